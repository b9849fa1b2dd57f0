//! Routing of reactor events to per-connection sessions.
//!
//! The reactor reports five events per connection. [`EventDispatch`] turns
//! them into calls on the [`Session`] attached to that connection, keeps the
//! [`SessionRegistry`] up to date, and contains session failures: a failing
//! session is logged and closed, and the dispatcher carries on with the
//! other connections.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::client::ClientSessionFactory;
use crate::error::{Error, Result};
use crate::io::{Channel, Connection, ConnectionId, IoHandle};
use crate::registry::SessionRegistry;
use crate::server::ServerSessionFactory;

/// Protocol logic of one connection.
///
/// All methods run on the thread that owns the connection.
pub trait Session {
    /// The connection has just been established.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot start.
    fn connected<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()>;

    /// The connection is gone.
    fn disconnected<C: Channel>(&mut self, io: &mut IoHandle<C>);

    /// The connection is readable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection has to be closed.
    fn consume_data<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()>;

    /// The connection is writable, or a pending result woke it.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection has to be closed.
    fn produce_data<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()>;

    /// The connection has been idle for too long.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection has to be closed.
    fn timeout<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()>;
}

/// Creates the session for a new connection.
pub trait SessionFactory: Send + Sync {
    /// Session type produced.
    type Session: Session;

    /// Creates a session for the connection behind `io`.
    fn create<C: Channel>(&self, io: &IoHandle<C>) -> Self::Session;
}

/// Reactor-facing event contract.
pub trait IoEventDispatch<C: Channel> {
    /// Session type attached to connections.
    type Session;

    /// A connection was established.
    fn connected(&self, conn: &mut Connection<C, Self::Session>);

    /// A connection was closed.
    fn disconnected(&self, conn: &mut Connection<C, Self::Session>);

    /// A connection became readable.
    fn input_ready(&self, conn: &mut Connection<C, Self::Session>);

    /// A connection became writable.
    fn output_ready(&self, conn: &mut Connection<C, Self::Session>);

    /// A connection was idle for too long.
    fn timeout(&self, conn: &mut Connection<C, Self::Session>);
}

/// A transport fault recorded by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Connection that failed.
    pub id: ConnectionId,
    /// Error description.
    pub message: String,
    /// When the fault was observed.
    pub at: DateTime<Utc>,
}

/// Bounded trail of transport faults, oldest entries dropped first.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl AuditLog {
    /// Creates a log keeping at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a fault.
    pub fn record(&self, id: ConnectionId, error: &Error) {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(AuditEntry {
            id,
            message: error.to_string(),
            at: Utc::now(),
        });
    }

    /// Returns the recorded faults, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Returns the number of recorded faults.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no fault was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Event dispatcher shared by all reactor threads.
#[derive(Debug)]
pub struct EventDispatch<F> {
    factory: F,
    registry: Arc<SessionRegistry>,
    audit: Arc<AuditLog>,
}

/// Dispatcher for accepted connections.
pub type ServerEventDispatch = EventDispatch<ServerSessionFactory>;

/// Dispatcher for outbound connections.
pub type ClientEventDispatch = EventDispatch<ClientSessionFactory>;

impl<F: SessionFactory> EventDispatch<F> {
    /// Creates a dispatcher registering connections in `registry`.
    #[must_use]
    pub fn new(factory: F, registry: Arc<SessionRegistry>) -> Self {
        Self {
            factory,
            registry,
            audit: Arc::new(AuditLog::default()),
        }
    }

    /// Replaces the audit log.
    #[must_use]
    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// The registry of live connections.
    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The audit log of transport faults.
    #[must_use]
    pub const fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// The session factory.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    fn handle_result<C: Channel>(&self, io: &mut IoHandle<C>, event: &'static str, result: Result<()>) {
        let Err(error) = result else {
            return;
        };
        if error.is_transport() {
            tracing::warn!(conn = %io.id(), event, %error, "transport fault");
            self.audit.record(io.id(), &error);
        } else {
            tracing::debug!(conn = %io.id(), event, %error, "session failed");
        }
        io.close();
    }
}

impl<C: Channel, F: SessionFactory> IoEventDispatch<C> for EventDispatch<F> {
    type Session = F::Session;

    fn connected(&self, conn: &mut Connection<C, Self::Session>) {
        self.registry.add(conn.id());
        tracing::info!(conn = %conn.id(), remote = ?conn.io.remote_addr(), "connected");
        let session = conn.session.insert(self.factory.create(&conn.io));
        let result = session.connected(&mut conn.io);
        self.handle_result(&mut conn.io, "connected", result);
    }

    fn disconnected(&self, conn: &mut Connection<C, Self::Session>) {
        if let Some(mut session) = conn.session.take() {
            session.disconnected(&mut conn.io);
        }
        self.registry.remove(conn.id());
        tracing::info!(conn = %conn.id(), "disconnected");
    }

    fn input_ready(&self, conn: &mut Connection<C, Self::Session>) {
        let result = match conn.session.as_mut() {
            Some(session) => session.consume_data(&mut conn.io),
            None => Err(Error::InvalidState("input on a connection without a session".into())),
        };
        if let Err(Error::InvalidState(reason)) = &result {
            tracing::error!(conn = %conn.id(), reason = %reason, "dispatch contract violated");
        }
        self.handle_result(&mut conn.io, "input", result);
    }

    fn output_ready(&self, conn: &mut Connection<C, Self::Session>) {
        let result = match conn.session.as_mut() {
            Some(session) => session.produce_data(&mut conn.io),
            None => Err(Error::InvalidState("output on a connection without a session".into())),
        };
        self.handle_result(&mut conn.io, "output", result);
    }

    fn timeout(&self, conn: &mut Connection<C, Self::Session>) {
        let result = match conn.session.as_mut() {
            Some(session) => session.timeout(&mut conn.io),
            None => Err(Error::InvalidState("timeout on a connection without a session".into())),
        };
        self.handle_result(&mut conn.io, "timeout", result);
    }
}

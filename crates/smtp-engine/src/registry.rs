//! Registry of live connections.
//!
//! The registry is the only structure touched by more than one thread: every
//! reactor thread adds and removes its own connections, while a shutdown
//! thread may block until the registry drains.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::io::ConnectionId;

/// Callback notified of registry membership changes.
///
/// Invoked while the registry lock is held, so implementations must not call
/// back into the registry.
pub trait RegistryCallback: Send + Sync {
    /// A connection was registered.
    fn added(&self, id: ConnectionId);

    /// A connection was deregistered.
    fn removed(&self, id: ConnectionId);
}

/// Thread-safe set of live connections with a shutdown barrier.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashSet<ConnectionId>>,
    changed: Condvar,
    callback: Option<Arc<dyn RegistryCallback>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry reporting changes to `callback`.
    #[must_use]
    pub fn with_callback(callback: Arc<dyn RegistryCallback>) -> Self {
        Self {
            callback: Some(callback),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ConnectionId>> {
        // The set stays consistent even if a callback panicked mid-update.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a connection. Adding a present id is a no-op for the set
    /// but still notifies the callback and any waiter.
    pub fn add(&self, id: ConnectionId) {
        let mut sessions = self.lock();
        sessions.insert(id);
        if let Some(callback) = &self.callback {
            callback.added(id);
        }
        self.changed.notify_all();
        tracing::trace!(conn = %id, live = sessions.len(), "session registered");
    }

    /// Deregisters a connection. Removing an absent id is harmless.
    pub fn remove(&self, id: ConnectionId) {
        let mut sessions = self.lock();
        sessions.remove(&id);
        if let Some(callback) = &self.callback {
            callback.removed(id);
        }
        self.changed.notify_all();
        tracing::trace!(conn = %id, live = sessions.len(), "session deregistered");
    }

    /// Registers `id` if present; `None` is ignored.
    pub fn add_opt(&self, id: Option<ConnectionId>) {
        if let Some(id) = id {
            self.add(id);
        }
    }

    /// Deregisters `id` if present; `None` is ignored.
    pub fn remove_opt(&self, id: Option<ConnectionId>) {
        if let Some(id) = id {
            self.remove(id);
        }
    }

    /// Returns true if no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains(&id)
    }

    /// Returns a point-in-time copy of the registered connections.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Blocks until the registry is empty or `timeout` elapses.
    ///
    /// Returns true if the registry drained in time.
    #[must_use]
    pub fn wait_until_empty(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut sessions = self.lock();
        while !sessions.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sessions = self
                .changed
                .wait_timeout(sessions, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.snapshot())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

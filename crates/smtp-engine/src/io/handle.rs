//! Connection handles exchanged with the reactor.

use std::fmt;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Waker;

/// A non-blocking byte stream.
///
/// Reads and writes return [`std::io::ErrorKind::WouldBlock`] when no
/// progress can be made, and a read of `Ok(0)` signals an orderly close by
/// the peer.
pub trait Channel: Read + Write {}

impl<T: Read + Write> Channel for T {}

/// Identifier of a live connection, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Allocates a fresh identifier.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Readiness events a connection is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest(u8);

impl Interest {
    /// No interest.
    pub const NONE: Self = Self(0);
    /// Interest in the connection becoming readable.
    pub const READ: Self = Self(0b01);
    /// Interest in the connection becoming writable.
    pub const WRITE: Self = Self(0b10);

    /// Returns true if all events in `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if readable interest is set.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        self.contains(Self::READ)
    }

    /// Returns true if writable interest is set.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Returns the events of `self` that are not in `other`.
    #[must_use]
    pub const fn remove(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for Interest {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The engine's view of one connection.
///
/// Owned by the reactor thread that services the connection; the engine only
/// ever touches it from inside a dispatch callback.
pub struct IoHandle<C> {
    id: ConnectionId,
    channel: C,
    interest: Interest,
    closed: bool,
    remote_addr: Option<SocketAddr>,
    waker: Option<Waker>,
}

impl<C: Channel> IoHandle<C> {
    /// Wraps a channel with a fresh connection id and read interest.
    #[must_use]
    pub fn new(channel: C) -> Self {
        Self {
            id: ConnectionId::next(),
            channel,
            interest: Interest::READ,
            closed: false,
            remote_addr: None,
            waker: None,
        }
    }

    /// Sets the peer address.
    #[must_use]
    pub const fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the waker used to schedule this connection from other threads.
    ///
    /// Waking it must make the reactor call `output_ready` for this
    /// connection on its owning thread.
    #[must_use]
    pub fn with_waker(mut self, waker: Waker) -> Self {
        self.waker = Some(waker);
        self
    }
}

impl<C> IoHandle<C> {
    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the underlying channel.
    pub const fn channel(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Returns the current interest set.
    #[must_use]
    pub const fn interest(&self) -> Interest {
        self.interest
    }

    /// Replaces the interest set.
    pub const fn set_interest(&mut self, interest: Interest) {
        self.interest = interest;
    }

    /// Adds events to the interest set.
    pub fn set_event(&mut self, interest: Interest) {
        self.interest |= interest;
    }

    /// Removes events from the interest set.
    pub const fn clear_event(&mut self, interest: Interest) {
        self.interest = self.interest.remove(interest);
    }

    /// Returns the waker for this connection; a no-op waker unless the
    /// reactor supplied one.
    #[must_use]
    pub fn waker(&self) -> &Waker {
        self.waker.as_ref().unwrap_or(Waker::noop())
    }

    /// Returns true if the reactor supplied a waker.
    #[must_use]
    pub const fn has_waker(&self) -> bool {
        self.waker.is_some()
    }

    /// Requests the reactor to close the connection.
    pub const fn close(&mut self) {
        self.closed = true;
        self.interest = Interest::NONE;
    }

    /// Returns true once the engine asked for the connection to be closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<C> fmt::Debug for IoHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoHandle")
            .field("id", &self.id)
            .field("interest", &self.interest)
            .field("closed", &self.closed)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

/// A connection as held by the reactor: the I/O handle plus the protocol
/// session attached to it at connect time.
#[derive(Debug)]
pub struct Connection<C, S> {
    /// I/O side of the connection.
    pub io: IoHandle<C>,
    /// Attached session; `None` until `connected` has run.
    pub session: Option<S>,
}

impl<C: Channel, S> Connection<C, S> {
    /// Creates a connection with no session attached.
    #[must_use]
    pub const fn new(io: IoHandle<C>) -> Self {
        Self { io, session: None }
    }
}

impl<C, S> Connection<C, S> {
    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.io.id()
    }
}

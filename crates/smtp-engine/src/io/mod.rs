//! Reactor-facing I/O primitives.
//!
//! The engine never owns sockets or an event loop. A reactor hands each
//! connection to the engine as an [`IoHandle`] wrapping a non-blocking
//! [`Channel`], and reads back the [`Interest`] the protocol asked for.

mod buffers;
mod handle;

pub use buffers::{Fill, SessionBuffers};
pub use handle::{Channel, Connection, ConnectionId, Interest, IoHandle};

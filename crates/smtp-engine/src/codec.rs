//! The protocol codec contract shared by client and server sessions.
//!
//! A session drives one codec at a time. Each codec owns one sub-dialogue
//! (greeting, hello, envelope, content, reset, quit), reads and writes the
//! session buffers when the reactor reports readiness, and once complete
//! names the next outer [`ProtocolState`].

use std::fmt;

use crate::error::Result;
use crate::io::{Channel, Fill, Interest, IoHandle, SessionBuffers};
use crate::parser::ReplyParser;
use crate::types::Reply;

/// Outer state of an SMTP dialogue.
///
/// These name whole sub-dialogues and are distinct from the internal states
/// of any one codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    /// Greeting exchange.
    Init,
    /// HELO/EHLO exchange.
    Hello,
    /// MAIL, RCPT and DATA commands.
    Envelope,
    /// Message content after a `354`.
    Content,
    /// RSET after a failed transaction.
    Reset,
    /// QUIT and connection teardown.
    Quit,
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Hello => "HELLO",
            Self::Envelope => "ENVELOPE",
            Self::Content => "CONTENT",
            Self::Reset => "RESET",
            Self::Quit => "QUIT",
        };
        f.write_str(name)
    }
}

/// A finite-state codec for one sub-dialogue over session state `S`.
pub trait ProtocolCodec<S> {
    /// Prepares the codec for (re)use and sets the initial interest.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered input or output could not be processed.
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut S,
    ) -> Result<()>;

    /// Called when the connection is writable.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a fatal protocol condition.
    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut S,
    ) -> Result<()>;

    /// Called when the connection is readable.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a fatal protocol condition.
    fn consume_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut S,
    ) -> Result<()>;

    /// Returns true once the sub-dialogue is over.
    fn is_completed(&self) -> bool;

    /// The outer state to move to; `None` until completed, and `None` after
    /// completion when the connection should simply be closed.
    fn next(&self, state: &S) -> Option<ProtocolState>;
}

/// Writes buffered output and keeps write interest only while some of it
/// is left.
pub(crate) fn flush_output<C: Channel>(
    io: &mut IoHandle<C>,
    buffers: &mut SessionBuffers,
) -> Result<()> {
    if buffers.has_output() {
        let written = buffers.flush(io.channel())?;
        tracing::trace!(conn = %io.id(), written, "output flushed");
    }
    if buffers.has_output() {
        io.set_event(Interest::WRITE);
    } else {
        io.clear_event(Interest::WRITE);
    }
    Ok(())
}

/// Reads once and tries to assemble one reply.
///
/// Returns the reply, if complete, and whether the peer closed the stream.
pub(crate) fn read_reply<C: Channel>(
    io: &mut IoHandle<C>,
    buffers: &mut SessionBuffers,
    parser: &mut ReplyParser,
) -> Result<(Option<Reply>, bool)> {
    let fill = buffers.fill(io.channel())?;
    let end_of_stream = fill.is_end_of_stream();
    if let Fill::Data(n) = fill
        && n > 0
    {
        tracing::trace!(conn = %io.id(), read = n, "input received");
    }
    let reply = parser.parse(buffers.inbuf(), end_of_stream)?;
    if let Some(reply) = &reply {
        tracing::trace!(conn = %io.id(), code = %reply.code, "reply received");
    }
    Ok((reply, end_of_stream))
}

/// Stops command intake while a pending result is outstanding.
///
/// Without a reactor waker nothing would schedule the connection on
/// completion, so the result is polled on write readiness instead.
pub(crate) fn hold_for_pending<C: Channel>(io: &mut IoHandle<C>) {
    io.clear_event(Interest::READ);
    if !io.has_waker() {
        io.set_event(Interest::WRITE);
    }
}

//! `RSET` after a refused transaction, and `QUIT`.

use super::ClientState;
use super::exchange::{Exchange, Phase};
use crate::codec::{ProtocolCodec, ProtocolState};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::io::{Channel, IoHandle, SessionBuffers};
use crate::parser::ReplyParser;
use crate::types::ReplyCode;

/// Client codec clearing the server's envelope state before the next
/// request.
#[derive(Debug)]
pub struct ResetCodec {
    exchange: Exchange,
}

impl ResetCodec {
    /// Creates the codec.
    #[must_use]
    pub const fn new(max_line_length: usize) -> Self {
        Self {
            exchange: Exchange::new(ReplyParser::new(false).with_max_line_length(max_line_length)),
        }
    }
}

impl ProtocolCodec<ClientState> for ResetCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        _buffers: &mut SessionBuffers,
        _state: &mut ClientState,
    ) -> Result<()> {
        self.exchange.reset(io);
        Ok(())
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        _state: &mut ClientState,
    ) -> Result<()> {
        self.exchange
            .send(io, buffers, |buf| Command::rset().write_to(buf))
    }

    fn consume_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        let (reply, end_of_stream) = self.exchange.receive(io, buffers)?;
        if let Some(reply) = reply {
            if reply.code != ReplyCode::SERVICE_UNAVAILABLE
                && self.exchange.phase() != Phase::ResponseExpected
            {
                return Err(Error::protocol(format!("Unexpected reply: {reply}")));
            }
            if reply.code != ReplyCode::OK {
                tracing::warn!(conn = %io.id(), code = %reply.code, "RSET refused");
                state.terminate();
            }
            self.exchange.complete();
        }
        if end_of_stream && !state.is_terminated() {
            return Err(Error::UnexpectedEndOfStream);
        }
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.exchange.phase() == Phase::Completed
    }

    fn next(&self, state: &ClientState) -> Option<ProtocolState> {
        if !self.is_completed() {
            return None;
        }
        if state.is_terminated() {
            Some(ProtocolState::Quit)
        } else {
            Some(ProtocolState::Envelope)
        }
    }
}

/// Client codec ending the session.
///
/// Completes on any reply or when the server closes first; the session
/// then closes the connection.
#[derive(Debug)]
pub struct QuitCodec {
    exchange: Exchange,
}

impl QuitCodec {
    /// Creates the codec.
    #[must_use]
    pub const fn new(max_line_length: usize) -> Self {
        Self {
            exchange: Exchange::new(ReplyParser::new(false).with_max_line_length(max_line_length)),
        }
    }
}

impl ProtocolCodec<ClientState> for QuitCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        _buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        state.terminate();
        self.exchange.reset(io);
        Ok(())
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        _state: &mut ClientState,
    ) -> Result<()> {
        self.exchange
            .send(io, buffers, |buf| Command::quit().write_to(buf))
    }

    fn consume_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        _state: &mut ClientState,
    ) -> Result<()> {
        let (reply, end_of_stream) = self.exchange.receive(io, buffers)?;
        if let Some(reply) = &reply {
            tracing::debug!(conn = %io.id(), code = %reply.code, "QUIT acknowledged");
        }
        if reply.is_some() || end_of_stream {
            self.exchange.complete();
        }
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.exchange.phase() == Phase::Completed
    }

    fn next(&self, _state: &ClientState) -> Option<ProtocolState> {
        None
    }
}

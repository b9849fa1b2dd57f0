//! Waits for the server greeting.

use super::ClientState;
use crate::codec::{ProtocolCodec, ProtocolState, flush_output, read_reply};
use crate::error::{Error, Result};
use crate::io::{Channel, Interest, IoHandle, SessionBuffers};
use crate::parser::ReplyParser;
use crate::types::ReplyCode;

/// Client codec consuming the `220` greeting.
///
/// Any other greeting ends the session with `QUIT`.
#[derive(Debug)]
pub struct ServiceReadyCodec {
    parser: ReplyParser,
    completed: bool,
}

impl ServiceReadyCodec {
    /// Creates the codec.
    #[must_use]
    pub const fn new(max_line_length: usize) -> Self {
        Self {
            parser: ReplyParser::new(false).with_max_line_length(max_line_length),
            completed: false,
        }
    }
}

impl ProtocolCodec<ClientState> for ServiceReadyCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        _buffers: &mut SessionBuffers,
        _state: &mut ClientState,
    ) -> Result<()> {
        self.parser.reset();
        self.completed = false;
        io.set_interest(Interest::READ);
        Ok(())
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        _state: &mut ClientState,
    ) -> Result<()> {
        flush_output(io, buffers)
    }

    fn consume_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        let (reply, end_of_stream) = read_reply(io, buffers, &mut self.parser)?;
        if let Some(reply) = reply {
            if reply.code == ReplyCode::SERVICE_READY {
                tracing::debug!(conn = %io.id(), greeting = %reply.message_text(), "server ready");
            } else {
                tracing::warn!(conn = %io.id(), code = %reply.code, "server refused the session");
                state.set_reply(reply);
                state.terminate();
            }
            self.completed = true;
        }
        if end_of_stream && !self.completed {
            return Err(Error::UnexpectedEndOfStream);
        }
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn next(&self, state: &ClientState) -> Option<ProtocolState> {
        if !self.completed {
            return None;
        }
        if state.is_terminated() {
            Some(ProtocolState::Quit)
        } else {
            Some(ProtocolState::Hello)
        }
    }
}

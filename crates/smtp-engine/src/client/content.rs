//! Message content transfer after a `354`.

use super::ClientState;
use super::exchange::{Exchange, Phase};
use crate::codec::{ProtocolCodec, ProtocolState};
use crate::error::{Error, Result};
use crate::io::{Channel, IoHandle, SessionBuffers};
use crate::parser::{ReplyParser, write_content};
use crate::types::ReplyCode;

/// Client codec sending the dot-stuffed content of the current request and
/// collecting the server's verdict.
#[derive(Debug)]
pub struct SendContentCodec {
    exchange: Exchange,
}

impl SendContentCodec {
    /// Creates the codec.
    #[must_use]
    pub const fn new(enhanced_codes: bool, max_line_length: usize) -> Self {
        Self {
            exchange: Exchange::new(
                ReplyParser::new(enhanced_codes).with_max_line_length(max_line_length),
            ),
        }
    }
}

impl ProtocolCodec<ClientState> for SendContentCodec {
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
        state: &mut ClientState,
    ) -> Result<()> {
        let request = state
            .request()
            .ok_or_else(|| Error::InvalidState("no content to send".into()))?;
        if self.exchange.phase() == Phase::RequestReady {
            tracing::debug!(conn = %io.id(), size = request.content().len(), "sending content");
        }
        self.exchange
            .send(io, buffers, |buf| write_content(request.content(), buf))
    }

    fn consume_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        let (reply, end_of_stream) = self.exchange.receive(io, buffers)?;
        if let Some(reply) = reply {
            if reply.code == ReplyCode::SERVICE_UNAVAILABLE {
                state.terminate();
            } else if self.exchange.phase() != Phase::ResponseExpected {
                return Err(Error::protocol(format!("Unexpected reply: {reply}")));
            }
            tracing::debug!(conn = %io.id(), code = %reply.code, "content acknowledged");
            state.set_reply(reply);
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

//! Server teardown: drain the last replies, then close.

use super::ServerState;
use crate::codec::{ProtocolCodec, ProtocolState, flush_output};
use crate::error::Result;
use crate::io::{Channel, Interest, IoHandle, SessionBuffers};

/// Flushes pending output and completes with no next state.
#[derive(Debug, Default)]
pub struct DisconnectCodec {
    completed: bool,
}

impl DisconnectCodec {
    /// Creates the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self { completed: false }
    }
}

impl ProtocolCodec<ServerState> for DisconnectCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        state.terminate();
        io.clear_event(Interest::READ);
        self.produce_data(io, buffers, state)
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        _state: &mut ServerState,
    ) -> Result<()> {
        flush_output(io, buffers)?;
        self.completed = !buffers.has_output();
        Ok(())
    }

    fn consume_data<C: Channel>(
        &mut self,
        _io: &mut IoHandle<C>,
        _buffers: &mut SessionBuffers,
        _state: &mut ServerState,
    ) -> Result<()> {
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn next(&self, _state: &ServerState) -> Option<ProtocolState> {
        None
    }
}

//! Server greeting, or rejection of an unwanted client.

use std::sync::Arc;

use super::ServerState;
use crate::codec::{ProtocolCodec, ProtocolState, flush_output};
use crate::error::Result;
use crate::io::{Channel, Interest, IoHandle, SessionBuffers};
use crate::types::{Reply, ReplyCode};
use crate::validate::RemoteAddressValidator;

/// Sends `220`, or `554` when the remote address validator turns the
/// client away, in which case the connection is closed once it is out.
pub struct GreetingCodec {
    admission: Option<Arc<dyn RemoteAddressValidator>>,
    completed: bool,
}

impl GreetingCodec {
    /// Creates a codec consulting `admission`, if any.
    #[must_use]
    pub fn new(admission: Option<Arc<dyn RemoteAddressValidator>>) -> Self {
        Self {
            admission,
            completed: false,
        }
    }
}

impl std::fmt::Debug for GreetingCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreetingCodec")
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl ProtocolCodec<ServerState> for GreetingCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        self.completed = false;
        let admitted = self
            .admission
            .as_ref()
            .is_none_or(|admission| admission.accept(state.client_addr()));

        let reply = if admitted {
            Reply::new(
                ReplyCode::SERVICE_READY,
                None,
                format!("{} ESMTP service ready", state.server_id()),
            )
        } else {
            tracing::info!(conn = %io.id(), remote = ?state.client_addr(), "client rejected");
            state.terminate();
            Reply::new(
                ReplyCode::TRANSACTION_FAILED,
                None,
                format!("{} service not available", state.server_id()),
            )
        };
        reply.write_to(buffers.outbuf());
        io.set_interest(Interest::WRITE);
        Ok(())
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

    fn next(&self, state: &ServerState) -> Option<ProtocolState> {
        if !self.completed || state.is_terminated() {
            None
        } else {
            Some(ProtocolState::Envelope)
        }
    }
}

//! The client session: drives the codecs through greeting, hello, one
//! transaction per request, and quit.

use std::sync::Arc;

use super::{
    ClientState, HelloCodec, QuitCodec, ResetCodec, SendContentCodec, SendEnvelopeCodec,
    ServiceReadyCodec,
};
use crate::codec::{ProtocolCodec, ProtocolState};
use crate::config::{ClientConfig, TimeoutPolicy};
use crate::delivery::{DeliveryRequestHandler, DeliveryResult, SessionContext};
use crate::dispatch::{Session, SessionFactory};
use crate::error::{Error, Result};
use crate::io::{Channel, IoHandle, SessionBuffers};
use crate::types::Extension;

/// The codec for the current client sub-dialogue.
#[derive(Debug)]
pub enum ClientCodec {
    /// Waiting for the greeting.
    ServiceReady(ServiceReadyCodec),
    /// EHLO / HELO.
    Hello(HelloCodec),
    /// MAIL / RCPT / DATA.
    Envelope(SendEnvelopeCodec),
    /// Message content.
    Content(SendContentCodec),
    /// RSET.
    Reset(ResetCodec),
    /// QUIT.
    Quit(QuitCodec),
}

impl ClientCodec {
    /// Creates the codec handling `protocol_state`.
    #[must_use]
    pub fn for_state(protocol_state: ProtocolState, config: &ClientConfig, state: &ClientState) -> Self {
        let max = config.max_line_length;
        let enhanced = config.enhanced_codes && state.supports(&Extension::EnhancedStatusCodes);
        match protocol_state {
            ProtocolState::Init => Self::ServiceReady(ServiceReadyCodec::new(max)),
            ProtocolState::Hello => Self::Hello(HelloCodec::new(config.helo_name.clone(), max)),
            ProtocolState::Envelope => {
                Self::Envelope(SendEnvelopeCodec::new(enhanced).with_max_line_length(max))
            }
            ProtocolState::Content => Self::Content(SendContentCodec::new(enhanced, max)),
            ProtocolState::Reset => Self::Reset(ResetCodec::new(max)),
            ProtocolState::Quit => Self::Quit(QuitCodec::new(max)),
        }
    }
}

impl ProtocolCodec<ClientState> for ClientCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        match self {
            Self::ServiceReady(codec) => codec.reset(io, buffers, state),
            Self::Hello(codec) => codec.reset(io, buffers, state),
            Self::Envelope(codec) => codec.reset(io, buffers, state),
            Self::Content(codec) => codec.reset(io, buffers, state),
            Self::Reset(codec) => codec.reset(io, buffers, state),
            Self::Quit(codec) => codec.reset(io, buffers, state),
        }
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        match self {
            Self::ServiceReady(codec) => codec.produce_data(io, buffers, state),
            Self::Hello(codec) => codec.produce_data(io, buffers, state),
            Self::Envelope(codec) => codec.produce_data(io, buffers, state),
            Self::Content(codec) => codec.produce_data(io, buffers, state),
            Self::Reset(codec) => codec.produce_data(io, buffers, state),
            Self::Quit(codec) => codec.produce_data(io, buffers, state),
        }
    }

    fn consume_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        match self {
            Self::ServiceReady(codec) => codec.consume_data(io, buffers, state),
            Self::Hello(codec) => codec.consume_data(io, buffers, state),
            Self::Envelope(codec) => codec.consume_data(io, buffers, state),
            Self::Content(codec) => codec.consume_data(io, buffers, state),
            Self::Reset(codec) => codec.consume_data(io, buffers, state),
            Self::Quit(codec) => codec.consume_data(io, buffers, state),
        }
    }

    fn is_completed(&self) -> bool {
        match self {
            Self::ServiceReady(codec) => codec.is_completed(),
            Self::Hello(codec) => codec.is_completed(),
            Self::Envelope(codec) => codec.is_completed(),
            Self::Content(codec) => codec.is_completed(),
            Self::Reset(codec) => codec.is_completed(),
            Self::Quit(codec) => codec.is_completed(),
        }
    }

    fn next(&self, state: &ClientState) -> Option<ProtocolState> {
        match self {
            Self::ServiceReady(codec) => codec.next(state),
            Self::Hello(codec) => codec.next(state),
            Self::Envelope(codec) => codec.next(state),
            Self::Content(codec) => codec.next(state),
            Self::Reset(codec) => codec.next(state),
            Self::Quit(codec) => codec.next(state),
        }
    }
}

/// Outbound SMTP session.
pub struct ClientSession {
    config: Arc<ClientConfig>,
    handler: Arc<dyn DeliveryRequestHandler>,
    context: SessionContext,
    state: ClientState,
    buffers: SessionBuffers,
    protocol_state: ProtocolState,
    codec: ClientCodec,
}

impl ClientSession {
    /// Creates a session for the connection described by `context`.
    #[must_use]
    pub fn new(
        config: Arc<ClientConfig>,
        handler: Arc<dyn DeliveryRequestHandler>,
        context: SessionContext,
    ) -> Self {
        let state = ClientState::new();
        let codec = ClientCodec::for_state(ProtocolState::Init, &config, &state);
        Self {
            config,
            handler,
            context,
            state,
            buffers: SessionBuffers::new(),
            protocol_state: ProtocolState::Init,
            codec,
        }
    }

    /// The current outer state.
    #[must_use]
    pub const fn protocol_state(&self) -> ProtocolState {
        self.protocol_state
    }

    /// The session state.
    #[must_use]
    pub const fn state(&self) -> &ClientState {
        &self.state
    }

    /// Moves through every completed codec.
    fn advance<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()> {
        while self.codec.is_completed() {
            let Some(next) = self.codec.next(&self.state) else {
                tracing::debug!(conn = %io.id(), "session finished");
                io.close();
                return Ok(());
            };

            let leaving = self.protocol_state;
            if leaving == ProtocolState::Content
                || (leaving == ProtocolState::Envelope && next != ProtocolState::Content)
            {
                self.report();
            }
            if next == ProtocolState::Envelope {
                self.next_request();
            }

            tracing::debug!(conn = %io.id(), from = %leaving, to = %next, "state transition");
            self.protocol_state = next;
            self.codec = ClientCodec::for_state(next, &self.config, &self.state);
            self.codec.reset(io, &mut self.buffers, &mut self.state)?;
            if next == ProtocolState::Envelope && self.state.request().is_none() {
                self.codec.produce_data(io, &mut self.buffers, &mut self.state)?;
            }
        }
        Ok(())
    }

    fn next_request(&mut self) {
        let request = if self.state.is_terminated() {
            None
        } else {
            self.handler.submit_request(&self.context)
        };
        if request.is_none() {
            self.state.terminate();
        }
        self.state.reset(request);
    }

    /// Reports the outcome of the current transaction, at most once.
    fn report(&mut self) {
        if let (Some(request), Some(result)) = (
            self.state.request().cloned(),
            DeliveryResult::from_state(&self.state),
        ) {
            if result.is_success() {
                tracing::info!(
                    conn = %self.context.id,
                    accepted = result.accepted().len(),
                    failed = result.failures().len(),
                    "delivery completed"
                );
                self.handler.completed(&request, &result, &self.context);
            } else {
                tracing::info!(conn = %self.context.id, code = %result.reply().code, "delivery failed");
                self.handler.failed(&request, &result, &self.context);
            }
        }
        self.state.reset(None);
    }

    fn fail<C: Channel>(&self, io: &mut IoHandle<C>, error: Error) -> Error {
        tracing::warn!(conn = %io.id(), state = %self.protocol_state, %error, "session aborted");
        self.handler.exception(&error, &self.context);
        io.close();
        error
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("context", &self.context)
            .field("protocol_state", &self.protocol_state)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session for ClientSession {
    fn connected<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()> {
        self.handler.connected(&self.context);
        self.codec
            .reset(io, &mut self.buffers, &mut self.state)
            .map_err(|error| self.fail(io, error))
    }

    fn disconnected<C: Channel>(&mut self, io: &mut IoHandle<C>) {
        tracing::debug!(conn = %io.id(), state = %self.protocol_state, "client session disconnected");
        self.handler.disconnected(&self.context);
    }

    fn consume_data<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()> {
        self.codec
            .consume_data(io, &mut self.buffers, &mut self.state)
            .and_then(|()| self.advance(io))
            .map_err(|error| self.fail(io, error))
    }

    fn produce_data<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()> {
        self.codec
            .produce_data(io, &mut self.buffers, &mut self.state)
            .and_then(|()| self.advance(io))
            .map_err(|error| self.fail(io, error))
    }

    fn timeout<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()> {
        match self.config.timeout_policy {
            TimeoutPolicy::Ignore => {
                tracing::debug!(conn = %io.id(), "idle timeout ignored");
                Ok(())
            }
            TimeoutPolicy::Close => {
                let error = Error::Timeout(self.config.idle_timeout);
                tracing::warn!(conn = %io.id(), state = %self.protocol_state, "idle timeout");
                self.handler.exception(&error, &self.context);
                io.close();
                Ok(())
            }
        }
    }
}

/// Creates client sessions sharing one configuration and request handler.
#[derive(Clone)]
pub struct ClientSessionFactory {
    config: Arc<ClientConfig>,
    handler: Arc<dyn DeliveryRequestHandler>,
}

impl ClientSessionFactory {
    /// Creates a factory.
    #[must_use]
    pub fn new(config: ClientConfig, handler: Arc<dyn DeliveryRequestHandler>) -> Self {
        Self {
            config: Arc::new(config),
            handler,
        }
    }
}

impl std::fmt::Debug for ClientSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSessionFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionFactory for ClientSessionFactory {
    type Session = ClientSession;

    fn create<C: Channel>(&self, io: &IoHandle<C>) -> ClientSession {
        ClientSession::new(
            Arc::clone(&self.config),
            Arc::clone(&self.handler),
            SessionContext {
                id: io.id(),
                remote_addr: io.remote_addr(),
            },
        )
    }
}

//! The server session: greeting, envelope command loop, content, repeat.

use std::sync::Arc;

use super::{
    CommandHandlers, DisconnectCodec, GreetingCodec, ReceiveContentCodec, ReceiveEnvelopeCodec,
    ServerState,
};
use crate::codec::{ProtocolCodec, ProtocolState};
use crate::config::{ServerConfig, TimeoutPolicy};
use crate::dispatch::{Session, SessionFactory};
use crate::error::{Error, Result};
use crate::id::{BasicIdGenerator, IdGenerator};
use crate::io::{Channel, IoHandle, SessionBuffers};
use crate::types::{EnhancedCode, Extension, ReplyCode};
use crate::validate::{AcceptAll, DeliveryHandler, EnvelopeValidator, RemoteAddressValidator};

/// The codec for the current server sub-dialogue.
#[derive(Debug)]
pub enum ServerCodec {
    /// Greeting.
    Greeting(GreetingCodec),
    /// Command loop.
    Envelope(ReceiveEnvelopeCodec),
    /// Message content.
    Content(ReceiveContentCodec),
    /// Teardown.
    Quit(DisconnectCodec),
}

impl ServerCodec {
    /// Creates the codec handling `protocol_state`.
    #[must_use]
    pub fn for_state(protocol_state: ProtocolState, services: &ServerServices, state: &ServerState) -> Self {
        match protocol_state {
            ProtocolState::Init => Self::Greeting(GreetingCodec::new(services.admission.clone())),
            ProtocolState::Hello | ProtocolState::Envelope | ProtocolState::Reset => {
                Self::Envelope(ReceiveEnvelopeCodec::new(
                    services.handlers(),
                    services.config.max_line_length,
                ))
            }
            ProtocolState::Content => Self::Content(ReceiveContentCodec::new(
                Arc::clone(&services.delivery),
                state.max_message_size(),
            )),
            ProtocolState::Quit => Self::Quit(DisconnectCodec::new()),
        }
    }
}

impl ProtocolCodec<ServerState> for ServerCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        match self {
            Self::Greeting(codec) => codec.reset(io, buffers, state),
            Self::Envelope(codec) => codec.reset(io, buffers, state),
            Self::Content(codec) => codec.reset(io, buffers, state),
            Self::Quit(codec) => codec.reset(io, buffers, state),
        }
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        match self {
            Self::Greeting(codec) => codec.produce_data(io, buffers, state),
            Self::Envelope(codec) => codec.produce_data(io, buffers, state),
            Self::Content(codec) => codec.produce_data(io, buffers, state),
            Self::Quit(codec) => codec.produce_data(io, buffers, state),
        }
    }

    fn consume_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        match self {
            Self::Greeting(codec) => codec.consume_data(io, buffers, state),
            Self::Envelope(codec) => codec.consume_data(io, buffers, state),
            Self::Content(codec) => codec.consume_data(io, buffers, state),
            Self::Quit(codec) => codec.consume_data(io, buffers, state),
        }
    }

    fn is_completed(&self) -> bool {
        match self {
            Self::Greeting(codec) => codec.is_completed(),
            Self::Envelope(codec) => codec.is_completed(),
            Self::Content(codec) => codec.is_completed(),
            Self::Quit(codec) => codec.is_completed(),
        }
    }

    fn next(&self, state: &ServerState) -> Option<ProtocolState> {
        match self {
            Self::Greeting(codec) => codec.next(state),
            Self::Envelope(codec) => codec.next(state),
            Self::Content(codec) => codec.next(state),
            Self::Quit(codec) => codec.next(state),
        }
    }
}

/// Collaborators shared by every session of one server.
#[derive(Clone)]
pub struct ServerServices {
    config: ServerConfig,
    extensions: Vec<Extension>,
    validator: Arc<dyn EnvelopeValidator>,
    ids: Arc<dyn IdGenerator>,
    delivery: Arc<dyn DeliveryHandler>,
    admission: Option<Arc<dyn RemoteAddressValidator>>,
}

impl ServerServices {
    fn handlers(&self) -> CommandHandlers {
        CommandHandlers::new(Arc::clone(&self.validator), Arc::clone(&self.ids))
    }

    /// The server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for ServerServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerServices")
            .field("config", &self.config)
            .field("admission", &self.admission.is_some())
            .finish_non_exhaustive()
    }
}

/// Inbound SMTP session.
#[derive(Debug)]
pub struct ServerSession {
    services: Arc<ServerServices>,
    state: ServerState,
    buffers: SessionBuffers,
    protocol_state: ProtocolState,
    codec: ServerCodec,
}

impl ServerSession {
    /// Creates a session for a client at `state.client_addr()`.
    #[must_use]
    pub fn new(services: Arc<ServerServices>, state: ServerState) -> Self {
        let codec = ServerCodec::for_state(ProtocolState::Init, &services, &state);
        Self {
            services,
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
    pub const fn state(&self) -> &ServerState {
        &self.state
    }

    fn advance<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()> {
        while self.codec.is_completed() {
            let Some(next) = self.codec.next(&self.state) else {
                tracing::debug!(conn = %io.id(), "session finished");
                io.close();
                return Ok(());
            };
            self.enter(io, next)?;
        }
        Ok(())
    }

    fn enter<C: Channel>(&mut self, io: &mut IoHandle<C>, next: ProtocolState) -> Result<()> {
        tracing::debug!(conn = %io.id(), from = %self.protocol_state, to = %next, "state transition");
        self.protocol_state = next;
        self.codec = ServerCodec::for_state(next, &self.services, &self.state);
        self.codec.reset(io, &mut self.buffers, &mut self.state)
    }

    fn fail<C: Channel>(&self, io: &mut IoHandle<C>, error: Error) -> Error {
        tracing::warn!(conn = %io.id(), state = %self.protocol_state, %error, "session aborted");
        io.close();
        error
    }
}

impl Session for ServerSession {
    fn connected<C: Channel>(&mut self, io: &mut IoHandle<C>) -> Result<()> {
        tracing::info!(conn = %io.id(), remote = ?io.remote_addr(), "client connected");
        self.codec
            .reset(io, &mut self.buffers, &mut self.state)
            .and_then(|()| self.advance(io))
            .map_err(|error| self.fail(io, error))
    }

    fn disconnected<C: Channel>(&mut self, io: &mut IoHandle<C>) {
        tracing::info!(conn = %io.id(), state = %self.protocol_state, "client disconnected");
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
        match self.services.config.timeout_policy {
            TimeoutPolicy::Ignore => {
                tracing::debug!(conn = %io.id(), "idle timeout ignored");
                Ok(())
            }
            TimeoutPolicy::Close => {
                tracing::warn!(conn = %io.id(), state = %self.protocol_state, "idle timeout");
                if self.protocol_state != ProtocolState::Quit {
                    let reply = self.state.reply(
                        ReplyCode::SERVICE_UNAVAILABLE,
                        EnhancedCode::new(4, 4, 2),
                        format!("{} idle timeout, closing connection", self.state.server_id()),
                    );
                    reply.write_to(self.buffers.outbuf());
                }
                self.enter(io, ProtocolState::Quit)
                    .and_then(|()| self.advance(io))
                    .map_err(|error| self.fail(io, error))
            }
        }
    }
}

/// Creates server sessions sharing one configuration and set of
/// collaborators.
#[derive(Debug, Clone)]
pub struct ServerSessionFactory {
    services: Arc<ServerServices>,
}

impl ServerSessionFactory {
    /// Creates a factory handing received messages to `delivery`.
    ///
    /// Every address is accepted and message ids come from a
    /// [`BasicIdGenerator`] until replaced.
    #[must_use]
    pub fn new(config: ServerConfig, delivery: Arc<dyn DeliveryHandler>) -> Self {
        let extensions = config.advertised_extensions();
        Self {
            services: Arc::new(ServerServices {
                config,
                extensions,
                validator: Arc::new(AcceptAll),
                ids: Arc::new(BasicIdGenerator::new()),
                delivery,
                admission: None,
            }),
        }
    }

    /// Sets the envelope validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn EnvelopeValidator>) -> Self {
        Arc::make_mut(&mut self.services).validator = validator;
        self
    }

    /// Sets the validator deciding which clients are greeted.
    #[must_use]
    pub fn with_remote_validator(mut self, admission: Arc<dyn RemoteAddressValidator>) -> Self {
        Arc::make_mut(&mut self.services).admission = Some(admission);
        self
    }

    /// Sets the message id generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        Arc::make_mut(&mut self.services).ids = ids;
        self
    }

    /// The shared collaborators.
    #[must_use]
    pub fn services(&self) -> &ServerServices {
        &self.services
    }
}

impl SessionFactory for ServerSessionFactory {
    type Session = ServerSession;

    fn create<C: Channel>(&self, io: &IoHandle<C>) -> ServerSession {
        let state = ServerState::new(
            self.services.config.server_id.clone(),
            self.services.extensions.clone(),
        )
        .with_client_addr(io.remote_addr());
        ServerSession::new(Arc::clone(&self.services), state)
    }
}

//! EHLO, falling back to HELO for servers that reject it.

use super::ClientState;
use crate::codec::{ProtocolCodec, ProtocolState, flush_output, read_reply};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::io::{Channel, Interest, IoHandle, SessionBuffers};
use crate::parser::ReplyParser;
use crate::types::{Extension, ReplyClass, ReplyCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HelloState {
    EhloReady,
    EhloExpected,
    HeloReady,
    HeloExpected,
    Completed,
}

/// Client codec introducing the client and learning the server extensions.
#[derive(Debug)]
pub struct HelloCodec {
    helo_name: String,
    parser: ReplyParser,
    codec_state: HelloState,
}

impl HelloCodec {
    /// Creates the codec announcing `helo_name`.
    #[must_use]
    pub fn new(helo_name: impl Into<String>, max_line_length: usize) -> Self {
        Self {
            helo_name: helo_name.into(),
            parser: ReplyParser::new(false).with_max_line_length(max_line_length),
            codec_state: HelloState::EhloReady,
        }
    }
}

impl ProtocolCodec<ClientState> for HelloCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        _buffers: &mut SessionBuffers,
        _state: &mut ClientState,
    ) -> Result<()> {
        self.parser.reset();
        self.codec_state = HelloState::EhloReady;
        io.set_event(Interest::WRITE);
        Ok(())
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        _state: &mut ClientState,
    ) -> Result<()> {
        let command = match self.codec_state {
            HelloState::EhloReady => {
                self.codec_state = HelloState::EhloExpected;
                Some(Command::ehlo(&self.helo_name))
            }
            HelloState::HeloReady => {
                self.codec_state = HelloState::HeloExpected;
                Some(Command::helo(&self.helo_name))
            }
            _ => None,
        };
        if let Some(command) = command {
            tracing::debug!(conn = %io.id(), %command, "sending greeting");
            command.write_to(buffers.outbuf());
            io.set_event(Interest::READ);
        }
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
            match self.codec_state {
                HelloState::EhloExpected if reply.code == ReplyCode::OK => {
                    state.set_extensions(
                        reply.message.iter().skip(1).map(String::as_str).map(Extension::parse),
                    );
                    tracing::debug!(conn = %io.id(), extensions = state.extensions().len(), "EHLO accepted");
                    self.codec_state = HelloState::Completed;
                }
                HelloState::EhloExpected if reply.class() == ReplyClass::PermanentNegative => {
                    tracing::debug!(conn = %io.id(), code = %reply.code, "EHLO refused, trying HELO");
                    self.codec_state = HelloState::HeloReady;
                    io.set_event(Interest::WRITE);
                }
                HelloState::HeloExpected if reply.code == ReplyCode::OK => {
                    state.set_extensions(std::iter::empty());
                    self.codec_state = HelloState::Completed;
                }
                HelloState::EhloExpected | HelloState::HeloExpected => {
                    tracing::warn!(conn = %io.id(), code = %reply.code, "greeting refused");
                    state.set_reply(reply);
                    state.terminate();
                    self.codec_state = HelloState::Completed;
                }
                _ if reply.code == ReplyCode::SERVICE_UNAVAILABLE => {
                    state.set_reply(reply);
                    state.terminate();
                    self.codec_state = HelloState::Completed;
                }
                _ => return Err(Error::protocol(format!("Unexpected reply: {reply}"))),
            }
        }

        if end_of_stream && !state.is_terminated() {
            return Err(Error::UnexpectedEndOfStream);
        }
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.codec_state == HelloState::Completed
    }

    fn next(&self, state: &ClientState) -> Option<ProtocolState> {
        if self.codec_state != HelloState::Completed {
            return None;
        }
        if state.is_terminated() {
            Some(ProtocolState::Quit)
        } else {
            Some(ProtocolState::Envelope)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::testing::MockChannel;

    fn setup() -> (IoHandle<MockChannel>, SessionBuffers, ClientState, HelloCodec) {
        let mut io = IoHandle::new(MockChannel::new());
        let mut buffers = SessionBuffers::new();
        let mut state = ClientState::new();
        let mut codec = HelloCodec::new("client.example.com", 1000);
        codec.reset(&mut io, &mut buffers, &mut state).unwrap();
        (io, buffers, state, codec)
    }

    #[test]
    fn ehlo_learns_extensions() {
        let (mut io, mut buffers, mut state, mut codec) = setup();
        codec.produce_data(&mut io, &mut buffers, &mut state).unwrap();
        assert_eq!(io.channel().take_output(), "EHLO client.example.com\r\n");

        io.channel()
            .push("250-mx.example.com\r\n250-ENHANCEDSTATUSCODES\r\n250-SIZE 1024\r\n250 PIPELINING\r\n");
        codec.consume_data(&mut io, &mut buffers, &mut state).unwrap();

        assert!(codec.is_completed());
        assert!(state.supports(&Extension::EnhancedStatusCodes));
        assert!(state.supports(&Extension::Size(Some(1024))));
        assert!(state.supports(&Extension::Pipelining));
        assert_eq!(codec.next(&state), Some(ProtocolState::Envelope));
    }

    #[test]
    fn falls_back_to_helo() {
        let (mut io, mut buffers, mut state, mut codec) = setup();
        codec.produce_data(&mut io, &mut buffers, &mut state).unwrap();
        io.channel().push("502 command not implemented\r\n");
        codec.consume_data(&mut io, &mut buffers, &mut state).unwrap();
        assert!(!codec.is_completed());
        assert!(io.interest().is_writable());

        codec.produce_data(&mut io, &mut buffers, &mut state).unwrap();
        assert_eq!(
            io.channel().take_output(),
            "EHLO client.example.com\r\nHELO client.example.com\r\n"
        );
        io.channel().push("250 mx.example.com\r\n");
        codec.consume_data(&mut io, &mut buffers, &mut state).unwrap();
        assert!(codec.is_completed());
        assert!(state.extensions().is_empty());
    }

    #[test]
    fn transient_refusal_quits() {
        let (mut io, mut buffers, mut state, mut codec) = setup();
        codec.produce_data(&mut io, &mut buffers, &mut state).unwrap();
        io.channel().push("421 too busy\r\n");
        codec.consume_data(&mut io, &mut buffers, &mut state).unwrap();
        assert!(state.is_terminated());
        assert_eq!(codec.next(&state), Some(ProtocolState::Quit));
    }
}

//! Envelope delivery: `MAIL FROM`, one `RCPT TO` per recipient, `DATA`.
//!
//! Exactly one command is outstanding at a time, whatever the server
//! advertises about pipelining.

use std::collections::VecDeque;

use super::ClientState;
use crate::codec::{ProtocolCodec, ProtocolState, flush_output, read_reply};
use crate::command::Command;
use crate::delivery::RcptResult;
use crate::error::{Error, Result};
use crate::io::{Channel, Interest, IoHandle, SessionBuffers};
use crate::parser::ReplyParser;
use crate::types::{Address, ReplyCode};

/// Internal states of [`SendEnvelopeCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    /// `MAIL FROM` is to be sent.
    MailRequestReady,
    /// Waiting for the reply to `MAIL FROM`.
    MailResponseExpected,
    /// `RCPT TO` for the head of the recipient queue is to be sent.
    RcptRequestReady,
    /// Waiting for the reply to `RCPT TO`.
    RcptResponseExpected,
    /// `DATA` is to be sent.
    DataRequestReady,
    /// Waiting for the reply to `DATA`.
    DataResponseExpected,
    /// The envelope exchange is over.
    Completed,
}

/// Client codec sending the envelope of the current request.
#[derive(Debug)]
pub struct SendEnvelopeCodec {
    parser: ReplyParser,
    recipients: VecDeque<Address>,
    codec_state: EnvelopeState,
    delivery_failed: bool,
}

impl SendEnvelopeCodec {
    /// Creates the codec; `enhanced_codes` enables parsing of enhanced
    /// status codes in replies.
    #[must_use]
    pub const fn new(enhanced_codes: bool) -> Self {
        Self {
            parser: ReplyParser::new(enhanced_codes),
            recipients: VecDeque::new(),
            codec_state: EnvelopeState::MailRequestReady,
            delivery_failed: false,
        }
    }

    /// Sets the maximum accepted reply line length.
    #[must_use]
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.parser = self.parser.with_max_line_length(max);
        self
    }

    /// Current internal state.
    #[must_use]
    pub const fn codec_state(&self) -> EnvelopeState {
        self.codec_state
    }

    /// Recipients still waiting for their `RCPT TO`.
    #[must_use]
    pub const fn pending_recipients(&self) -> &VecDeque<Address> {
        &self.recipients
    }

    /// Returns true if the transaction was refused.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.delivery_failed
    }
}

impl ProtocolCodec<ClientState> for SendEnvelopeCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        _buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        self.parser.reset();
        self.recipients.clear();
        self.codec_state = EnvelopeState::MailRequestReady;
        self.delivery_failed = false;

        if state.request().is_some() {
            io.set_event(Interest::WRITE);
        } else {
            io.set_event(Interest::READ);
        }
        Ok(())
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ClientState,
    ) -> Result<()> {
        let Some(request) = state.request() else {
            if state.is_terminated() {
                self.codec_state = EnvelopeState::Completed;
            }
            return Ok(());
        };

        let command = match self.codec_state {
            EnvelopeState::MailRequestReady => {
                self.codec_state = EnvelopeState::MailResponseExpected;
                Some(Command::mail_from(request.sender()))
            }
            EnvelopeState::RcptRequestReady => {
                let recipient = self
                    .recipients
                    .front()
                    .ok_or_else(|| Error::InvalidState("no recipient left to send".into()))?;
                self.codec_state = EnvelopeState::RcptResponseExpected;
                Some(Command::rcpt_to(recipient))
            }
            EnvelopeState::DataRequestReady => {
                self.codec_state = EnvelopeState::DataResponseExpected;
                Some(Command::data())
            }
            _ => None,
        };

        if let Some(command) = command {
            tracing::debug!(conn = %io.id(), %command, "sending envelope command");
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
                EnvelopeState::MailResponseExpected => {
                    if reply.code == ReplyCode::OK {
                        let request = state
                            .request()
                            .ok_or_else(|| Error::InvalidState("no active request".into()))?;
                        self.recipients.clear();
                        self.recipients.extend(request.recipients().iter().cloned());
                        self.codec_state = EnvelopeState::RcptRequestReady;
                        io.set_event(Interest::WRITE);
                    } else {
                        tracing::debug!(conn = %io.id(), code = %reply.code, "sender refused");
                        self.delivery_failed = true;
                        self.codec_state = EnvelopeState::Completed;
                        state.set_reply(reply);
                    }
                }
                EnvelopeState::RcptResponseExpected => {
                    let recipient = self.recipients.pop_front().ok_or_else(|| {
                        Error::InvalidState(format!("unexpected state: {:?}", self.codec_state))
                    })?;
                    if reply.code != ReplyCode::OK {
                        tracing::debug!(conn = %io.id(), %recipient, code = %reply.code, "recipient refused");
                        state.add_failure(RcptResult::new(recipient, reply.clone()));
                    }

                    if self.recipients.is_empty() {
                        let requested = state.request().map_or(0, |r| r.recipients().len());
                        if requested > state.failures().len() {
                            self.codec_state = EnvelopeState::DataRequestReady;
                        } else {
                            self.delivery_failed = true;
                            self.codec_state = EnvelopeState::Completed;
                            state.set_reply(reply);
                        }
                    } else {
                        self.codec_state = EnvelopeState::RcptRequestReady;
                    }
                    io.set_event(Interest::WRITE);
                }
                EnvelopeState::DataResponseExpected => {
                    self.codec_state = EnvelopeState::Completed;
                    if reply.code != ReplyCode::START_DATA {
                        self.delivery_failed = true;
                    }
                    state.set_reply(reply);
                }
                _ => {
                    if reply.code == ReplyCode::SERVICE_UNAVAILABLE {
                        tracing::debug!(conn = %io.id(), "server is shutting down");
                        self.delivery_failed = true;
                        state.set_reply(reply);
                        state.terminate();
                        self.codec_state = EnvelopeState::Completed;
                    } else {
                        return Err(Error::protocol(format!("Unexpected reply: {reply}")));
                    }
                }
            }
        }

        if end_of_stream && !state.is_terminated() {
            return Err(Error::UnexpectedEndOfStream);
        }
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.codec_state == EnvelopeState::Completed
    }

    fn next(&self, state: &ClientState) -> Option<ProtocolState> {
        if self.codec_state != EnvelopeState::Completed {
            return None;
        }
        if state.is_terminated() {
            Some(ProtocolState::Quit)
        } else if self.delivery_failed {
            Some(ProtocolState::Reset)
        } else {
            Some(ProtocolState::Content)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryRequest;
    use crate::testing::MockChannel;

    struct Fixture {
        io: IoHandle<MockChannel>,
        buffers: SessionBuffers,
        state: ClientState,
        codec: SendEnvelopeCodec,
    }

    impl Fixture {
        fn new(recipients: &[&str]) -> Self {
            let mut state = ClientState::new();
            let request = DeliveryRequest::new(
                Address::new("sender@example.com").unwrap(),
                recipients.iter().map(|r| Address::new(*r).unwrap()).collect(),
                "Subject: test\r\n\r\nbody\r\n",
            )
            .unwrap();
            state.reset(Some(request));
            let mut fixture = Self {
                io: IoHandle::new(MockChannel::new()),
                buffers: SessionBuffers::new(),
                state,
                codec: SendEnvelopeCodec::new(false),
            };
            fixture
                .codec
                .reset(&mut fixture.io, &mut fixture.buffers, &mut fixture.state)
                .unwrap();
            fixture
        }

        fn send(&mut self) -> String {
            self.codec
                .produce_data(&mut self.io, &mut self.buffers, &mut self.state)
                .unwrap();
            self.io.channel().take_output()
        }

        fn receive(&mut self, reply: &str) {
            self.io.channel().push(reply);
            self.codec
                .consume_data(&mut self.io, &mut self.buffers, &mut self.state)
                .unwrap();
        }
    }

    #[test]
    fn all_accepted_issues_data_once() {
        let mut f = Fixture::new(&["a@x.org", "b@x.org"]);
        assert!(f.io.interest().is_writable());

        assert_eq!(f.send(), "MAIL FROM:<sender@example.com>\r\n");
        assert!(!f.io.interest().is_writable());
        f.receive("250 OK\r\n");
        assert_eq!(f.send(), "RCPT TO:<a@x.org>\r\n");
        f.receive("250 OK\r\n");
        assert_eq!(f.send(), "RCPT TO:<b@x.org>\r\n");
        f.receive("250 OK\r\n");
        assert_eq!(f.send(), "DATA\r\n");
        assert!(!f.codec.is_completed());
        f.receive("354 go ahead\r\n");

        assert!(f.codec.is_completed());
        assert!(!f.codec.is_failed());
        assert_eq!(f.send(), "");
        assert_eq!(f.codec.next(&f.state), Some(ProtocolState::Content));
        assert_eq!(f.state.reply().unwrap().code, ReplyCode::START_DATA);
    }

    #[test]
    fn all_recipients_refused_skips_data() {
        let mut f = Fixture::new(&["a@x.org", "b@x.org"]);
        f.send();
        f.receive("250 OK\r\n");
        f.send();
        f.receive("550 no such user\r\n");
        assert!(!f.codec.is_completed());
        f.send();
        f.receive("550 no such user\r\n");

        assert!(f.codec.is_completed());
        assert_eq!(f.send(), "");
        assert_eq!(f.state.failures().len(), 2);
        assert_eq!(f.codec.next(&f.state), Some(ProtocolState::Reset));
    }

    #[test]
    fn partial_acceptance_still_sends_data() {
        let mut f = Fixture::new(&["a@x.org", "b@x.org", "c@x.org"]);
        f.send();
        f.receive("250 OK\r\n");
        f.send();
        f.receive("250 OK\r\n");
        f.send();
        f.receive("550 rejected\r\n");
        f.send();
        f.receive("250 OK\r\n");
        assert_eq!(f.codec.codec_state(), EnvelopeState::DataRequestReady);
        assert_eq!(f.send(), "DATA\r\n");
        f.receive("354 go ahead\r\n");

        assert_eq!(f.state.failures().len(), 1);
        assert_eq!(f.state.failures()[0].recipient.as_str(), "b@x.org");
        assert_eq!(f.codec.next(&f.state), Some(ProtocolState::Content));
    }

    #[test]
    fn reset_twice_is_idempotent() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.send();
        f.receive("250 OK\r\n");
        assert_eq!(f.codec.pending_recipients().len(), 1);

        for _ in 0..2 {
            f.codec
                .reset(&mut f.io, &mut f.buffers, &mut f.state)
                .unwrap();
            assert_eq!(f.codec.codec_state(), EnvelopeState::MailRequestReady);
            assert!(f.codec.pending_recipients().is_empty());
            assert!(!f.codec.is_failed());
            assert!(f.codec.next(&f.state).is_none());
        }
    }

    #[test]
    fn sender_refused_completes_at_once() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.send();
        f.receive("550 sender rejected\r\n");

        assert!(f.codec.is_completed());
        assert_eq!(f.send(), "");
        let reply = f.state.reply().unwrap();
        assert_eq!(reply.code, ReplyCode::MAILBOX_UNAVAILABLE);
        assert_eq!(reply.message_text(), "sender rejected");
        assert_eq!(f.codec.next(&f.state), Some(ProtocolState::Reset));
    }

    #[test]
    fn data_refused_fails_transaction() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.send();
        f.receive("250 OK\r\n");
        f.send();
        f.receive("250 OK\r\n");
        f.send();
        f.receive("452 insufficient storage\r\n");

        assert!(f.codec.is_completed());
        assert!(f.codec.is_failed());
        assert_eq!(f.state.reply().unwrap().code, ReplyCode::INSUFFICIENT_STORAGE);
        assert_eq!(f.codec.next(&f.state), Some(ProtocolState::Reset));
    }

    #[test]
    fn reply_split_across_reads() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.send();
        f.receive("25");
        assert_eq!(f.codec.codec_state(), EnvelopeState::MailResponseExpected);
        f.receive("0 OK\r");
        f.receive("\n");
        assert_eq!(f.codec.codec_state(), EnvelopeState::RcptRequestReady);
    }

    #[test]
    fn back_pressure_keeps_write_interest() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.io.channel().write_cap = Some(4);
        f.codec
            .produce_data(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap();
        assert!(f.io.interest().is_writable());
        assert!(f.io.interest().is_readable());

        f.io.channel().write_cap = None;
        f.codec
            .produce_data(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap();
        assert!(!f.io.interest().is_writable());
        assert_eq!(f.io.channel().take_output(), "MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn end_of_stream_is_fatal() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.send();
        f.io.channel().close();
        let err = f
            .codec
            .consume_data(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedEndOfStream));
    }

    #[test]
    fn end_of_stream_between_requests_is_fatal() {
        let mut f = Fixture::new(&["a@x.org"]);
        assert_eq!(f.codec.codec_state(), EnvelopeState::MailRequestReady);
        f.io.channel().close();
        let err = f
            .codec
            .consume_data(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedEndOfStream));
        assert!(f.state.reply().is_none());
    }

    #[test]
    fn end_of_stream_after_termination_is_quiet() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.state.terminate();
        f.io.channel().close();
        f.codec
            .consume_data(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap();
        assert!(!f.codec.is_completed());
    }

    #[test]
    fn reply_line_limit_is_enforced() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.codec = SendEnvelopeCodec::new(false).with_max_line_length(16);
        f.codec
            .reset(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap();
        f.send();
        f.io.channel().push("250 this reply line is far too long\r\n");
        let err = f
            .codec
            .consume_data(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap_err();
        assert!(matches!(err, Error::LineTooLong(16)));
    }

    #[test]
    fn unexpected_reply_is_a_protocol_error() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.io.channel().push("250 OK\r\n");
        let err = f
            .codec
            .consume_data(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn service_unavailable_is_tolerated() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.receive("421 shutting down\r\n");
        assert!(f.codec.is_completed());
        assert_eq!(f.codec.next(&f.state), Some(ProtocolState::Quit));
    }

    #[test]
    fn terminated_without_request_completes_silently() {
        let mut f = Fixture::new(&["a@x.org"]);
        f.state.reset(None);
        f.state.terminate();
        f.codec
            .reset(&mut f.io, &mut f.buffers, &mut f.state)
            .unwrap();
        assert!(f.io.interest().is_readable());
        assert_eq!(f.send(), "");
        assert!(f.codec.is_completed());
        assert_eq!(f.codec.next(&f.state), Some(ProtocolState::Quit));
    }
}

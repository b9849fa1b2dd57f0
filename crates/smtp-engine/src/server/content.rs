//! Server reception of message content after `354`.

use std::sync::Arc;
use std::task::Poll;

use bytes::Bytes;

use super::ServerState;
use crate::codec::{ProtocolCodec, ProtocolState, flush_output, hold_for_pending};
use crate::error::{Error, Result};
use crate::io::{Channel, Interest, IoHandle, SessionBuffers};
use crate::parser::{ContentOutcome, ContentParser};
use crate::pending::{Outcome, PendingResult, Validation};
use crate::types::{EnhancedCode, Reply, ReplyCode};
use crate::validate::{DeliveryHandler, ReceivedMessage};

/// Receives content up to the terminating dot, hands the message to the
/// [`DeliveryHandler`] and answers with its verdict.
pub struct ReceiveContentCodec {
    delivery: Arc<dyn DeliveryHandler>,
    parser: ContentParser,
    pending: Option<PendingResult>,
    completed: bool,
    next: Option<ProtocolState>,
}

impl ReceiveContentCodec {
    /// Creates a codec accepting at most `max_size` bytes of content.
    #[must_use]
    pub fn new(delivery: Arc<dyn DeliveryHandler>, max_size: Option<usize>) -> Self {
        Self {
            delivery,
            parser: ContentParser::new(max_size),
            pending: None,
            completed: false,
            next: None,
        }
    }

    /// Sends the final reply and ends the transaction.
    fn finish(&mut self, reply: &Reply, buffers: &mut SessionBuffers, state: &mut ServerState) {
        reply.write_to(buffers.outbuf());
        state.reset();
        self.completed = true;
        self.next = Some(ProtocolState::Envelope);
    }

    fn process<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        while !self.completed {
            if let Some(mut pending) = self.pending.take() {
                match pending.poll(io.waker()) {
                    Poll::Pending => {
                        self.pending = Some(pending);
                        break;
                    }
                    Poll::Ready(outcome) => {
                        let reply = verdict(outcome, state);
                        self.finish(&reply, buffers, state);
                        continue;
                    }
                }
            }

            let Some(outcome) = self.parser.parse(buffers.inbuf()) else {
                break;
            };
            match outcome {
                ContentOutcome::Complete(content) => {
                    let message = received_message(state, content)?;
                    tracing::info!(
                        conn = %io.id(),
                        message_id = %message.message_id,
                        recipients = message.recipients.len(),
                        size = message.content.len(),
                        "message received"
                    );
                    match self.delivery.deliver(message) {
                        Validation::Ready(outcome) => {
                            let reply = verdict(outcome, state);
                            self.finish(&reply, buffers, state);
                        }
                        Validation::Pending(result) => {
                            tracing::debug!(conn = %io.id(), "awaiting delivery");
                            self.pending = Some(result);
                        }
                    }
                }
                ContentOutcome::TooLarge => {
                    tracing::warn!(
                        conn = %io.id(),
                        limit = ?state.max_message_size(),
                        "message too large"
                    );
                    let reply = state.reply(
                        ReplyCode::EXCEEDED_STORAGE,
                        EnhancedCode::new(5, 3, 4),
                        "message size exceeds fixed maximum message size",
                    );
                    self.finish(&reply, buffers, state);
                }
            }
        }

        flush_output(io, buffers)?;
        if self.completed {
            io.clear_event(Interest::READ);
        } else if self.pending.is_some() {
            hold_for_pending(io);
        } else {
            io.set_event(Interest::READ);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReceiveContentCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveContentCodec")
            .field("parser", &self.parser)
            .field("pending", &self.pending)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

fn received_message(state: &ServerState, content: Bytes) -> Result<ReceivedMessage> {
    let (Some(sender), Some(message_id)) = (state.sender(), state.message_id()) else {
        return Err(Error::InvalidState(
            "message content outside a mail transaction".into(),
        ));
    };
    Ok(ReceivedMessage {
        message_id: message_id.to_string(),
        client_domain: state.client_domain().map(str::to_string),
        client_addr: state.client_addr(),
        sender: sender.clone(),
        recipients: state.recipients().to_vec(),
        content,
    })
}

fn verdict(outcome: Outcome, state: &ServerState) -> Reply {
    match outcome {
        Ok(()) => state.reply(
            ReplyCode::OK,
            EnhancedCode::new(2, 6, 0),
            format!(
                "{} message accepted for delivery",
                state.message_id().unwrap_or_default()
            ),
        ),
        Err(error) => error.to_reply(state.is_enhanced_code_capable()),
    }
}

impl ProtocolCodec<ServerState> for ReceiveContentCodec {
    fn reset<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        self.parser.reset();
        self.pending = None;
        self.completed = false;
        self.next = None;
        self.process(io, buffers, state)
    }

    fn produce_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        self.process(io, buffers, state)
    }

    fn consume_data<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        state: &mut ServerState,
    ) -> Result<()> {
        let fill = buffers.fill(io.channel())?;
        self.process(io, buffers, state)?;
        if fill.is_end_of_stream() && !self.completed {
            tracing::debug!(
                conn = %io.id(),
                received = self.parser.received(),
                "client closed the connection during message content"
            );
            self.pending = None;
            self.completed = true;
            self.next = None;
        }
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn next(&self, _state: &ServerState) -> Option<ProtocolState> {
        self.next
    }
}

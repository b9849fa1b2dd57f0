//! Server command loop from HELO up to DATA or QUIT.
//!
//! Pipelined commands are answered in order, one at a time. While a
//! command waits for its validation no further input is parsed, and read
//! interest is dropped until the result is in.

use std::task::Poll;

use super::{Action, CommandHandlers, PendingAction, ServerState};
use crate::codec::{ProtocolCodec, ProtocolState, flush_output, hold_for_pending};
use crate::error::Result;
use crate::io::{Channel, Interest, IoHandle, SessionBuffers};
use crate::parser::CommandParser;
use crate::types::{Reply, ReplyCode};

/// Receives envelope commands and answers them.
#[derive(Debug)]
pub struct ReceiveEnvelopeCodec {
    handlers: CommandHandlers,
    parser: CommandParser,
    pending: Option<PendingAction>,
    completed: bool,
    next: Option<ProtocolState>,
}

impl ReceiveEnvelopeCodec {
    /// Creates a codec answering commands with `handlers`.
    #[must_use]
    pub fn new(handlers: CommandHandlers, max_line_length: usize) -> Self {
        Self {
            handlers,
            parser: CommandParser::new(max_line_length),
            pending: None,
            completed: false,
            next: None,
        }
    }

    /// Returns true while a command waits for its validation.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn respond<C>(&mut self, io: &IoHandle<C>, reply: &Reply, buffers: &mut SessionBuffers, state: &ServerState) {
        tracing::trace!(conn = %io.id(), code = %reply.code, "reply queued");
        reply.write_to(buffers.outbuf());
        if state.is_terminated() {
            self.finish(Some(ProtocolState::Quit));
        } else if reply.code == ReplyCode::START_DATA {
            self.finish(Some(ProtocolState::Content));
        }
    }

    const fn finish(&mut self, next: Option<ProtocolState>) {
        self.completed = true;
        self.next = next;
    }

    /// Answers every buffered command, stopping at a pending validation or
    /// at the end of the envelope phase.
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
                        let reply = pending.complete(outcome, state);
                        self.respond(io, &reply, buffers, state);
                        continue;
                    }
                }
            }

            let Some(incoming) = self.parser.parse(buffers.inbuf()) else {
                break;
            };
            tracing::trace!(conn = %io.id(), ?incoming, "command received");
            match self.handlers.handle_incoming(incoming, state) {
                Action::Reply(reply) => self.respond(io, &reply, buffers, state),
                Action::Pending(pending) => {
                    tracing::debug!(conn = %io.id(), "awaiting validation");
                    self.pending = Some(pending);
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

impl ProtocolCodec<ServerState> for ReceiveEnvelopeCodec {
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
            tracing::debug!(conn = %io.id(), "client closed the connection");
            self.pending = None;
            self.finish(None);
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

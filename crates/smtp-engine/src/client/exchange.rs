//! A single request/reply exchange, shared by the content, reset and quit
//! codecs.

use bytes::BytesMut;

use crate::codec::{flush_output, read_reply};
use crate::error::Result;
use crate::io::{Channel, Interest, IoHandle, SessionBuffers};
use crate::parser::ReplyParser;
use crate::types::Reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Phase {
    RequestReady,
    ResponseExpected,
    Completed,
}

#[derive(Debug)]
pub(super) struct Exchange {
    parser: ReplyParser,
    phase: Phase,
}

impl Exchange {
    pub(super) const fn new(parser: ReplyParser) -> Self {
        Self {
            parser,
            phase: Phase::RequestReady,
        }
    }

    pub(super) const fn phase(&self) -> Phase {
        self.phase
    }

    pub(super) const fn complete(&mut self) {
        self.phase = Phase::Completed;
    }

    pub(super) fn reset<C: Channel>(&mut self, io: &mut IoHandle<C>) {
        self.parser.reset();
        self.phase = Phase::RequestReady;
        io.set_event(Interest::WRITE);
    }

    /// Writes the request once, then keeps flushing it.
    pub(super) fn send<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
        write: impl FnOnce(&mut BytesMut),
    ) -> Result<()> {
        if self.phase == Phase::RequestReady {
            write(buffers.outbuf());
            self.phase = Phase::ResponseExpected;
            io.set_event(Interest::READ);
        }
        flush_output(io, buffers)
    }

    pub(super) fn receive<C: Channel>(
        &mut self,
        io: &mut IoHandle<C>,
        buffers: &mut SessionBuffers,
    ) -> Result<(Option<Reply>, bool)> {
        read_reply(io, buffers, &mut self.parser)
    }
}

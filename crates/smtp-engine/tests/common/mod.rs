//! Shared fixtures for the integration tests: scripted and paired in-memory
//! channels, and a single-threaded driver standing in for a reactor.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use smtp_engine::{Connection, IoEventDispatch};

/// Installs a test subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smtp_engine=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Non-blocking channel that replays scripted input chunks and captures
/// everything written to it.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    input: VecDeque<Vec<u8>>,
    closed: bool,
    fail_reads: bool,
    output: Vec<u8>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a chunk for a later read.
    pub fn push(&mut self, chunk: impl AsRef<[u8]>) {
        self.input.push_back(chunk.as_ref().to_vec());
    }

    /// Reads hit end of stream once the script is drained.
    pub const fn close(&mut self) {
        self.closed = true;
    }

    /// Every read fails with a connection reset.
    pub const fn fail_reads(&mut self) {
        self.fail_reads = true;
    }

    /// Takes the output written so far.
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.output)).into_owned()
    }
}

impl Read for ScriptedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_reads {
            return Err(io::ErrorKind::ConnectionReset.into());
        }
        let Some(chunk) = self.input.front_mut() else {
            return if self.closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            self.input.pop_front();
        }
        Ok(n)
    }
}

impl Write for ScriptedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Direction {
    data: VecDeque<u8>,
    closed: bool,
}

/// One end of an in-memory, non-blocking duplex pipe.
#[derive(Debug)]
pub struct Pipe {
    inbound: Rc<RefCell<Direction>>,
    outbound: Rc<RefCell<Direction>>,
    /// Largest write accepted at once.
    pub write_limit: usize,
}

impl Pipe {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Rc::new(RefCell::new(Direction::default()));
        let b_to_a = Rc::new(RefCell::new(Direction::default()));
        let a = Self {
            inbound: Rc::clone(&b_to_a),
            outbound: Rc::clone(&a_to_b),
            write_limit: usize::MAX,
        };
        let b = Self {
            inbound: a_to_b,
            outbound: b_to_a,
            write_limit: usize::MAX,
        };
        (a, b)
    }

    /// Returns true if a read would make progress.
    pub fn is_readable(&self) -> bool {
        let inbound = self.inbound.borrow();
        !inbound.data.is_empty() || inbound.closed
    }

    /// Closes this end; the peer reads end of stream once drained.
    pub fn shutdown(&self) {
        self.outbound.borrow_mut().closed = true;
    }
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbound = self.inbound.borrow_mut();
        if inbound.data.is_empty() {
            return if inbound.closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }
        let n = inbound.data.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.data.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut outbound = self.outbound.borrow_mut();
        if outbound.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let n = buf.len().min(self.write_limit);
        outbound.data.extend(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Delivers one round of readiness events to `conn`.
///
/// Returns true if any event was delivered.
fn step<D: IoEventDispatch<Pipe>>(dispatch: &D, conn: &mut Connection<Pipe, D::Session>) -> bool {
    if conn.io.is_closed() {
        return false;
    }
    let interest = conn.io.interest();
    let mut progressed = false;
    if interest.is_writable() {
        dispatch.output_ready(conn);
        progressed = true;
    }
    if !conn.io.is_closed() && interest.is_readable() && conn.io.channel().is_readable() {
        dispatch.input_ready(conn);
        progressed = true;
    }
    if conn.io.is_closed() {
        conn.io.channel().shutdown();
    }
    progressed
}

/// Runs two connected endpoints until both have closed or `limit` elapses.
///
/// Returns true if both closed in time. `disconnected` is reported for
/// every closed connection.
pub fn run_pair<A, B>(
    a: &A,
    a_conn: &mut Connection<Pipe, A::Session>,
    b: &B,
    b_conn: &mut Connection<Pipe, B::Session>,
    limit: Duration,
) -> bool
where
    A: IoEventDispatch<Pipe>,
    B: IoEventDispatch<Pipe>,
{
    a.connected(a_conn);
    b.connected(b_conn);

    let deadline = Instant::now() + limit;
    while !(a_conn.io.is_closed() && b_conn.io.is_closed()) && Instant::now() < deadline {
        let progressed = step(a, a_conn) | step(b, b_conn);
        if !progressed {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    let finished = a_conn.io.is_closed() && b_conn.io.is_closed();
    if a_conn.io.is_closed() {
        a.disconnected(a_conn);
    }
    if b_conn.io.is_closed() {
        b.disconnected(b_conn);
    }
    finished
}

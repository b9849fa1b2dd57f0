//! In-memory channel for codec and session unit tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// Non-blocking channel fed from scripted input chunks.
#[derive(Debug, Default)]
pub struct MockChannel {
    input: VecDeque<Vec<u8>>,
    closed: bool,
    pub output: Vec<u8>,
    pub write_cap: Option<usize>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes for the next read.
    pub fn push(&mut self, chunk: impl AsRef<[u8]>) {
        self.input.push_back(chunk.as_ref().to_vec());
    }

    /// Makes reads return end of stream once the queued input is drained.
    pub const fn close(&mut self) {
        self.closed = true;
    }

    /// Takes everything written so far as text.
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.output)).into_owned()
    }
}

impl Read for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
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

impl Write for MockChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match self.write_cap {
            Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(cap) => {
                let n = cap.min(buf.len());
                self.write_cap = Some(cap - n);
                n
            }
            None => buf.len(),
        };
        self.output.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

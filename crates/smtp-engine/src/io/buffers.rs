//! Per-session input and output buffers.

use std::io::{self, Read, Write};

use bytes::{Buf, BytesMut};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Outcome of a single fill from the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// This many bytes were appended (zero if the read would block).
    Data(usize),
    /// The peer closed its side of the connection.
    EndOfStream,
}

impl Fill {
    /// Returns true for an orderly close.
    #[must_use]
    pub const fn is_end_of_stream(self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Input and output buffers shared by the codecs of one session.
#[derive(Debug)]
pub struct SessionBuffers {
    inbuf: BytesMut,
    outbuf: BytesMut,
    chunk: usize,
}

impl Default for SessionBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuffers {
    /// Creates empty buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Creates empty buffers reading at most `chunk` bytes per fill.
    #[must_use]
    pub fn with_capacity(chunk: usize) -> Self {
        Self {
            inbuf: BytesMut::with_capacity(chunk),
            outbuf: BytesMut::with_capacity(chunk),
            chunk: chunk.max(1),
        }
    }

    /// Buffered input not consumed by a parser yet.
    pub const fn inbuf(&mut self) -> &mut BytesMut {
        &mut self.inbuf
    }

    /// Pending output not written to the channel yet.
    pub const fn outbuf(&mut self) -> &mut BytesMut {
        &mut self.outbuf
    }

    /// Returns true if output is waiting to be flushed.
    #[must_use]
    pub fn has_output(&self) -> bool {
        !self.outbuf.is_empty()
    }

    /// Performs one read from `channel` into the input buffer.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than `WouldBlock` / `Interrupted`.
    pub fn fill<R: Read + ?Sized>(&mut self, channel: &mut R) -> io::Result<Fill> {
        let mut chunk = vec![0u8; self.chunk];
        loop {
            match channel.read(&mut chunk) {
                Ok(0) => return Ok(Fill::EndOfStream),
                Ok(n) => {
                    self.inbuf.extend_from_slice(&chunk[..n]);
                    return Ok(Fill::Data(n));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Fill::Data(0)),
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes as much pending output as `channel` accepts.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than `WouldBlock` / `Interrupted`.
    pub fn flush<W: Write + ?Sized>(&mut self, channel: &mut W) -> io::Result<usize> {
        let mut written = 0;
        while self.outbuf.has_remaining() {
            match channel.write(&self.outbuf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "channel refused to accept data",
                    ));
                }
                Ok(n) => {
                    self.outbuf.advance(n);
                    written += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        if written > 0 {
            match channel.flush() {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// Drops all buffered input and output.
    pub fn clear(&mut self) {
        self.inbuf.clear();
        self.outbuf.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use bytes::BufMut;

    /// Accepts at most `cap` bytes per write, then blocks.
    struct Throttled {
        written: Vec<u8>,
        cap: usize,
    }

    impl Write for Throttled {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.cap == 0 {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(self.cap);
            self.written.extend_from_slice(&buf[..n]);
            self.cap -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Blocking;

    impl Read for Blocking {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    #[test]
    fn fill_reads_one_chunk() {
        let mut buffers = SessionBuffers::with_capacity(4);
        let mut input: &[u8] = b"250 OK\r\n";
        assert_eq!(buffers.fill(&mut input).unwrap(), Fill::Data(4));
        assert_eq!(&buffers.inbuf()[..], b"250 ");
        assert_eq!(buffers.fill(&mut input).unwrap(), Fill::Data(4));
        assert_eq!(buffers.fill(&mut input).unwrap(), Fill::EndOfStream);
    }

    #[test]
    fn fill_would_block() {
        let mut buffers = SessionBuffers::new();
        assert_eq!(buffers.fill(&mut Blocking).unwrap(), Fill::Data(0));
    }

    #[test]
    fn flush_respects_back_pressure() {
        let mut buffers = SessionBuffers::new();
        buffers.outbuf().put_slice(b"MAIL FROM:<a@b.c>\r\n");
        let mut channel = Throttled {
            written: Vec::new(),
            cap: 5,
        };
        assert_eq!(buffers.flush(&mut channel).unwrap(), 5);
        assert!(buffers.has_output());

        channel.cap = 100;
        buffers.flush(&mut channel).unwrap();
        assert!(!buffers.has_output());
        assert_eq!(channel.written, b"MAIL FROM:<a@b.c>\r\n");
    }
}

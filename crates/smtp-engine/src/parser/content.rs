//! Message content framing for the DATA phase.
//!
//! Content travels as CRLF terminated lines ended by a line holding a single
//! dot. Lines starting with a dot get an extra dot prepended on the wire
//! (RFC 5321 section 4.5.2).

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Unterminated input larger than this is moved out of the input buffer.
const PARTIAL_LINE_LIMIT: usize = 8192;

/// Result of receiving a full message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome {
    /// The terminating dot was seen; content is un-stuffed with CRLF line ends.
    Complete(Bytes),
    /// The terminating dot was seen but the content exceeded the size limit.
    TooLarge,
}

/// Restartable parser for incoming message content.
#[derive(Debug)]
pub struct ContentParser {
    max_size: Option<usize>,
    data: BytesMut,
    size: usize,
    at_line_start: bool,
}

impl ContentParser {
    /// Creates a parser with an optional size limit in bytes.
    #[must_use]
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            max_size,
            data: BytesMut::new(),
            size: 0,
            at_line_start: true,
        }
    }

    /// Discards any partially received content.
    pub fn reset(&mut self) {
        self.data.clear();
        self.size = 0;
        self.at_line_start = true;
    }

    /// Returns the number of content bytes received so far.
    #[must_use]
    pub const fn received(&self) -> usize {
        self.size
    }

    /// Consumes content lines from `buf`.
    ///
    /// Returns `Some` once the terminating line has been consumed; anything
    /// after it stays in `buf`.
    pub fn parse(&mut self, buf: &mut BytesMut) -> Option<ContentOutcome> {
        loop {
            let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
                if buf.len() > PARTIAL_LINE_LIMIT {
                    // Keep the last byte back in case it is the CR of a CRLF.
                    let mut chunk = buf.split_to(buf.len() - 1);
                    if self.at_line_start && chunk.first() == Some(&b'.') {
                        chunk.advance(1);
                    }
                    self.append(&chunk);
                    self.at_line_start = false;
                }
                return None;
            };

            let mut line = buf.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            if self.at_line_start {
                if &line[..] == b"." {
                    return Some(self.finish());
                }
                if line.first() == Some(&b'.') {
                    line.advance(1);
                }
            }
            self.append(&line);
            self.append(b"\r\n");
            self.at_line_start = true;
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        self.size += bytes.len();
        if self.max_size.is_some_and(|max| self.size > max) {
            self.data.clear();
        } else {
            self.data.put_slice(bytes);
        }
    }

    fn finish(&mut self) -> ContentOutcome {
        let outcome = if self.max_size.is_some_and(|max| self.size > max) {
            ContentOutcome::TooLarge
        } else {
            ContentOutcome::Complete(self.data.split().freeze())
        };
        self.reset();
        outcome
    }
}

/// Writes `content` for transmission after a 354 reply.
///
/// Line endings are normalized to CRLF, leading dots are doubled, and the
/// terminating `.` line is appended.
pub fn write_content(content: &[u8], buf: &mut BytesMut) {
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    if !content.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                buf.put_u8(b'.');
            }
            buf.put_slice(line);
            buf.put_slice(b"\r\n");
        }
    }
    buf.put_slice(b".\r\n");
}

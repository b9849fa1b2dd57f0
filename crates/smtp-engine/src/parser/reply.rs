//! SMTP reply parser.

use bytes::BytesMut;

use super::{DEFAULT_MAX_LINE_LENGTH, take_line, take_remainder};
use crate::error::{Error, Result};
use crate::types::{EnhancedCode, Reply, ReplyCode};

/// Restartable parser assembling one (possibly multi-line) reply at a time.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// Lines of an incomplete reply are kept across calls to [`parse`], so the
/// parser can be fed after every read regardless of where the peer's segments
/// were split.
///
/// [`parse`]: ReplyParser::parse
#[derive(Debug)]
pub struct ReplyParser {
    code: Option<ReplyCode>,
    lines: Vec<String>,
    enhanced_codes: bool,
    max_line_length: usize,
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ReplyParser {
    /// Creates a parser. With `enhanced_codes` set, a leading `x.y.z` token is
    /// split off the reply text into [`Reply::enhanced`].
    #[must_use]
    pub const fn new(enhanced_codes: bool) -> Self {
        Self {
            code: None,
            lines: Vec::new(),
            enhanced_codes,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Sets the maximum accepted line length.
    #[must_use]
    pub const fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Enables or disables enhanced status code extraction.
    pub const fn set_enhanced_codes(&mut self, enabled: bool) {
        self.enhanced_codes = enabled;
    }

    /// Discards any partially assembled reply.
    pub fn reset(&mut self) {
        self.code = None;
        self.lines.clear();
    }

    /// Attempts to assemble one reply from `buf`.
    ///
    /// Returns `Ok(None)` when more data is needed. With `end_of_stream` set,
    /// an unterminated trailing line is accepted as the final line.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is malformed, too long, or changes reply
    /// code in the middle of a multi-line reply.
    pub fn parse(&mut self, buf: &mut BytesMut, end_of_stream: bool) -> Result<Option<Reply>> {
        loop {
            let line = match take_line(buf, self.max_line_length)? {
                Some(line) => line,
                None if end_of_stream => match take_remainder(buf) {
                    Some(line) => line,
                    None => return Ok(None),
                },
                None => return Ok(None),
            };

            let line = String::from_utf8_lossy(&line).into_owned();
            if line.is_empty() {
                continue;
            }
            if self.push_line(&line)? {
                return Ok(Some(self.finish()));
            }
        }
    }

    /// Adds one line; returns true if it completed the reply.
    fn push_line(&mut self, line: &str) -> Result<bool> {
        if line.len() < 3 || !line.is_char_boundary(3) {
            return Err(Error::protocol(format!("Reply too short: {line}")));
        }

        let code_str = &line[0..3];
        let code = code_str
            .parse::<u16>()
            .map_err(|_| Error::protocol(format!("Invalid reply code: {code_str}")))?;
        let code = ReplyCode::new(code)?;

        if let Some(expected) = self.code
            && expected != code
        {
            return Err(Error::protocol(format!(
                "Reply code changed from {expected} to {code} in multi-line reply"
            )));
        }
        self.code = Some(code);

        let last = match line.as_bytes().get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(_) => return Err(Error::protocol(format!("Malformed reply line: {line}"))),
        };

        self.lines
            .push(line.get(4..).map(str::to_string).unwrap_or_default());
        Ok(last)
    }

    fn finish(&mut self) -> Reply {
        let code = self.code.take().unwrap_or(ReplyCode::OK);
        let mut message = std::mem::take(&mut self.lines);

        let mut enhanced = None;
        if self.enhanced_codes {
            enhanced = message
                .first()
                .and_then(|first| first.split_whitespace().next())
                .and_then(EnhancedCode::parse)
                .filter(|e| u16::from(e.class) == code.as_u16() / 100);
            if let Some(token) = enhanced.map(|e| e.to_string()) {
                for text in &mut message {
                    if let Some(rest) = text.strip_prefix(token.as_str()) {
                        *text = rest.trim_start().to_string();
                    }
                }
            }
        }

        Reply::multiline(code, enhanced, message)
    }
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last line.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() == 3 || (line.len() >= 4 && line.as_bytes()[3] == b' ')
}

impl Reply {
    /// Serializes the reply, one CRLF terminated line per message line.
    pub fn write_to(&self, buf: &mut BytesMut) {
        use bytes::BufMut;

        let code = self.code.to_string();
        let count = self.message.len().max(1);
        for i in 0..count {
            buf.put_slice(code.as_bytes());
            buf.put_u8(if i + 1 == count { b' ' } else { b'-' });
            if let Some(enhanced) = self.enhanced {
                buf.put_slice(enhanced.to_string().as_bytes());
                buf.put_u8(b' ');
            }
            if let Some(text) = self.message.get(i) {
                buf.put_slice(text.as_bytes());
            }
            buf.put_slice(b"\r\n");
        }
    }
}

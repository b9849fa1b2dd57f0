//! Restartable SMTP wire parsers.
//!
//! All parsers consume from a [`BytesMut`] input buffer that is filled by the
//! session as data arrives. A parser only removes bytes once a full line is
//! available, so feeding the same buffer again after a partial read resumes
//! where the previous call stopped.

mod command;
mod content;
mod reply;

use bytes::{Buf, BytesMut};

pub use command::{CommandParser, Incoming};
pub use content::{ContentOutcome, ContentParser, write_content};
pub use reply::{ReplyParser, is_last_reply_line};

use crate::error::{Error, Result};

/// Default maximum length of a command or reply line, including CRLF (RFC 5321).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1000;

/// Takes one line off the front of `buf`, without its terminator.
///
/// Lines end with CRLF; a bare LF is tolerated. Returns `Ok(None)` when no
/// complete line is buffered yet.
///
/// # Errors
///
/// Returns [`Error::LineTooLong`] if more than `max_len` bytes are buffered
/// without a line terminator.
pub fn take_line(buf: &mut BytesMut, max_len: usize) -> Result<Option<BytesMut>> {
    match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => {
            let mut line = buf.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }
            // Limits count the terminator as received.
            if pos + 1 > max_len {
                return Err(Error::LineTooLong(max_len));
            }
            Ok(Some(line))
        }
        None if buf.len() > max_len => Err(Error::LineTooLong(max_len)),
        None => Ok(None),
    }
}

/// Takes whatever is left in `buf` as a final, unterminated line.
pub(crate) fn take_remainder(buf: &mut BytesMut) -> Option<BytesMut> {
    if buf.has_remaining() {
        let mut line = buf.split();
        if line.last() == Some(&b'\r') {
            let len = line.len() - 1;
            line.truncate(len);
        }
        Some(line)
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn take_line_crlf() {
        let mut buf = BytesMut::from(&b"250 OK\r\n220 next"[..]);
        let line = take_line(&mut buf, 100).unwrap().unwrap();
        assert_eq!(&line[..], b"250 OK");
        assert_eq!(&buf[..], b"220 next");
        assert!(take_line(&mut buf, 100).unwrap().is_none());
    }

    #[test]
    fn take_line_bare_lf() {
        let mut buf = BytesMut::from(&b"NOOP\n"[..]);
        assert_eq!(&take_line(&mut buf, 100).unwrap().unwrap()[..], b"NOOP");
        assert!(buf.is_empty());
    }

    #[test]
    fn take_line_too_long() {
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert!(matches!(take_line(&mut buf, 8), Err(Error::LineTooLong(8))));

        let mut buf = BytesMut::from(&b"0123456789\r\n"[..]);
        assert!(matches!(take_line(&mut buf, 8), Err(Error::LineTooLong(8))));
    }

    #[test]
    fn take_line_limit_counts_actual_terminator() {
        let mut buf = BytesMut::from(&b"1234567\n"[..]);
        assert_eq!(&take_line(&mut buf, 8).unwrap().unwrap()[..], b"1234567");

        let mut buf = BytesMut::from(&b"1234567\r\n"[..]);
        assert!(matches!(take_line(&mut buf, 8), Err(Error::LineTooLong(8))));

        let mut buf = BytesMut::from(&b"123456\r\n"[..]);
        assert_eq!(&take_line(&mut buf, 8).unwrap().unwrap()[..], b"123456");
    }

    #[test]
    fn take_remainder_strips_cr() {
        let mut buf = BytesMut::from(&b"221 bye\r"[..]);
        assert_eq!(&take_remainder(&mut buf).unwrap()[..], b"221 bye");
        assert!(take_remainder(&mut buf).is_none());
    }
}

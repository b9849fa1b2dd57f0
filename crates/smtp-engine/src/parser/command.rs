//! SMTP command line parser (server side).

use bytes::BytesMut;

use super::{DEFAULT_MAX_LINE_LENGTH, take_line};
use crate::command::Command;

/// One unit of client input as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A well formed command.
    Command(Command),
    /// A line that could not be parsed as a command.
    Malformed(String),
    /// A line longer than the configured limit; it has been discarded.
    TooLong,
}

/// Restartable parser yielding one command line at a time.
///
/// Unlike reply parsing on the client, bad input from a client is not fatal:
/// malformed and overlong lines are surfaced as [`Incoming`] values so the
/// server can answer them with a negative reply.
#[derive(Debug)]
pub struct CommandParser {
    max_line_length: usize,
    discarding: bool,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl CommandParser {
    /// Creates a parser with the given maximum line length.
    #[must_use]
    pub const fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            discarding: false,
        }
    }

    /// Resets the parser state.
    pub const fn reset(&mut self) {
        self.discarding = false;
    }

    /// Attempts to take one command from `buf`.
    ///
    /// Returns `None` when no complete line is buffered.
    pub fn parse(&mut self, buf: &mut BytesMut) -> Option<Incoming> {
        if self.discarding {
            // Drop the tail of an overlong line up to and including its LF.
            match buf.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    let _ = buf.split_to(pos + 1);
                    self.discarding = false;
                    return Some(Incoming::TooLong);
                }
                None => {
                    buf.clear();
                    return None;
                }
            }
        }

        let terminated = buf.contains(&b'\n');
        match take_line(buf, self.max_line_length) {
            Ok(Some(line)) => {
                let text = String::from_utf8_lossy(&line);
                Some(match Command::parse(&text) {
                    Ok(command) => Incoming::Command(command),
                    Err(_) => Incoming::Malformed(text.into_owned()),
                })
            }
            Ok(None) => None,
            Err(_) if terminated => Some(Incoming::TooLong),
            Err(_) => {
                buf.clear();
                self.discarding = true;
                None
            }
        }
    }
}

//! SMTP commands: construction, parsing and serialization.

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::types::Address;

/// SMTP command verb.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    /// HELO - Simple greeting
    Helo,
    /// EHLO - Extended greeting
    Ehlo,
    /// MAIL - Start mail transaction
    Mail,
    /// RCPT - Add recipient
    Rcpt,
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// VRFY - Verify address
    Vrfy,
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
    /// Any verb this engine does not implement
    Other(String),
}

impl Verb {
    /// Parses a verb, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "HELO" => Self::Helo,
            "EHLO" => Self::Ehlo,
            "MAIL" => Self::Mail,
            "RCPT" => Self::Rcpt,
            "DATA" => Self::Data,
            "RSET" => Self::Rset,
            "VRFY" => Self::Vrfy,
            "NOOP" => Self::Noop,
            "QUIT" => Self::Quit,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the verb as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Helo => "HELO",
            Self::Ehlo => "EHLO",
            Self::Mail => "MAIL",
            Self::Rcpt => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy => "VRFY",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
            Self::Other(verb) => verb,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SMTP command: a verb, its argument and any extra parameters.
///
/// For `MAIL FROM:<a> BODY=8BITMIME` the argument is `FROM:<a>` and the
/// parameters are `["BODY=8BITMIME"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command verb.
    pub verb: Verb,
    /// First argument token, empty when absent.
    pub argument: String,
    /// Remaining whitespace separated parameters.
    pub params: Vec<String>,
}

impl Command {
    /// Creates a command with an argument and no parameters.
    #[must_use]
    pub fn new(verb: Verb, argument: impl Into<String>) -> Self {
        Self {
            verb,
            argument: argument.into(),
            params: Vec::new(),
        }
    }

    /// `HELO <domain>`
    #[must_use]
    pub fn helo(domain: &str) -> Self {
        Self::new(Verb::Helo, domain)
    }

    /// `EHLO <domain>`
    #[must_use]
    pub fn ehlo(domain: &str) -> Self {
        Self::new(Verb::Ehlo, domain)
    }

    /// `MAIL FROM:<sender>`
    #[must_use]
    pub fn mail_from(sender: &Address) -> Self {
        Self::new(Verb::Mail, format!("FROM:<{sender}>"))
    }

    /// `RCPT TO:<recipient>`
    #[must_use]
    pub fn rcpt_to(recipient: &Address) -> Self {
        Self::new(Verb::Rcpt, format!("TO:<{recipient}>"))
    }

    /// `DATA`
    #[must_use]
    pub fn data() -> Self {
        Self::new(Verb::Data, "")
    }

    /// `RSET`
    #[must_use]
    pub fn rset() -> Self {
        Self::new(Verb::Rset, "")
    }

    /// `NOOP`
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Verb::Noop, "")
    }

    /// `QUIT`
    #[must_use]
    pub fn quit() -> Self {
        Self::new(Verb::Quit, "")
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Parses a command line (without its CRLF terminator).
    ///
    /// # Errors
    ///
    /// Returns an error if the line is empty or the verb is not alphabetic.
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| Error::protocol("Empty command line"))?;
        if !verb.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::protocol(format!("Invalid command verb: {verb}")));
        }

        let mut argument = tokens.next().unwrap_or_default().to_string();
        let mut params: Vec<String> = tokens.map(str::to_string).collect();

        // Tolerate `MAIL FROM: <addr>` by joining the path back to its keyword.
        if argument.ends_with(':') && !params.is_empty() {
            argument.push_str(&params.remove(0));
        }

        Ok(Self {
            verb: Verb::parse(verb),
            argument,
            params,
        })
    }

    /// Serializes the command, including the CRLF terminator.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_slice(self.verb.as_str().as_bytes());
        if !self.argument.is_empty() {
            buf.put_u8(b' ');
            buf.put_slice(self.argument.as_bytes());
        }
        for param in &self.params {
            buf.put_u8(b' ');
            buf.put_slice(param.as_bytes());
        }
        buf.put_slice(b"\r\n");
    }

    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        buf.to_vec()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb)?;
        if !self.argument.is_empty() {
            write!(f, " {}", self.argument)?;
        }
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}

/// Extracts the path from a `FROM:<path>` / `TO:<path>` argument.
///
/// The keyword comparison is case-insensitive. Returns the text between the
/// angle brackets, which is empty for the null path `<>`.
#[must_use]
pub fn extract_path<'a>(argument: &'a str, keyword: &str) -> Option<&'a str> {
    let head = argument.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = argument[keyword.len()..].trim_start();
    let rest = rest.strip_prefix('<')?;
    let end = rest.find('>')?;
    if !rest[end + 1..].trim().is_empty() {
        return None;
    }
    Some(&rest[..end])
}

/// Splits an ESMTP `KEY=value` parameter.
#[must_use]
pub fn split_param(param: &str) -> (String, Option<&str>) {
    match param.split_once('=') {
        Some((key, value)) => (key.to_ascii_uppercase(), Some(value)),
        None => (param.to_ascii_uppercase(), None),
    }
}

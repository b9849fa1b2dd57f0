//! SMTP reply types.

use std::fmt;

use crate::error::{Error, Result};

/// SMTP reply.
///
/// A reply carries a three digit status code, an optional enhanced status
/// code (RFC 3463) and one or more lines of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Enhanced status code, when negotiated.
    pub enhanced: Option<EnhancedCode>,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new single line reply.
    #[must_use]
    pub fn new(code: ReplyCode, enhanced: Option<EnhancedCode>, text: impl Into<String>) -> Self {
        Self {
            code,
            enhanced,
            message: vec![text.into()],
        }
    }

    /// Creates a new multi-line reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn multiline(code: ReplyCode, enhanced: Option<EnhancedCode>, message: Vec<String>) -> Self {
        Self {
            code,
            enhanced,
            message,
        }
    }

    /// Returns the class of the reply code.
    #[must_use]
    pub const fn class(&self) -> ReplyClass {
        self.code.class()
    }

    /// Returns true for a 2xx reply.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.class(), ReplyClass::Positive)
    }

    /// Message lines joined with `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(enhanced) = self.enhanced {
            write!(f, " {enhanced}")?;
        }
        write!(f, " {}", self.message_text())
    }
}

/// SMTP reply code.
///
/// Always a valid RFC 5321 status: the first digit is 2 to 5 and the
/// second digit 0 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid SMTP status code.
    pub const fn new(code: u16) -> Result<Self> {
        let class = code / 100;
        let subject = (code / 10) % 10;
        if class >= 2 && class <= 5 && subject <= 5 {
            Ok(Self(code))
        } else {
            Err(Error::InvalidReplyCode(code))
        }
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Classifies the code by its first digit.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            2 => ReplyClass::Positive,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::TransientNegative,
            _ => ReplyClass::PermanentNegative,
        }
    }
}

/// The four reply classes of RFC 5321 section 4.2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// `2yz`: the action completed.
    Positive,
    /// `3yz`: more input is expected, as after `DATA`.
    Intermediate,
    /// `4yz`: the action failed but may succeed later.
    TransientNegative,
    /// `5yz`: the action failed for good.
    PermanentNegative,
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for ReplyCode {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self> {
        Self::new(code)
    }
}

// Codes the engine sends or reacts to.
impl ReplyCode {
    /// 220, greeting.
    pub const SERVICE_READY: Self = Self(220);
    /// 221, reply to QUIT.
    pub const CLOSING: Self = Self(221);
    /// 250
    pub const OK: Self = Self(250);
    /// 354, the client may send content.
    pub const START_DATA: Self = Self(354);
    /// 421, the server is shutting the channel down.
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450, mailbox busy or temporarily refused.
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 451, local error in processing.
    pub const LOCAL_ERROR: Self = Self(451);
    /// 452, insufficient storage.
    pub const INSUFFICIENT_STORAGE: Self = Self(452);
    /// 500, unrecognized command or malformed line.
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501, bad arguments.
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 503, command out of sequence.
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 550, mailbox unavailable.
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 552, message too large.
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// 554, no service or transaction failed.
    pub const TRANSACTION_FAILED: Self = Self(554);
    /// 555, unknown MAIL or RCPT parameter.
    pub const PARAMETERS_NOT_RECOGNIZED: Self = Self(555);
}

/// Enhanced mail system status code (`class.subject.detail`, RFC 3463).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnhancedCode {
    /// Class: 2 (success), 4 (persistent transient) or 5 (permanent).
    pub class: u8,
    /// Subject sub-code.
    pub subject: u16,
    /// Detail sub-code.
    pub detail: u16,
}

impl EnhancedCode {
    /// Creates an enhanced code.
    #[must_use]
    pub const fn new(class: u8, subject: u16, detail: u16) -> Self {
        Self {
            class,
            subject,
            detail,
        }
    }

    /// Parses a `x.y.z` token.
    ///
    /// Returns `None` if the token is not a well formed enhanced code.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let class = parts.next()?.parse::<u8>().ok()?;
        let subject = parts.next()?.parse::<u16>().ok()?;
        let detail = parts.next()?.parse::<u16>().ok()?;
        if parts.next().is_some() || !matches!(class, 2 | 4 | 5) {
            return None;
        }
        Some(Self::new(class, subject, detail))
    }
}

impl fmt::Display for EnhancedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.class, self.subject, self.detail)
    }
}

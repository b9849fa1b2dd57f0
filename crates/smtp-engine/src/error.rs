//! Error types for SMTP protocol sessions.
//!
//! These are the fatal errors of a connection. Expected, negative outcomes of
//! envelope validation are modelled separately as [`SmtpError`] values and
//! never travel through this type.
//!
//! [`SmtpError`]: crate::validate::SmtpError

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (malformed or out-of-sequence data from the peer).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The peer closed the connection while a reply was still pending.
    #[error("Unexpected end of stream")]
    UnexpectedEndOfStream,

    /// A line exceeded the configured maximum length.
    #[error("Line exceeds maximum length of {0} bytes")]
    LineTooLong(usize),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Reply code outside of the SMTP status code grammar.
    #[error("Invalid reply code: {0}")]
    InvalidReplyCode(u16),

    /// Delivery request rejected at construction.
    #[error("Invalid delivery request: {0}")]
    InvalidRequest(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// The connection was idle for too long.
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Creates a protocol error from a message.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns true if this is a transport-level fault.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if the peer violated the protocol.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::LineTooLong(_) | Self::InvalidReplyCode(_)
        )
    }
}

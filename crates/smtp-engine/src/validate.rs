//! Server-side collaborators: envelope validation, connection admission
//! and final delivery of received messages.
//!
//! Negative outcomes are [`SmtpError`] values. They are ordinary data: the
//! command handler that asked turns them into a reply and the session
//! carries on.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::pending::Validation;
use crate::types::{Address, EnhancedCode, Reply, ReplyCode};

/// A negative SMTP outcome produced by a validator or delivery handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} {message}")]
pub struct SmtpError {
    /// Reply code to send.
    pub code: ReplyCode,
    /// Enhanced status code, sent only when the session negotiated them.
    pub enhanced: Option<EnhancedCode>,
    /// Human-readable reply text.
    pub message: String,
}

impl SmtpError {
    /// Creates a new error value.
    #[must_use]
    pub fn new(code: ReplyCode, enhanced: Option<EnhancedCode>, message: impl Into<String>) -> Self {
        Self {
            code,
            enhanced,
            message: message.into(),
        }
    }

    /// `550 5.1.1` for an unknown mailbox.
    #[must_use]
    pub fn unknown_mailbox(address: &Address) -> Self {
        Self::new(
            ReplyCode::MAILBOX_UNAVAILABLE,
            Some(EnhancedCode::new(5, 1, 1)),
            format!("<{address}> mailbox unavailable"),
        )
    }

    /// Converts into a reply, dropping the enhanced code unless the session
    /// is capable of them.
    #[must_use]
    pub fn to_reply(&self, enhanced_capable: bool) -> Reply {
        let enhanced = if enhanced_capable { self.enhanced } else { None };
        Reply::new(self.code, enhanced, self.message.clone())
    }
}

/// Validates envelope addresses as they arrive.
///
/// Both methods accept by default.
pub trait EnvelopeValidator: Send + Sync {
    /// Validates the reverse-path of `MAIL FROM`.
    fn validate_sender(&self, client: Option<SocketAddr>, sender: &Address) -> Validation {
        let _ = (client, sender);
        Validation::accept()
    }

    /// Validates a forward-path of `RCPT TO`.
    fn validate_recipient(&self, client: Option<SocketAddr>, recipient: &Address) -> Validation {
        let _ = (client, recipient);
        Validation::accept()
    }

    /// Validates the argument of `VRFY`, which need not be an address.
    ///
    /// Arguments that parse as an [`Address`] go through
    /// [`validate_recipient`](Self::validate_recipient); anything else, such
    /// as a user name, is accepted unless this method is overridden.
    fn verify(&self, client: Option<SocketAddr>, argument: &str) -> Validation {
        match Address::new(argument) {
            Ok(address) => self.validate_recipient(client, &address),
            Err(_) => Validation::accept(),
        }
    }
}

/// Validator accepting every address.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EnvelopeValidator for AcceptAll {}

/// Decides whether a connecting client is served at all.
pub trait RemoteAddressValidator: Send + Sync {
    /// Returns true to greet the client, false to reject it with 554.
    fn accept(&self, addr: Option<SocketAddr>) -> bool;
}

impl<F> RemoteAddressValidator for F
where
    F: Fn(Option<SocketAddr>) -> bool + Send + Sync,
{
    fn accept(&self, addr: Option<SocketAddr>) -> bool {
        self(addr)
    }
}

/// A fully received message handed over for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Id generated when the transaction started.
    pub message_id: String,
    /// Domain the client announced in HELO/EHLO.
    pub client_domain: Option<String>,
    /// Peer address, if known.
    pub client_addr: Option<SocketAddr>,
    /// Reverse-path.
    pub sender: Address,
    /// Accepted forward-paths, in order.
    pub recipients: Vec<Address>,
    /// Content with dot-stuffing removed and CRLF line ends.
    pub content: Bytes,
}

/// Accepts responsibility for received messages.
pub trait DeliveryHandler: Send + Sync {
    /// Takes over `message`.
    ///
    /// Acceptance is acknowledged to the client with `250`, a rejection is
    /// sent as the error's reply.
    fn deliver(&self, message: ReceivedMessage) -> Validation;
}

//! Results of validations that may complete after the handler returns.
//!
//! A validator either answers at once or hands back a [`PendingResult`]
//! whose [`ValidationSender`] it completes later from any thread. The
//! session polls the pending result with its connection's waker, so
//! completion schedules the connection and the dialogue resumes on the
//! thread that owns it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use tokio::sync::oneshot;

use crate::types::{EnhancedCode, ReplyCode};
use crate::validate::SmtpError;

/// Outcome of a validation: accepted, or rejected with a negative reply.
pub type Outcome = std::result::Result<(), SmtpError>;

/// A validation result that may not be available yet.
#[derive(Debug)]
pub enum Validation {
    /// The result is known.
    Ready(Outcome),
    /// The result will arrive through a [`ValidationSender`].
    Pending(PendingResult),
}

impl Validation {
    /// An immediate acceptance.
    #[must_use]
    pub const fn accept() -> Self {
        Self::Ready(Ok(()))
    }

    /// An immediate rejection.
    #[must_use]
    pub const fn reject(error: SmtpError) -> Self {
        Self::Ready(Err(error))
    }

    /// Creates a pending validation and the sender that completes it.
    #[must_use]
    pub fn pending() -> (ValidationSender, Self) {
        let (sender, result) = channel();
        (sender, Self::Pending(result))
    }
}

impl From<Outcome> for Validation {
    fn from(outcome: Outcome) -> Self {
        Self::Ready(outcome)
    }
}

/// Creates a connected sender / pending result pair.
#[must_use]
pub fn channel() -> (ValidationSender, PendingResult) {
    let (tx, rx) = oneshot::channel();
    (ValidationSender { tx }, PendingResult { rx })
}

/// Completing half of a pending validation.
#[derive(Debug)]
pub struct ValidationSender {
    tx: oneshot::Sender<Outcome>,
}

impl ValidationSender {
    /// Delivers the outcome.
    ///
    /// Returns false if the connection went away in the meantime.
    pub fn complete(self, outcome: Outcome) -> bool {
        self.tx.send(outcome).is_ok()
    }

    /// Returns true if the waiting connection has been dropped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Waiting half of a pending validation.
///
/// Dropping it cancels the validation.
#[derive(Debug)]
pub struct PendingResult {
    rx: oneshot::Receiver<Outcome>,
}

impl PendingResult {
    /// Polls for the outcome, registering `waker` to be woken on completion.
    ///
    /// A sender dropped without completing counts as a local processing
    /// error.
    pub fn poll(&mut self, waker: &Waker) -> Poll<Outcome> {
        let mut cx = Context::from_waker(waker);
        match Pin::new(&mut self.rx).poll(&mut cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SmtpError::new(
                ReplyCode::LOCAL_ERROR,
                Some(EnhancedCode::new(4, 3, 0)),
                "requested action aborted: local error in processing",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

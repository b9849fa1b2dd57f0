//! Outbound delivery requests, their outcomes, and the handler contract
//! through which a client session pulls work and reports results.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::client::ClientState;
use crate::error::{Error, Result};
use crate::io::ConnectionId;
use crate::types::{Address, Reply, ReplyCode};

/// One message to deliver: envelope plus content.
///
/// Immutable once built; cloning shares the recipient list and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    sender: Address,
    recipients: Arc<[Address]>,
    content: Bytes,
}

impl DeliveryRequest {
    /// Creates a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `recipients` is empty.
    pub fn new(sender: Address, recipients: Vec<Address>, content: impl Into<Bytes>) -> Result<Self> {
        if recipients.is_empty() {
            return Err(Error::InvalidRequest(
                "at least one recipient is required".into(),
            ));
        }
        Ok(Self {
            sender,
            recipients: recipients.into(),
            content: content.into(),
        })
    }

    /// Reverse-path; may be the null address.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Forward-paths in submission order.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Message content.
    #[must_use]
    pub const fn content(&self) -> &Bytes {
        &self.content
    }
}

/// A recipient rejected during the envelope phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcptResult {
    /// The rejected recipient.
    pub recipient: Address,
    /// Reply the server gave to its `RCPT TO`.
    pub reply: Reply,
}

impl RcptResult {
    /// Pairs a recipient with its reply.
    #[must_use]
    pub const fn new(recipient: Address, reply: Reply) -> Self {
        Self { recipient, reply }
    }
}

/// Outcome of a finished transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    reply: Reply,
    accepted: Vec<Address>,
    failures: Vec<RcptResult>,
}

impl DeliveryResult {
    /// Builds the outcome of the transaction recorded in `state`.
    ///
    /// Returns `None` if no request is active or no terminal reply has been
    /// stored yet.
    #[must_use]
    pub fn from_state(state: &ClientState) -> Option<Self> {
        let request = state.request()?;
        let reply = state.reply()?.clone();
        let failures = state.failures().to_vec();

        let mut rejected: Vec<&Address> = failures.iter().map(|f| &f.recipient).collect();
        let accepted = request
            .recipients()
            .iter()
            .filter(|recipient| {
                rejected
                    .iter()
                    .position(|r| r == recipient)
                    .map(|pos| rejected.swap_remove(pos))
                    .is_none()
            })
            .cloned()
            .collect();

        Some(Self {
            reply,
            accepted,
            failures,
        })
    }

    /// Terminal reply of the transaction.
    #[must_use]
    pub const fn reply(&self) -> &Reply {
        &self.reply
    }

    /// Recipients the server accepted.
    #[must_use]
    pub fn accepted(&self) -> &[Address] {
        &self.accepted
    }

    /// Recipients the server rejected, in order.
    #[must_use]
    pub fn failures(&self) -> &[RcptResult] {
        &self.failures
    }

    /// Returns true if at least one recipient was accepted and the terminal
    /// reply is positive.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.accepted.is_empty()
            && (self.reply.is_success() || self.reply.code == ReplyCode::START_DATA)
    }
}

/// Identity of the connection a handler callback concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    /// Connection id.
    pub id: ConnectionId,
    /// Peer address, if known.
    pub remote_addr: Option<SocketAddr>,
}

/// Source of outbound requests and sink of their outcomes.
///
/// Called on the connection's owning thread; implementations must return
/// promptly.
pub trait DeliveryRequestHandler: Send + Sync {
    /// The connection is established.
    fn connected(&self, context: &SessionContext) {
        let _ = context;
    }

    /// The connection is gone.
    fn disconnected(&self, context: &SessionContext) {
        let _ = context;
    }

    /// Returns the next request to send, or `None` to end the session.
    fn submit_request(&self, context: &SessionContext) -> Option<DeliveryRequest>;

    /// A request was delivered.
    fn completed(&self, request: &DeliveryRequest, result: &DeliveryResult, context: &SessionContext);

    /// A request was refused.
    fn failed(&self, request: &DeliveryRequest, result: &DeliveryResult, context: &SessionContext);

    /// The session hit a fatal error.
    fn exception(&self, error: &Error, context: &SessionContext);
}

#[derive(Debug, Default)]
struct QueueState {
    requests: VecDeque<DeliveryRequest>,
    results: Vec<(DeliveryRequest, DeliveryResult)>,
    errors: Vec<String>,
}

/// Thread-safe hand-off of requests into client sessions and of results
/// back out.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
}

impl DeliveryQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue preloaded with `requests`.
    #[must_use]
    pub fn with_requests(requests: impl IntoIterator<Item = DeliveryRequest>) -> Self {
        let queue = Self::new();
        for request in requests {
            queue.push(request);
        }
        queue
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a request.
    pub fn push(&self, request: DeliveryRequest) {
        self.lock().requests.push_back(request);
    }

    /// Number of requests not yet taken by a session.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().requests.len()
    }

    /// Outcomes reported so far.
    #[must_use]
    pub fn results(&self) -> Vec<(DeliveryRequest, DeliveryResult)> {
        self.lock().results.clone()
    }

    /// Fatal session errors reported so far.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.lock().errors.clone()
    }

    /// Blocks until `count` results or errors have been reported, or
    /// `timeout` elapses. Returns true if enough arrived in time.
    #[must_use]
    pub fn wait_for_results(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.results.len() + state.errors.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn record(&self, request: &DeliveryRequest, result: &DeliveryResult) {
        self.lock().results.push((request.clone(), result.clone()));
        self.changed.notify_all();
    }
}

impl DeliveryRequestHandler for DeliveryQueue {
    fn submit_request(&self, context: &SessionContext) -> Option<DeliveryRequest> {
        let request = self.lock().requests.pop_front();
        tracing::debug!(conn = %context.id, available = request.is_some(), "request submitted");
        request
    }

    fn completed(&self, request: &DeliveryRequest, result: &DeliveryResult, _context: &SessionContext) {
        self.record(request, result);
    }

    fn failed(&self, request: &DeliveryRequest, result: &DeliveryResult, _context: &SessionContext) {
        self.record(request, result);
    }

    fn exception(&self, error: &Error, _context: &SessionContext) {
        self.lock().errors.push(error.to_string());
        self.changed.notify_all();
    }
}

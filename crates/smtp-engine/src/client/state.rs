//! Client-side session state.

use std::collections::HashSet;

use crate::delivery::{DeliveryRequest, RcptResult};
use crate::types::{Extension, Reply};

/// State of an outbound session, shared by the client codecs.
///
/// Holds at most one in-flight [`DeliveryRequest`].
#[derive(Debug, Default)]
pub struct ClientState {
    extensions: HashSet<Extension>,
    request: Option<DeliveryRequest>,
    reply: Option<Reply>,
    failures: Vec<RcptResult>,
    terminated: bool,
}

impl ClientState {
    /// Creates an idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the next request and forgets the previous outcome.
    pub fn reset(&mut self, request: Option<DeliveryRequest>) {
        self.request = request;
        self.reply = None;
        self.failures.clear();
    }

    /// The request being delivered.
    #[must_use]
    pub const fn request(&self) -> Option<&DeliveryRequest> {
        self.request.as_ref()
    }

    /// The terminal reply of the current transaction.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        self.reply.as_ref()
    }

    /// Records the terminal reply of the current transaction.
    pub fn set_reply(&mut self, reply: Reply) {
        self.reply = Some(reply);
    }

    /// Recipients rejected so far.
    #[must_use]
    pub fn failures(&self) -> &[RcptResult] {
        &self.failures
    }

    /// Records a rejected recipient.
    pub fn add_failure(&mut self, failure: RcptResult) {
        self.failures.push(failure);
    }

    /// Extensions the server advertised.
    #[must_use]
    pub const fn extensions(&self) -> &HashSet<Extension> {
        &self.extensions
    }

    /// Replaces the advertised extension set.
    pub fn set_extensions(&mut self, extensions: impl IntoIterator<Item = Extension>) {
        self.extensions = extensions.into_iter().collect();
    }

    /// Returns true if the server advertised `extension`.
    #[must_use]
    pub fn supports(&self, extension: &Extension) -> bool {
        self.extensions.iter().any(|ext| ext.same_keyword(extension))
    }

    /// Returns true once the session is shutting down.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Marks the session as shutting down.
    pub const fn terminate(&mut self) {
        self.terminated = true;
    }
}

//! Server-side session state.

use std::net::SocketAddr;

use crate::types::{Address, EnhancedCode, Extension, Reply, ReplyCode};

/// How the client introduced itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    /// `HELO`.
    Basic,
    /// `EHLO`.
    Extended,
}

/// Body type requested with `MAIL FROM ... BODY=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// `BODY=7BIT`.
    SevenBit,
    /// `BODY=8BITMIME`.
    EightBitMime,
}

/// State of an inbound session, shared by the server codecs and command
/// handlers.
#[derive(Debug, Clone)]
pub struct ServerState {
    server_id: String,
    extensions: Vec<Extension>,
    max_message_size: Option<usize>,
    client_addr: Option<SocketAddr>,
    client_domain: Option<String>,
    client_type: Option<ClientType>,
    message_id: Option<String>,
    sender: Option<Address>,
    recipients: Vec<Address>,
    data_type: Option<DataType>,
    terminated: bool,
}

impl ServerState {
    /// Creates the state of a new session.
    #[must_use]
    pub fn new(server_id: impl Into<String>, extensions: Vec<Extension>) -> Self {
        let max_message_size = extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        });
        Self {
            server_id: server_id.into(),
            extensions,
            max_message_size,
            client_addr: None,
            client_domain: None,
            client_type: None,
            message_id: None,
            sender: None,
            recipients: Vec::new(),
            data_type: None,
            terminated: false,
        }
    }

    /// Sets the client's network address.
    #[must_use]
    pub const fn with_client_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.client_addr = addr;
        self
    }

    /// Clears the mail transaction. Client identity and extensions stay.
    pub fn reset(&mut self) {
        self.message_id = None;
        self.sender = None;
        self.recipients.clear();
        self.data_type = None;
    }

    /// Identity used in greetings.
    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Extensions advertised in the EHLO reply, in order.
    #[must_use]
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Returns true if `extension` is advertised.
    #[must_use]
    pub fn has_extension(&self, extension: &Extension) -> bool {
        self.extensions.iter().any(|ext| ext.same_keyword(extension))
    }

    /// Largest message accepted, from the advertised `SIZE`.
    #[must_use]
    pub const fn max_message_size(&self) -> Option<usize> {
        self.max_message_size
    }

    /// The client's network address.
    #[must_use]
    pub const fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// Domain from the client's HELO/EHLO.
    #[must_use]
    pub fn client_domain(&self) -> Option<&str> {
        self.client_domain.as_deref()
    }

    /// How the client introduced itself, if it did.
    #[must_use]
    pub const fn client_type(&self) -> Option<ClientType> {
        self.client_type
    }

    /// Records the client's HELO/EHLO.
    pub fn set_client(&mut self, domain: impl Into<String>, client_type: ClientType) {
        self.client_domain = Some(domain.into());
        self.client_type = Some(client_type);
    }

    /// Id of the current message.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Reverse-path of the current transaction.
    #[must_use]
    pub const fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// Starts a transaction.
    pub fn begin_transaction(
        &mut self,
        sender: Address,
        data_type: Option<DataType>,
        message_id: String,
    ) {
        self.sender = Some(sender);
        self.data_type = data_type;
        self.message_id = Some(message_id);
    }

    /// Accepted forward-paths, in order.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Appends an accepted forward-path.
    pub fn add_recipient(&mut self, recipient: Address) {
        self.recipients.push(recipient);
    }

    /// Body type of the current transaction.
    #[must_use]
    pub const fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    /// Returns true once the client sent QUIT or the session is ending.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Marks the session as ending.
    pub const fn terminate(&mut self) {
        self.terminated = true;
    }

    /// Returns true if replies carry enhanced status codes: the extension
    /// is advertised and the client used EHLO.
    #[must_use]
    pub fn is_enhanced_code_capable(&self) -> bool {
        self.client_type == Some(ClientType::Extended)
            && self.has_extension(&Extension::EnhancedStatusCodes)
    }

    /// Builds a single line reply, attaching `enhanced` only when capable.
    #[must_use]
    pub fn reply(&self, code: ReplyCode, enhanced: EnhancedCode, text: impl Into<String>) -> Reply {
        let enhanced = self.is_enhanced_code_capable().then_some(enhanced);
        Reply::new(code, enhanced, text)
    }
}

//! Session configuration types.

use std::time::Duration;

use crate::parser::DEFAULT_MAX_LINE_LENGTH;
use crate::types::Extension;

/// What a session does when the reactor reports an idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Tear the connection down (servers send `421` first).
    #[default]
    Close,
    /// Keep the connection open.
    Ignore,
}

/// Server session configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Identity announced in the greeting and in HELO/EHLO replies.
    pub server_id: String,
    /// Extensions advertised in the EHLO reply.
    pub extensions: Vec<Extension>,
    /// Maximum command line length, CRLF included.
    pub max_line_length: usize,
    /// Largest message accepted, in bytes.
    pub max_message_size: Option<usize>,
    /// Idle period after which the reactor should fire `timeout`.
    pub idle_timeout: Duration,
    /// Reaction to an idle timeout.
    pub timeout_policy: TimeoutPolicy,
}

impl ServerConfig {
    /// Creates a configuration advertising `ENHANCEDSTATUSCODES`, `8BITMIME`
    /// and `PIPELINING`.
    #[must_use]
    pub fn new(server_id: impl Into<String>) -> Self {
        ServerConfigBuilder::new(server_id).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(server_id: impl Into<String>) -> ServerConfigBuilder {
        ServerConfigBuilder::new(server_id)
    }

    /// Returns the extensions to advertise, including `SIZE` when a message
    /// size limit is set.
    #[must_use]
    pub fn advertised_extensions(&self) -> Vec<Extension> {
        let mut extensions: Vec<_> = self
            .extensions
            .iter()
            .filter(|ext| !matches!(ext, Extension::Size(_)))
            .cloned()
            .collect();
        if let Some(max) = self.max_message_size {
            extensions.push(Extension::Size(Some(max)));
        }
        extensions
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    server_id: String,
    extensions: Vec<Extension>,
    max_line_length: usize,
    max_message_size: Option<usize>,
    idle_timeout: Duration,
    timeout_policy: TimeoutPolicy,
}

impl ServerConfigBuilder {
    /// Creates a new builder with the given server identity.
    #[must_use]
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            extensions: vec![
                Extension::EnhancedStatusCodes,
                Extension::EightBitMime,
                Extension::Pipelining,
            ],
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_message_size: None,
            idle_timeout: Duration::from_secs(300),
            timeout_policy: TimeoutPolicy::Close,
        }
    }

    /// Adds an advertised extension, replacing one with the same keyword.
    #[must_use]
    pub fn extension(mut self, extension: Extension) -> Self {
        self.extensions.retain(|ext| !ext.same_keyword(&extension));
        self.extensions.push(extension);
        self
    }

    /// Stops advertising an extension, whatever its parameters.
    #[must_use]
    pub fn without_extension(mut self, extension: &Extension) -> Self {
        self.extensions.retain(|ext| !ext.same_keyword(extension));
        self
    }

    /// Sets the maximum command line length.
    #[must_use]
    pub const fn max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = Some(max);
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the idle timeout policy.
    #[must_use]
    pub const fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            server_id: self.server_id,
            extensions: self.extensions,
            max_line_length: self.max_line_length,
            max_message_size: self.max_message_size,
            idle_timeout: self.idle_timeout,
            timeout_policy: self.timeout_policy,
        }
    }
}

/// Client session configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Domain announced in EHLO/HELO.
    pub helo_name: String,
    /// Parse enhanced status codes when the server advertises them.
    pub enhanced_codes: bool,
    /// Maximum reply line length, CRLF included.
    pub max_line_length: usize,
    /// Idle period after which the reactor should fire `timeout`.
    pub idle_timeout: Duration,
    /// Reaction to an idle timeout.
    pub timeout_policy: TimeoutPolicy,
}

impl ClientConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new(helo_name: impl Into<String>) -> Self {
        ClientConfigBuilder::new(helo_name).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(helo_name: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(helo_name)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    helo_name: String,
    enhanced_codes: bool,
    max_line_length: usize,
    idle_timeout: Duration,
    timeout_policy: TimeoutPolicy,
}

impl ClientConfigBuilder {
    /// Creates a new builder with the given HELO name.
    #[must_use]
    pub fn new(helo_name: impl Into<String>) -> Self {
        Self {
            helo_name: helo_name.into(),
            enhanced_codes: true,
            max_line_length: 4096,
            idle_timeout: Duration::from_secs(300),
            timeout_policy: TimeoutPolicy::Close,
        }
    }

    /// Enables or disables enhanced status code parsing.
    #[must_use]
    pub const fn enhanced_codes(mut self, enabled: bool) -> Self {
        self.enhanced_codes = enabled;
        self
    }

    /// Sets the maximum reply line length.
    #[must_use]
    pub const fn max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the idle timeout policy.
    #[must_use]
    pub const fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            helo_name: self.helo_name,
            enhanced_codes: self.enhanced_codes,
            max_line_length: self.max_line_length,
            idle_timeout: self.idle_timeout,
            timeout_policy: self.timeout_policy,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let config = ServerConfig::new("mx.example.com");
        assert_eq!(config.server_id, "mx.example.com");
        assert_eq!(
            config.advertised_extensions(),
            vec![
                Extension::EnhancedStatusCodes,
                Extension::EightBitMime,
                Extension::Pipelining
            ]
        );
        assert_eq!(config.max_line_length, 1000);
        assert_eq!(config.timeout_policy, TimeoutPolicy::Close);
    }

    #[test]
    fn size_is_advertised_with_limit() {
        let config = ServerConfig::builder("mx.example.com")
            .max_message_size(10 * 1024)
            .without_extension(&Extension::Pipelining)
            .build();
        assert_eq!(
            config.advertised_extensions(),
            vec![
                Extension::EnhancedStatusCodes,
                Extension::EightBitMime,
                Extension::Size(Some(10 * 1024))
            ]
        );
    }

    #[test]
    fn client_builder() {
        let config = ClientConfig::builder("client.example.com")
            .enhanced_codes(false)
            .timeout_policy(TimeoutPolicy::Ignore)
            .idle_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.helo_name, "client.example.com");
        assert!(!config.enhanced_codes);
        assert_eq!(config.timeout_policy, TimeoutPolicy::Ignore);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
    }
}

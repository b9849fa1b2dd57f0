//! Message id generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of globally unique message ids.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh id.
    fn generate(&self) -> String;
}

/// Id generator combining time, a counter, a random number and the host
/// name: `<millis>.<counter:016x>-<random:08x>.<hostname>`.
#[derive(Debug)]
pub struct BasicIdGenerator {
    hostname: String,
    count: AtomicU64,
}

impl BasicIdGenerator {
    /// Creates a generator for the local host.
    ///
    /// The host name is taken from `HOSTNAME`, falling back to `localhost`.
    #[must_use]
    pub fn new() -> Self {
        let hostname = std::env::var("HOSTNAME")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        Self::with_hostname(hostname)
    }

    /// Creates a generator with an explicit host name.
    #[must_use]
    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            count: AtomicU64::new(0),
        }
    }
}

impl Default for BasicIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for BasicIdGenerator {
    fn generate(&self) -> String {
        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        let random: u32 = rand::random();
        format!(
            "{}.{count:016x}-{random:08x}.{}",
            chrono::Utc::now().timestamp_millis(),
            self.hostname
        )
    }
}

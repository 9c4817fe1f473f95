//! Configuration for the session cache.

use std::time::Duration;

use crate::expiry::ExpiryPolicy;

/// Default capacity for client-side session caches.
pub const DEFAULT_CLIENT_CACHE_SIZE: usize = 10_000;

/// Default capacity for server-side session caches.
/// Servers typically rely on session tickets and keep fewer ids around.
pub const DEFAULT_SERVER_CACHE_SIZE: usize = 1_000;

/// Default session timeout (24 hours).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for a single session cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Label used in log events (`client`, `server`, ...).
    pub label: String,

    /// Maximum number of sessions retained before FIFO eviction.
    pub capacity: usize,

    /// Maximum entry age. `None` means sessions never expire.
    pub timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            label: "sessions".to_string(),
            capacity: DEFAULT_CLIENT_CACHE_SIZE,
            timeout: Some(DEFAULT_SESSION_TIMEOUT),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for the cache of sessions this side initiated as a client.
    pub fn client_default() -> Self {
        Self::default()
            .with_label("client")
            .with_capacity(DEFAULT_CLIENT_CACHE_SIZE)
    }

    /// Defaults for the cache of sessions this side accepted as a server.
    pub fn server_default() -> Self {
        Self::default()
            .with_label("server")
            .with_capacity(DEFAULT_SERVER_CACHE_SIZE)
    }

    /// Set the log label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the maximum number of sessions to cache.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the session timeout. A zero duration disables expiry.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Set the session timeout in whole seconds. Zero disables expiry.
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        self.with_timeout(Duration::from_secs(secs))
    }

    /// Disable expiry.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Timeout in whole seconds (rounded up), `0` when expiry is disabled.
    pub fn timeout_secs(&self) -> u64 {
        ExpiryPolicy::new(self.timeout).timeout_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_defaults_differ() {
        let client = CacheConfig::client_default();
        let server = CacheConfig::server_default();
        assert_eq!(client.label, "client");
        assert_eq!(server.label, "server");
        assert!(client.capacity > server.capacity);
        assert_eq!(client.timeout, Some(DEFAULT_SESSION_TIMEOUT));
    }

    #[test]
    fn test_zero_timeout_disables_expiry() {
        let config = CacheConfig::new().with_timeout_secs(0);
        assert_eq!(config.timeout, None);
        assert_eq!(config.timeout_secs(), 0);
    }

    #[test]
    fn test_sub_second_timeout_is_not_never() {
        let config = CacheConfig::new().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout_secs(), 1);
    }
}

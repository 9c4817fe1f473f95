//! Timeout policy for session expiration.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Decides whether a cached entry has outlived the configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Maximum entry age (None means no expiration).
    timeout: Option<Duration>,
}

impl ExpiryPolicy {
    /// Create a policy with the given timeout. A zero duration disables expiry.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout: timeout.filter(|t| !t.is_zero()),
        }
    }

    /// Create a policy from whole seconds, where `0` means never expire.
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Some(Duration::from_secs(secs)))
    }

    /// Check whether an entry cached at `cached_at` has expired.
    pub fn is_expired(&self, cached_at: Instant) -> bool {
        self.is_expired_at(cached_at, Instant::now())
    }

    /// Same as [`is_expired`](Self::is_expired) against a fixed `now`, so a
    /// sweep over many entries uses one clock reading.
    pub fn is_expired_at(&self, cached_at: Instant, now: Instant) -> bool {
        match self.timeout {
            None => false,
            Some(timeout) => now.saturating_duration_since(cached_at) > timeout,
        }
    }

    /// Check a wall-clock creation time, used for sessions restored from
    /// persistent storage where no `Instant` exists.
    pub fn is_stale(&self, created_at: DateTime<Utc>) -> bool {
        match self.timeout {
            None => false,
            Some(timeout) => match (Utc::now() - created_at).to_std() {
                Ok(age) => age > timeout,
                // Created in the future: clock skew, keep it.
                Err(_) => false,
            },
        }
    }

    /// Get the configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Timeout in whole seconds, `0` when expiry is disabled.
    ///
    /// Sub-second remainders round up so an enabled timeout never reads as `0`.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout
            .map_or(0, |t| t.as_secs() + u64::from(t.subsec_nanos() > 0))
    }

    /// Update the timeout. A zero duration disables expiry.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.filter(|t| !t.is_zero());
    }
}

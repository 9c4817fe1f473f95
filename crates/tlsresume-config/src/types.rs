//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [client]                 # cache of sessions initiated as a client
//! [server]                 # cache of sessions accepted as a server
//! [logging]                # CLI file logging
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tlsresume_cache::CacheConfig;

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsResumeConfig {
    /// Client-side session cache.
    pub client: Option<CacheSection>,

    /// Server-side session cache.
    pub server: Option<CacheSection>,

    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl TlsResumeConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config with every section filled in with defaults, used by
    /// `config init`.
    pub fn with_defaults() -> Self {
        Self {
            client: Some(CacheSection::client_default()),
            server: Some(CacheSection::server_default()),
            logging: Some(LoggingConfig::default()),
        }
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: TlsResumeConfig) {
        if other.client.is_some() {
            self.client = other.client;
        }

        if other.server.is_some() {
            self.server = other.server;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Validated cache configuration for the client side.
    pub fn client_cache(&self) -> Result<CacheConfig> {
        let section = self.client.clone().unwrap_or_default();
        section.to_cache_config(CacheConfig::client_default())
    }

    /// Validated cache configuration for the server side.
    pub fn server_cache(&self) -> Result<CacheConfig> {
        let section = self.server.clone().unwrap_or_default();
        section.to_cache_config(CacheConfig::server_default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for one session cache. Unset fields take the side's default.
///
/// ```toml
/// [client]
/// cache_size = 10000
/// timeout_secs = 86400
/// persist_dir = "/var/lib/tlsresume/client"
/// ```
///
/// Values are signed so that out-of-range numbers in a file produce a
/// validation error instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Maximum number of cached sessions (must be at least 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<i64>,

    /// Session timeout in seconds (0 = never expire, must not be negative).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<i64>,

    /// Directory for persisted sessions. Only used by the client side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_dir: Option<PathBuf>,

    /// Maximum number of persisted session files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_max_files: Option<usize>,
}

impl CacheSection {
    /// Section spelling out the client-side defaults.
    pub fn client_default() -> Self {
        Self::from_cache_config(&CacheConfig::client_default())
    }

    /// Section spelling out the server-side defaults.
    pub fn server_default() -> Self {
        Self::from_cache_config(&CacheConfig::server_default())
    }

    fn from_cache_config(config: &CacheConfig) -> Self {
        Self {
            cache_size: Some(config.capacity as i64),
            timeout_secs: Some(config.timeout_secs() as i64),
            persist_dir: None,
            persist_max_files: None,
        }
    }

    /// Validate this section and apply it on top of `base`.
    pub fn to_cache_config(&self, base: CacheConfig) -> Result<CacheConfig> {
        let invalid = |field: &str, reason: String| ConfigError::Invalid {
            section: base.label.clone(),
            field: field.to_string(),
            reason,
        };

        let mut config = base.clone();

        if let Some(size) = self.cache_size {
            let capacity = usize::try_from(size)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| invalid("cache_size", format!("must be at least 1, got {size}")))?;
            config = config.with_capacity(capacity);
        }

        if let Some(secs) = self.timeout_secs {
            let secs = u64::try_from(secs)
                .map_err(|_| invalid("timeout_secs", format!("must not be negative, got {secs}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
///
/// ```toml
/// [logging]
/// dir = "/var/log/tlsresume"
/// json = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the daily-rolling log file. No file log when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Write the file log as JSON lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            json: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! # Rate Limiter Configuration
//!
//! This module provides the settings that control a fixed-window limiter and
//! the in-memory store behind it.
//!
//! ## Key Concepts
//!
//! ```text
//!     Fixed Window Configuration:
//!
//!     ┌──────────────────────────────────────┐
//!     │ max_requests: 3     ← N per window   │
//!     │ window_ms: 3600000  ← W (one hour)   │
//!     │                                      │
//!     │ max_tracked_clients: 10000           │ ← memory bound
//!     │ cleanup_interval_ms: 60000           │ ← sweep period
//!     └──────────────────────────────────────┘
//! ```
//!
//! Configuration is fixed at deployment. It can be built in code or read from
//! a TOML document:
//!
//! ```toml
//! [rate_limit]
//! max_requests = 3
//! window_ms = 3600000
//! ```

use super::core::WindowPolicy;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 3;

/// Default window length: one hour.
pub const DEFAULT_WINDOW_MS: u64 = 60 * 60 * 1000;

/// Default upper bound on distinct clients held in memory.
///
/// Prevents memory exhaustion when an attacker rotates through many source
/// addresses.
pub const DEFAULT_MAX_TRACKED_CLIENTS: usize = 10_000;

/// Default period of the background sweep that drops expired windows.
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60_000;

/// Errors raised while building or loading a [`RateLimiterConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value the limiter cannot work with.
    #[error("invalid rate limiter configuration: {0}")]
    Invalid(&'static str),

    /// The configuration file could not be read.
    #[error("failed to read rate limiter configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document is not valid TOML for this schema.
    #[error("failed to parse rate limiter configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for a fixed-window rate limiter.
///
/// ## Examples
///
/// ```rust
/// use window_gate::RateLimiterConfig;
///
/// // 3 requests per hour (the defaults)
/// let config = RateLimiterConfig::default();
/// assert_eq!(config.max_requests, 3);
///
/// // 100 requests per minute, smaller memory bound
/// let config = RateLimiterConfig::per_minute(100)
///     .with_max_tracked_clients(1_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimiterConfig {
    /// Maximum admitted requests per client per window (N).
    pub max_requests: u32,

    /// Window length in milliseconds (W). The window is fixed at creation and
    /// does not slide with later requests.
    pub window_ms: u64,

    /// Maximum number of client windows the in-memory store keeps before it
    /// purges expired windows and, if still full, refuses new clients.
    pub max_tracked_clients: usize,

    /// Interval between background sweeps of expired windows.
    pub cleanup_interval_ms: u64,
}

impl Default for RateLimiterConfig {
    /// 3 requests per hour, 10 000 tracked clients, sweep every minute.
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_ms: DEFAULT_WINDOW_MS,
            max_tracked_clients: DEFAULT_MAX_TRACKED_CLIENTS,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SectionedDocument {
    rate_limit: RateLimiterConfig,
}

// Either bare keys or a `[rate_limit]` table, never both.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Sectioned(SectionedDocument),
    Flat(RateLimiterConfig),
}

impl RateLimiterConfig {
    /// Creates a configuration admitting `max_requests` per `window_ms`.
    ///
    /// Store settings keep their defaults.
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
            ..Default::default()
        }
    }

    /// `requests` per one-minute window.
    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, 60_000)
    }

    /// `requests` per one-hour window.
    pub fn per_hour(requests: u32) -> Self {
        Self::new(requests, DEFAULT_WINDOW_MS)
    }

    /// Sets the in-memory capacity bound.
    pub fn with_max_tracked_clients(mut self, clients: usize) -> Self {
        self.max_tracked_clients = clients;
        self
    }

    /// Sets the background sweep interval.
    pub fn with_cleanup_interval_ms(mut self, ms: u64) -> Self {
        self.cleanup_interval_ms = ms;
        self
    }

    /// The admission policy carried into every store check.
    #[inline]
    pub fn policy(&self) -> WindowPolicy {
        WindowPolicy {
            max_requests: self.max_requests,
            window_ms: self.window_ms,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if any of `max_requests`, `window_ms`,
    /// `max_tracked_clients` or `cleanup_interval_ms` is zero.
    ///
    /// ```rust
    /// use window_gate::RateLimiterConfig;
    ///
    /// assert!(RateLimiterConfig::new(0, 1_000).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::Invalid("max_requests must be greater than 0"));
        }
        if self.window_ms == 0 {
            return Err(ConfigError::Invalid("window_ms must be greater than 0"));
        }
        if self.max_tracked_clients == 0 {
            return Err(ConfigError::Invalid(
                "max_tracked_clients must be greater than 0",
            ));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "cleanup_interval_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    ///
    /// Keys may sit at the top level or inside a `[rate_limit]` table, but not
    /// both: a document mixing the two is a [`ConfigError::Parse`]. Missing
    /// keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config = match toml::from_str::<ConfigDocument>(input)? {
            ConfigDocument::Sectioned(document) => document.rate_limit,
            ConfigDocument::Flat(config) => config,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.max_requests, 3);
        assert_eq!(config.window_ms, 3_600_000);
        assert_eq!(config.max_tracked_clients, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(RateLimiterConfig::new(0, 1000).validate().is_err());
        assert!(RateLimiterConfig::new(3, 0).validate().is_err());
        assert!(RateLimiterConfig::default()
            .with_max_tracked_clients(0)
            .validate()
            .is_err());
        assert!(RateLimiterConfig::default()
            .with_cleanup_interval_ms(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validation_message() {
        let err = RateLimiterConfig::new(0, 1000).validate().unwrap_err();
        assert!(err.to_string().contains("max_requests"));
    }

    #[test]
    fn test_config_builders() {
        let config = RateLimiterConfig::per_minute(10);
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(config.max_requests, 10);

        let config = RateLimiterConfig::per_hour(3).with_cleanup_interval_ms(5_000);
        assert_eq!(config.window_ms, 3_600_000);
        assert_eq!(config.cleanup_interval_ms, 5_000);

        let policy = config.policy();
        assert_eq!(policy.max_requests, 3);
        assert_eq!(policy.window_ms, 3_600_000);
    }

    #[test]
    fn test_from_toml_sectioned() {
        let config = RateLimiterConfig::from_toml_str(
            r#"
            [rate_limit]
            max_requests = 5
            window_ms = 120000
            "#,
        )
        .unwrap();

        assert_eq!(config.max_requests, 5);
        assert_eq!(config.window_ms, 120_000);
        assert_eq!(config.cleanup_interval_ms, DEFAULT_CLEANUP_INTERVAL_MS);
    }

    #[test]
    fn test_from_toml_flat() {
        let config = RateLimiterConfig::from_toml_str("max_tracked_clients = 50").unwrap();
        assert_eq!(config.max_tracked_clients, 50);
        assert_eq!(config.max_requests, DEFAULT_MAX_REQUESTS);
    }

    #[test]
    fn test_from_toml_rejects_mixed_layout() {
        let result = RateLimiterConfig::from_toml_str(
            r#"
            max_requests = 10

            [rate_limit]
            max_requests = 5
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_toml_empty_document_uses_defaults() {
        let config = RateLimiterConfig::from_toml_str("").unwrap();
        assert_eq!(config, RateLimiterConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let result = RateLimiterConfig::from_toml_str("max_requests = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let result = RateLimiterConfig::from_toml_str("max_requests = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = RateLimiterConfig::load("/definitely/not/here/window-gate.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "window-gate-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[rate_limit]\nmax_requests = 7\n").unwrap();

        let config = RateLimiterConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.max_requests, 7);
    }
}

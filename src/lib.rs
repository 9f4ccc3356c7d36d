//! # window-gate - Fixed-Window Rate Limiting for HTTP Handlers
//!
//! A small, thread-safe admission controller for routes that trigger expensive
//! work: "at most N requests per client per fixed window W".
//!
//! ## The Fixed Window Algorithm
//!
//! ```text
//!     N = 3, W = 1 hour, client 203.0.113.7
//!
//!     10:00  ✅ remaining 2   (window opens, resets at 11:00)
//!     10:05  ✅ remaining 1
//!     10:20  ✅ remaining 0
//!     10:40  ❌ 429, retry-after 1200s
//!     11:00  ✅ remaining 2   (new window)
//! ```
//!
//! The window does not slide: it is fixed when the first request arrives. A
//! client can therefore land up to 2N requests around a window boundary.
//!
//! ## Quick Start
//!
//! ```rust
//! use http::HeaderMap;
//! use window_gate::{get_real_ip, RateLimiter, RateLimiterConfig};
//!
//! let limiter = RateLimiter::new(RateLimiterConfig::per_hour(3)).unwrap();
//!
//! // In a route handler:
//! let mut headers = HeaderMap::new();
//! headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
//!
//! let client = get_real_ip(&headers);
//! let decision = limiter.check_rate_limit(&client);
//! if decision.allowed {
//!     // do the work, echo decision.headers() on the response
//! } else {
//!     // 429 with decision.headers() and decision.rejection_body()
//! }
//! ```
//!
//! ### With axum
//!
//! The `axum` feature adds `enforce_rate_limit`, a middleware for
//! `axum::middleware::from_fn_with_state` that runs the check above and
//! answers rejected requests with a 429. Its documentation carries a full
//! router example.
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │     Route handlers      │
//!                    └──────────┬──────────────┘
//!                               │
//!                    ┌──────────▼──────────────┐
//!                    │      RateLimiter        │
//!                    ├─────────────────────────┤
//!                    │  • check_rate_limit()   │
//!                    │  • cleanup()            │
//!                    │  • metrics()            │
//!                    └──────────┬──────────────┘
//!                               │
//!                ┌──────────────┴───────────────┐
//!                │                              │
//!     ┌──────────▼──────────┐       ┌───────────▼──────────┐
//!     │   RateLimitStore    │       │        Clock         │
//!     ├─────────────────────┤       ├──────────────────────┤
//!     │ • MemoryStore       │       │ • SystemClock        │
//!     │ • per-key atomicity │       │ • ManualClock        │
//!     │ • capacity bound    │       │                      │
//!     └─────────────────────┘       └──────────────────────┘
//! ```
//!
//! ## Deployment Notes
//!
//! - State lives in process memory and resets on restart.
//! - The in-memory store is only correct for a single instance. Running
//!   several replicas needs a shared [`RateLimitStore`] with atomic increments.
//! - Expired windows are swept by [`RateLimiter::start_cleanup_thread`] and,
//!   when the store is full, purged on demand.
//! - A store full of open windows refuses new clients until one expires.
//!   Tracked clients keep their windows and limits.
//!
//! ## Features
//!
//! - `axum` (default): the `enforce_rate_limit` middleware and `IntoResponse`
//!   for [`RateLimitExceeded`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

// Internal module
mod rate_limiter;

// Public re-exports
pub use rate_limiter::{
    current_time_ms, format_wait_time, get_real_ip, get_real_ip_from, ClientWindow, Clock,
    ConfigError, HealthStatus, ManualClock, MemoryStore, RateLimitDecision, RateLimitExceeded,
    RateLimitStore, RateLimiter, RateLimiterConfig, RateLimiterMetrics, SystemClock,
    WindowPolicy, CF_CONNECTING_IP, CLIENT_IP_HEADERS, DEFAULT_CLEANUP_INTERVAL_MS,
    DEFAULT_MAX_REQUESTS, DEFAULT_MAX_TRACKED_CLIENTS, DEFAULT_WINDOW_MS, UNKNOWN_CLIENT,
    X_FORWARDED_FOR, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET, X_REAL_IP,
};

#[cfg(feature = "axum")]
pub use rate_limiter::{enforce_rate_limit, too_many_requests};

/// A limiter wrapped in `Arc` for sharing between handlers and the cleanup
/// thread.
pub type SharedRateLimiter<S = MemoryStore, C = SystemClock> = std::sync::Arc<RateLimiter<S, C>>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
///
/// ```rust
/// use window_gate::prelude::*;
///
/// let limiter = RateLimiter::hourly(3);
/// let decision: RateLimitDecision = limiter.check_rate_limit(UNKNOWN_CLIENT);
/// assert!(decision.allowed);
/// ```
pub mod prelude {
    //! Common imports for route handlers.

    pub use crate::{
        get_real_ip, Clock, HealthStatus, MemoryStore, RateLimitDecision, RateLimitStore,
        RateLimiter, RateLimiterBuilder, RateLimiterConfig, RateLimiterMetrics,
        SharedRateLimiter, SystemClock, UNKNOWN_CLIENT,
    };
}

/// Builder for a limiter with the in-memory store and system clock.
///
/// ```rust
/// use window_gate::RateLimiterBuilder;
///
/// let limiter = RateLimiterBuilder::new()
///     .max_requests(3)
///     .window_ms(60 * 60 * 1000)
///     .max_tracked_clients(5_000)
///     .try_build()
///     .unwrap();
/// assert_eq!(limiter.policy().max_requests, 3);
///
/// // Invalid settings are reported, not panicked on.
/// assert!(RateLimiterBuilder::new().max_requests(0).try_build().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RateLimiterBuilder {
    config: RateLimiterConfig,
}

impl RateLimiterBuilder {
    /// Starts from [`RateLimiterConfig::default`]: 3 requests per hour.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from TOML.
    pub fn from_config(config: RateLimiterConfig) -> Self {
        Self { config }
    }

    /// N, requests admitted per window.
    pub fn max_requests(mut self, n: u32) -> Self {
        self.config.max_requests = n;
        self
    }

    /// W, window length in milliseconds.
    pub fn window_ms(mut self, ms: u64) -> Self {
        self.config.window_ms = ms;
        self
    }

    /// Capacity bound of the in-memory store.
    pub fn max_tracked_clients(mut self, clients: usize) -> Self {
        self.config.max_tracked_clients = clients;
        self
    }

    /// Interval of the background sweep.
    pub fn cleanup_interval_ms(mut self, ms: u64) -> Self {
        self.config.cleanup_interval_ms = ms;
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Builds the limiter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if any setting is zero.
    pub fn try_build(self) -> Result<RateLimiter, ConfigError> {
        RateLimiter::new(self.config)
    }

    /// Builds the limiter around a custom store and clock.
    pub fn try_build_with<S: RateLimitStore, C: Clock>(
        self,
        store: S,
        clock: C,
    ) -> Result<RateLimiter<S, C>, ConfigError> {
        RateLimiter::with_parts(self.config, store, clock)
    }
}

//! # Rate Limiter Module
//!
//! Internal organization of the fixed-window limiter.
//!
//! ## Module Structure
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── config.rs       (Limits, store bounds, TOML loading)
//!     ├── core.rs         (Window record and admission rule)
//!     ├── store.rs        (Storage trait and in-memory store)
//!     ├── manager.rs      (RateLimiter facade and cleanup threads)
//!     ├── metrics.rs      (Counters and health)
//!     ├── client_ip.rs    (Client identity from proxy headers)
//!     ├── response.rs     (Rate-limit headers and 429 body)
//!     ├── middleware.rs   (axum middleware, `axum` feature)
//!     └── utils.rs        (Clocks)
//! ```
//!
//! ## Request Flow
//!
//! ```text
//!     HTTP request
//!          │
//!          ▼
//!     ┌───────────┐
//!     │ client_ip │ ◄── x-forwarded-for / x-real-ip / cf-connecting-ip
//!     └─────┬─────┘
//!           ▼
//!     ┌───────────┐
//!     │  manager  │ ◄── clock reading, counters
//!     └─────┬─────┘
//!           ▼
//!     ┌───────────┐
//!     │   store   │ ◄── per-key atomic check-and-increment
//!     └─────┬─────┘
//!           ▼
//!     ┌───────────┐
//!     │   core    │ ◄── fixed-window rule
//!     └─────┬─────┘
//!           ▼
//!     ┌───────────┐
//!     │ response  │ ◄── headers, 429 body
//!     └───────────┘
//! ```

mod client_ip;
mod config;
mod core;
mod manager;
#[cfg(feature = "axum")]
mod middleware;
mod metrics;
mod response;
mod store;
mod utils;

/// Client identity extraction
pub use client_ip::{
    get_real_ip, get_real_ip_from, CF_CONNECTING_IP, CLIENT_IP_HEADERS, UNKNOWN_CLIENT,
    X_FORWARDED_FOR, X_REAL_IP,
};

/// Configuration and its errors
pub use config::{
    ConfigError, RateLimiterConfig, DEFAULT_CLEANUP_INTERVAL_MS, DEFAULT_MAX_REQUESTS,
    DEFAULT_MAX_TRACKED_CLIENTS, DEFAULT_WINDOW_MS,
};

/// Window record, policy and decision
pub use self::core::{ClientWindow, RateLimitDecision, WindowPolicy};

/// The limiter itself
pub use manager::RateLimiter;

/// axum integration
#[cfg(feature = "axum")]
pub use middleware::{enforce_rate_limit, too_many_requests};

/// Metrics and health
pub use metrics::{HealthStatus, RateLimiterMetrics};

/// HTTP header and body conventions
pub use response::{
    format_wait_time, RateLimitExceeded, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING,
    X_RATELIMIT_RESET,
};

/// Storage backends
pub use store::{MemoryStore, RateLimitStore};

/// Time sources
pub use utils::{current_time_ms, Clock, ManualClock, SystemClock};

//! Admission metrics and health assessment for a rate limiter.
//!
//! ```text
//!     Metrics Dashboard:
//!     ┌─────────────────────────────────────┐
//!     │  Checks: 1200                       │
//!     │  Rejection Rate: 4%                 │
//!     │  ▓░░░░░░░░░░░░░░░░░░░  (48/1200)    │
//!     │                                     │
//!     │  Tracked Clients: 310/10000         │
//!     │  Health: ✅ Healthy                 │
//!     └─────────────────────────────────────┘
//! ```

use std::fmt;

/// Snapshot of a limiter's counters and its store occupancy.
///
/// ## Example Usage
///
/// ```rust
/// use window_gate::RateLimiter;
///
/// let limiter = RateLimiter::hourly(3);
/// limiter.check_rate_limit("198.51.100.4");
///
/// let metrics = limiter.metrics();
/// assert_eq!(metrics.total_allowed, 1);
/// println!("{}", metrics.summary());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterMetrics {
    /// Checks performed since startup.
    pub total_checks: u64,

    /// Checks that admitted the request.
    pub total_allowed: u64,

    /// Checks that rejected the request.
    pub total_rejected: u64,

    /// Client windows currently held by the store.
    pub tracked_clients: usize,

    /// Store capacity bound, if the store has one.
    pub max_tracked_clients: Option<usize>,

    /// Client windows opened since startup.
    pub total_created: u64,

    /// Client windows removed by sweeps, capacity purges or resets.
    pub total_evicted: u64,

    /// New clients rejected because the store was full of open windows.
    pub total_refused: u64,
}

impl RateLimiterMetrics {
    /// Fraction of checks that were rejected, 0.0 when nothing was checked.
    #[inline]
    pub fn rejection_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.total_rejected as f64 / self.total_checks as f64
        }
    }

    /// Fraction of checks that were admitted, 1.0 when nothing was checked.
    #[inline]
    pub fn success_rate(&self) -> f64 {
        1.0 - self.rejection_rate()
    }

    /// Store occupancy in `0.0..=1.0`; 0.0 for unbounded stores.
    #[inline]
    pub fn capacity_used(&self) -> f64 {
        match self.max_tracked_clients {
            Some(max) if max > 0 => self.tracked_clients as f64 / max as f64,
            _ => 0.0,
        }
    }

    /// Whether the store is above 90% of its capacity bound.
    #[inline]
    pub fn is_near_capacity(&self) -> bool {
        self.capacity_used() > 0.9
    }

    /// Health of the limiter.
    ///
    /// - **Critical**: store above 90% capacity; once it is full of open
    ///   windows, new clients are refused
    /// - **Degraded**: more than half of all checks rejected
    /// - **Healthy**: otherwise
    pub fn health_status(&self) -> HealthStatus {
        if self.is_near_capacity() {
            HealthStatus::Critical
        } else if self.total_checks > 0 && self.rejection_rate() > 0.5 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Human-readable report suitable for logs.
    ///
    /// ```text
    /// RateLimiter Metrics:
    /// ├─ Admission:
    /// │  ├─ Checks: 120
    /// │  ├─ Allowed: 100
    /// │  ├─ Rejected: 20
    /// │  └─ Rejection Rate: 16.67%
    /// ├─ Store:
    /// │  ├─ Tracked Clients: 40/10000
    /// │  ├─ Created: 55
    /// │  ├─ Evicted: 15
    /// │  └─ Refused: 0
    /// └─ Health: ✅ Healthy
    /// ```
    pub fn summary(&self) -> String {
        let capacity = self
            .max_tracked_clients
            .map_or_else(|| "unbounded".to_string(), |max| max.to_string());

        format!(
            "RateLimiter Metrics:\n\
             ├─ Admission:\n\
             │  ├─ Checks: {}\n\
             │  ├─ Allowed: {}\n\
             │  ├─ Rejected: {}\n\
             │  └─ Rejection Rate: {:.2}%\n\
             ├─ Store:\n\
             │  ├─ Tracked Clients: {}/{}\n\
             │  ├─ Created: {}\n\
             │  ├─ Evicted: {}\n\
             │  └─ Refused: {}\n\
             └─ Health: {}",
            self.total_checks,
            self.total_allowed,
            self.total_rejected,
            self.rejection_rate() * 100.0,
            self.tracked_clients,
            capacity,
            self.total_created,
            self.total_evicted,
            self.total_refused,
            self.health_status(),
        )
    }
}

impl fmt::Display for RateLimiterMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Three-level health indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Normal operation.
    Healthy,

    /// Most traffic is being rejected; either abuse or a limit set too low.
    Degraded,

    /// The store is close to its capacity bound.
    Critical,
}

impl HealthStatus {
    /// Returns true for anything but `Healthy`.
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }

    /// Operator guidance for this status.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Healthy => "No action needed",
            Self::Degraded => "Check for abusive clients or raise max_requests",
            Self::Critical => "Raise max_tracked_clients or shorten cleanup_interval_ms",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "✅ Healthy"),
            Self::Degraded => write!(f, "⚠️ Degraded"),
            Self::Critical => write!(f, "🔴 Critical"),
        }
    }
}

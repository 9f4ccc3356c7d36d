//! # Core Fixed-Window Algorithm
//!
//! This module holds the per-client window record and the admission rule.
//! Everything here is pure: given a record, a policy and "now" the outcome is
//! fully determined. Concurrency is the store's business.
//!
//! ## The Fixed Window Algorithm
//!
//! ```text
//!     N = 3, W = 60 min
//!
//!     t=0      open window   count=1  ✅ remaining 2
//!     t=1m                   count=2  ✅ remaining 1
//!     t=2m                   count=3  ✅ remaining 0
//!     t=3m                   count=3  ❌ remaining 0 (not incremented)
//!     ────────────── reset_time = t0 + 60m ──────────────
//!     t=60m    new window    count=1  ✅ remaining 2
//! ```
//!
//! ## Per-Record State Machine
//!
//! ```text
//!     NONE ──► OPEN(1) ──► OPEN(k ≤ N) ──► EXPIRED ──► OPEN(1)
//!                                            │
//!                          inferred from now >= reset_time_ms
//! ```
//!
//! A client may get up to 2N admissions across a window boundary (N just
//! before reset, N just after). That is inherent to fixed windows.

/// Admission policy: at most `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    /// N, maximum admitted requests per window.
    pub max_requests: u32,
    /// W, window length in milliseconds.
    pub window_ms: u64,
}

/// Window record for one client identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    /// Admitted requests in this window.
    pub count: u32,
    /// Epoch ms when the window opened.
    pub window_start_ms: u64,
    /// Epoch ms when the window closes, `window_start_ms + W`.
    pub reset_time_ms: u64,
}

impl ClientWindow {
    /// Opens a window at `now_ms` counting the opening request, and returns the
    /// admission for that request.
    pub fn open(now_ms: u64, policy: WindowPolicy) -> (Self, RateLimitDecision) {
        let window = Self {
            count: 1,
            window_start_ms: now_ms,
            reset_time_ms: now_ms.saturating_add(policy.window_ms),
        };
        let decision = window.decision(true, now_ms, policy);
        (window, decision)
    }

    /// Whether the window has closed at `now_ms`.
    #[inline]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_time_ms
    }

    /// Applies one request to this record.
    ///
    /// An expired record is replaced by a fresh window. A full window rejects
    /// without consuming more quota.
    pub fn admit(&mut self, now_ms: u64, policy: WindowPolicy) -> RateLimitDecision {
        if self.is_expired(now_ms) {
            let (fresh, decision) = Self::open(now_ms, policy);
            *self = fresh;
            return decision;
        }

        if self.count < policy.max_requests {
            self.count += 1;
            self.decision(true, now_ms, policy)
        } else {
            self.decision(false, now_ms, policy)
        }
    }

    fn decision(&self, allowed: bool, now_ms: u64, policy: WindowPolicy) -> RateLimitDecision {
        RateLimitDecision {
            allowed,
            limit: policy.max_requests,
            remaining: if allowed {
                policy.max_requests.saturating_sub(self.count)
            } else {
                0
            },
            reset_time_ms: self.reset_time_ms,
            retry_after_ms: self.reset_time_ms.saturating_sub(now_ms),
        }
    }
}

/// Outcome of a rate-limit check.
///
/// A rejection is an ordinary value, not an error: callers branch on
/// [`allowed`](Self::allowed) and translate `false` into HTTP 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// N, the configured requests per window.
    pub limit: u32,
    /// Requests left in this window after this one; 0 when rejected.
    pub remaining: u32,
    /// Epoch ms at which the current window closes.
    pub reset_time_ms: u64,
    /// Milliseconds from the check until `reset_time_ms`.
    pub retry_after_ms: u64,
}

impl RateLimitDecision {
    /// Whole seconds until reset, rounded up.
    ///
    /// ```rust
    /// use window_gate::RateLimitDecision;
    ///
    /// let decision = RateLimitDecision {
    ///     allowed: false,
    ///     limit: 3,
    ///     remaining: 0,
    ///     reset_time_ms: 10_500,
    ///     retry_after_ms: 1_500,
    /// };
    /// assert_eq!(decision.retry_after_secs(), 2);
    /// ```
    #[inline]
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }

    /// Whether the request was rejected.
    #[inline]
    pub fn is_rejected(&self) -> bool {
        !self.allowed
    }
}

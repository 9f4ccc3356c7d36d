//! HTTP conventions for surfacing a [`RateLimitDecision`].
//!
//! ```text
//!     allowed                         rejected (429)
//!     ───────                         ──────────────
//!     x-ratelimit-limit: 3            x-ratelimit-limit: 3
//!     x-ratelimit-remaining: 1        x-ratelimit-remaining: 0
//!     x-ratelimit-reset: <epoch ms>   x-ratelimit-reset: <epoch ms>
//!                                     retry-after: <seconds>
//!                                     {"error": "...", "message": "...", ...}
//! ```

use super::core::RateLimitDecision;
use http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use serde::Serialize;

/// Total requests allowed per window.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");

/// Requests left in the current window.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Epoch milliseconds at which the window resets.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

impl RateLimitDecision {
    /// Writes the rate-limit header family into `headers`.
    ///
    /// `retry-after` is only added for rejections.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_time_ms));
        if !self.allowed {
            headers.insert(RETRY_AFTER, HeaderValue::from(self.retry_after_secs()));
        }
    }

    /// The rate-limit headers as a fresh map.
    ///
    /// ```rust
    /// use window_gate::RateLimiter;
    ///
    /// let limiter = RateLimiter::hourly(3);
    /// let headers = limiter.check_rate_limit("192.0.2.10").headers();
    /// assert_eq!(headers["x-ratelimit-remaining"], "2");
    /// assert!(headers.get("retry-after").is_none());
    /// ```
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(4);
        self.apply_headers(&mut headers);
        headers
    }

    /// JSON body for a 429 response.
    pub fn rejection_body(&self) -> RateLimitExceeded {
        RateLimitExceeded::from_decision(self)
    }
}

/// JSON body of a 429 response.
///
/// Serializes as
/// `{"error": "Too many requests", "message": "...", "retryAfter": 42, "resetTime": 1700000000000}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceeded {
    /// Short machine-stable reason.
    pub error: &'static str,
    /// Human-readable explanation with the wait time.
    pub message: String,
    /// Seconds until the window resets.
    pub retry_after: u64,
    /// Epoch milliseconds at which the window resets.
    pub reset_time: u64,
}

impl RateLimitExceeded {
    /// Builds the body for a (rejected) decision.
    pub fn from_decision(decision: &RateLimitDecision) -> Self {
        let retry_after = decision.retry_after_secs();
        Self {
            error: "Too many requests",
            message: format!(
                "Rate limit exceeded. Please try again in {}.",
                format_wait_time(retry_after)
            ),
            retry_after,
            reset_time: decision.reset_time_ms,
        }
    }

    /// The body serialized as JSON bytes.
    pub fn to_json(&self) -> Vec<u8> {
        // Plain struct of strings and integers; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Renders a wait in the largest whole unit, rounding up.
///
/// ```rust
/// use window_gate::format_wait_time;
///
/// assert_eq!(format_wait_time(1), "1 second");
/// assert_eq!(format_wait_time(90), "2 minutes");
/// assert_eq!(format_wait_time(3_600), "1 hour");
/// ```
pub fn format_wait_time(secs: u64) -> String {
    let (amount, unit) = if secs >= 3_600 {
        (secs.div_ceil(3_600), "hour")
    } else if secs >= 60 {
        (secs.div_ceil(60), "minute")
    } else {
        (secs, "second")
    };

    if amount == 1 {
        format!("1 {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}

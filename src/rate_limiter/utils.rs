//! # Time Sources (utils.rs)
//!
//! Every window decision is a function of the stored record and "now". This
//! module provides the wall-clock reading used in production and a manually
//! driven clock for tests and simulations.
//!
//! ```text
//!     Clock readings:
//!
//!     SystemClock:  process-start epoch ms + monotonic elapsed
//!                   (never jumps backwards if the wall clock is adjusted)
//!
//!     ManualClock:  shared AtomicU64, moved with set()/advance()
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

// Wall-clock epoch milliseconds captured at first use, advanced by a monotonic
// Instant afterwards.
static START_TIME_BASE: OnceLock<(Instant, u64)> = OnceLock::new();

/// Returns the current time in milliseconds since UNIX epoch.
///
/// The value is anchored to the wall clock once per process and then moves
/// forward monotonically, so windows never reopen because of an NTP step.
///
/// # Example
///
/// ```rust
/// use window_gate::current_time_ms;
///
/// let a = current_time_ms();
/// let b = current_time_ms();
/// assert!(b >= a);
/// ```
#[inline]
pub fn current_time_ms() -> u64 {
    let (start, base_ms) = START_TIME_BASE.get_or_init(|| {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        (Instant::now(), epoch_ms)
    });
    base_ms.saturating_add(start.elapsed().as_millis() as u64)
}

/// Source of "now" for window bookkeeping, in epoch milliseconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds since UNIX epoch.
    fn now_ms(&self) -> u64;
}

/// Production clock backed by [`current_time_ms`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        current_time_ms()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// the limiter and keep another to advance time.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use window_gate::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let handle = clock.clone();
/// handle.advance(Duration::from_secs(2));
/// assert_eq!(clock.now_ms(), 3_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Moves the clock to an absolute epoch millisecond value.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::Release);
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::AcqRel);
    }

    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

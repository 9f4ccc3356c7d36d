//! # Fixed-Window Rate Limiter
//!
//! [`RateLimiter`] ties a configuration, a [`RateLimitStore`] and a [`Clock`]
//! together and exposes the admission check route handlers call before doing
//! expensive work.
//!
//! ## Architecture
//!
//! ```text
//!     Route handler
//!          │ get_real_ip(headers)
//!          ▼
//!     ┌──────────────┐  check(id, now, policy)  ┌──────────────┐
//!     │ RateLimiter  │ ───────────────────────► │    Store     │
//!     │ counters     │ ◄─────────────────────── │ id → window  │
//!     └──────┬───────┘     RateLimitDecision    └──────▲───────┘
//!            │                                         │
//!            └──── cleanup thread ── purge_expired ────┘
//! ```
//!
//! The limiter is an ordinary value: create it at startup, wrap it in `Arc`
//! and hand it to handlers. There is no process-wide singleton, so tests can
//! build as many isolated limiters as they like.

use super::{
    client_ip::UNKNOWN_CLIENT,
    config::{ConfigError, RateLimiterConfig},
    core::{ClientWindow, RateLimitDecision, WindowPolicy},
    metrics::RateLimiterMetrics,
    store::{MemoryStore, RateLimitStore},
    utils::{Clock, SystemClock},
};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-client fixed-window rate limiter.
///
/// ## Usage
///
/// ```rust
/// use window_gate::{RateLimiter, RateLimiterConfig};
///
/// let limiter = RateLimiter::new(RateLimiterConfig::per_hour(3)).unwrap();
///
/// for expected_remaining in [2, 1, 0] {
///     let decision = limiter.check_rate_limit("203.0.113.9");
///     assert!(decision.allowed);
///     assert_eq!(decision.remaining, expected_remaining);
/// }
///
/// let decision = limiter.check_rate_limit("203.0.113.9");
/// assert!(!decision.allowed);
/// assert_eq!(decision.remaining, 0);
/// ```
///
/// ## Custom Store and Clock
///
/// ```rust
/// use std::time::Duration;
/// use window_gate::{ManualClock, MemoryStore, RateLimiter, RateLimiterConfig};
///
/// let clock = ManualClock::new(0);
/// let limiter = RateLimiter::with_parts(
///     RateLimiterConfig::per_minute(1),
///     MemoryStore::new(100),
///     clock.clone(),
/// )
/// .unwrap();
///
/// assert!(limiter.check_rate_limit("a").allowed);
/// assert!(!limiter.check_rate_limit("a").allowed);
/// clock.advance(Duration::from_secs(60));
/// assert!(limiter.check_rate_limit("a").allowed);
/// ```
pub struct RateLimiter<S = MemoryStore, C = SystemClock>
where
    S: RateLimitStore,
    C: Clock,
{
    store: S,
    clock: C,
    config: RateLimiterConfig,
    policy: WindowPolicy,
    total_allowed: AtomicU64,
    total_rejected: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter with an in-memory store and the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn new(config: RateLimiterConfig) -> Result<Self, ConfigError> {
        let store = MemoryStore::new(config.max_tracked_clients);
        Self::with_parts(config, store, SystemClock)
    }

    /// `max_requests` per hour with default store settings.
    ///
    /// This constructor is infallible: a zero `max_requests`, which
    /// [`RateLimiterConfig::validate`] would reject, is raised to 1 instead.
    /// Use [`RateLimiter::new`] to have a zero limit reported as
    /// [`ConfigError::Invalid`].
    ///
    /// ```rust
    /// use window_gate::{RateLimiter, RateLimiterConfig};
    ///
    /// assert_eq!(RateLimiter::hourly(0).policy().max_requests, 1);
    /// assert!(RateLimiter::new(RateLimiterConfig::per_hour(0)).is_err());
    /// ```
    pub fn hourly(max_requests: u32) -> Self {
        let config = RateLimiterConfig::per_hour(max_requests.max(1));
        Self::from_valid_parts(
            MemoryStore::new(config.max_tracked_clients),
            SystemClock,
            config,
        )
    }
}

impl<S: RateLimitStore, C: Clock> RateLimiter<S, C> {
    /// Creates a limiter around an explicit store and clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn with_parts(config: RateLimiterConfig, store: S, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_parts(store, clock, config))
    }

    fn from_valid_parts(store: S, clock: C, config: RateLimiterConfig) -> Self {
        Self {
            policy: config.policy(),
            store,
            clock,
            config,
            total_allowed: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
        }
    }

    /// Decides whether a request from `identifier` may proceed.
    ///
    /// The first request of a window opens it with `remaining = N - 1`; each
    /// further admitted request lowers `remaining` by one. Once `N` requests
    /// were admitted the window rejects with `remaining = 0` until
    /// `reset_time_ms`, and rejections do not consume quota.
    ///
    /// Never fails. An empty identifier is counted as `"unknown"`.
    #[inline]
    pub fn check_rate_limit(&self, identifier: &str) -> RateLimitDecision {
        let identifier = if identifier.is_empty() {
            UNKNOWN_CLIENT
        } else {
            identifier
        };

        let now_ms = self.clock.now_ms();
        let decision = self.store.check(identifier, now_ms, self.policy);

        if decision.allowed {
            self.total_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                client = identifier,
                reset_time_ms = decision.reset_time_ms,
                "rate limit exceeded"
            );
        }
        decision
    }

    /// Removes every expired window. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        self.store.purge_expired(self.clock.now_ms())
    }

    /// Forgets `identifier`, giving it a fresh window on its next request.
    pub fn reset(&self, identifier: &str) -> bool {
        self.store.remove(identifier)
    }

    /// Forgets every client. Returns how many were tracked.
    pub fn clear(&self) -> usize {
        let cleared = self.store.clear();
        if cleared > 0 {
            info!(cleared, "cleared all client windows");
        }
        cleared
    }

    /// Current window of `identifier`, if it has one.
    pub fn window(&self, identifier: &str) -> Option<ClientWindow> {
        self.store.window(identifier)
    }

    /// Number of clients currently tracked.
    #[inline]
    pub fn tracked_clients(&self) -> usize {
        self.store.tracked_clients()
    }

    /// The configuration this limiter was built with.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// The admission policy in effect.
    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The clock used for window decisions.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Snapshot of admission counters and store occupancy.
    pub fn metrics(&self) -> RateLimiterMetrics {
        let total_allowed = self.total_allowed.load(Ordering::Relaxed);
        let total_rejected = self.total_rejected.load(Ordering::Relaxed);

        RateLimiterMetrics {
            total_checks: total_allowed + total_rejected,
            total_allowed,
            total_rejected,
            tracked_clients: self.store.tracked_clients(),
            max_tracked_clients: self.store.capacity(),
            total_created: self.store.total_created(),
            total_evicted: self.store.total_evicted(),
            total_refused: self.store.total_refused(),
        }
    }

    fn sweep(&self) {
        self.cleanup();

        let metrics = self.metrics();
        if metrics.is_near_capacity() {
            warn!(
                tracked = metrics.tracked_clients,
                used_pct = (metrics.capacity_used() * 100.0) as u64,
                "high client window usage"
            );
        }
    }
}

impl<S, C> RateLimiter<S, C>
where
    S: RateLimitStore + 'static,
    C: Clock + 'static,
{
    /// Starts a background thread that sweeps expired windows every
    /// `cleanup_interval_ms` for the rest of the process.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use window_gate::RateLimiter;
    ///
    /// let limiter = Arc::new(RateLimiter::hourly(3));
    /// let _handle = limiter.clone().start_cleanup_thread().unwrap();
    /// ```
    pub fn start_cleanup_thread(self: Arc<Self>) -> io::Result<thread::JoinHandle<()>> {
        let interval = Duration::from_millis(self.config.cleanup_interval_ms);

        thread::Builder::new()
            .name("window-gate-cleanup".to_string())
            .spawn(move || {
                info!(
                    interval_ms = self.config.cleanup_interval_ms,
                    "started client window cleanup thread"
                );
                loop {
                    thread::sleep(interval);
                    self.sweep();
                }
            })
    }

    /// Starts a sweep thread that stops when the returned sender fires or is
    /// dropped.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use window_gate::RateLimiter;
    ///
    /// let limiter = Arc::new(RateLimiter::hourly(3));
    /// let (handle, stop_tx) = limiter.clone().start_stoppable_cleanup_thread().unwrap();
    ///
    /// stop_tx.send(()).unwrap();
    /// handle.join().unwrap();
    /// ```
    pub fn start_stoppable_cleanup_thread(
        self: Arc<Self>,
    ) -> io::Result<(thread::JoinHandle<()>, mpsc::Sender<()>)> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let interval = Duration::from_millis(self.config.cleanup_interval_ms);

        let handle = thread::Builder::new()
            .name("window-gate-cleanup".to_string())
            .spawn(move || {
                info!(
                    interval_ms = self.config.cleanup_interval_ms,
                    "started stoppable client window cleanup thread"
                );
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            info!("client window cleanup thread stopping");
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => self.sweep(),
                    }
                }
            })?;

        Ok((handle, stop_tx))
    }
}

impl<S: RateLimitStore + fmt::Debug, C: Clock> fmt::Debug for RateLimiter<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field("total_allowed", &self.total_allowed.load(Ordering::Relaxed))
            .field("total_rejected", &self.total_rejected.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::utils::ManualClock;
    use std::sync::atomic::AtomicU32;

    const MINUTE_MS: u64 = 60_000;

    fn manual(config: RateLimiterConfig) -> (RateLimiter<MemoryStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let store = MemoryStore::new(config.max_tracked_clients);
        let limiter = RateLimiter::with_parts(config, store, clock.clone()).unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(RateLimiter::new(RateLimiterConfig::new(0, 1_000)).is_err());
        assert!(RateLimiter::new(RateLimiterConfig::new(3, 0)).is_err());
    }

    #[test]
    fn test_hourly_raises_zero_limit() {
        let limiter = RateLimiter::hourly(0);
        assert_eq!(limiter.policy().max_requests, 1);
        assert_eq!(limiter.config().window_ms, 60 * MINUTE_MS);

        assert!(limiter.check_rate_limit("a").allowed);
        assert!(!limiter.check_rate_limit("a").allowed);
        assert!(matches!(
            RateLimiter::new(RateLimiterConfig::per_hour(0)),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_hourly_scenario() {
        let (limiter, clock) = manual(RateLimiterConfig::new(3, 60 * MINUTE_MS));
        let window_start = clock.now_ms();

        for expected in [2, 1, 0] {
            let decision = limiter.check_rate_limit("198.51.100.7");
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected);
        }

        let fourth = limiter.check_rate_limit("198.51.100.7");
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
        assert_eq!(fourth.reset_time_ms, window_start + 60 * MINUTE_MS);

        clock.set(fourth.reset_time_ms + 1);
        let after = limiter.check_rate_limit("198.51.100.7");
        assert!(after.allowed);
        assert_eq!(after.remaining, 2);
    }

    #[test]
    fn test_admission_bound() {
        let (limiter, clock) = manual(RateLimiterConfig::per_minute(5));

        let admitted = (0..50)
            .filter(|_| {
                clock.advance_ms(100);
                limiter.check_rate_limit("a").allowed
            })
            .count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_remaining_strictly_decreases() {
        let (limiter, _clock) = manual(RateLimiterConfig::per_minute(10));

        let remaining: Vec<u32> = (0..10)
            .map(|_| limiter.check_rate_limit("a").remaining)
            .collect();
        assert_eq!(remaining, (0..10).rev().collect::<Vec<u32>>());
    }

    #[test]
    fn test_independent_clients() {
        let (limiter, _clock) = manual(RateLimiterConfig::per_minute(2));

        limiter.check_rate_limit("a");
        limiter.check_rate_limit("a");
        assert!(!limiter.check_rate_limit("a").allowed);

        let b = limiter.check_rate_limit("b");
        assert!(b.allowed);
        assert_eq!(b.remaining, 1);
    }

    #[test]
    fn test_empty_identifier_is_unknown() {
        let (limiter, _clock) = manual(RateLimiterConfig::per_minute(2));

        limiter.check_rate_limit("");
        let decision = limiter.check_rate_limit(UNKNOWN_CLIENT);
        assert_eq!(decision.remaining, 0);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_cleanup_removes_expired() {
        let (limiter, clock) = manual(RateLimiterConfig::per_minute(3));

        limiter.check_rate_limit("early");
        clock.advance_ms(30_000);
        limiter.check_rate_limit("late");
        clock.advance_ms(30_000);

        assert_eq!(limiter.cleanup(), 1);
        assert!(limiter.window("early").is_none());
        assert!(limiter.window("late").is_some());
    }

    #[test]
    fn test_reset_and_clear() {
        let (limiter, _clock) = manual(RateLimiterConfig::per_minute(1));

        limiter.check_rate_limit("a");
        assert!(!limiter.check_rate_limit("a").allowed);
        assert!(limiter.reset("a"));
        assert!(limiter.check_rate_limit("a").allowed);

        limiter.check_rate_limit("b");
        assert_eq!(limiter.clear(), 2);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_metrics() {
        let (limiter, _clock) = manual(RateLimiterConfig::per_minute(1).with_max_tracked_clients(10));

        limiter.check_rate_limit("a");
        limiter.check_rate_limit("a");
        limiter.check_rate_limit("b");

        let metrics = limiter.metrics();
        assert_eq!(metrics.total_checks, 3);
        assert_eq!(metrics.total_allowed, 2);
        assert_eq!(metrics.total_rejected, 1);
        assert_eq!(metrics.tracked_clients, 2);
        assert_eq!(metrics.max_tracked_clients, Some(10));
        assert_eq!(metrics.total_created, 2);
    }

    #[test]
    fn test_concurrent_single_client() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::per_hour(3)).unwrap());
        let admitted = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                thread::spawn(move || {
                    if limiter.check_rate_limit("203.0.113.50").allowed {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::Relaxed), 3);
        assert_eq!(limiter.metrics().total_rejected, 13);
    }

    #[test]
    fn test_stoppable_cleanup_thread() {
        let clock = ManualClock::new(0);
        let config = RateLimiterConfig::new(3, 1_000).with_cleanup_interval_ms(20);
        let limiter = Arc::new(
            RateLimiter::with_parts(config, MemoryStore::new(100), clock.clone()).unwrap(),
        );

        limiter.check_rate_limit("a");
        limiter.check_rate_limit("b");
        clock.advance_ms(5_000);

        let (handle, stop_tx) = limiter.clone().start_stoppable_cleanup_thread().unwrap();
        thread::sleep(Duration::from_millis(200));
        stop_tx.send(()).unwrap();
        handle.join().unwrap();

        assert_eq!(limiter.tracked_clients(), 0);
        assert_eq!(limiter.metrics().total_evicted, 2);
    }

    #[test]
    fn test_cleanup_thread_stops_when_sender_dropped() {
        let limiter = Arc::new(RateLimiter::hourly(3));
        let (handle, stop_tx) = limiter.start_stoppable_cleanup_thread().unwrap();

        drop(stop_tx);
        handle.join().unwrap();
    }

    #[test]
    fn test_debug_impl() {
        let limiter = RateLimiter::hourly(3);
        let debug = format!("{limiter:?}");
        assert!(debug.contains("RateLimiter"));
        assert!(debug.contains("max_requests: 3"));
    }
}

//! # Client Window Storage
//!
//! The limiter never touches a global map. It owns a [`RateLimitStore`] handed
//! to it at construction, which keeps one [`ClientWindow`] per identifier and
//! performs check-and-increment as a single step per key.
//!
//! ```text
//!     Client Requests:
//!     203.0.113.7 ──┐
//!     198.51.100.2 ─┼──► MemoryStore ──► DashMap<identifier, ClientWindow>
//!     unknown ──────┘          │              (sharded, per-key lock)
//!                              ▼
//!                    capacity reached?
//!                    ├─ purge expired windows
//!                    └─ still full: refuse the newcomer until a window expires
//! ```
//!
//! Open windows are never evicted, so no client regains quota inside its
//! window.
//!
//! The in-memory store is correct for a single process only. Deployments
//! running several instances need a shared implementation of the trait with
//! atomic increment semantics.

use super::core::{ClientWindow, RateLimitDecision, WindowPolicy};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Storage backend for per-client windows.
///
/// `check` must be atomic per identifier: two concurrent calls for the same
/// identifier may never both observe the last free slot.
pub trait RateLimitStore: Send + Sync {
    /// Applies one request for `identifier` at `now_ms` under `policy`.
    fn check(&self, identifier: &str, now_ms: u64, policy: WindowPolicy) -> RateLimitDecision;

    /// Drops every window that has expired at `now_ms`. Returns how many were
    /// removed.
    fn purge_expired(&self, now_ms: u64) -> usize;

    /// Forgets one client. Returns whether it was tracked.
    fn remove(&self, identifier: &str) -> bool;

    /// Forgets every client. Returns how many were tracked.
    fn clear(&self) -> usize;

    /// Number of clients currently tracked.
    fn tracked_clients(&self) -> usize;

    /// The current window of `identifier`, if any.
    fn window(&self, identifier: &str) -> Option<ClientWindow>;

    /// Upper bound on tracked clients, if the store has one.
    fn capacity(&self) -> Option<usize> {
        None
    }

    /// Windows created since startup.
    fn total_created(&self) -> u64 {
        0
    }

    /// Windows removed by purges, removals or clears since startup.
    fn total_evicted(&self) -> u64 {
        0
    }

    /// New clients turned away because the store had no room for them.
    fn total_refused(&self) -> u64 {
        0
    }
}

// Resets the emergency-purge flag when dropped.
struct PurgeGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for PurgeGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// In-process store backed by a sharded concurrent map.
///
/// ```rust
/// use window_gate::{MemoryStore, RateLimitStore, WindowPolicy};
///
/// let store = MemoryStore::new(1_000);
/// let policy = WindowPolicy { max_requests: 2, window_ms: 60_000 };
///
/// assert!(store.check("203.0.113.7", 0, policy).allowed);
/// assert!(store.check("203.0.113.7", 1, policy).allowed);
/// assert!(!store.check("203.0.113.7", 2, policy).allowed);
/// ```
pub struct MemoryStore {
    windows: DashMap<String, ClientWindow, ahash::RandomState>,
    max_clients: usize,
    total_created: AtomicU64,
    total_evicted: AtomicU64,
    total_refused: AtomicU64,
    // Lower bound on the reset time of every stored window.
    earliest_reset_ms: AtomicU64,
    purge_in_progress: AtomicBool,
}

impl MemoryStore {
    /// Creates a store holding at most `max_clients` windows.
    pub fn new(max_clients: usize) -> Self {
        let max_clients = max_clients.max(1);
        let num_shards = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(2, 64);

        Self {
            windows: DashMap::with_capacity_and_hasher_and_shard_amount(
                max_clients.min(1024),
                ahash::RandomState::new(),
                num_shards,
            ),
            max_clients,
            total_created: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
            total_refused: AtomicU64::new(0),
            earliest_reset_ms: AtomicU64::new(0),
            purge_in_progress: AtomicBool::new(false),
        }
    }

    fn record_evicted(&self, n: usize) {
        if n > 0 {
            self.total_evicted.fetch_add(n as u64, Ordering::Relaxed);
        }
    }

    // Drops expired windows and refreshes `earliest_reset_ms` from the
    // survivors. Returns the number removed.
    fn retain_open(&self, now_ms: u64) -> usize {
        let mut removed = 0;
        let mut earliest = u64::MAX;
        self.windows.retain(|_, window| {
            if window.is_expired(now_ms) {
                removed += 1;
                false
            } else {
                earliest = earliest.min(window.reset_time_ms);
                true
            }
        });

        // Windows opened from here on reset after `now_ms`.
        let bound = if earliest == u64::MAX { now_ms } else { earliest };
        self.earliest_reset_ms.store(bound, Ordering::Release);
        self.record_evicted(removed);
        removed
    }

    /// Tries to free room for a new client once the map is full.
    ///
    /// Only expired windows are removed. Returns whether there is room
    /// afterwards. Must not be called while holding a map reference.
    fn make_room(&self, now_ms: u64) -> bool {
        // Nothing has expired since the last purge.
        if now_ms < self.earliest_reset_ms.load(Ordering::Acquire) {
            return false;
        }

        if self
            .purge_in_progress
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return self.windows.len() < self.max_clients;
        }
        let _guard = PurgeGuard {
            flag: &self.purge_in_progress,
        };

        let before = self.windows.len();
        if before < self.max_clients {
            return true;
        }

        info!(tracked = before, "client window store full, purging");
        let removed = self.retain_open(now_ms);
        let tracked = self.windows.len();
        info!(removed, tracked, "client window purge finished");

        if tracked >= self.max_clients {
            warn!(
                tracked,
                capacity = self.max_clients,
                "client window store full of open windows, refusing new clients"
            );
            return false;
        }
        true
    }

    // Rejection for a client the store has no room for. It may retry once the
    // earliest stored window has expired.
    fn refuse(&self, identifier: &str, now_ms: u64, policy: WindowPolicy) -> RateLimitDecision {
        self.total_refused.fetch_add(1, Ordering::Relaxed);
        let reset_time_ms = self
            .earliest_reset_ms
            .load(Ordering::Acquire)
            .max(now_ms.saturating_add(1));
        debug!(client = identifier, reset_time_ms, "no room for new client window");

        RateLimitDecision {
            allowed: false,
            limit: policy.max_requests,
            remaining: 0,
            reset_time_ms,
            retry_after_ms: reset_time_ms - now_ms,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(super::config::DEFAULT_MAX_TRACKED_CLIENTS)
    }
}

impl RateLimitStore for MemoryStore {
    fn check(&self, identifier: &str, now_ms: u64, policy: WindowPolicy) -> RateLimitDecision {
        // Fast path: known client, no allocation.
        if let Some(mut window) = self.windows.get_mut(identifier) {
            return window.admit(now_ms, policy);
        }

        if self.windows.len() >= self.max_clients && !self.make_room(now_ms) {
            // Another caller may have opened this client's window meanwhile.
            if let Some(mut window) = self.windows.get_mut(identifier) {
                return window.admit(now_ms, policy);
            }
            return self.refuse(identifier, now_ms, policy);
        }

        match self.windows.entry(identifier.to_owned()) {
            // Another caller opened it between the lookup and here.
            Entry::Occupied(mut occupied) => occupied.get_mut().admit(now_ms, policy),
            Entry::Vacant(vacant) => {
                let (window, decision) = ClientWindow::open(now_ms, policy);
                vacant.insert(window);
                self.total_created.fetch_add(1, Ordering::Relaxed);
                debug!(client = identifier, "opened client window");
                decision
            }
        }
    }

    fn purge_expired(&self, now_ms: u64) -> usize {
        let removed = self.retain_open(now_ms);
        if removed > 0 {
            debug!(removed, "purged expired client windows");
        }

        // Give memory back after a large burst of one-off clients.
        if self.windows.capacity() > self.windows.len() * 4 && self.windows.capacity() > 1024 {
            self.windows.shrink_to_fit();
        }
        removed
    }

    fn remove(&self, identifier: &str) -> bool {
        let removed = self.windows.remove(identifier).is_some();
        if removed {
            self.record_evicted(1);
        }
        removed
    }

    fn clear(&self) -> usize {
        let count = self.windows.len();
        self.windows.clear();
        self.record_evicted(count);
        count
    }

    #[inline]
    fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    fn window(&self, identifier: &str) -> Option<ClientWindow> {
        self.windows.get(identifier).map(|window| *window)
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.max_clients)
    }

    fn total_created(&self) -> u64 {
        self.total_created.load(Ordering::Relaxed)
    }

    fn total_evicted(&self) -> u64 {
        self.total_evicted.load(Ordering::Relaxed)
    }

    fn total_refused(&self) -> u64 {
        self.total_refused.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("tracked_clients", &self.windows.len())
            .field("max_clients", &self.max_clients)
            .field("total_created", &self.total_created())
            .field("total_evicted", &self.total_evicted())
            .field("total_refused", &self.total_refused())
            .finish()
    }
}

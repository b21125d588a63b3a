//! Tracker statistics with atomic counters.
//!
//! [`TrackerStats`] counts registry and dispatch activity for the lifetime
//! of a tracker; [`StatsSnapshot`] is a copyable point-in-time view.
//!
//! All counters use [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering. The values are informational only.
//!
//! # Examples
//!
//! ```
//! use pt_tracker::TrackerStats;
//!
//! let stats = TrackerStats::new();
//! stats.increment_added();
//! stats.increment_added();
//! stats.increment_removed();
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.live_projects(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters for tracker activity.
#[derive(Debug, Default)]
pub struct TrackerStats {
    /// Projects registered.
    added: AtomicU64,
    /// Projects unregistered.
    removed: AtomicU64,
    /// Binary references promoted to direct references.
    promoted: AtomicU64,
    /// Direct references demoted back to binary references.
    demoted: AtomicU64,
    /// Notifications delivered, counted once per host.
    notifications: AtomicU64,
    /// Project load batches started.
    batches: AtomicU64,
}

impl TrackerStats {
    /// Creates a new [`TrackerStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the registered projects counter.
    #[inline]
    pub fn increment_added(&self) {
        self.added.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the unregistered projects counter.
    #[inline]
    pub fn increment_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds to the promoted references counter.
    #[inline]
    pub fn add_promoted(&self, count: usize) {
        self.promoted.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Adds to the demoted references counter.
    #[inline]
    pub fn add_demoted(&self, count: usize) {
        self.demoted.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Increments the delivered notifications counter.
    #[inline]
    pub fn increment_notifications(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the load batches counter.
    #[inline]
    pub fn increment_batches(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all statistics.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            added: self.added.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            promoted: self.promoted.load(Ordering::Relaxed),
            demoted: self.demoted.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.added.store(0, Ordering::Relaxed);
        self.removed.store(0, Ordering::Relaxed);
        self.promoted.store(0, Ordering::Relaxed);
        self.demoted.store(0, Ordering::Relaxed);
        self.notifications.store(0, Ordering::Relaxed);
        self.batches.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of tracker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Projects registered.
    pub added: u64,
    /// Projects unregistered.
    pub removed: u64,
    /// Binary references promoted to direct references.
    pub promoted: u64,
    /// Direct references demoted back to binary references.
    pub demoted: u64,
    /// Notifications delivered, counted once per host.
    pub notifications: u64,
    /// Project load batches started.
    pub batches: u64,
}

impl StatsSnapshot {
    /// Returns the number of projects still registered.
    #[inline]
    #[must_use]
    pub const fn live_projects(&self) -> u64 {
        self.added.saturating_sub(self.removed)
    }
}

//! Per-Entry Metrics
//!
//! Every cache entry carries a small bookkeeping record: how often it was hit,
//! how long the computation that produced it took, how much computation time
//! its hits have saved in total, and when it was created and last accessed.
//!
//! # Representation
//!
//! | Field | Storage | Written |
//! |-------|---------|---------|
//! | `hit_count` | `AtomicU64` | every access |
//! | `total_duration` | `AtomicU64` nanos | every access |
//! | `invoke_duration` | `u64` nanos | once, at creation |
//! | `creation_time` | `u64` nanos | once, at creation |
//! | `last_access_time` | `AtomicU64` nanos | every access |
//!
//! Timestamps are offsets from the owning cache's [`Stopwatch`](crate::clock::Stopwatch)
//! origin.
//!
//! # Consistency
//!
//! Accesses update the counters with independent relaxed atomic operations, so a
//! concurrent reader may observe a hit count and a total duration that belong to
//! different moments. Rankings are heuristics and tolerate this.

use crate::clock::duration_nanos;
use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of an entry's bookkeeping.
///
/// This is what ranking functions and metrics predicates receive.
///
/// # Examples
///
/// ```
/// use memo_cache::meta::EntryMetrics;
/// use core::time::Duration;
///
/// let m = EntryMetrics {
///     hit_count: 3,
///     total_duration: Duration::from_millis(30),
///     invoke_duration: Duration::from_millis(10),
///     creation_time: Duration::ZERO,
///     last_access_time: Duration::from_secs(1),
/// };
/// assert_eq!(m.hit_count, 3);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryMetrics {
    /// Number of accesses, including the access that created the entry.
    pub hit_count: u64,
    /// Sum of the invoke duration over every access.
    pub total_duration: Duration,
    /// Time the wrapped function took to produce this entry.
    pub invoke_duration: Duration,
    /// Stopwatch time at which the entry was created.
    pub creation_time: Duration,
    /// Stopwatch time of the most recent access.
    pub last_access_time: Duration,
}

/// Shared, lock-free home of an entry's metrics.
#[derive(Debug)]
pub(crate) struct MetricsCell {
    hit_count: AtomicU64,
    total_nanos: AtomicU64,
    invoke_nanos: u64,
    creation_nanos: u64,
    last_access_nanos: AtomicU64,
}

impl MetricsCell {
    pub(crate) fn new(creation_time: Duration, invoke_duration: Duration) -> Self {
        let creation_nanos = duration_nanos(creation_time);
        Self {
            hit_count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            invoke_nanos: duration_nanos(invoke_duration),
            creation_nanos,
            last_access_nanos: AtomicU64::new(creation_nanos),
        }
    }

    /// Counts one access at stopwatch time `now`.
    #[inline]
    pub(crate) fn record_access(&self, now: Duration) {
        self.hit_count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(self.invoke_nanos, Ordering::Relaxed);
        self.last_access_nanos
            .fetch_max(duration_nanos(now), Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> EntryMetrics {
        EntryMetrics {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
            invoke_duration: Duration::from_nanos(self.invoke_nanos),
            creation_time: Duration::from_nanos(self.creation_nanos),
            last_access_time: Duration::from_nanos(self.last_access_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Ready-made ranking functions for [`RankedCache`](crate::RankedCache).
///
/// A ranking maps an entry's metrics to a score. Whether low or high scores
/// are evicted first is chosen by
/// [`RankedCacheConfig::descending`](crate::config::RankedCacheConfig::descending).
pub mod ranking {
    use super::EntryMetrics;

    /// Number of accesses. Ascending order gives LFU eviction.
    pub fn hit_count(m: &EntryMetrics) -> f64 {
        m.hit_count as f64
    }

    /// Time of last access. Ascending order gives LRU eviction.
    pub fn last_access(m: &EntryMetrics) -> f64 {
        m.last_access_time.as_secs_f64()
    }

    /// Computation time saved so far. Ascending order keeps the entries that
    /// paid off the most.
    pub fn total_duration(m: &EntryMetrics) -> f64 {
        m.total_duration.as_secs_f64()
    }

    /// Cost of recomputing the entry. Ascending order evicts cheap entries first.
    pub fn invoke_duration(m: &EntryMetrics) -> f64 {
        m.invoke_duration.as_secs_f64()
    }

    /// Creation time. Ascending order gives FIFO eviction.
    pub fn creation_time(m: &EntryMetrics) -> f64 {
        m.creation_time.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cell_has_no_hits() {
        let cell = MetricsCell::new(Duration::from_secs(2), Duration::from_millis(5));
        let m = cell.snapshot();
        assert_eq!(m.hit_count, 0);
        assert_eq!(m.total_duration, Duration::ZERO);
        assert_eq!(m.invoke_duration, Duration::from_millis(5));
        assert_eq!(m.creation_time, Duration::from_secs(2));
        assert_eq!(m.last_access_time, Duration::from_secs(2));
    }

    #[test]
    fn test_record_access_accumulates() {
        let cell = MetricsCell::new(Duration::ZERO, Duration::from_millis(4));
        cell.record_access(Duration::from_secs(1));
        cell.record_access(Duration::from_secs(3));
        let m = cell.snapshot();
        assert_eq!(m.hit_count, 2);
        assert_eq!(m.total_duration, Duration::from_millis(8));
        assert_eq!(m.last_access_time, Duration::from_secs(3));
    }

    #[test]
    fn test_last_access_never_moves_backwards() {
        let cell = MetricsCell::new(Duration::ZERO, Duration::ZERO);
        cell.record_access(Duration::from_secs(5));
        cell.record_access(Duration::from_secs(4));
        assert_eq!(cell.snapshot().last_access_time, Duration::from_secs(5));
    }

    #[test]
    fn test_rankings() {
        let m = EntryMetrics {
            hit_count: 4,
            total_duration: Duration::from_secs(8),
            invoke_duration: Duration::from_secs(2),
            creation_time: Duration::from_secs(1),
            last_access_time: Duration::from_secs(9),
        };
        assert_eq!(ranking::hit_count(&m), 4.0);
        assert_eq!(ranking::total_duration(&m), 8.0);
        assert_eq!(ranking::invoke_duration(&m), 2.0);
        assert_eq!(ranking::creation_time(&m), 1.0);
        assert_eq!(ranking::last_access(&m), 9.0);
    }
}

//! Cache Metrics System
//!
//! Every memoization cache counts what happens to it in a [`CoreCacheMetrics`]
//! and reports the counters through the [`CacheMetrics`] trait as a
//! `BTreeMap<String, f64>`.
//!
//! # Why BTreeMap over HashMap?
//!
//! BTreeMap keeps the keys sorted, so the report has the same order on every
//! run. That keeps test assertions and benchmark output comparable.
//!
//! # Counters
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `requests` | lookups through `get_or_add` |
//! | `cache_hits` | lookups served by an existing entry |
//! | `cache_misses` | `requests - cache_hits` |
//! | `computations` | entries produced by running the wrapped function |
//! | `cached_failures` | computations whose failure was stored as an error entry |
//! | `evictions` | entries removed to respect capacity |
//! | `reclaimed` | entries removed because their weak key was reclaimed |
//!
//! Lookups that fail without storing anything count as requests only.
//!
//! Decorators report the sum over the caches they wrap.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every cache.
///
/// Counters use relaxed ordering; a report taken during concurrent activity
/// may be slightly inconsistent between fields.
#[derive(Debug, Default)]
pub struct CoreCacheMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    computations: AtomicU64,
    cached_failures: AtomicU64,
    evictions: AtomicU64,
    reclaimed: AtomicU64,
}

impl CoreCacheMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a `get_or_add` call.
    #[inline]
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lookup served by an existing entry.
    #[inline]
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a run of the wrapped function that produced an entry.
    #[inline]
    pub fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failure stored as an error entry.
    #[inline]
    pub fn record_cached_failure(&self) {
        self.cached_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a capacity eviction.
    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the removal of an entry whose key was reclaimed.
    #[inline]
    pub fn record_reclaimed(&self) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        for counter in [
            &self.requests,
            &self.cache_hits,
            &self.computations,
            &self.cached_failures,
            &self.evictions,
            &self.reclaimed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            cached_failures: self.cached_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`CoreCacheMetrics`] at one point in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total number of lookups.
    pub requests: u64,
    /// Lookups served by an existing entry.
    pub cache_hits: u64,
    /// Runs of the wrapped function that produced an entry.
    pub computations: u64,
    /// Failures stored as error entries.
    pub cached_failures: u64,
    /// Entries removed to respect capacity.
    pub evictions: u64,
    /// Entries removed because their weak key was reclaimed.
    pub reclaimed: u64,
}

impl MetricsSnapshot {
    /// Lookups that were not served by an existing entry.
    pub fn cache_misses(&self) -> u64 {
        self.requests.saturating_sub(self.cache_hits)
    }

    /// Calculates the cache hit rate
    ///
    /// # Returns
    /// A value between 0.0 and 1.0, or 0.0 if no requests have been made
    pub fn hit_rate(&self) -> f64 {
        if self.requests > 0 {
            self.cache_hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Calculates the cache miss rate
    ///
    /// # Returns
    /// A value between 0.0 and 1.0, or 0.0 if no requests have been made
    pub fn miss_rate(&self) -> f64 {
        if self.requests > 0 {
            self.cache_misses() as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Convert the snapshot to a BTreeMap for reporting
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("cache_hits".to_string(), self.cache_hits as f64);
        metrics.insert("cache_misses".to_string(), self.cache_misses() as f64);
        metrics.insert("cached_failures".to_string(), self.cached_failures as f64);
        metrics.insert("computations".to_string(), self.computations as f64);
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("reclaimed".to_string(), self.reclaimed as f64);
        metrics.insert("requests".to_string(), self.requests as f64);

        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert("miss_rate".to_string(), self.miss_rate());

        metrics
    }
}

impl Add for MetricsSnapshot {
    type Output = MetricsSnapshot;

    fn add(mut self, rhs: MetricsSnapshot) -> MetricsSnapshot {
        self += rhs;
        self
    }
}

impl AddAssign for MetricsSnapshot {
    fn add_assign(&mut self, rhs: MetricsSnapshot) {
        self.requests += rhs.requests;
        self.cache_hits += rhs.cache_hits;
        self.computations += rhs.computations;
        self.cached_failures += rhs.cached_failures;
        self.evictions += rhs.evictions;
        self.reclaimed += rhs.reclaimed;
    }
}

/// Trait that all caches implement for metrics reporting
///
/// Decorators sum the snapshots of the caches they wrap, which is why the
/// trait exposes the raw snapshot as well as the rendered map.
pub trait CacheMetrics {
    /// Current counter values.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Returns all metrics as key-value pairs in deterministic order
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.metrics_snapshot().to_btreemap()
    }

    /// Algorithm name for identification (e.g. "Ranked", "WeakLRU")
    fn algorithm_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_rates() {
        let metrics = CoreCacheMetrics::new();
        for _ in 0..4 {
            metrics.record_request();
        }
        metrics.record_hit();
        metrics.record_computation();
        metrics.record_computation();
        metrics.record_cached_failure();
        metrics.record_eviction();
        metrics.record_reclaimed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 4);
        assert_eq!(snapshot.cache_misses(), 3);
        assert_eq!(snapshot.hit_rate(), 0.25);
        assert_eq!(snapshot.miss_rate(), 0.75);

        let map = snapshot.to_btreemap();
        assert_eq!(map["computations"], 2.0);
        assert_eq!(map["cached_failures"], 1.0);
        assert_eq!(map["evictions"], 1.0);
        assert_eq!(map["reclaimed"], 1.0);
    }

    #[test]
    fn test_reset() {
        let metrics = CoreCacheMetrics::new();
        metrics.record_request();
        metrics.record_hit();
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert_eq!(metrics.snapshot().hit_rate(), 0.0);
    }

    #[test]
    fn test_snapshot_sum() {
        let a = MetricsSnapshot {
            requests: 2,
            cache_hits: 1,
            ..Default::default()
        };
        let b = MetricsSnapshot {
            requests: 3,
            evictions: 1,
            ..Default::default()
        };
        let sum = a + b;
        assert_eq!(sum.requests, 5);
        assert_eq!(sum.cache_hits, 1);
        assert_eq!(sum.evictions, 1);
    }
}

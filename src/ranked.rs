//! Ranked-Eviction Memoization Cache
//!
//! A strong-keyed memoization cache that, once full, evicts the entries a
//! caller-supplied ranking scores worst.
//!
//! # How It Works
//!
//! Every entry carries [`EntryMetrics`]. A ranking function maps those metrics
//! to a score; the configuration decides whether low or high scores go first.
//! The entries live in a striped [`StrongStore`], so lookups of different keys
//! do not contend.
//!
//! ```text
//! get_or_add(key)
//!   │
//!   ├─ hit ──────────────────────────────▶ touch metrics, return outcome
//!   │
//!   └─ miss ─▶ trim (if count ≥ capacity) ─▶ run function ─▶ insert-if-absent
//!
//! trim:
//!   all entries ─▶ oldest first ─▶ keep the candidate pool ─▶ sort by score
//!               ─▶ remove until count < capacity
//! ```
//!
//! ## Candidate Pool
//!
//! Only the oldest entries are eligible; see
//! [`RankedCacheConfig::candidate_pool`]. Within the pool, entries with equal
//! scores are evicted oldest first.
//!
//! ## Rankings
//!
//! | Ranking | Order | Behaves like |
//! |---------|-------|--------------|
//! | [`ranking::hit_count`](crate::meta::ranking::hit_count) | ascending | LFU |
//! | [`ranking::last_access`](crate::meta::ranking::last_access) | ascending | LRU |
//! | [`ranking::creation_time`](crate::meta::ranking::creation_time) | ascending | FIFO |
//! | [`ranking::invoke_duration`](crate::meta::ranking::invoke_duration) | ascending | keep expensive results |
//!
//! # Thread Safety
//!
//! `RankedCache` is `Send + Sync`. The wrapped function never runs under a
//! lock, so two threads missing the same key may both compute it; the first
//! insertion wins and the other result is dropped. Trims are serialized with
//! each other but not with lookups.
//!
//! # Example
//!
//! ```
//! use memo_cache::config::RankedCacheConfig;
//! use memo_cache::meta::ranking;
//! use memo_cache::{CacheOptions, MemoCache, RankedCache};
//! use core::num::NonZeroUsize;
//!
//! let config = RankedCacheConfig::new(NonZeroUsize::new(2).unwrap());
//! let cache = RankedCache::init(config, ranking::hit_count, CacheOptions::NONE, |n: &u64| {
//!     Ok::<_, String>(n * n)
//! })
//! .unwrap();
//!
//! assert_eq!(cache.get_or_add(&3), Ok(9));
//! assert_eq!(cache.get_or_add(&3), Ok(9));
//! assert_eq!(cache.get_or_add(&4), Ok(16));
//! // full: the least hit entry (4) makes room for 5
//! assert_eq!(cache.get_or_add(&5), Ok(25));
//! assert_eq!(cache.count(), 2);
//! assert!(cache.contains_key(&3));
//! assert!(!cache.contains_key(&4));
//! ```

use crate::clock::{MonotonicStopwatch, Stopwatch};
use crate::config::RankedCacheConfig;
use crate::entry::{write_debug_line, CacheEntry};
use crate::error::{CacheError, ConfigError};
use crate::meta::EntryMetrics;
use crate::metrics::{CacheMetrics, CoreCacheMetrics, MetricsSnapshot};
use crate::store::{DefaultEquivalence, Equivalence, Keyed, StrongStore};
use crate::traits::{
    CacheFactory, CacheFn, CacheKey, CacheOptions, CacheValue, MemoCache, TrimPredicate, Trimmer,
};
use core::fmt;
use core::hash::Hash;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Scores an entry for eviction.
pub type Ranker = Arc<dyn Fn(&EntryMetrics) -> f64 + Send + Sync>;

struct RankedNode<K, V, E> {
    entry: CacheEntry<K, V, E>,
    /// Insertion order, used to find the oldest entries and to break ties.
    sequence: u64,
}

impl<K, V, E> Keyed for RankedNode<K, V, E> {
    type Key = K;

    #[inline]
    fn key(&self) -> &K {
        self.entry.key()
    }
}

/// Strong-keyed memoization cache with ranked eviction.
///
/// # Type Parameters
///
/// - `K`: Key type. Cloned into the entry on a miss.
/// - `V`: Value type. Cloned out on every lookup.
/// - `E`: Error type of the wrapped function.
/// - `Q`: Key [`Equivalence`]. Defaults to the key's own `Eq` and `Hash`.
pub struct RankedCache<K, V, E, Q = DefaultEquivalence> {
    config: RankedCacheConfig,
    options: CacheOptions,
    ranker: Ranker,
    function: CacheFn<K, V, E>,
    store: StrongStore<RankedNode<K, V, E>, Q>,
    stopwatch: Arc<dyn Stopwatch>,
    sequence: AtomicU64,
    trim_lock: Mutex<()>,
    metrics: CoreCacheMetrics,
    disposed: AtomicBool,
}

impl<K, V, E> RankedCache<K, V, E, DefaultEquivalence>
where
    K: Hash + Eq,
{
    /// Creates a ranked cache memoizing `function`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` is invalid.
    pub fn init<R, F>(
        config: RankedCacheConfig,
        ranker: R,
        options: CacheOptions,
        function: F,
    ) -> Result<Self, ConfigError>
    where
        R: Fn(&EntryMetrics) -> f64 + Send + Sync + 'static,
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self::from_parts(
            config,
            Arc::new(ranker),
            options,
            Box::new(function),
            DefaultEquivalence::default(),
            Arc::new(MonotonicStopwatch::new()),
        ))
    }
}

impl<K, V, E, Q> RankedCache<K, V, E, Q>
where
    Q: Equivalence<K>,
{
    fn from_parts(
        config: RankedCacheConfig,
        ranker: Ranker,
        options: CacheOptions,
        function: CacheFn<K, V, E>,
        equivalence: Q,
        stopwatch: Arc<dyn Stopwatch>,
    ) -> Self {
        Self {
            config,
            options,
            ranker,
            function,
            store: StrongStore::new(equivalence),
            stopwatch,
            sequence: AtomicU64::new(0),
            trim_lock: Mutex::new(()),
            metrics: CoreCacheMetrics::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.config.capacity.get()
    }

    /// The configuration this cache was created with.
    pub fn config(&self) -> &RankedCacheConfig {
        &self.config
    }

    /// The options this cache was created with.
    pub fn options(&self) -> CacheOptions {
        self.options
    }

    /// Returns `true` if an entry for `key` is held. Does not count as an
    /// access.
    pub fn contains_key(&self, key: &K) -> bool {
        self.store.get(key).is_some()
    }

    /// Metrics of the entry for `key`, without counting an access.
    pub fn entry_metrics(&self, key: &K) -> Option<EntryMetrics> {
        self.store.get(key).map(|node| node.entry.metrics())
    }

    /// Evicts entries until the cache is below capacity.
    ///
    /// Runs before every computation. Returns how many entries were evicted.
    fn trim_to_capacity(&self) -> usize {
        let capacity = self.config.capacity.get();
        if self.store.len() < capacity {
            return 0;
        }
        let _trimming = self.trim_lock.lock();

        let mut nodes = self.store.snapshot();
        if nodes.len() < capacity {
            return 0;
        }
        let excess = nodes.len() + 1 - capacity;

        nodes.sort_unstable_by_key(|node| node.sequence);
        nodes.truncate(self.config.candidate_pool(nodes.len()));

        let mut candidates: Vec<_> = nodes
            .into_iter()
            .map(|node| ((self.ranker)(&node.entry.metrics()), node))
            .collect();
        // stable: equal scores stay oldest first
        candidates.sort_by(|a, b| {
            let order = a.0.total_cmp(&b.0);
            if self.config.descending {
                order.reverse()
            } else {
                order
            }
        });

        let mut evicted = 0;
        for (_, node) in candidates {
            if evicted == excess {
                break;
            }
            if self.store.remove(&node) {
                evicted += 1;
                self.metrics.record_eviction();
            }
        }
        debug!(
            "Evicted {} of {} requested entries from ranked cache (capacity {})",
            evicted, excess, capacity
        );
        evicted
    }
}

impl<K, V, E, Q> RankedCache<K, V, E, Q>
where
    K: Clone,
    Q: Equivalence<K>,
{
    fn create_node(&self, key: &K) -> Result<Arc<RankedNode<K, V, E>>, CacheError<E>> {
        self.trim_to_capacity();
        let entry = CacheEntry::compute(
            key.clone(),
            key,
            &self.function,
            self.options,
            self.stopwatch.as_ref(),
            &self.metrics,
        )?;
        Ok(Arc::new(RankedNode {
            entry,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        }))
    }
}

impl<K, V, E, Q> MemoCache<K, V, E> for RankedCache<K, V, E, Q>
where
    K: CacheKey + Clone,
    V: CacheValue,
    E: CacheValue,
    Q: Equivalence<K> + 'static,
{
    fn get_or_add(&self, key: &K) -> Result<V, CacheError<E>> {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }
        self.metrics.record_request();

        let (node, created) = self
            .store
            .get_or_insert_with(key, || self.create_node(key))?;
        if self.is_disposed() {
            self.store.remove(&node);
            return Err(CacheError::Disposed);
        }
        if !created {
            self.metrics.record_hit();
        }
        node.entry.touch(self.stopwatch.elapsed());
        node.entry.to_result().map_err(CacheError::Computation)
    }

    fn count(&self) -> usize {
        self.store.len()
    }

    fn clear(&self) {
        let drained = self.store.drain();
        self.metrics.reset();
        debug!("Cleared {} entries from ranked cache", drained.len());
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained = self.store.drain();
        debug!("Disposed ranked cache, dropped {} entries", drained.len());
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn debug_view(&self) -> String {
        let mut nodes = self.store.snapshot();
        nodes.sort_unstable_by_key(|node| node.sequence);

        let mut out = format!(
            "RankedCache(count={}, capacity={}, descending={}, age_threshold={})\n",
            nodes.len(),
            self.config.capacity,
            self.config.descending,
            self.config.age_threshold
        );
        for node in &nodes {
            write_debug_line(&mut out, node.entry.key(), &node.entry);
        }
        out
    }

    fn trimmer(&self) -> Option<&dyn Trimmer<K, V, E>> {
        Some(self)
    }
}

impl<K, V, E, Q> Trimmer<K, V, E> for RankedCache<K, V, E, Q>
where
    Q: Equivalence<K>,
{
    fn trim(&self, predicate: TrimPredicate<'_, K, V, E>) -> usize {
        let mut removed = 0;
        for node in self.store.snapshot() {
            if predicate.matches(node.entry.key(), &node.entry) && self.store.remove(&node) {
                removed += 1;
            }
        }
        trace!("Trimmed {} entries from ranked cache by predicate", removed);
        removed
    }
}

impl<K, V, E, Q> CacheMetrics for RankedCache<K, V, E, Q> {
    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn algorithm_name(&self) -> &'static str {
        "Ranked"
    }
}

impl<K, V, E, Q> fmt::Debug for RankedCache<K, V, E, Q>
where
    Q: Equivalence<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankedCache")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("count", &self.store.len())
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Creates [`RankedCache`]s sharing one configuration and ranking.
///
/// # Example
///
/// ```
/// use memo_cache::config::RankedCacheConfig;
/// use memo_cache::meta::ranking;
/// use memo_cache::{CacheFactory, CacheOptions, MemoCache, RankedCacheFactory};
/// use core::num::NonZeroUsize;
///
/// let factory = RankedCacheFactory::new(
///     RankedCacheConfig::new(NonZeroUsize::new(100).unwrap()),
///     ranking::last_access,
/// )
/// .unwrap();
/// let lengths = factory.create(|s: &String| Ok::<_, ()>(s.len()), CacheOptions::NONE);
/// assert_eq!(lengths.get_or_add(&"four".to_string()), Ok(4));
/// ```
#[derive(Clone)]
pub struct RankedCacheFactory<Q = DefaultEquivalence> {
    config: RankedCacheConfig,
    ranker: Ranker,
    stopwatch: Arc<dyn Stopwatch>,
    equivalence: Q,
}

impl RankedCacheFactory<DefaultEquivalence> {
    /// Creates a factory for caches with `config`, scored by `ranker`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` is invalid.
    pub fn new<R>(config: RankedCacheConfig, ranker: R) -> Result<Self, ConfigError>
    where
        R: Fn(&EntryMetrics) -> f64 + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self {
            config,
            ranker: Arc::new(ranker),
            stopwatch: Arc::new(MonotonicStopwatch::new()),
            equivalence: DefaultEquivalence::default(),
        })
    }
}

impl<Q> RankedCacheFactory<Q> {
    /// Times computations and stamps entries with `stopwatch`.
    pub fn with_stopwatch(mut self, stopwatch: Arc<dyn Stopwatch>) -> Self {
        self.stopwatch = stopwatch;
        self
    }

    /// Compares keys of created caches with `equivalence`.
    pub fn with_equivalence<Q2>(self, equivalence: Q2) -> RankedCacheFactory<Q2> {
        RankedCacheFactory {
            config: self.config,
            ranker: self.ranker,
            stopwatch: self.stopwatch,
            equivalence,
        }
    }

    /// Creates a cache comparing keys with `comparer` instead of the
    /// factory's equivalence.
    pub fn create_with_comparer<K, V, E, C, F>(
        &self,
        function: F,
        options: CacheOptions,
        comparer: C,
    ) -> RankedCache<K, V, E, C>
    where
        C: Equivalence<K>,
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        RankedCache::from_parts(
            self.config,
            Arc::clone(&self.ranker),
            options,
            Box::new(function),
            comparer,
            Arc::clone(&self.stopwatch),
        )
    }
}

impl<K, V, E, Q> CacheFactory<K, V, E> for RankedCacheFactory<Q>
where
    K: CacheKey + Clone,
    V: CacheValue,
    E: CacheValue,
    Q: Equivalence<K> + Clone + 'static,
{
    type Cache = RankedCache<K, V, E, Q>;

    fn create<F>(&self, function: F, options: CacheOptions) -> Self::Cache
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        self.create_with_comparer(function, options, self.equivalence.clone())
    }
}

impl<Q: fmt::Debug> fmt::Debug for RankedCacheFactory<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankedCacheFactory")
            .field("config", &self.config)
            .field("equivalence", &self.equivalence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualStopwatch;
    use crate::meta::ranking;
    use core::num::NonZeroUsize;
    use core::time::Duration;
    use std::sync::atomic::AtomicUsize;

    fn config(capacity: usize, age_threshold: f64) -> RankedCacheConfig {
        RankedCacheConfig {
            capacity: NonZeroUsize::new(capacity).unwrap(),
            descending: false,
            age_threshold,
        }
    }

    fn counting_cache(
        config: RankedCacheConfig,
        calls: Arc<AtomicUsize>,
    ) -> RankedCache<&'static str, String, String> {
        RankedCache::init(
            config,
            ranking::hit_count,
            CacheOptions::NONE,
            move |k: &&'static str| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(k.to_uppercase())
            },
        )
        .unwrap()
    }

    #[test]
    fn test_memoizes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(config(10, 0.0), Arc::clone(&calls));
        assert_eq!(cache.get_or_add(&"a"), Ok("A".to_string()));
        assert_eq!(cache.get_or_add(&"a"), Ok("A".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.entry_metrics(&"a").unwrap().hit_count, 2);
    }

    #[test]
    fn test_evicts_least_hit_entry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(config(3, 0.0), Arc::clone(&calls));
        for key in ["a", "b", "c", "a", "b"] {
            cache.get_or_add(&key).unwrap();
        }
        cache.get_or_add(&"d").unwrap();

        assert_eq!(cache.count(), 3);
        assert!(cache.contains_key(&"a"));
        assert!(cache.contains_key(&"b"));
        assert!(!cache.contains_key(&"c"));
        assert!(cache.contains_key(&"d"));
        assert_eq!(cache.metrics()["evictions"], 1.0);
    }

    #[test]
    fn test_descending_evicts_highest_score() {
        let mut cfg = config(2, 0.0);
        cfg.descending = true;
        let cache: RankedCache<u32, u32, ()> =
            RankedCache::init(cfg, ranking::hit_count, CacheOptions::NONE, |k| Ok(*k)).unwrap();
        cache.get_or_add(&1).unwrap();
        cache.get_or_add(&1).unwrap();
        cache.get_or_add(&2).unwrap();
        cache.get_or_add(&3).unwrap();
        assert!(!cache.contains_key(&1));
        assert!(cache.contains_key(&2));
        assert!(cache.contains_key(&3));
    }

    #[test]
    fn test_age_threshold_protects_newest() {
        // pool = floor(4 * 0.5) = 2: only the two oldest can be evicted
        let cache: RankedCache<u32, u32, ()> =
            RankedCache::init(config(4, 0.5), ranking::hit_count, CacheOptions::NONE, |k| {
                Ok(*k)
            })
            .unwrap();
        for key in [1, 2, 3, 4] {
            cache.get_or_add(&key).unwrap();
        }
        // the oldest two are hit most, the newest two never again
        for _ in 0..3 {
            cache.get_or_add(&1).unwrap();
            cache.get_or_add(&2).unwrap();
        }
        cache.get_or_add(&5).unwrap();
        assert!(!cache.contains_key(&1));
        assert!(cache.contains_key(&2));
        assert!(cache.contains_key(&3));
        assert!(cache.contains_key(&4));
    }

    #[test]
    fn test_ties_evict_oldest() {
        let cache: RankedCache<u32, u32, ()> =
            RankedCache::init(config(3, 0.0), |_: &EntryMetrics| 0.0, CacheOptions::NONE, |k| {
                Ok(*k)
            })
            .unwrap();
        for key in [7, 8, 9, 10] {
            cache.get_or_add(&key).unwrap();
        }
        assert!(!cache.contains_key(&7));
        assert_eq!(cache.count(), 3);
    }

    #[test]
    fn test_failures_not_cached_by_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache: RankedCache<u32, u32, String> = RankedCache::init(
            config(4, 0.0),
            ranking::hit_count,
            CacheOptions::NONE,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("nope".to_string())
            },
        )
        .unwrap();
        assert_eq!(
            cache.get_or_add(&1),
            Err(CacheError::Computation("nope".to_string()))
        );
        assert!(cache.get_or_add(&1).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn test_cache_exception_replays_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache: RankedCache<u32, u32, String> = RankedCache::init(
            config(4, 0.0),
            ranking::hit_count,
            CacheOptions::CACHE_EXCEPTION,
            move |k| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(format!("failed {}", k))
            },
        )
        .unwrap();
        let first = cache.get_or_add(&1);
        let second = cache.get_or_add(&1);
        assert_eq!(first, second);
        assert_eq!(first, Err(CacheError::Computation("failed 1".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn test_metrics_accumulate_invoke_duration() {
        let clock = Arc::new(ManualStopwatch::new());
        let ticking = Arc::clone(&clock);
        let factory = RankedCacheFactory::new(config(4, 0.0), ranking::total_duration)
            .unwrap()
            .with_stopwatch(clock);
        let cache = factory.create(
            move |k: &u32| {
                ticking.advance(Duration::from_millis(5));
                Ok::<_, ()>(*k)
            },
            CacheOptions::NONE,
        );
        for _ in 0..3 {
            cache.get_or_add(&1).unwrap();
        }
        let m = cache.entry_metrics(&1).unwrap();
        assert_eq!(m.hit_count, 3);
        assert_eq!(m.invoke_duration, Duration::from_millis(5));
        assert_eq!(m.total_duration, Duration::from_millis(15));
    }

    #[test]
    fn test_trim_by_predicate() {
        let cache: RankedCache<u32, u32, String> = RankedCache::init(
            config(10, 0.0),
            ranking::hit_count,
            CacheOptions::CACHE_EXCEPTION,
            |k| if k % 3 == 0 { Err("three".to_string()) } else { Ok(*k) },
        )
        .unwrap();
        for key in 1..=6 {
            let _ = cache.get_or_add(&key);
        }
        let trimmer = cache.trimmer().unwrap();

        let errors = |_: &u32, r: Result<&u32, &String>| r.is_err();
        assert_eq!(trimmer.trim(TrimPredicate::Entries(&errors)), 2);

        let even = |_: &u32, v: &u32| v % 2 == 0;
        assert_eq!(trimmer.trim(TrimPredicate::Values(&even)), 2);
        assert_eq!(cache.count(), 2);
        assert!(cache.contains_key(&1));
        assert!(cache.contains_key(&5));
    }

    #[test]
    fn test_clear_and_dispose() {
        let cache: RankedCache<u32, u32, ()> =
            RankedCache::init(config(4, 0.0), ranking::hit_count, CacheOptions::NONE, |k| {
                Ok(*k)
            })
            .unwrap();
        cache.get_or_add(&1).unwrap();
        cache.clear();
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.metrics()["requests"], 0.0);

        cache.get_or_add(&2).unwrap();
        cache.dispose();
        cache.dispose();
        assert!(cache.is_disposed());
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.get_or_add(&2), Err(CacheError::Disposed));
    }

    #[test]
    fn test_custom_equivalence() {
        #[derive(Clone, Debug)]
        struct Modulo(u32);

        impl Equivalence<u32> for Modulo {
            fn equivalent(&self, a: &u32, b: &u32) -> bool {
                a % self.0 == b % self.0
            }

            fn hash(&self, value: &u32) -> u64 {
                u64::from(value % self.0)
            }
        }

        let factory = RankedCacheFactory::new(config(8, 0.0), ranking::hit_count).unwrap();
        let cache = factory.create_with_comparer(
            |k: &u32| Ok::<_, ()>(*k),
            CacheOptions::NONE,
            Modulo(10),
        );
        assert_eq!(cache.get_or_add(&3), Ok(3));
        assert_eq!(cache.get_or_add(&13), Ok(3));
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result: Result<RankedCache<u32, u32, ()>, _> =
            RankedCache::init(config(4, 2.0), ranking::hit_count, CacheOptions::NONE, |k| {
                Ok(*k)
            });
        assert_eq!(result.unwrap_err(), ConfigError::AgeThreshold(2.0));
        assert!(RankedCacheFactory::new(config(4, -1.0), ranking::hit_count).is_err());
    }

    #[test]
    fn test_debug_view_lists_entries_oldest_first() {
        let cache: RankedCache<u32, u32, ()> =
            RankedCache::init(config(4, 0.0), ranking::hit_count, CacheOptions::NONE, |k| {
                Ok(k * 10)
            })
            .unwrap();
        cache.get_or_add(&2).unwrap();
        cache.get_or_add(&1).unwrap();
        let view = cache.debug_view();
        assert!(view.starts_with("RankedCache(count=2, capacity=4"));
        let first = view.find("2 => 20").unwrap();
        let second = view.find("1 => 10").unwrap();
        assert!(first < second);
    }
}

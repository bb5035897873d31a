//! Weak-Key LRU Memoization Cache
//!
//! Memoizes a function of reference-typed keys without keeping the keys alive.
//! Keys are compared by identity: two distinct `Arc`s holding equal values are
//! two different keys.
//!
//! # How It Works
//!
//! ```text
//!                 ┌─────────────────────────────────────────┐
//!   WeakStore     │ identity ──▶ (Weak<key>, Arc<LruNode>)  │
//!                 └───────────────────┬─────────────────────┘
//!                                     │ same node
//!                 ┌───────────────────▼─────────────────────┐
//!   recency list  │ MRU ◀──▶ node ◀──▶ node ◀──▶ node ◀──▶ LRU│
//!                 └─────────────────────────────────────────┘
//! ```
//!
//! Each node sits both in the store (for lookup) and in the recency list (for
//! eviction order), and records its own list link so it can be moved or
//! removed in O(1).
//!
//! ## Locking
//!
//! The list is guarded by a `parking_lot::RwLock`:
//!
//! | Step | Lock |
//! |------|------|
//! | store lookup / insert | store segment only |
//! | run the wrapped function | none |
//! | capacity trim before computing | write |
//! | check whether the node is already most recent | upgradable read |
//! | move to front, prune reclaimed tail | write (upgraded) |
//!
//! Hits on the entry that is already most recent never take the write lock.
//!
//! ## Reclaimed Keys
//!
//! When the last strong reference to a key is dropped, its entry stays in the
//! list until it reaches the tail: promotions prune reclaimed nodes from the
//! tail, and capacity trims evict them first. Values of reclaimed entries are
//! dropped when their node leaves the list.
//!
//! # Example
//!
//! ```
//! use memo_cache::config::WeakLruCacheConfig;
//! use memo_cache::{CacheOptions, MemoCache, WeakLruCache};
//! use core::num::NonZeroUsize;
//! use std::sync::Arc;
//!
//! let config = WeakLruCacheConfig { capacity: NonZeroUsize::new(16).unwrap() };
//! let cache = WeakLruCache::init(config, CacheOptions::NONE, |path: &Arc<str>| {
//!     Ok::<_, ()>(path.len())
//! });
//!
//! let key: Arc<str> = Arc::from("/etc/hosts");
//! assert_eq!(cache.get_or_add(&key), Ok(10));
//! assert_eq!(cache.count(), 1);
//!
//! // an equal but distinct key is a different entry
//! let other: Arc<str> = Arc::from("/etc/hosts");
//! assert_eq!(cache.get_or_add(&other), Ok(10));
//! assert_eq!(cache.count(), 2);
//! ```

use crate::clock::{MonotonicStopwatch, Stopwatch};
use crate::config::WeakLruCacheConfig;
use crate::entry::{write_debug_line, CacheEntry};
use crate::error::CacheError;
use crate::list::{self, List};
use crate::meta::EntryMetrics;
use crate::metrics::{CacheMetrics, CoreCacheMetrics, MetricsSnapshot};
use crate::store::{WeakHandle, WeakKey, WeakStore};
use crate::traits::{
    CacheFactory, CacheFn, CacheKey, CacheOptions, CacheValue, MemoCache, TrimPredicate, Trimmer,
};
use core::fmt;
use core::ptr;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

type Recency<K, V, E> = List<Arc<LruNode<K, V, E>>>;

struct LruNode<K: WeakKey, V, E> {
    entry: CacheEntry<K::Handle, V, E>,
    identity: usize,
    /// Position in the recency list; null while unlinked. Guarded by the
    /// recency lock.
    link: AtomicPtr<list::Entry<Arc<LruNode<K, V, E>>>>,
    /// Set once the node left the cache; it must never be linked again.
    /// Guarded by the recency lock.
    evicted: AtomicBool,
}

impl<K: WeakKey, V, E> LruNode<K, V, E> {
    /// Marks a node that was taken out of the list (or never linked) as gone.
    fn retire(&self) {
        self.link.store(ptr::null_mut(), Ordering::Relaxed);
        self.evicted.store(true, Ordering::Relaxed);
    }
}

/// Weak-keyed memoization cache with least-recently-used eviction.
///
/// # Type Parameters
///
/// - `K`: Key type, a [`WeakKey`] such as `Arc<T>`.
/// - `V`: Value type. Cloned out on every lookup.
/// - `E`: Error type of the wrapped function.
pub struct WeakLruCache<K: WeakKey, V, E> {
    config: WeakLruCacheConfig,
    options: CacheOptions,
    function: CacheFn<K, V, E>,
    store: WeakStore<K, LruNode<K, V, E>>,
    recency: RwLock<Recency<K, V, E>>,
    stopwatch: Arc<dyn Stopwatch>,
    metrics: CoreCacheMetrics,
    disposed: AtomicBool,
}

impl<K: WeakKey, V, E> WeakLruCache<K, V, E> {
    /// Creates a weak-key LRU cache memoizing `function`.
    pub fn init<F>(config: WeakLruCacheConfig, options: CacheOptions, function: F) -> Self
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        Self::from_parts(
            config,
            options,
            Box::new(function),
            Arc::new(MonotonicStopwatch::new()),
        )
    }

    fn from_parts(
        config: WeakLruCacheConfig,
        options: CacheOptions,
        function: CacheFn<K, V, E>,
        stopwatch: Arc<dyn Stopwatch>,
    ) -> Self {
        Self {
            config,
            options,
            function,
            store: WeakStore::new(),
            recency: RwLock::new(List::new()),
            stopwatch,
            metrics: CoreCacheMetrics::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.config.capacity.get()
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

    /// Number of held entries whose key has already been reclaimed.
    pub fn reclaimed_count(&self) -> usize {
        self.recency
            .read()
            .iter()
            .filter(|node| node.entry.key().is_reclaimed())
            .count()
    }

    fn create_node(&self, key: &K) -> Result<Arc<LruNode<K, V, E>>, CacheError<E>> {
        self.trim_to_capacity();
        let entry = CacheEntry::compute(
            key.downgrade(),
            key,
            &self.function,
            self.options,
            self.stopwatch.as_ref(),
            &self.metrics,
        )?;
        Ok(Arc::new(LruNode {
            entry,
            identity: key.identity(),
            link: AtomicPtr::new(ptr::null_mut()),
            evicted: AtomicBool::new(false),
        }))
    }

    /// Makes `node` the most recently used entry, linking it if it is new.
    fn promote(&self, node: &Arc<LruNode<K, V, E>>) -> Result<(), CacheError<E>> {
        let recency = self.recency.upgradable_read();
        if self.disposed.load(Ordering::Acquire) {
            self.store.remove(node.identity, node);
            return Err(CacheError::Disposed);
        }
        if node.evicted.load(Ordering::Relaxed) {
            return Ok(());
        }
        let link = node.link.load(Ordering::Relaxed);
        if recency.is_front(link) {
            return Ok(());
        }

        let mut recency = RwLockUpgradableReadGuard::upgrade(recency);
        if link.is_null() {
            let link = recency.push_front(Arc::clone(node));
            node.link.store(link, Ordering::Relaxed);
        } else {
            // SAFETY: a non-null link of a node that was not evicted points
            // into this list; links only change under the write lock, and the
            // upgradable read excluded writers since it was loaded
            unsafe { recency.move_to_front(link) };
        }
        let pruned = self.prune_reclaimed_tail(&mut recency);
        drop(recency);
        drop(pruned);
        Ok(())
    }

    /// Removes nodes with reclaimed keys from the tail of the list.
    ///
    /// Returns the removed nodes so they are dropped after the lock.
    fn prune_reclaimed_tail(&self, recency: &mut Recency<K, V, E>) -> Vec<Arc<LruNode<K, V, E>>> {
        let mut pruned = Vec::new();
        while recency
            .back()
            .is_some_and(|node| node.entry.key().is_reclaimed())
        {
            let Some(node) = recency.pop_back() else {
                break;
            };
            node.retire();
            self.store.remove(node.identity, &node);
            self.metrics.record_reclaimed();
            pruned.push(node);
        }
        if !pruned.is_empty() {
            trace!("Pruned {} reclaimed entries from weak LRU cache", pruned.len());
        }
        pruned
    }

    /// Evicts from the tail until the cache is below capacity.
    fn trim_to_capacity(&self) -> usize {
        let capacity = self.config.capacity.get();
        if self.recency.read().len() < capacity {
            return 0;
        }

        let mut recency = self.recency.write();
        let mut evicted = Vec::new();
        while recency.len() >= capacity {
            let Some(node) = recency.pop_back() else {
                break;
            };
            node.retire();
            self.store.remove(node.identity, &node);
            if node.entry.key().is_reclaimed() {
                self.metrics.record_reclaimed();
            } else {
                self.metrics.record_eviction();
            }
            evicted.push(node);
        }
        drop(recency);

        debug!(
            "Evicted {} entries from weak LRU cache (capacity {})",
            evicted.len(),
            capacity
        );
        evicted.len()
    }
}

impl<K, V, E> MemoCache<K, V, E> for WeakLruCache<K, V, E>
where
    K: WeakKey + CacheKey,
    V: CacheValue,
    E: CacheValue,
{
    fn get_or_add(&self, key: &K) -> Result<V, CacheError<E>> {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }
        self.metrics.record_request();

        let (node, created) = self
            .store
            .get_or_insert_with(key, || self.create_node(key))?;
        if !created {
            self.metrics.record_hit();
        }
        node.entry.touch(self.stopwatch.elapsed());
        self.promote(&node)?;
        node.entry.to_result().map_err(CacheError::Computation)
    }

    fn count(&self) -> usize {
        self.recency.read().len()
    }

    fn clear(&self) {
        let mut recency = self.recency.write();
        let cleared = recency.len();
        let mut retired = Vec::with_capacity(cleared);
        while let Some(node) = recency.pop_front() {
            node.retire();
            retired.push(node);
        }
        // nodes stored but not linked yet must not be linked afterwards
        for node in self.store.drain() {
            node.retire();
            retired.push(node);
        }
        drop(recency);
        debug!("Cleared {} entries from weak LRU cache", cleared);
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.clear();
        debug!("Disposed weak LRU cache");
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn debug_view(&self) -> String {
        let recency = self.recency.read();
        let mut out = format!(
            "WeakLruCache(count={}, capacity={})\n",
            recency.len(),
            self.config.capacity
        );
        for node in recency.iter() {
            match node.entry.key().try_resolve() {
                Some(key) => write_debug_line(&mut out, &key, &node.entry),
                None => write_debug_line(&mut out, &format_args!("<reclaimed>"), &node.entry),
            }
        }
        out
    }

    fn trimmer(&self) -> Option<&dyn Trimmer<K, V, E>> {
        Some(self)
    }
}

impl<K: WeakKey, V, E> Trimmer<K, V, E> for WeakLruCache<K, V, E> {
    /// Removes matching entries, and every entry whose key was reclaimed, in
    /// one pass. Only matches are counted.
    fn trim(&self, predicate: TrimPredicate<'_, K, V, E>) -> usize {
        let nodes: Vec<_> = self.recency.read().iter().cloned().collect();

        // evaluate outside the lock; the predicate is caller code
        let doomed: Vec<_> = nodes
            .into_iter()
            .filter_map(|node| match node.entry.key().try_resolve() {
                None => Some((node, false)),
                Some(key) if predicate.matches(&key, &node.entry) => Some((node, true)),
                Some(_) => None,
            })
            .collect();

        let mut recency = self.recency.write();
        let mut removed = 0;
        for (node, matched) in &doomed {
            let link = node.link.load(Ordering::Relaxed);
            if link.is_null() {
                continue;
            }
            // SAFETY: non-null links point into this list and are only
            // changed under the write lock we hold
            drop(unsafe { recency.remove(link) });
            node.retire();
            self.store.remove(node.identity, node);
            if *matched {
                removed += 1;
            } else {
                self.metrics.record_reclaimed();
            }
        }
        drop(recency);

        trace!("Trimmed {} entries from weak LRU cache by predicate", removed);
        removed
    }
}

impl<K: WeakKey, V, E> CacheMetrics for WeakLruCache<K, V, E> {
    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn algorithm_name(&self) -> &'static str {
        "WeakLRU"
    }
}

impl<K: WeakKey, V, E> fmt::Debug for WeakLruCache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLruCache")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("count", &self.recency.read().len())
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Creates [`WeakLruCache`]s sharing one configuration.
#[derive(Clone)]
pub struct WeakLruCacheFactory {
    config: WeakLruCacheConfig,
    stopwatch: Arc<dyn Stopwatch>,
}

impl WeakLruCacheFactory {
    /// Creates a factory for caches with `config`.
    pub fn new(config: WeakLruCacheConfig) -> Self {
        Self {
            config,
            stopwatch: Arc::new(MonotonicStopwatch::new()),
        }
    }

    /// Times computations and stamps entries with `stopwatch`.
    pub fn with_stopwatch(mut self, stopwatch: Arc<dyn Stopwatch>) -> Self {
        self.stopwatch = stopwatch;
        self
    }
}

impl<K, V, E> CacheFactory<K, V, E> for WeakLruCacheFactory
where
    K: WeakKey + CacheKey,
    V: CacheValue,
    E: CacheValue,
{
    type Cache = WeakLruCache<K, V, E>;

    fn create<F>(&self, function: F, options: CacheOptions) -> Self::Cache
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        WeakLruCache::from_parts(
            self.config,
            options,
            Box::new(function),
            Arc::clone(&self.stopwatch),
        )
    }
}

impl fmt::Debug for WeakLruCacheFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLruCacheFactory")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::num::NonZeroUsize;
    use std::sync::atomic::AtomicUsize;
    use std::sync::OnceLock;

    type Key = Arc<String>;

    fn key(s: &str) -> Key {
        Arc::new(s.to_string())
    }

    fn cache(capacity: usize) -> WeakLruCache<Key, usize, ()> {
        let config = WeakLruCacheConfig {
            capacity: NonZeroUsize::new(capacity).unwrap(),
        };
        WeakLruCache::init(config, CacheOptions::NONE, |k: &Key| Ok(k.len()))
    }

    #[test]
    fn test_memoizes_by_identity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = WeakLruCacheConfig {
            capacity: NonZeroUsize::new(8).unwrap(),
        };
        let cache = WeakLruCache::init(config, CacheOptions::NONE, move |k: &Key| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(k.len())
        });

        let a = key("abc");
        let twin = key("abc");
        assert_eq!(cache.get_or_add(&a), Ok(3));
        assert_eq!(cache.get_or_add(&a), Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_or_add(&twin), Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.entry_metrics(&a).unwrap().hit_count, 2);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = cache(3);
        let (k1, k2, k3, k4) = (key("1"), key("2"), key("3"), key("4"));
        for k in [&k1, &k2, &k3, &k1] {
            cache.get_or_add(k).unwrap();
        }
        cache.get_or_add(&k4).unwrap();

        assert_eq!(cache.count(), 3);
        assert!(cache.contains_key(&k1));
        assert!(!cache.contains_key(&k2));
        assert!(cache.contains_key(&k3));
        assert!(cache.contains_key(&k4));
        assert_eq!(cache.metrics()["evictions"], 1.0);
    }

    #[test]
    fn test_does_not_keep_key_alive() {
        let cache = cache(4);
        let k = key("transient");
        let weak = Arc::downgrade(&k);
        cache.get_or_add(&k).unwrap();
        drop(k);
        assert!(weak.upgrade().is_none());
        assert_eq!(cache.reclaimed_count(), 1);
    }

    #[test]
    fn test_promotion_prunes_reclaimed_tail() {
        let cache = cache(3);
        let (k1, k2, k3) = (key("1"), key("2"), key("3"));
        for k in [&k1, &k2, &k3] {
            cache.get_or_add(k).unwrap();
        }
        // list: 3, 2, 1
        drop(k1);
        cache.get_or_add(&k2).unwrap();
        // list: 2, 3 after pruning 1 from the tail
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.reclaimed_count(), 0);
        assert_eq!(cache.metrics()["reclaimed"], 1.0);
    }

    #[test]
    fn test_trim_by_predicate_also_prunes_reclaimed() {
        let cache = cache(8);
        let keep = key("keep");
        let long = key("very long key");
        let gone = key("gone");
        for k in [&keep, &long, &gone] {
            cache.get_or_add(k).unwrap();
        }
        drop(gone);

        let long_values = |_: &Key, len: &usize| *len > 5;
        let removed = cache
            .trimmer()
            .unwrap()
            .trim(TrimPredicate::Values(&long_values));
        assert_eq!(removed, 1);
        assert_eq!(cache.count(), 1);
        assert!(cache.contains_key(&keep));
        assert!(!cache.contains_key(&long));
    }

    #[test]
    fn test_cache_exception() {
        let config = WeakLruCacheConfig {
            capacity: NonZeroUsize::new(2).unwrap(),
        };
        let cache = WeakLruCache::init(config, CacheOptions::CACHE_EXCEPTION, |k: &Key| {
            Err::<usize, _>(format!("no {}", k))
        });
        let k = key("x");
        assert_eq!(
            cache.get_or_add(&k),
            Err(CacheError::Computation("no x".to_string()))
        );
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.get_or_add(&k), cache.get_or_add(&k));
    }

    #[test]
    fn test_clear_and_dispose() {
        let cache = cache(4);
        let k = key("k");
        cache.get_or_add(&k).unwrap();
        cache.clear();
        assert_eq!(cache.count(), 0);
        assert!(!cache.contains_key(&k));

        cache.get_or_add(&k).unwrap();
        assert_eq!(cache.count(), 1);
        cache.dispose();
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.get_or_add(&k), Err(CacheError::Disposed));
    }

    #[test]
    fn test_dispose_during_computation() {
        let slot: Arc<OnceLock<Arc<WeakLruCache<Key, usize, ()>>>> = Arc::new(OnceLock::new());
        let disposer = Arc::clone(&slot);
        let config = WeakLruCacheConfig {
            capacity: NonZeroUsize::new(4).unwrap(),
        };
        let cache = Arc::new(WeakLruCache::init(
            config,
            CacheOptions::NONE,
            move |k: &Key| {
                if let Some(cache) = disposer.get() {
                    cache.dispose();
                }
                Ok(k.len())
            },
        ));
        assert!(slot.set(Arc::clone(&cache)).is_ok());

        let k = key("late");
        assert_eq!(cache.get_or_add(&k), Err(CacheError::Disposed));
        assert!(cache.is_disposed());
        assert_eq!(cache.count(), 0);
        assert!(!cache.contains_key(&k));
    }

    #[test]
    fn test_debug_view_marks_reclaimed() {
        let cache = cache(4);
        let live = key("live");
        let dead = key("dead");
        cache.get_or_add(&dead).unwrap();
        cache.get_or_add(&live).unwrap();
        drop(dead);
        let view = cache.debug_view();
        assert!(view.starts_with("WeakLruCache(count=2, capacity=4)"));
        assert!(view.contains("\"live\" => 4"));
        assert!(view.contains("<reclaimed> => 4"));
    }

    #[test]
    fn test_factory() {
        let factory = WeakLruCacheFactory::new(WeakLruCacheConfig {
            capacity: NonZeroUsize::new(2).unwrap(),
        });
        let cache = factory.create(|k: &Key| Ok::<_, ()>(k.len() * 2), CacheOptions::NONE);
        let k = key("ab");
        assert_eq!(cache.get_or_add(&k), Ok(4));
        assert_eq!(cache.algorithm_name(), "WeakLRU");
    }
}

//! Per-thread cache decorator.

use crate::error::CacheError;
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::traits::{CacheFactory, CacheOptions, MemoCache, TrimPredicate, Trimmer};
use core::fmt;
use core::fmt::Write;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

/// Which caches the queries of a [`ThreadLocalCache`] cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadView {
    /// Only the calling thread's cache.
    Local,
    /// The caches of every thread.
    Union,
}

/// Factory decorator creating a [`ThreadLocalCache`] around the wrapped
/// factory's caches.
#[derive(Debug, Clone)]
pub struct ThreadLocalCacheFactory<F> {
    inner: F,
    view: ThreadView,
}

impl<F> ThreadLocalCacheFactory<F> {
    /// Wraps `inner`. See [`with_thread_local_view`](super::with_thread_local_view).
    pub fn new(inner: F, expose_thread_local_view: bool) -> Self {
        let view = if expose_thread_local_view {
            ThreadView::Local
        } else {
            ThreadView::Union
        };
        Self { inner, view }
    }

    /// The view created caches use.
    pub fn view(&self) -> ThreadView {
        self.view
    }
}

impl<F, K, V, E> CacheFactory<K, V, E> for ThreadLocalCacheFactory<F>
where
    F: CacheFactory<K, V, E> + Clone + Send + Sync + 'static,
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Cache = ThreadLocalCache<F, K, V, E>;

    fn create<Fun>(&self, function: Fun, options: CacheOptions) -> Self::Cache
    where
        Fun: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        ThreadLocalCache {
            factory: self.inner.clone(),
            function: Arc::new(function),
            options,
            view: self.view,
            caches: RwLock::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }
}

/// A memoization cache that keeps one inner cache per thread.
///
/// Lookups always go to the calling thread's cache, which is created on first
/// use. `count`, `clear`, `debug_view` and trims cover the calling thread or
/// every thread, depending on the [`ThreadView`]. `dispose` always covers
/// every thread.
pub struct ThreadLocalCache<F: CacheFactory<K, V, E>, K, V, E> {
    factory: F,
    function: Arc<dyn Fn(&K) -> Result<V, E> + Send + Sync>,
    options: CacheOptions,
    view: ThreadView,
    caches: RwLock<HashMap<ThreadId, Arc<F::Cache>>>,
    disposed: AtomicBool,
}

impl<F, K, V, E> ThreadLocalCache<F, K, V, E>
where
    F: CacheFactory<K, V, E>,
    K: 'static,
    V: 'static,
    E: 'static,
{
    /// The view this cache was created with.
    pub fn view(&self) -> ThreadView {
        self.view
    }

    /// Number of threads that own an inner cache.
    pub fn thread_count(&self) -> usize {
        self.caches.read().len()
    }

    /// The calling thread's cache, created on first use.
    ///
    /// Fails once the decorator is disposed. A cache created while `dispose`
    /// drained the registry is disposed instead of registered.
    fn local(&self) -> Result<Arc<F::Cache>, CacheError<E>> {
        let id = thread::current().id();
        if let Some(cache) = self.caches.read().get(&id) {
            return Ok(Arc::clone(cache));
        }

        let function = Arc::clone(&self.function);
        let cache = Arc::new(self.factory.create(move |key: &K| function(key), self.options));
        let mut caches = self.caches.write();
        if self.disposed.load(Ordering::Acquire) {
            drop(caches);
            cache.dispose();
            return Err(CacheError::Disposed);
        }
        trace!("Created thread-local cache for {:?}", id);
        Ok(Arc::clone(caches.entry(id).or_insert(cache)))
    }

    /// The calling thread's cache, if it has one.
    fn existing_local(&self) -> Option<Arc<F::Cache>> {
        self.caches
            .read()
            .get(&thread::current().id())
            .map(Arc::clone)
    }

    /// The caches the current view covers, cloned out of the registry.
    fn in_view(&self) -> Vec<(ThreadId, Arc<F::Cache>)> {
        match self.view {
            ThreadView::Local => self
                .existing_local()
                .map(|cache| (thread::current().id(), cache))
                .into_iter()
                .collect(),
            ThreadView::Union => self
                .caches
                .read()
                .iter()
                .map(|(id, cache)| (*id, Arc::clone(cache)))
                .collect(),
        }
    }
}

impl<F, K, V, E> MemoCache<K, V, E> for ThreadLocalCache<F, K, V, E>
where
    F: CacheFactory<K, V, E> + Send + Sync,
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn get_or_add(&self, key: &K) -> Result<V, CacheError<E>> {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }
        self.local()?.get_or_add(key)
    }

    fn count(&self) -> usize {
        self.in_view().iter().map(|(_, cache)| cache.count()).sum()
    }

    fn clear(&self) {
        for (_, cache) in self.in_view() {
            cache.clear();
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let caches: Vec<_> = self.caches.write().drain().collect();
        for (_, cache) in &caches {
            cache.dispose();
        }
        debug!("Disposed thread-local cache with {} threads", caches.len());
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn debug_view(&self) -> String {
        let caches = self.in_view();
        let mut out = format!(
            "ThreadLocalCache(view={:?}, threads={})\n",
            self.view,
            caches.len()
        );
        for (id, cache) in caches {
            let _ = writeln!(out, "[{:?}]", id);
            out.push_str(&cache.debug_view());
        }
        out
    }

    fn trimmer(&self) -> Option<&dyn Trimmer<K, V, E>> {
        if self.is_disposed() {
            return None;
        }
        match self.local() {
            Ok(local) if local.trimmer().is_some() => Some(self),
            _ => None,
        }
    }
}

impl<F, K, V, E> Trimmer<K, V, E> for ThreadLocalCache<F, K, V, E>
where
    F: CacheFactory<K, V, E>,
    K: 'static,
    V: 'static,
    E: 'static,
{
    fn trim(&self, predicate: TrimPredicate<'_, K, V, E>) -> usize {
        self.in_view()
            .iter()
            .map(|(_, cache)| cache.trimmer().map_or(0, |t| t.trim(predicate)))
            .sum()
    }
}

impl<F, K, V, E> CacheMetrics for ThreadLocalCache<F, K, V, E>
where
    F: CacheFactory<K, V, E>,
    F::Cache: CacheMetrics,
    K: 'static,
    V: 'static,
    E: 'static,
{
    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.in_view()
            .iter()
            .fold(MetricsSnapshot::default(), |sum, (_, cache)| {
                sum + cache.metrics_snapshot()
            })
    }

    fn algorithm_name(&self) -> &'static str {
        "ThreadLocal"
    }
}

impl<F, K, V, E> fmt::Debug for ThreadLocalCache<F, K, V, E>
where
    F: CacheFactory<K, V, E>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocalCache")
            .field("view", &self.view)
            .field("options", &self.options)
            .field("threads", &self.caches.read().len())
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrent::{with_thread_local, with_thread_local_view};
    use crate::config::RankedCacheConfig;
    use crate::meta::ranking;
    use crate::RankedCacheFactory;
    use crate::RankedCache;
    use core::num::NonZeroUsize;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    fn ranked() -> RankedCacheFactory {
        RankedCacheFactory::new(
            RankedCacheConfig::new(NonZeroUsize::new(16).unwrap()),
            ranking::hit_count,
        )
        .unwrap()
    }

    #[test]
    fn test_each_thread_computes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = with_thread_local(ranked()).create(
            move |k: &u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(k + 100)
            },
            CacheOptions::NONE,
        );

        assert_eq!(cache.get_or_add(&1), Ok(101));
        assert_eq!(cache.get_or_add(&1), Ok(101));
        thread::scope(|s| {
            s.spawn(|| assert_eq!(cache.get_or_add(&1), Ok(101)));
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.thread_count(), 2);
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.metrics()["computations"], 2.0);
    }

    #[test]
    fn test_local_view_sees_own_thread_only() {
        let cache = with_thread_local_view(ranked(), true)
            .create(|k: &u32| Ok::<_, ()>(*k), CacheOptions::NONE);
        assert_eq!(cache.view(), ThreadView::Local);

        cache.get_or_add(&1).unwrap();
        thread::scope(|s| {
            s.spawn(|| {
                cache.get_or_add(&2).unwrap();
                cache.get_or_add(&3).unwrap();
                assert_eq!(cache.count(), 2);
            });
        });
        assert_eq!(cache.count(), 1);

        cache.clear();
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.thread_count(), 2);
    }

    #[test]
    fn test_union_trim_fans_out() {
        let cache =
            with_thread_local(ranked()).create(|k: &u32| Ok::<_, ()>(*k), CacheOptions::NONE);
        cache.get_or_add(&1).unwrap();
        cache.get_or_add(&2).unwrap();
        thread::scope(|s| {
            s.spawn(|| {
                cache.get_or_add(&2).unwrap();
            });
        });

        let twos = |_: &u32, v: &u32| *v == 2;
        let trimmer = cache.trimmer().unwrap();
        assert_eq!(trimmer.trim(TrimPredicate::Values(&twos)), 2);
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn test_dispose_covers_all_threads() {
        let cache =
            with_thread_local(ranked()).create(|k: &u32| Ok::<_, ()>(*k), CacheOptions::NONE);
        cache.get_or_add(&1).unwrap();
        cache.dispose();
        assert!(cache.is_disposed());
        assert_eq!(cache.thread_count(), 0);
        assert_eq!(cache.get_or_add(&1), Err(CacheError::Disposed));
        assert!(cache.trimmer().is_none());
        assert!(cache.debug_view().contains("threads=0"));
    }

    /// Blocks every `create` call until the test lets it continue.
    #[derive(Clone)]
    struct GatedFactory {
        inner: RankedCacheFactory,
        entered: Arc<Barrier>,
        resume: Arc<Barrier>,
    }

    impl CacheFactory<u32, u32, ()> for GatedFactory {
        type Cache = RankedCache<u32, u32, ()>;

        fn create<Fun>(&self, function: Fun, options: CacheOptions) -> Self::Cache
        where
            Fun: Fn(&u32) -> Result<u32, ()> + Send + Sync + 'static,
        {
            self.entered.wait();
            self.resume.wait();
            self.inner.create(function, options)
        }
    }

    #[test]
    fn test_dispose_while_creating_thread_cache() {
        let entered = Arc::new(Barrier::new(2));
        let resume = Arc::new(Barrier::new(2));
        let factory = GatedFactory {
            inner: ranked(),
            entered: Arc::clone(&entered),
            resume: Arc::clone(&resume),
        };
        let cache = with_thread_local(factory).create(|k: &u32| Ok::<_, ()>(*k), CacheOptions::NONE);

        thread::scope(|s| {
            let lookup = s.spawn(|| cache.get_or_add(&1));
            entered.wait();
            cache.dispose();
            resume.wait();
            assert_eq!(lookup.join().unwrap(), Err(CacheError::Disposed));
        });

        assert!(cache.is_disposed());
        assert_eq!(cache.thread_count(), 0);
        assert_eq!(cache.count(), 0);
    }
}

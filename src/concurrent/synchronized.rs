//! Reader/writer lock decorator.

use crate::error::CacheError;
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::traits::{CacheFactory, CacheOptions, MemoCache, TrimPredicate, Trimmer};
use core::fmt;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::trace;

/// Observable state of a [`SynchronizedCache`] lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No lock is held.
    Idle,
    /// One or more readers hold the lock.
    ReadHeld,
    /// A writer holds the lock.
    WriteHeld,
    /// A writer released the lock to run the memoized function and will take
    /// it back once the function returns.
    WriteReleasedForCallback,
}

#[derive(Debug, Default)]
struct LockInner {
    writer: Option<ThreadId>,
    readers: usize,
    suspended: usize,
}

impl LockInner {
    /// The lock is not reentrant: waiting on a write lock the calling thread
    /// already holds would never return.
    fn check_not_writer(&self) {
        if self.writer == Some(thread::current().id()) {
            panic!(
                "synchronized cache lock acquired recursively by the thread holding its write lock"
            );
        }
    }
}

/// Reader/writer lock whose write side can be handed back while the owning
/// thread runs a callback.
#[derive(Debug, Default)]
struct SyncLock {
    inner: Mutex<LockInner>,
    changed: Condvar,
}

impl SyncLock {
    fn read(&self) -> ReadGuard<'_> {
        let mut inner = self.inner.lock();
        inner.check_not_writer();
        while inner.writer.is_some() {
            self.changed.wait(&mut inner);
        }
        inner.readers += 1;
        ReadGuard { lock: self }
    }

    fn write(&self) -> WriteGuard<'_> {
        self.acquire_exclusive();
        WriteGuard { lock: self }
    }

    fn acquire_exclusive(&self) {
        let mut inner = self.inner.lock();
        inner.check_not_writer();
        while inner.writer.is_some() || inner.readers > 0 {
            self.changed.wait(&mut inner);
        }
        inner.writer = Some(thread::current().id());
    }

    fn release_exclusive(&self) {
        self.inner.lock().writer = None;
        self.changed.notify_all();
    }

    /// Releases the write lock if the calling thread holds it. The returned
    /// guard takes it back on drop.
    fn release_for_callback(&self) -> Option<CallbackGuard<'_>> {
        let mut inner = self.inner.lock();
        if inner.writer != Some(thread::current().id()) {
            return None;
        }
        inner.writer = None;
        inner.suspended += 1;
        drop(inner);
        self.changed.notify_all();
        Some(CallbackGuard { lock: self })
    }

    fn state(&self) -> LockState {
        let inner = self.inner.lock();
        if inner.writer.is_some() {
            LockState::WriteHeld
        } else if inner.suspended > 0 {
            LockState::WriteReleasedForCallback
        } else if inner.readers > 0 {
            LockState::ReadHeld
        } else {
            LockState::Idle
        }
    }
}

struct ReadGuard<'a> {
    lock: &'a SyncLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.lock.inner.lock();
        inner.readers -= 1;
        if inner.readers == 0 {
            drop(inner);
            self.lock.changed.notify_all();
        }
    }
}

struct WriteGuard<'a> {
    lock: &'a SyncLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_exclusive();
    }
}

struct CallbackGuard<'a> {
    lock: &'a SyncLock,
}

impl Drop for CallbackGuard<'_> {
    fn drop(&mut self) {
        self.lock.acquire_exclusive();
        self.lock.inner.lock().suspended -= 1;
    }
}

/// Factory decorator creating a [`SynchronizedCache`] around the wrapped
/// factory's caches.
#[derive(Debug, Clone)]
pub struct SynchronizedCacheFactory<F> {
    inner: F,
}

impl<F> SynchronizedCacheFactory<F> {
    /// Wraps `inner`.
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F, K, V, E> CacheFactory<K, V, E> for SynchronizedCacheFactory<F>
where
    F: CacheFactory<K, V, E>,
    K: 'static,
    V: 'static,
    E: 'static,
{
    type Cache = SynchronizedCache<F::Cache>;

    fn create<Fun>(&self, function: Fun, options: CacheOptions) -> Self::Cache
    where
        Fun: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        let lock = Arc::new(SyncLock::default());
        let callback_lock = Arc::clone(&lock);
        let inner = self.inner.create(
            move |key: &K| {
                let _released = callback_lock.release_for_callback();
                function(key)
            },
            options,
        );
        SynchronizedCache { lock, inner }
    }
}

/// A memoization cache guarded by a reader/writer lock.
///
/// `get_or_add`, `clear`, `dispose` and trims hold the write lock; `count`
/// and `debug_view` hold the read lock. The write lock is released while the
/// memoized function runs, so the function may read or populate the same
/// cache.
///
/// # Panics
///
/// Trim predicates run under the write lock. A predicate that calls back into
/// the same cache panics instead of deadlocking.
pub struct SynchronizedCache<C> {
    lock: Arc<SyncLock>,
    inner: C,
}

impl<C> SynchronizedCache<C> {
    /// Current state of the lock.
    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C, K, V, E> MemoCache<K, V, E> for SynchronizedCache<C>
where
    C: MemoCache<K, V, E>,
{
    fn get_or_add(&self, key: &K) -> Result<V, CacheError<E>> {
        let _write = self.lock.write();
        self.inner.get_or_add(key)
    }

    fn count(&self) -> usize {
        let _read = self.lock.read();
        self.inner.count()
    }

    fn clear(&self) {
        let _write = self.lock.write();
        self.inner.clear();
    }

    fn dispose(&self) {
        let _write = self.lock.write();
        self.inner.dispose();
        trace!("Disposed synchronized cache");
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn debug_view(&self) -> String {
        let _read = self.lock.read();
        self.inner.debug_view()
    }

    fn trimmer(&self) -> Option<&dyn Trimmer<K, V, E>> {
        self.inner
            .trimmer()
            .map(|_| self as &dyn Trimmer<K, V, E>)
    }
}

impl<C, K, V, E> Trimmer<K, V, E> for SynchronizedCache<C>
where
    C: MemoCache<K, V, E>,
{
    fn trim(&self, predicate: TrimPredicate<'_, K, V, E>) -> usize {
        let _write = self.lock.write();
        self.inner.trimmer().map_or(0, |t| t.trim(predicate))
    }
}

impl<C: CacheMetrics> CacheMetrics for SynchronizedCache<C> {
    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.inner.metrics_snapshot()
    }

    fn algorithm_name(&self) -> &'static str {
        "Synchronized"
    }
}

impl<C: fmt::Debug> fmt::Debug for SynchronizedCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizedCache")
            .field("state", &self.lock.state())
            .field("inner", &self.inner)
            .finish()
    }
}

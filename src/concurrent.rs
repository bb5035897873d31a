//! Concurrency Decorators
//!
//! Every cache in this crate is already safe to share between threads. The
//! decorators in this module change *how* a cache is shared, by wrapping the
//! [`CacheFactory`](crate::CacheFactory) that creates it:
//!
//! | Entry point | Produces | Behaviour |
//! |-------------|----------|-----------|
//! | [`with_thread_local`] | [`ThreadLocalCache`] | one inner cache per thread; queries see the union |
//! | [`with_thread_local_view`] | [`ThreadLocalCache`] | as above, optionally scoped to the calling thread |
//! | [`synchronized`] | [`SynchronizedCache`] | one inner cache behind a reader/writer lock |
//!
//! Decorators compose: `synchronized(with_thread_local(factory))` is a valid
//! factory.
//!
//! # Thread-Local Caches
//!
//! Each thread that calls `get_or_add` gets its own inner cache, created on
//! first use from the wrapped factory. Threads never contend on each other's
//! entries, at the price of computing a key once per thread.
//!
//! ```text
//!   thread A ──▶ ┌─────────┐
//!                │ cache A │      registry: ThreadId ──▶ Arc<cache>
//!   thread B ──▶ ├─────────┤
//!                │ cache B │      count / clear / trim: this thread only,
//!   thread C ──▶ ├─────────┤      or the union of all threads
//!                │ cache C │
//!                └─────────┘
//! ```
//!
//! Inner caches of threads that have exited stay registered, and counted in
//! union view, until the decorator is disposed.
//!
//! # Synchronized Caches
//!
//! `get_or_add`, `clear`, `dispose` and trims take the write lock; `count` and
//! `debug_view` take the read lock. While the wrapped function runs the write
//! lock is released, so a slow computation never blocks readers, and the
//! function may itself query the cache. The lock is re-acquired before the
//! result is stored.
//!
//! ```text
//!   Idle ──write──▶ WriteHeld ──callback──▶ WriteReleasedForCallback
//!    ▲                  │    ◀──returns───          │
//!    └────release───────┘                           │ readers may enter
//!   Idle ──read───▶ ReadHeld ──release──▶ Idle
//! ```
//!
//! # Example
//!
//! ```
//! use memo_cache::concurrent::{synchronized, with_thread_local};
//! use memo_cache::config::RankedCacheConfig;
//! use memo_cache::meta::ranking;
//! use memo_cache::{CacheFactory, CacheOptions, MemoCache, RankedCacheFactory};
//! use core::num::NonZeroUsize;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let ranked = RankedCacheFactory::new(
//!     RankedCacheConfig::new(NonZeroUsize::new(64).unwrap()),
//!     ranking::hit_count,
//! )
//! .unwrap();
//!
//! let shared = Arc::new(synchronized(ranked.clone()).create(
//!     |n: &u32| Ok::<_, ()>(n + 1),
//!     CacheOptions::NONE,
//! ));
//! let per_thread = Arc::new(with_thread_local(ranked).create(
//!     |n: &u32| Ok::<_, ()>(n * 2),
//!     CacheOptions::NONE,
//! ));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let shared = Arc::clone(&shared);
//!         let per_thread = Arc::clone(&per_thread);
//!         thread::spawn(move || {
//!             assert_eq!(shared.get_or_add(&t), Ok(t + 1));
//!             assert_eq!(per_thread.get_or_add(&1), Ok(2));
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(shared.count(), 4);
//! // key 1 was computed once on each of the four threads
//! assert_eq!(per_thread.count(), 4);
//! ```

mod synchronized;
mod thread_local;

pub use self::synchronized::{LockState, SynchronizedCache, SynchronizedCacheFactory};
pub use self::thread_local::{ThreadLocalCache, ThreadLocalCacheFactory, ThreadView};

/// Wraps `factory` so each thread gets its own cache. Queries report the
/// union of all threads' caches.
pub fn with_thread_local<F>(factory: F) -> ThreadLocalCacheFactory<F> {
    ThreadLocalCacheFactory::new(factory, false)
}

/// Wraps `factory` so each thread gets its own cache.
///
/// With `expose_thread_local_view`, `count`, `clear`, `debug_view` and trims
/// only see the calling thread's cache; otherwise they see the union.
pub fn with_thread_local_view<F>(
    factory: F,
    expose_thread_local_view: bool,
) -> ThreadLocalCacheFactory<F> {
    ThreadLocalCacheFactory::new(factory, expose_thread_local_view)
}

/// Wraps `factory` so its caches are guarded by a reader/writer lock that is
/// released while the memoized function runs.
pub fn synchronized<F>(factory: F) -> SynchronizedCacheFactory<F> {
    SynchronizedCacheFactory::new(factory)
}

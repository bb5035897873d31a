#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Cache Selection Guide
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                    Which Cache Should I Use?                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │  ┌─────────────────┐                                                        │
//! │  │ Must the cache  │──Yes──▶ ┌──────────────┐                               │
//! │  │ let keys die?   │         │ WeakLruCache │                               │
//! │  └────────┬────────┘         └──────────────┘                               │
//! │          No                                                                 │
//! │           ▼                                                                 │
//! │  ┌─────────────────┐                                                        │
//! │  │ Evict by a      │──Yes──▶ ┌──────────────┐  ranking::hit_count,          │
//! │  │ per-entry score?│         │ RankedCache  │  ranking::last_access, ...    │
//! │  └────────┬────────┘         └──────────────┘                               │
//! │          No                                                                 │
//! │           ▼                                                                 │
//! │  ┌─────────────────┐                                                        │
//! │  │ Intern shared   │──Yes──▶ ┌──────────────┐                               │
//! │  │ values?         │         │ CacheStorage │                               │
//! │  └─────────────────┘         └──────────────┘                               │
//! │                                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | Keys | Eviction | Created by |
//! |------|------|----------|------------|
//! | [`RankedCache`] | owned, compared by [`Equivalence`](store::Equivalence) | lowest score among the oldest entries | [`RankedCacheFactory`] |
//! | [`WeakLruCache`] | `Arc<T>`, held weakly | least recently used, plus reclaimed keys | [`WeakLruCacheFactory`] |
//! | [`ThreadLocalCache`](concurrent::ThreadLocalCache) | as wrapped | as wrapped, per thread | [`with_thread_local`] |
//! | [`SynchronizedCache`](concurrent::SynchronizedCache) | as wrapped | as wrapped | [`synchronized`] |
//! | [`CacheStorage`] | the values themselves | when the last reference is released | [`CacheStorage::new`] |
//!
//! ## Caching Failures
//!
//! ```rust
//! use memo_cache::config::WeakLruCacheConfig;
//! use memo_cache::{CacheError, CacheFactory, CacheOptions, MemoCache, WeakLruCacheFactory};
//! use core::num::NonZeroUsize;
//! use std::sync::Arc;
//!
//! let factory = WeakLruCacheFactory::new(WeakLruCacheConfig {
//!     capacity: NonZeroUsize::new(8).unwrap(),
//! });
//! let parse = factory.create(
//!     |s: &Arc<String>| s.parse::<i32>().map_err(|e| e.to_string()),
//!     CacheOptions::CACHE_EXCEPTION,
//! );
//!
//! let bad = Arc::new("x".to_string());
//! let first = parse.get_or_add(&bad);
//! assert!(matches!(first, Err(CacheError::Computation(_))));
//! // the failure is stored and re-raised without running the function again
//! assert_eq!(parse.get_or_add(&bad), first);
//! assert_eq!(parse.count(), 1);
//!
//! drop(bad);
//! // the entry no longer keeps its key alive
//! assert_eq!(parse.count(), 1);
//! assert_eq!(parse.reclaimed_count(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`traits`]: the cache contract, factories, options and trimming
//! - [`ranked`]: metric-ranked eviction cache
//! - [`weak_lru`]: weak-key LRU cache
//! - [`concurrent`]: thread-local and synchronized decorators
//! - [`storage`]: reference-counted deduplication store
//! - [`store`]: the concurrent keyed stores backing the caches
//! - [`config`]: configuration structures
//! - [`metrics`]: cache-level counters
//! - [`meta`]: per-entry metrics and ranking functions

/// Error types.
pub mod error;

/// The memoization cache contract.
pub mod traits;

/// Cache entries.
///
/// Provides `CacheEntry<K, V, E>`, holding the key, the memoized outcome and
/// the entry's access metrics.
pub mod entry;

/// Per-entry metrics.
///
/// Provides the `EntryMetrics` snapshot passed to ranking functions and
/// trim predicates, and a set of ready-made ranking functions.
pub mod meta;

/// Time sources used to stamp and time entries.
pub mod clock;

/// Doubly linked list implementation with in-place editing capabilities.
///
/// **Note**: This module is internal infrastructure. It exposes unsafe raw
/// pointer operations that require careful invariant maintenance.
pub(crate) mod list;

/// Concurrent keyed stores.
pub mod store;

/// Cache configuration structures.
pub mod config;

/// Metric-ranked eviction cache.
///
/// Evicts the entries whose ranking score is lowest (or highest) among the
/// oldest part of the cache, before every computation that would exceed
/// capacity.
pub mod ranked;

/// Weak-key least recently used cache.
///
/// Holds its `Arc` keys weakly, evicts the least recently used entry when
/// full, and prunes entries whose key was dropped.
pub mod weak_lru;

/// Cache metrics system.
pub mod metrics;

/// Concurrency decorators.
pub mod concurrent;

/// Reference-counted deduplication store.
pub mod storage;

// Re-export cache types
pub use ranked::{RankedCache, RankedCacheFactory, Ranker};
pub use weak_lru::{WeakLruCache, WeakLruCacheFactory};

pub use storage::{CacheReference, CacheStorage};

pub use traits::{
    CacheFactory, CacheKey, CacheOptions, CacheValue, MemoCache, TrimPredicate, Trimmer,
};

pub use error::{CacheError, ConfigError, StorageError};

pub use entry::{CacheEntry, Outcome};
pub use meta::EntryMetrics;
pub use metrics::CacheMetrics;

pub use concurrent::{synchronized, with_thread_local, with_thread_local_view};

//! Cache Configuration Module
//!
//! Configuration structures for the memoization caches. Each cache type has
//! its own config struct with public fields.
//!
//! # Design Philosophy
//!
//! Configuration structs have all public fields for simple instantiation.
//! Parameters whose valid range is narrower than their type (such as
//! `age_threshold`) are checked when the cache is constructed, and a
//! [`ConfigError`](crate::ConfigError) is returned if they are out of range.
//!
//! | Config | Cache | Description |
//! |--------|-------|-------------|
//! | `RankedCacheConfig` | [`RankedCache`](crate::RankedCache) | Strong keys, eviction by ranked metrics |
//! | `WeakLruCacheConfig` | [`WeakLruCache`](crate::WeakLruCache) | Weak keys, least recently used eviction |
//!
//! Behavioural flags that apply to every cache, such as caching failures,
//! live in [`CacheOptions`](crate::CacheOptions) rather than in a config.
//!
//! # Examples
//!
//! ```
//! use memo_cache::config::{RankedCacheConfig, WeakLruCacheConfig};
//! use core::num::NonZeroUsize;
//!
//! let ranked = RankedCacheConfig {
//!     capacity: NonZeroUsize::new(1000).unwrap(),
//!     descending: false,
//!     age_threshold: 0.9,
//! };
//! assert!(ranked.validate().is_ok());
//!
//! let lru = WeakLruCacheConfig {
//!     capacity: NonZeroUsize::new(64).unwrap(),
//! };
//! assert_eq!(lru.capacity.get(), 64);
//! ```

pub mod ranked;
pub mod weak_lru;

pub use ranked::RankedCacheConfig;
pub use weak_lru::WeakLruCacheConfig;

//! Configuration for the weak-key LRU cache.

use core::fmt;
use core::num::NonZeroUsize;

/// Configuration for a [`WeakLruCache`](crate::WeakLruCache).
///
/// # Fields
///
/// - `capacity`: Maximum number of entries in the recency list. Entries whose
///   key was reclaimed still occupy a slot until they are pruned.
///
/// # Examples
///
/// ```
/// use memo_cache::config::WeakLruCacheConfig;
/// use core::num::NonZeroUsize;
///
/// let config = WeakLruCacheConfig {
///     capacity: NonZeroUsize::new(256).unwrap(),
/// };
/// assert_eq!(config.capacity.get(), 256);
/// ```
#[derive(Clone, Copy)]
pub struct WeakLruCacheConfig {
    /// Maximum number of memoized entries.
    pub capacity: NonZeroUsize,
}

impl fmt::Debug for WeakLruCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLruCacheConfig")
            .field("capacity", &self.capacity)
            .finish()
    }
}

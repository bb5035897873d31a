//! Configuration for the ranked-eviction cache.
//!
//! # Choosing `age_threshold`
//!
//! When the cache is full, eviction candidates are drawn from the oldest
//! entries only, so a freshly inserted entry is not evicted before it had a
//! chance to collect hits. The pool holds the oldest
//! `max(1, floor(capacity * age_threshold))` entries:
//!
//! ```text
//! capacity = 100, age_threshold = 0.9
//!
//!   oldest ─────────────────────────────── newest
//!   [ 90 candidates ranked for eviction ][ 10 exempt ]
//! ```
//!
//! An `age_threshold` of `0.0` disables the age filter: every entry is a
//! candidate.

use crate::error::ConfigError;
use core::fmt;
use core::num::NonZeroUsize;

/// Configuration for a [`RankedCache`](crate::RankedCache).
///
/// # Fields
///
/// - `capacity`: Maximum number of entries. Reaching it triggers a trim
///   before the next computation.
/// - `descending`: Evict the highest scores first instead of the lowest.
/// - `age_threshold`: Fraction of `capacity` eligible for eviction, counted
///   from the oldest entry. `0.0` makes every entry eligible.
///
/// # Examples
///
/// ```
/// use memo_cache::config::RankedCacheConfig;
/// use core::num::NonZeroUsize;
///
/// // LFU-like: evict the least hit entries, protect the newest 10%
/// let config = RankedCacheConfig {
///     capacity: NonZeroUsize::new(500).unwrap(),
///     descending: false,
///     age_threshold: 0.9,
/// };
/// assert_eq!(config.candidate_pool(500), 450);
/// ```
#[derive(Clone, Copy)]
pub struct RankedCacheConfig {
    /// Maximum number of memoized entries.
    pub capacity: NonZeroUsize,
    /// Evict high scores first when `true`, low scores first otherwise.
    pub descending: bool,
    /// Fraction of the capacity, oldest first, eligible for eviction.
    pub age_threshold: f64,
}

impl RankedCacheConfig {
    /// Creates a config with ascending order and no age filter.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            descending: false,
            age_threshold: 0.0,
        }
    }

    /// Checks that `age_threshold` is a finite fraction in `[0.0, 1.0]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AgeThreshold`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&self.age_threshold) {
            Ok(())
        } else {
            Err(ConfigError::AgeThreshold(self.age_threshold))
        }
    }

    /// Number of oldest entries ranked for eviction when `len` entries are
    /// held.
    pub fn candidate_pool(&self, len: usize) -> usize {
        if self.age_threshold == 0.0 {
            return len;
        }
        #[allow(clippy::cast_possible_truncation)]
        let pool = (self.capacity.get() as f64 * self.age_threshold).floor() as usize;
        pool.max(1).min(len)
    }
}

impl fmt::Debug for RankedCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankedCacheConfig")
            .field("capacity", &self.capacity)
            .field("descending", &self.descending)
            .field("age_threshold", &self.age_threshold)
            .finish()
    }
}

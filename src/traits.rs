//! The memoization cache contract.
//!
//! Every cache in this crate, concrete or decorator, implements [`MemoCache`]:
//!
//! | Operation | Meaning |
//! |-----------|---------|
//! | [`get_or_add`](MemoCache::get_or_add) | return the memoized result for a key, computing it on a miss |
//! | [`count`](MemoCache::count) | number of live entries |
//! | [`clear`](MemoCache::clear) | drop every entry |
//! | [`dispose`](MemoCache::dispose) | drop every entry and refuse further lookups |
//! | [`debug_view`](MemoCache::debug_view) | human-readable dump |
//! | [`trimmer`](MemoCache::trimmer) | optional trim-by-predicate capability |
//!
//! Caches are created by a [`CacheFactory`] from a function and
//! [`CacheOptions`]. Factories are what the decorators in
//! [`concurrent`](crate::concurrent) wrap.

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::meta::EntryMetrics;
use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// Bounds every key type of a memoization cache satisfies.
pub trait CacheKey: fmt::Debug + Send + Sync + 'static {}

impl<T: fmt::Debug + Send + Sync + 'static> CacheKey for T {}

/// Bounds every value and error type of a memoization cache satisfies.
///
/// Values and errors are cloned out of the cache on every hit.
pub trait CacheValue: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> CacheValue for T {}

/// The memoized function as stored by a cache.
pub(crate) type CacheFn<K, V, E> = Box<dyn Fn(&K) -> Result<V, E> + Send + Sync>;

/// Flags controlling how a cache treats the wrapped function.
///
/// ```
/// use memo_cache::CacheOptions;
///
/// let options = CacheOptions::NONE | CacheOptions::CACHE_EXCEPTION;
/// assert!(options.contains(CacheOptions::CACHE_EXCEPTION));
/// assert!(!CacheOptions::NONE.contains(CacheOptions::CACHE_EXCEPTION));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CacheOptions(u8);

impl CacheOptions {
    /// No flags. Failures propagate and are never cached.
    pub const NONE: CacheOptions = CacheOptions(0);

    /// Store failures of the wrapped function as error entries and re-raise
    /// them on every hit instead of recomputing.
    pub const CACHE_EXCEPTION: CacheOptions = CacheOptions(1);

    /// Returns `true` if every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: CacheOptions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw flag bits.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for CacheOptions {
    type Output = CacheOptions;

    fn bitor(self, rhs: CacheOptions) -> CacheOptions {
        CacheOptions(self.0 | rhs.0)
    }
}

impl BitOrAssign for CacheOptions {
    fn bitor_assign(&mut self, rhs: CacheOptions) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(CacheOptions::CACHE_EXCEPTION) {
            f.write_str("CacheOptions(CACHE_EXCEPTION)")
        } else {
            f.write_str("CacheOptions(NONE)")
        }
    }
}

/// Selects which entries a [`Trimmer`] removes.
///
/// The variant decides what the predicate sees:
///
/// - `Values`: key and value of value entries. Error entries never match.
/// - `Entries`: key and outcome of every entry.
/// - `Metrics`: the entry's metrics only.
pub enum TrimPredicate<'p, K, V, E> {
    /// Match value entries by key and value.
    Values(&'p dyn Fn(&K, &V) -> bool),
    /// Match any entry by key and outcome.
    Entries(&'p dyn Fn(&K, Result<&V, &E>) -> bool),
    /// Match any entry by its metrics.
    Metrics(&'p dyn Fn(&EntryMetrics) -> bool),
}

impl<K, V, E> TrimPredicate<'_, K, V, E> {
    /// Evaluates the predicate against `entry`, stored under `key`.
    ///
    /// The entry's own key field is not consulted, so weak-keyed caches can
    /// pass the resolved strong key.
    pub fn matches<X>(&self, key: &K, entry: &CacheEntry<X, V, E>) -> bool {
        match self {
            TrimPredicate::Values(p) => entry.value().is_some_and(|v| p(key, v)),
            TrimPredicate::Entries(p) => p(key, entry.outcome().as_result()),
            TrimPredicate::Metrics(p) => p(&entry.metrics()),
        }
    }
}

impl<K, V, E> Clone for TrimPredicate<'_, K, V, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, E> Copy for TrimPredicate<'_, K, V, E> {}

impl<K, V, E> fmt::Debug for TrimPredicate<'_, K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            TrimPredicate::Values(_) => "Values",
            TrimPredicate::Entries(_) => "Entries",
            TrimPredicate::Metrics(_) => "Metrics",
        };
        f.debug_tuple("TrimPredicate").field(&kind).finish()
    }
}

/// Trim-by-predicate capability.
///
/// Obtained through [`MemoCache::trimmer`]. Removes every entry matching the
/// predicate, regardless of capacity.
pub trait Trimmer<K, V, E> {
    /// Removes all matching entries and returns how many were removed.
    fn trim(&self, predicate: TrimPredicate<'_, K, V, E>) -> usize;
}

/// A memoizing cache of `key -> Result<V, E>`.
///
/// Implementations are shared between threads, so every method takes `&self`.
pub trait MemoCache<K, V, E>: Send + Sync {
    /// Returns the memoized result for `key`, running the wrapped function on
    /// a miss.
    ///
    /// Under a race, two threads may both compute the same key. Only one
    /// result is kept; the other is discarded.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Computation`] when the function fails, or when a
    ///   cached failure is re-raised.
    /// - [`CacheError::Disposed`] when the cache was disposed before or during
    ///   the lookup.
    fn get_or_add(&self, key: &K) -> Result<V, CacheError<E>>;

    /// Number of entries currently held.
    fn count(&self) -> usize;

    /// Removes every entry.
    fn clear(&self);

    /// Removes every entry and makes further lookups fail with
    /// [`CacheError::Disposed`]. Idempotent.
    fn dispose(&self);

    /// Returns `true` once [`dispose`](MemoCache::dispose) was called.
    fn is_disposed(&self) -> bool;

    /// Human-readable dump of the cache contents.
    fn debug_view(&self) -> String;

    /// Capability query for trim-by-predicate.
    ///
    /// Returns `None` if this cache cannot trim by predicate.
    fn trimmer(&self) -> Option<&dyn Trimmer<K, V, E>> {
        None
    }
}

/// Creates caches around a function.
///
/// Strong-keyed factories additionally accept an
/// [`Equivalence`](crate::store::Equivalence) through their inherent
/// constructors.
pub trait CacheFactory<K, V, E> {
    /// Cache type produced by this factory.
    type Cache: MemoCache<K, V, E>;

    /// Creates a cache memoizing `function`.
    fn create<F>(&self, function: F, options: CacheOptions) -> Self::Cache
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Outcome;
    use core::time::Duration;

    #[test]
    fn test_options_flags() {
        let mut options = CacheOptions::default();
        assert_eq!(options, CacheOptions::NONE);
        options |= CacheOptions::CACHE_EXCEPTION;
        assert!(options.contains(CacheOptions::CACHE_EXCEPTION));
        assert_eq!(options.bits(), 1);
        assert_eq!(format!("{:?}", options), "CacheOptions(CACHE_EXCEPTION)");
    }

    #[test]
    fn test_predicate_kinds() {
        let value: CacheEntry<(), i32, &str> =
            CacheEntry::new((), Outcome::Value(4), Duration::ZERO, Duration::ZERO);
        let error: CacheEntry<(), i32, &str> =
            CacheEntry::new((), Outcome::Error("x"), Duration::ZERO, Duration::ZERO);

        let even = |_: &u8, v: &i32| v % 2 == 0;
        let values = TrimPredicate::Values(&even);
        assert!(values.matches(&1, &value));
        assert!(!values.matches(&1, &error));

        let errors = |_: &u8, r: Result<&i32, &&str>| r.is_err();
        let entries = TrimPredicate::Entries(&errors);
        assert!(!entries.matches(&1, &value));
        assert!(entries.matches(&1, &error));

        let unused = |m: &EntryMetrics| m.hit_count == 0;
        let metrics: TrimPredicate<'_, u8, i32, &str> = TrimPredicate::Metrics(&unused);
        assert!(metrics.matches(&1, &value));
        assert_eq!(format!("{:?}", metrics), "TrimPredicate(\"Metrics\")");
    }
}

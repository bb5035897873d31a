//! Memoized Cache Entry
//!
//! A [`CacheEntry`] is what a memoization cache stores for one key: the key
//! itself, the outcome of running the wrapped function for that key, and the
//! entry's [`EntryMetrics`].
//!
//! # Outcomes
//!
//! The outcome is a tagged union:
//!
//! - [`Outcome::Value`]: the function returned successfully.
//! - [`Outcome::Error`]: the function failed and the cache was configured with
//!   [`CacheOptions::CACHE_EXCEPTION`](crate::CacheOptions::CACHE_EXCEPTION),
//!   so the failure is remembered and re-raised on every hit.
//!
//! # Key Representation
//!
//! Strong-keyed caches store `K` itself. The weak LRU cache stores a
//! [`Weak`](std::sync::Weak) handle instead, so an entry never keeps its key
//! alive.
//!
//! # Thread Safety
//!
//! Entries are shared between threads behind `Arc`. The key and outcome are
//! immutable after creation; only the metrics change, through atomics.

use crate::clock::Stopwatch;
use crate::error::CacheError;
use crate::meta::{EntryMetrics, MetricsCell};
use crate::metrics::CoreCacheMetrics;
use crate::traits::{CacheFn, CacheOptions};
use core::fmt;
use core::time::Duration;

/// Result of running the wrapped function for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V, E> {
    /// The function produced a value.
    Value(V),
    /// The function failed and the failure is cached.
    Error(E),
}

impl<V, E> Outcome<V, E> {
    /// Borrows the outcome as a `Result`.
    #[inline]
    pub fn as_result(&self) -> Result<&V, &E> {
        match self {
            Outcome::Value(v) => Ok(v),
            Outcome::Error(e) => Err(e),
        }
    }
}

impl<V, E> From<Result<V, E>> for Outcome<V, E> {
    fn from(result: Result<V, E>) -> Self {
        match result {
            Ok(v) => Outcome::Value(v),
            Err(e) => Outcome::Error(e),
        }
    }
}

/// One memoized result: key, outcome and metrics.
///
/// # Examples
///
/// ```
/// use memo_cache::entry::{CacheEntry, Outcome};
/// use core::time::Duration;
///
/// let entry: CacheEntry<&str, i32, ()> =
///     CacheEntry::new("answer", Outcome::Value(42), Duration::ZERO, Duration::from_millis(3));
/// assert_eq!(entry.value(), Some(&42));
/// assert!(!entry.is_error());
/// assert_eq!(entry.metrics().invoke_duration, Duration::from_millis(3));
/// ```
pub struct CacheEntry<K, V, E> {
    key: K,
    outcome: Outcome<V, E>,
    metrics: MetricsCell,
}

impl<K, V, E> CacheEntry<K, V, E> {
    /// Creates an entry stamped with `creation_time` whose computation took
    /// `invoke_duration`. The entry starts with zero hits.
    pub fn new(
        key: K,
        outcome: Outcome<V, E>,
        creation_time: Duration,
        invoke_duration: Duration,
    ) -> Self {
        Self {
            key,
            outcome,
            metrics: MetricsCell::new(creation_time, invoke_duration),
        }
    }

    /// The stored key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The stored outcome.
    #[inline]
    pub fn outcome(&self) -> &Outcome<V, E> {
        &self.outcome
    }

    /// The stored value, or `None` for an error entry.
    #[inline]
    pub fn value(&self) -> Option<&V> {
        self.outcome.as_result().ok()
    }

    /// The stored failure, or `None` for a value entry.
    #[inline]
    pub fn error(&self) -> Option<&E> {
        self.outcome.as_result().err()
    }

    /// Returns `true` if this entry caches a failure.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Snapshot of the entry's metrics.
    #[inline]
    pub fn metrics(&self) -> EntryMetrics {
        self.metrics.snapshot()
    }

    /// Counts one access at stopwatch time `now`.
    #[inline]
    pub(crate) fn touch(&self, now: Duration) {
        self.metrics.record_access(now);
    }

    /// Runs `function` for `key` and wraps the outcome in an entry stored
    /// under `stored_key`.
    ///
    /// A failure becomes an error entry only with
    /// [`CacheOptions::CACHE_EXCEPTION`]; otherwise it is returned and nothing
    /// is created.
    pub(crate) fn compute<A>(
        stored_key: K,
        key: &A,
        function: &CacheFn<A, V, E>,
        options: CacheOptions,
        stopwatch: &dyn Stopwatch,
        metrics: &CoreCacheMetrics,
    ) -> Result<Self, CacheError<E>> {
        let start = stopwatch.elapsed();
        let result = function(key);
        let invoke_duration = stopwatch.elapsed().saturating_sub(start);
        let outcome = match result {
            Ok(value) => Outcome::Value(value),
            Err(error) if options.contains(CacheOptions::CACHE_EXCEPTION) => {
                metrics.record_cached_failure();
                Outcome::Error(error)
            }
            Err(error) => return Err(CacheError::Computation(error)),
        };
        metrics.record_computation();
        Ok(Self::new(stored_key, outcome, start, invoke_duration))
    }
}

impl<K, V: Clone, E: Clone> CacheEntry<K, V, E> {
    /// Clones the outcome out as the result a caller of `get_or_add` sees.
    #[inline]
    pub fn to_result(&self) -> Result<V, E> {
        match &self.outcome {
            Outcome::Value(v) => Ok(v.clone()),
            Outcome::Error(e) => Err(e.clone()),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, E: fmt::Debug> fmt::Debug for CacheEntry<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("outcome", &self.outcome)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

/// Writes the one-line dump of an entry used by debug views.
pub(crate) fn write_debug_line<K, V, E>(
    out: &mut String,
    key: &dyn fmt::Debug,
    entry: &CacheEntry<K, V, E>,
) where
    V: fmt::Debug,
    E: fmt::Debug,
{
    use core::fmt::Write;
    let m = entry.metrics();
    let _ = match entry.outcome() {
        Outcome::Value(v) => write!(out, "  {:?} => {:?}", key, v),
        Outcome::Error(e) => write!(out, "  {:?} => error {:?}", key, e),
    };
    let _ = writeln!(
        out,
        " [hits={}, total={:?}, invoke={:?}, created={:?}, last_access={:?}]",
        m.hit_count, m.total_duration, m.invoke_duration, m.creation_time, m.last_access_time
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_entry() {
        let entry: CacheEntry<&str, i32, &str> =
            CacheEntry::new("key", Outcome::Value(42), Duration::ZERO, Duration::ZERO);
        assert_eq!(entry.key(), &"key");
        assert_eq!(entry.value(), Some(&42));
        assert_eq!(entry.error(), None);
        assert!(!entry.is_error());
        assert_eq!(entry.to_result(), Ok(42));
    }

    #[test]
    fn test_error_entry() {
        let entry: CacheEntry<&str, i32, &str> =
            CacheEntry::new("key", Outcome::Error("boom"), Duration::ZERO, Duration::ZERO);
        assert!(entry.is_error());
        assert_eq!(entry.value(), None);
        assert_eq!(entry.error(), Some(&"boom"));
        assert_eq!(entry.to_result(), Err("boom"));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Outcome<i32, ()> = Ok(1).into();
        assert_eq!(ok, Outcome::Value(1));
        let err: Outcome<i32, &str> = Err("x").into();
        assert_eq!(err.as_result(), Err(&"x"));
    }

    #[test]
    fn test_touch_counts_hits() {
        let entry: CacheEntry<u8, u8, ()> = CacheEntry::new(
            1,
            Outcome::Value(2),
            Duration::from_secs(1),
            Duration::from_millis(2),
        );
        entry.touch(Duration::from_secs(2));
        entry.touch(Duration::from_secs(3));
        let m = entry.metrics();
        assert_eq!(m.hit_count, 2);
        assert_eq!(m.total_duration, Duration::from_millis(4));
        assert_eq!(m.last_access_time, Duration::from_secs(3));
    }

    #[test]
    fn test_compute_respects_cache_exception() {
        use crate::clock::ManualStopwatch;

        let clock = ManualStopwatch::new();
        let metrics = CoreCacheMetrics::new();
        let function: CacheFn<u32, u32, String> = Box::new(|k| {
            if *k == 0 {
                Err("zero".to_string())
            } else {
                Ok(k * 2)
            }
        });

        let entry = CacheEntry::compute(3, &3, &function, CacheOptions::NONE, &clock, &metrics)
            .unwrap();
        assert_eq!(entry.value(), Some(&6));

        let failed = CacheEntry::compute(0, &0, &function, CacheOptions::NONE, &clock, &metrics);
        assert_eq!(
            failed.unwrap_err(),
            CacheError::Computation("zero".to_string())
        );

        let cached = CacheEntry::compute(
            0,
            &0,
            &function,
            CacheOptions::CACHE_EXCEPTION,
            &clock,
            &metrics,
        )
        .unwrap();
        assert_eq!(cached.error(), Some(&"zero".to_string()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.computations, 2);
        assert_eq!(snapshot.cached_failures, 1);
    }

    #[test]
    fn test_debug_line() {
        let entry: CacheEntry<&str, i32, ()> =
            CacheEntry::new("key", Outcome::Value(7), Duration::ZERO, Duration::ZERO);
        let mut out = String::new();
        write_debug_line(&mut out, entry.key(), &entry);
        assert!(out.contains("\"key\" => 7"));
        assert!(out.contains("hits=0"));
        assert!(format!("{:?}", entry).contains("CacheEntry"));
    }
}

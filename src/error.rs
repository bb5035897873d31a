//! Error types for the memoization caches and the deduplication store.
//!
//! Three families of failures exist:
//!
//! - [`CacheError`]: returned by [`MemoCache::get_or_add`](crate::MemoCache::get_or_add).
//!   Either the cache was disposed, or the wrapped function failed (freshly, or
//!   re-raised from a cached error entry).
//! - [`ConfigError`]: returned by fallible constructors when a configuration
//!   parameter is out of range.
//! - [`StorageError`]: returned by [`CacheStorage`](crate::CacheStorage) and
//!   [`CacheReference`](crate::CacheReference) when a handle is used after it
//!   has been released.

use thiserror::Error;

/// Error returned by a memoization cache lookup.
///
/// `E` is the error type of the wrapped function. It is cloned out of the
/// cache when a cached failure is re-raised, so every caller observes the
/// identical value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError<E> {
    /// The cache was disposed before or while the lookup ran.
    #[error("cache has been disposed")]
    Disposed,

    /// The wrapped function failed for this key.
    #[error("cached function failed: {0:?}")]
    Computation(E),
}

impl<E> CacheError<E> {
    /// Returns the function error, if this is a computation failure.
    pub fn computation(&self) -> Option<&E> {
        match self {
            CacheError::Computation(e) => Some(e),
            CacheError::Disposed => None,
        }
    }

    /// Returns `true` if the lookup failed because the cache was disposed.
    pub fn is_disposed(&self) -> bool {
        matches!(self, CacheError::Disposed)
    }
}

/// Error returned when a cache configuration parameter is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `age_threshold` must be a finite fraction in `[0.0, 1.0]`.
    #[error("age threshold must be within [0.0, 1.0], got {0}")]
    AgeThreshold(f64),
}

/// Error returned by the reference-counted deduplication store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The reference was already released; its value is no longer reachable.
    #[error("cache reference has already been released")]
    Released,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_accessors() {
        let err: CacheError<&str> = CacheError::Computation("boom");
        assert_eq!(err.computation(), Some(&"boom"));
        assert!(!err.is_disposed());

        let disposed: CacheError<&str> = CacheError::Disposed;
        assert!(disposed.is_disposed());
        assert_eq!(disposed.computation(), None);
    }

    #[test]
    fn test_error_display() {
        let err: CacheError<&str> = CacheError::Computation("boom");
        assert!(err.to_string().contains("boom"));
        assert_eq!(
            CacheError::<()>::Disposed.to_string(),
            "cache has been disposed"
        );
        assert!(ConfigError::AgeThreshold(1.5).to_string().contains("1.5"));
        assert!(StorageError::Released.to_string().contains("released"));
    }
}

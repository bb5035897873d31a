//! Keyed Stores
//!
//! The caches keep their entries in one of two concurrent key/value tables:
//!
//! | Store | Keys | Identity | Used by |
//! |-------|------|----------|---------|
//! | [`StrongStore`] | owned by the entry | [`Equivalence`] (hash + equality) | [`RankedCache`](crate::RankedCache), [`CacheStorage`](crate::CacheStorage) |
//! | [`WeakStore`] | weak handles | allocation identity | [`WeakLruCache`](crate::WeakLruCache) |
//!
//! Both partition their contents across independent segments, each guarded by
//! its own `parking_lot::Mutex`:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  hash(key) ──▶ segment selection                          │
//! │                                                           │
//! │  ┌────────────┐ ┌────────────┐       ┌────────────┐       │
//! │  │ Segment 0  │ │ Segment 1  │  ...  │ Segment N-1│       │
//! │  │  Mutex     │ │  Mutex     │       │  Mutex     │       │
//! │  │  table     │ │  table     │       │  table     │       │
//! │  └────────────┘ └────────────┘       └────────────┘       │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Insert-if-absent
//!
//! Lookups that miss release the segment lock before the value is produced,
//! then re-lock and insert only if no other thread got there first. The loser
//! of such a race receives the winner's node and its own is dropped. No user
//! code ever runs under a segment lock.

mod strong;
mod weak;

pub use self::strong::{Keyed, StrongStore};
pub use self::weak::{WeakHandle, WeakKey, WeakStore};

use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::DefaultHashBuilder;

/// Segment count used by the stores unless told otherwise.
pub const DEFAULT_SEGMENTS: usize = 16;

/// Pluggable key equality for strong-keyed stores.
///
/// Two keys that are `equivalent` must produce the same `hash`.
///
/// # Examples
///
/// ```
/// use memo_cache::store::Equivalence;
///
/// /// Compares strings ignoring ASCII case.
/// #[derive(Clone, Debug)]
/// struct IgnoreCase;
///
/// impl Equivalence<String> for IgnoreCase {
///     fn equivalent(&self, a: &String, b: &String) -> bool {
///         a.eq_ignore_ascii_case(b)
///     }
///
///     fn hash(&self, value: &String) -> u64 {
///         value
///             .bytes()
///             .fold(0xcbf29ce484222325, |h, b| {
///                 (h ^ u64::from(b.to_ascii_lowercase())).wrapping_mul(0x100000001b3)
///             })
///     }
/// }
///
/// assert!(IgnoreCase.equivalent(&"Key".to_string(), &"KEY".to_string()));
/// assert_eq!(IgnoreCase.hash(&"Key".to_string()), IgnoreCase.hash(&"kEy".to_string()));
/// ```
pub trait Equivalence<T: ?Sized>: Send + Sync {
    /// Returns `true` if `a` and `b` denote the same key.
    fn equivalent(&self, a: &T, b: &T) -> bool;

    /// Hashes `value` consistently with [`equivalent`](Equivalence::equivalent).
    fn hash(&self, value: &T) -> u64;
}

/// Equivalence given by the key's own `Eq` and `Hash`.
#[derive(Clone, Default)]
pub struct DefaultEquivalence<S = DefaultHashBuilder> {
    hash_builder: S,
}

impl<S> DefaultEquivalence<S> {
    /// Uses `hash_builder` to hash keys.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self { hash_builder }
    }
}

impl<T, S> Equivalence<T> for DefaultEquivalence<S>
where
    T: Hash + Eq + ?Sized,
    S: BuildHasher + Send + Sync,
{
    #[inline]
    fn equivalent(&self, a: &T, b: &T) -> bool {
        a == b
    }

    #[inline]
    fn hash(&self, value: &T) -> u64 {
        self.hash_builder.hash_one(value)
    }
}

impl<S> fmt::Debug for DefaultEquivalence<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultEquivalence")
    }
}

/// Picks a segment from a hash.
///
/// The hash tables inside a segment index buckets by the low bits, so the
/// segment is chosen from the high half.
#[inline]
fn segment_for(hash: u64, segments: usize) -> usize {
    ((hash >> 32) as usize) % segments
}

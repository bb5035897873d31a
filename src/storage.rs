//! Reference-Counted Deduplication Store
//!
//! [`CacheStorage`] interns values: asking for a value equal to one already
//! stored returns a handle to the stored copy instead of storing a second one.
//! Every [`CacheReference`] owns one count on its entry; the entry leaves the
//! store when its last reference is released.
//!
//! # Reference Count
//!
//! ```text
//!   inserted ──▶ UNCLAIMED ──claim──▶ 1 ──acquire──▶ 2 ──▶ ... ──▶ n
//!                                     ▲                            │
//!                                     └─────────── release ────────┘
//!                                     │
//!                                  release (last)
//!                                     ▼
//!                             0 + removed from store   (one step, under the
//!                                                       entry's segment lock)
//! ```
//!
//! A count of zero is terminal. Acquiring an entry at zero fails, and the
//! caller retries against the store, where the entry is already gone.
//!
//! # Example
//!
//! ```
//! use memo_cache::CacheStorage;
//!
//! let storage = CacheStorage::new();
//! let mut a = storage.get_entry(String::from("shared"));
//! let b = storage.get_entry(String::from("shared"));
//!
//! assert!(a.ptr_eq(&b));
//! assert_eq!(storage.len(), 1);
//! assert_eq!(storage.ref_count(&"shared".to_string()), Some(2));
//!
//! a.dispose().unwrap();
//! assert!(a.value().is_err());
//! drop(b);
//! assert!(storage.is_empty());
//! ```

use crate::error::StorageError;
use crate::store::{DefaultEquivalence, Equivalence, Keyed, StrongStore};
use core::fmt;
use core::hash::Hash;
use std::process;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Count of an entry that was inserted but not yet handed out.
const UNCLAIMED: i32 = i32::MIN;

/// A stored value and the number of live references to it.
pub struct StorageEntry<T> {
    value: Arc<T>,
    ref_count: AtomicI32,
}

impl<T> StorageEntry<T> {
    fn unclaimed(value: Arc<T>) -> Self {
        Self {
            value,
            ref_count: AtomicI32::new(UNCLAIMED),
        }
    }

    /// The stored value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Number of live references. Zero for an entry not yet claimed.
    pub fn ref_count(&self) -> usize {
        match self.ref_count.load(Ordering::Acquire) {
            UNCLAIMED => 0,
            n => n.max(0) as usize,
        }
    }

    /// Adds one reference. Fails once the count has dropped to zero.
    fn try_acquire(&self) -> bool {
        let mut current = self.ref_count.load(Ordering::Acquire);
        loop {
            let next = match current {
                0 => return false,
                UNCLAIMED => 1,
                n => match n.checked_add(1) {
                    Some(next) => next,
                    None => process::abort(),
                },
            };
            match self.ref_count.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<T> Keyed for StorageEntry<T> {
    type Key = T;

    fn key(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for StorageEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEntry")
            .field("value", &self.value)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Concurrent deduplication store handing out reference-counted handles.
///
/// Values are compared with an [`Equivalence`]; the default uses `Eq` and
/// `Hash`. Clones share the same underlying store.
pub struct CacheStorage<T, Q = DefaultEquivalence> {
    store: Arc<StrongStore<StorageEntry<T>, Q>>,
}

impl<T: Hash + Eq> CacheStorage<T, DefaultEquivalence> {
    /// Creates an empty store comparing values by `Eq`.
    pub fn new() -> Self {
        Self::with_equivalence(DefaultEquivalence::default())
    }
}

impl<T: Hash + Eq> Default for CacheStorage<T, DefaultEquivalence> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, Q: Equivalence<T>> CacheStorage<T, Q> {
    /// Creates an empty store comparing values with `equivalence`.
    pub fn with_equivalence(equivalence: Q) -> Self {
        Self {
            store: Arc::new(StrongStore::new(equivalence)),
        }
    }

    /// Returns a reference to the stored value equal to `value`, storing
    /// `value` first if no equal value is present.
    pub fn get_entry(&self, value: T) -> CacheReference<T, Q> {
        let value = Arc::new(value);
        loop {
            if let Some(existing) = self.store.get(&value) {
                if existing.try_acquire() {
                    return self.reference(existing);
                }
                // released concurrently; its removal is already done or pending
                continue;
            }

            let created = Arc::new(StorageEntry::unclaimed(Arc::clone(&value)));
            let entry = match self.store.try_insert(created) {
                Ok(inserted) => {
                    trace!("Inserted new storage entry");
                    inserted
                }
                Err(existing) => existing,
            };
            if entry.try_acquire() {
                return self.reference(entry);
            }
        }
    }

    /// Releases `reference`, removing its entry once no reference is left.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Released`] if the reference was already
    /// released.
    pub fn release_entry(&self, reference: &mut CacheReference<T, Q>) -> Result<(), StorageError> {
        reference.dispose()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if no value is stored.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns `true` if a value equal to `value` is stored.
    pub fn contains(&self, value: &T) -> bool {
        self.store.get(value).is_some()
    }

    /// Number of live references to the value equal to `value`.
    pub fn ref_count(&self, value: &T) -> Option<usize> {
        self.store.get(value).map(|entry| entry.ref_count())
    }

    fn reference(&self, entry: Arc<StorageEntry<T>>) -> CacheReference<T, Q> {
        CacheReference {
            store: Arc::clone(&self.store),
            entry: Some(entry),
        }
    }
}

impl<T, Q> Clone for CacheStorage<T, Q> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<T, Q: Equivalence<T>> fmt::Debug for CacheStorage<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStorage")
            .field("len", &self.store.len())
            .finish()
    }
}

/// Handle to a value interned by a [`CacheStorage`].
///
/// Owns one count on the entry. The count is given back by
/// [`dispose`](CacheReference::dispose) or, if that was never called, on drop.
/// Cloning a live reference acquires another count.
pub struct CacheReference<T, Q: Equivalence<T> = DefaultEquivalence> {
    store: Arc<StrongStore<StorageEntry<T>, Q>>,
    entry: Option<Arc<StorageEntry<T>>>,
}

impl<T, Q: Equivalence<T>> CacheReference<T, Q> {
    /// The referenced value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Released`] after the reference was disposed.
    pub fn value(&self) -> Result<&T, StorageError> {
        self.entry().map(StorageEntry::value)
    }

    /// The referenced store entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Released`] after the reference was disposed.
    pub fn entry(&self) -> Result<&StorageEntry<T>, StorageError> {
        self.entry.as_deref().ok_or(StorageError::Released)
    }

    /// Returns `true` once the reference was disposed.
    pub fn is_released(&self) -> bool {
        self.entry.is_none()
    }

    /// Returns `true` if both references point at the same live entry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.entry, &other.entry) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Gives the reference's count back to the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Released`] if the reference was already
    /// disposed. The count is never given back twice.
    pub fn dispose(&mut self) -> Result<(), StorageError> {
        let entry = self.entry.take().ok_or(StorageError::Released)?;
        let removed = self.store.remove_when(&entry, || {
            entry.ref_count.fetch_sub(1, Ordering::AcqRel) == 1
        });
        if removed {
            trace!("Removed storage entry after its last reference");
        }
        Ok(())
    }
}

impl<T, Q: Equivalence<T>> Clone for CacheReference<T, Q> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            entry: self
                .entry
                .as_ref()
                .filter(|entry| entry.try_acquire())
                .map(Arc::clone),
        }
    }
}

impl<T, Q: Equivalence<T>> Drop for CacheReference<T, Q> {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}

impl<T: fmt::Debug, Q: Equivalence<T>> fmt::Debug for CacheReference<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => f.debug_tuple("CacheReference").field(entry).finish(),
            None => f.write_str("CacheReference(<released>)"),
        }
    }
}

//! Weak-keyed concurrent store.
//!
//! Keys are compared by the identity of the allocation they point to, never
//! by value. The store holds only a weak handle to each key, so a key whose
//! last strong reference is dropped gets reclaimed even while its entry is
//! still stored.
//!
//! # Identity Reuse
//!
//! An identity derived from an address could be reused by a new allocation
//! once the old key is freed. A `Weak<T>` keeps the allocation (not the value)
//! alive until the handle itself is dropped, so as long as a slot holds its
//! handle no other key can show up with the same identity.

use super::segment_for;
use super::DEFAULT_SEGMENTS;
use core::fmt;
use core::hash::BuildHasher;
use hashbrown::hash_map::Entry;
use hashbrown::{DefaultHashBuilder, HashMap};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Non-owning handle to a key.
pub trait WeakHandle: Send + Sync {
    /// The owning key type this handle resolves to.
    type Strong;

    /// Returns the key if it is still alive.
    fn try_resolve(&self) -> Option<Self::Strong>;

    /// Returns `true` once the key has been reclaimed.
    fn is_reclaimed(&self) -> bool;
}

/// A key type that can be held weakly and compared by identity.
///
/// # Contract
///
/// While any handle produced by [`downgrade`](WeakKey::downgrade) exists, no
/// other key may report the same [`identity`](WeakKey::identity).
pub trait WeakKey: Clone + Send + Sync {
    /// Handle type stored in place of the key.
    type Handle: WeakHandle<Strong = Self>;

    /// Creates a non-owning handle to this key.
    fn downgrade(&self) -> Self::Handle;

    /// Identity of the referenced allocation.
    fn identity(&self) -> usize;
}

impl<T: ?Sized + Send + Sync> WeakHandle for Weak<T> {
    type Strong = Arc<T>;

    #[inline]
    fn try_resolve(&self) -> Option<Arc<T>> {
        self.upgrade()
    }

    #[inline]
    fn is_reclaimed(&self) -> bool {
        self.strong_count() == 0
    }
}

impl<T: ?Sized + Send + Sync> WeakKey for Arc<T> {
    type Handle = Weak<T>;

    #[inline]
    fn downgrade(&self) -> Weak<T> {
        Arc::downgrade(self)
    }

    #[inline]
    fn identity(&self) -> usize {
        Arc::as_ptr(self).cast::<()>() as usize
    }
}

struct WeakSlot<K: WeakKey, T> {
    key: K::Handle,
    node: Arc<T>,
}

/// Concurrent table from weakly held keys to `Arc<T>` nodes.
pub struct WeakStore<K: WeakKey, T> {
    segments: Box<[Mutex<HashMap<usize, WeakSlot<K, T>>>]>,
    hash_builder: DefaultHashBuilder,
}

impl<K: WeakKey, T> WeakStore<K, T> {
    /// Creates an empty store with [`DEFAULT_SEGMENTS`] segments.
    pub fn new() -> Self {
        Self::with_segments(DEFAULT_SEGMENTS)
    }

    /// Creates an empty store with `segments` segments (at least one).
    pub fn with_segments(segments: usize) -> Self {
        let segments: Vec<_> = (0..segments.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            segments: segments.into_boxed_slice(),
            hash_builder: DefaultHashBuilder::default(),
        }
    }

    #[inline]
    fn segment(&self, identity: usize) -> &Mutex<HashMap<usize, WeakSlot<K, T>>> {
        let hash = self.hash_builder.hash_one(identity);
        &self.segments[segment_for(hash, self.segments.len())]
    }

    /// Returns the node stored for `key`, if any.
    pub fn get(&self, key: &K) -> Option<Arc<T>> {
        let identity = key.identity();
        let slots = self.segment(identity).lock();
        slots.get(&identity).map(|slot| Arc::clone(&slot.node))
    }

    /// Stores `node` for `key` unless a node is already stored.
    ///
    /// Returns `Ok(node)` if it was inserted, or `Err(existing)`.
    pub fn try_insert(&self, key: &K, node: Arc<T>) -> Result<Arc<T>, Arc<T>> {
        let identity = key.identity();
        let mut slots = self.segment(identity).lock();
        match slots.entry(identity) {
            Entry::Occupied(existing) => Err(Arc::clone(&existing.get().node)),
            Entry::Vacant(vacant) => {
                vacant.insert(WeakSlot {
                    key: key.downgrade(),
                    node: Arc::clone(&node),
                });
                Ok(node)
            }
        }
    }

    /// Returns the node stored for `key`, creating it with `create` on a miss.
    ///
    /// `create` runs without any lock held. The flag is `true` if the returned
    /// node was created by this call.
    ///
    /// # Errors
    ///
    /// Propagates the error of `create`; nothing is inserted in that case.
    pub fn get_or_insert_with<X>(
        &self,
        key: &K,
        create: impl FnOnce() -> Result<Arc<T>, X>,
    ) -> Result<(Arc<T>, bool), X> {
        if let Some(found) = self.get(key) {
            return Ok((found, false));
        }
        let node = create()?;
        match self.try_insert(key, node) {
            Ok(node) => Ok((node, true)),
            Err(existing) => Ok((existing, false)),
        }
    }

    /// Removes the slot for `identity` if it still holds `node`.
    ///
    /// Works after the key has been reclaimed.
    pub fn remove(&self, identity: usize, node: &Arc<T>) -> bool {
        let mut slots = self.segment(identity).lock();
        match slots.entry(identity) {
            Entry::Occupied(slot) if Arc::ptr_eq(&slot.get().node, node) => {
                slot.remove();
                true
            }
            _ => false,
        }
    }

    /// Returns the number of stored slots, including slots whose key was
    /// reclaimed.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.lock().len()).sum()
    }

    /// Returns `true` if no slot is stored.
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.lock().is_empty())
    }

    /// Number of stored slots whose key has been reclaimed.
    pub fn reclaimed_len(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.lock().values().filter(|slot| slot.key.is_reclaimed()).count())
            .sum()
    }

    /// Removes and returns every stored node.
    pub fn drain(&self) -> Vec<Arc<T>> {
        let mut nodes = Vec::new();
        for segment in self.segments.iter() {
            nodes.extend(segment.lock().drain().map(|(_, slot)| slot.node));
        }
        nodes
    }
}

impl<K: WeakKey, T> Default for WeakStore<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: WeakKey, T> fmt::Debug for WeakStore<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("len", &self.len())
            .field("segments", &self.segments.len())
            .finish()
    }
}

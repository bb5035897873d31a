//! Strong-keyed concurrent store.

use super::{segment_for, Equivalence, DEFAULT_SEGMENTS};
use core::fmt;
use hashbrown::hash_table::Entry;
use hashbrown::HashTable;
use parking_lot::Mutex;
use std::sync::Arc;

/// A node that carries its own lookup key.
///
/// Stores hold `Arc<N>` and locate nodes through the key they expose.
pub trait Keyed {
    /// Lookup key type.
    type Key: ?Sized;

    /// Returns the node's key.
    fn key(&self) -> &Self::Key;
}

/// Concurrent table of `Arc<N>` nodes, keyed by [`Keyed::key`] under an
/// [`Equivalence`].
///
/// Removal is by node identity (`Arc::ptr_eq`), never by key, so a stale node
/// can never evict a newer node stored under an equivalent key.
pub struct StrongStore<N: Keyed, Q> {
    segments: Box<[Mutex<HashTable<Arc<N>>>]>,
    equivalence: Q,
}

impl<N: Keyed, Q: Equivalence<N::Key>> StrongStore<N, Q> {
    /// Creates an empty store with [`DEFAULT_SEGMENTS`] segments.
    pub fn new(equivalence: Q) -> Self {
        Self::with_segments(equivalence, DEFAULT_SEGMENTS)
    }

    /// Creates an empty store with `segments` segments (at least one).
    pub fn with_segments(equivalence: Q, segments: usize) -> Self {
        let segments: Vec<_> = (0..segments.max(1))
            .map(|_| Mutex::new(HashTable::new()))
            .collect();
        Self {
            segments: segments.into_boxed_slice(),
            equivalence,
        }
    }

    #[inline]
    fn segment(&self, hash: u64) -> &Mutex<HashTable<Arc<N>>> {
        &self.segments[segment_for(hash, self.segments.len())]
    }

    /// The equivalence used to compare keys.
    pub fn equivalence(&self) -> &Q {
        &self.equivalence
    }

    /// Returns the number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns the node stored under `key`, if any.
    pub fn get(&self, key: &N::Key) -> Option<Arc<N>> {
        let hash = self.equivalence.hash(key);
        let table = self.segment(hash).lock();
        table
            .find(hash, |n| self.equivalence.equivalent(n.key(), key))
            .cloned()
    }

    /// Inserts `node` unless a node with an equivalent key is present.
    ///
    /// Returns `Ok(node)` if it was inserted, or `Err(existing)` with the node
    /// already stored.
    pub fn try_insert(&self, node: Arc<N>) -> Result<Arc<N>, Arc<N>> {
        let hash = self.equivalence.hash(node.key());
        let mut table = self.segment(hash).lock();
        let entry = table.entry(
            hash,
            |n| self.equivalence.equivalent(n.key(), node.key()),
            |n| self.equivalence.hash(n.key()),
        );
        match entry {
            Entry::Occupied(existing) => Err(Arc::clone(existing.get())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&node));
                Ok(node)
            }
        }
    }

    /// Returns the node stored under `key`, creating it with `create` on a
    /// miss.
    ///
    /// `create` runs without any lock held and must produce a node whose key
    /// is equivalent to `key`. The flag is `true` if the returned node was
    /// created by this call; under a race the other thread's node is returned
    /// and the flag is `false`.
    ///
    /// # Errors
    ///
    /// Propagates the error of `create`; nothing is inserted in that case.
    pub fn get_or_insert_with<X>(
        &self,
        key: &N::Key,
        create: impl FnOnce() -> Result<Arc<N>, X>,
    ) -> Result<(Arc<N>, bool), X> {
        if let Some(found) = self.get(key) {
            return Ok((found, false));
        }
        let node = create()?;
        match self.try_insert(node) {
            Ok(node) => Ok((node, true)),
            Err(existing) => Ok((existing, false)),
        }
    }

    /// Removes `node` if it is still stored.
    pub fn remove(&self, node: &Arc<N>) -> bool {
        self.remove_when(node, || true)
    }

    /// Evaluates `condition` under the segment lock of `node` and removes the
    /// node if it returns `true`.
    ///
    /// No lookup or insertion on the same segment can interleave between the
    /// evaluation and the removal.
    pub fn remove_when(&self, node: &Arc<N>, condition: impl FnOnce() -> bool) -> bool {
        let hash = self.equivalence.hash(node.key());
        let mut table = self.segment(hash).lock();
        if !condition() {
            return false;
        }
        match table.find_entry(hash, |n| Arc::ptr_eq(n, node)) {
            Ok(found) => {
                found.remove();
                true
            }
            Err(_) => false,
        }
    }

    /// Returns the number of stored nodes.
    ///
    /// Segments are locked one after the other, so the result may be stale
    /// under concurrent modification.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.lock().len()).sum()
    }

    /// Returns `true` if no node is stored.
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.lock().is_empty())
    }

    /// Clones out every stored node.
    pub fn snapshot(&self) -> Vec<Arc<N>> {
        let mut nodes = Vec::new();
        for segment in self.segments.iter() {
            nodes.extend(segment.lock().iter().cloned());
        }
        nodes
    }

    /// Removes and returns every stored node.
    ///
    /// The nodes are dropped by the caller, outside the segment locks.
    pub fn drain(&self) -> Vec<Arc<N>> {
        let mut nodes = Vec::new();
        for segment in self.segments.iter() {
            nodes.extend(segment.lock().drain());
        }
        nodes
    }
}

impl<N: Keyed, Q: Equivalence<N::Key>> fmt::Debug for StrongStore<N, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongStore")
            .field("len", &self.len())
            .field("segments", &self.segments.len())
            .finish()
    }
}

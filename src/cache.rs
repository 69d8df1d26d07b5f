//! Paired identity caches for cacheable reference fields.
//!
//! The encode side maps values to small integer indices, the decode side
//! maps indices back to values. The two tables are mirror images and must
//! stay in lock-step across a connection: the Nth cacheable value the sender
//! marshals in full lands at index N on both ends. Eviction is a fixed-size
//! slot array with a wrapping insertion cursor, so it is a pure function of
//! insertion order and both ends always agree.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{Error, Result};

/// Clamp a requested capacity into the u16 index space, with a floor of
/// one slot.
fn clamp_capacity(capacity: usize) -> usize {
    capacity.clamp(1, usize::from(u16::MAX) + 1)
}

/// Encode-side table: value identity to wire index.
///
/// Insertions are journaled so an abandoned frame can be rolled back: a
/// frame that never reaches the peer must not advance this table, or every
/// later index reference resolves to the wrong value on the far end.
#[derive(Debug)]
pub struct MarshalCache<V> {
    map: HashMap<V, u16>,
    slots: Vec<Option<V>>,
    cursor: usize,
    journal: Vec<(usize, V, Option<V>)>,
}

impl<V: Clone + Eq + Hash> MarshalCache<V> {
    /// Create a cache bounded to `capacity` slots. Degenerate capacities
    /// are clamped into the u16 index space.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = clamp_capacity(capacity);
        Self {
            map: HashMap::with_capacity(capacity),
            slots: vec![None; capacity],
            cursor: 0,
            journal: Vec::new(),
        }
    }

    /// Index of an already-cached value, if any.
    #[must_use]
    pub fn lookup(&self, value: &V) -> Option<u16> {
        self.map.get(value).copied()
    }

    /// Insert a value at the next slot, evicting that slot's previous
    /// occupant, and return the assigned index. The insertion is journaled
    /// until the next [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback).
    pub fn insert(&mut self, value: V) -> u16 {
        let slot = self.cursor;
        let evicted = self.slots[slot].take();
        if let Some(old) = &evicted {
            self.map.remove(old);
        }
        self.map.insert(value.clone(), slot as u16);
        self.slots[slot] = Some(value.clone());
        self.journal.push((slot, value, evicted));
        self.cursor = (slot + 1) % self.slots.len();
        slot as u16
    }

    /// Keep every insertion made since the last commit or rollback.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    /// Undo every insertion made since the last commit, restoring evicted
    /// occupants and the cursor.
    pub fn rollback(&mut self) {
        while let Some((slot, value, evicted)) = self.journal.pop() {
            self.map.remove(&value);
            if let Some(old) = &evicted {
                self.map.insert(old.clone(), slot as u16);
            }
            self.slots[slot] = evicted;
            self.cursor = slot;
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Decode-side table: wire index to value.
#[derive(Debug)]
pub struct UnmarshalCache<V> {
    slots: Vec<Option<V>>,
    cursor: usize,
}

impl<V: Clone> UnmarshalCache<V> {
    /// Create a cache bounded to `capacity` slots. Degenerate capacities
    /// are clamped into the u16 index space.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; clamp_capacity(capacity)],
            cursor: 0,
        }
    }

    /// Store a freshly decoded value at the next slot, mirroring the
    /// encoder's assignment, and return the index it received.
    pub fn insert(&mut self, value: V) -> u16 {
        let index = self.cursor as u16;
        self.slots[self.cursor] = Some(value);
        self.cursor = (self.cursor + 1) % self.slots.len();
        index
    }

    /// Resolve a wire index. An index that was never populated means the two
    /// ends have diverged, which is fatal to the connection.
    pub fn get(&self, index: u16) -> Result<&V> {
        self.slots
            .get(usize::from(index))
            .and_then(Option::as_ref)
            .ok_or(Error::CacheIndexMiss { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_index_assignment() {
        let mut cache = MarshalCache::new(8);
        assert_eq!(cache.insert("conn-1"), 0);
        assert_eq!(cache.insert("conn-2"), 1);
        assert_eq!(cache.insert("conn-3"), 2);
        assert_eq!(cache.lookup(&"conn-2"), Some(1));
        assert_eq!(cache.lookup(&"conn-9"), None);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_wrap_eviction_removes_old_mapping() {
        let mut cache = MarshalCache::new(2);
        cache.insert("a");
        cache.insert("b");
        // Cursor wraps: "c" takes slot 0 and evicts "a".
        assert_eq!(cache.insert("c"), 0);
        assert_eq!(cache.lookup(&"a"), None);
        assert_eq!(cache.lookup(&"b"), Some(1));
        assert_eq!(cache.lookup(&"c"), Some(0));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_unmarshal_cache_mirrors_indices() {
        let mut encode = MarshalCache::new(4);
        let mut decode = UnmarshalCache::new(4);

        for value in ["x", "y", "z"] {
            let sent = encode.insert(value);
            let received = decode.insert(value);
            assert_eq!(sent, received);
        }
        assert_eq!(*decode.get(1).unwrap(), "y");
    }

    #[test]
    fn test_unpopulated_index_is_a_miss() {
        let cache: UnmarshalCache<&str> = UnmarshalCache::new(4);
        assert!(matches!(
            cache.get(2),
            Err(Error::CacheIndexMiss { index: 2 })
        ));
        // Out-of-range indices fail the same way.
        let mut small = UnmarshalCache::new(2);
        small.insert("a");
        assert!(matches!(
            small.get(40),
            Err(Error::CacheIndexMiss { index: 40 })
        ));
    }

    #[test]
    fn test_rollback_restores_evicted_entries_and_cursor() {
        let mut cache = MarshalCache::new(2);
        cache.insert("a");
        cache.insert("b");
        cache.commit();

        // "c" evicts "a", "d" evicts "b"; neither survives the rollback.
        cache.insert("c");
        cache.insert("d");
        cache.rollback();

        assert_eq!(cache.lookup(&"a"), Some(0));
        assert_eq!(cache.lookup(&"b"), Some(1));
        assert_eq!(cache.lookup(&"c"), None);
        assert_eq!(cache.lookup(&"d"), None);
        assert_eq!(cache.len(), 2);
        // The cursor resumes where the rolled-back insertions started.
        assert_eq!(cache.insert("e"), 0);
    }

    #[test]
    fn test_rollback_without_insertions_is_a_no_op() {
        let mut cache = MarshalCache::new(4);
        cache.insert("a");
        cache.commit();
        cache.rollback();
        assert_eq!(cache.lookup(&"a"), Some(0));
        assert_eq!(cache.insert("b"), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped_to_one_slot() {
        let mut encode = MarshalCache::new(0);
        assert_eq!(encode.insert("a"), 0);
        // One slot: the next insert wraps and evicts.
        assert_eq!(encode.insert("b"), 0);
        assert_eq!(encode.lookup(&"a"), None);
        assert_eq!(encode.lookup(&"b"), Some(0));

        let mut decode = UnmarshalCache::new(0);
        assert_eq!(decode.insert("a"), 0);
        assert_eq!(*decode.get(0).unwrap(), "a");
    }

    #[test]
    fn test_wrap_is_deterministic_on_both_sides() {
        let mut encode = MarshalCache::new(2);
        let mut decode = UnmarshalCache::new(2);

        for value in ["a", "b", "c", "d", "e"] {
            assert_eq!(encode.insert(value), decode.insert(value));
        }
        // After wrapping twice, slot 0 holds "e" and slot 1 holds "d".
        assert_eq!(*decode.get(0).unwrap(), "e");
        assert_eq!(*decode.get(1).unwrap(), "d");
        assert_eq!(encode.lookup(&"e"), Some(0));
        assert_eq!(encode.lookup(&"d"), Some(1));
    }
}

//! Undo journals for in-memory ledger state.
//!
//! While a unit is being processed every change is journaled. If the pipeline fails or is
//! dropped half way, `rollback` restores the exact previous contents; on success `commit`
//! drops the journal and reports which keys changed so they can be persisted.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::RangeBounds;

#[derive(Debug, Clone)]
pub struct JournaledMap<K, V> {
    entries: BTreeMap<K, V>,
    /// Original value of each key touched since `begin`, `None` if it was absent.
    undo: Option<BTreeMap<K, Option<V>>>,
}

impl<K: Ord + Clone, V: Clone> Default for JournaledMap<K, V> {
    fn default() -> Self { Self::new() }
}

impl<K: Ord + Clone, V: Clone> JournaledMap<K, V> {
    pub fn new() -> Self { Self { entries: BTreeMap::new(), undo: None } }

    pub fn begin(&mut self) { self.undo = Some(BTreeMap::new()); }

    pub fn is_journaling(&self) -> bool { self.undo.is_some() }

    fn remember(&mut self, key: &K) {
        if let Some(undo) = &mut self.undo {
            if !undo.contains_key(key) {
                undo.insert(key.clone(), self.entries.get(key).cloned());
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> { self.entries.get(key) }

    pub fn contains_key(&self, key: &K) -> bool { self.entries.contains_key(key) }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.remember(key);
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.remember(&key);
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.remember(key);
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> btree_map::Iter<'_, K, V> { self.entries.iter() }

    pub fn keys(&self) -> btree_map::Keys<'_, K, V> { self.entries.keys() }

    pub fn range<R: RangeBounds<K>>(&self, range: R) -> btree_map::Range<'_, K, V> { self.entries.range(range) }

    pub fn last_key_value(&self) -> Option<(&K, &V)> { self.entries.last_key_value() }

    /// Keys changed since `begin`.
    pub fn touched(&self) -> impl Iterator<Item = &K> { self.undo.iter().flat_map(|undo| undo.keys()) }

    pub fn rollback(&mut self) {
        if let Some(undo) = self.undo.take() {
            for (key, original) in undo {
                match original {
                    Some(value) => self.entries.insert(key, value),
                    None => self.entries.remove(&key),
                };
            }
        }
    }

    pub fn commit(&mut self) { self.undo = None; }
}

/// A single journaled value.
#[derive(Debug, Clone, Default)]
pub struct JournaledCell<T> {
    value: T,
    undo: Option<T>,
}

impl<T: Clone> JournaledCell<T> {
    pub fn new(value: T) -> Self { Self { value, undo: None } }

    pub fn begin(&mut self) { self.undo = Some(self.value.clone()); }

    pub fn get(&self) -> &T { &self.value }

    pub fn set(&mut self, value: T) { self.value = value; }

    pub fn get_mut(&mut self) -> &mut T { &mut self.value }

    pub fn rollback(&mut self) {
        if let Some(value) = self.undo.take() {
            self.value = value;
        }
    }

    pub fn commit(&mut self) { self.undo = None; }
}

//! Ordered map used while accumulating index entries and per-family scores.
//!
//! Keys are either plain integers or [`Word`]s. Words compare by
//! `(prefix, suffix)`, so an in-order walk yields entries in exactly the
//! order the index stores them.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::encode::Word;
use crate::error::{Error, Result};

/// Keys accepted by [`WordTree`]: a strict total order, cheap to copy.
pub trait TreeKey: Ord + Copy + std::fmt::Debug {}

impl TreeKey for u64 {}
impl TreeKey for Word {}

/// Ordered map that rejects duplicate keys.
#[derive(Clone, Debug)]
pub struct WordTree<K: TreeKey, V> {
    nodes: BTreeMap<K, V>,
}

impl<K: TreeKey, V> Default for WordTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TreeKey, V> WordTree<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert `value` under `key`; `DuplicateKey` if the key is present.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        match self.nodes.entry(key) {
            Entry::Occupied(_) => Err(Error::DuplicateKey),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.nodes.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.nodes.get_mut(key)
    }

    /// Remove `key`, handing its value to `on_evict`.
    pub fn remove<F: FnOnce(V)>(&mut self, key: &K, on_evict: F) -> Result<()> {
        let value = self.nodes.remove(key).ok_or(Error::NotFound)?;
        on_evict(value);
        Ok(())
    }

    /// In-order walk. The first error returned by `visit` stops the walk.
    pub fn walk<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&K, &V) -> Result<(), E>,
    {
        for (k, v) in &self.nodes {
            visit(k, v)?;
        }
        Ok(())
    }

    /// Empty the tree, handing every value to `on_evict` in key order.
    pub fn clear<F: FnMut(V)>(&mut self, mut on_evict: F) {
        for (_, v) in std::mem::take(&mut self.nodes) {
            on_evict(v);
        }
    }

    /// Consume the tree, yielding entries in ascending key order.
    pub fn into_sorted(self) -> impl Iterator<Item = (K, V)> {
        self.nodes.into_iter()
    }
}

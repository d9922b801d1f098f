//! Entry Table: the primary storage, a lock-free concurrent map from
//! fingerprint to [`Entry`]. Grounded on `AsyncGlobalCache`'s choice of
//! `DashMap` over `RwLock<HashMap>`, generalized here to be the default
//! storage for every configuration rather than an async-only variant.

use crate::entry::Entry;
use dashmap::mapref::one::{Ref, RefMut};
use dashmap::DashMap;
use std::time::Instant;

pub struct EntryTable<V> {
    inner: DashMap<String, Entry<V>>,
}

impl<V> EntryTable<V> {
    pub fn new() -> Self {
        EntryTable { inner: DashMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<Ref<'_, String, Entry<V>>> {
        self.inner.get(key)
    }

    pub fn get_mut(&self, key: &str) -> Option<RefMut<'_, String, Entry<V>>> {
        self.inner.get_mut(key)
    }

    pub fn insert(&self, key: String, entry: Entry<V>) {
        self.inner.insert(key, entry);
    }

    pub fn remove(&self, key: &str) -> Option<Entry<V>> {
        self.inner.remove(key).map(|(_, e)| e)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn iter(&self) -> dashmap::iter::Iter<'_, String, Entry<V>> {
        self.inner.iter()
    }

    /// Removes every entry whose `absolute_expiration` has passed as of `now`.
    /// Returns the removed keys (callers de-index them from the tag index).
    pub fn sweep_expired(&self, now: Instant, sample: Option<usize>) -> Vec<(String, Option<std::collections::HashSet<String>>)> {
        let candidates: Vec<String> = match sample {
            Some(n) => self.inner.iter().take(n).map(|e| e.key().clone()).collect(),
            None => self.inner.iter().map(|e| e.key().clone()).collect(),
        };
        let mut removed = Vec::new();
        for key in candidates {
            let expired = self
                .inner
                .get(&key)
                .map(|e| e.is_expired(now))
                .unwrap_or(false);
            if expired {
                if let Some((_, entry)) = self.inner.remove(&key) {
                    removed.push((key, entry.tags));
                }
            }
        }
        removed
    }
}

impl<V> Default for EntryTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

// src/core/storage/db/shard.rs

//! Defines the `DbShard` and `ShardCache` structs, the fundamental storage
//! units within a `Db`.

use crate::core::storage::data_types::StoredValue;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A `DbShard` is a single, concurrent slice of the database: a
/// mutex-guarded `ShardCache` plus an atomic key counter readable without
/// the lock.
#[derive(Debug)]
pub struct DbShard {
    pub entries: Mutex<ShardCache>,
    pub key_count: Arc<AtomicUsize>,
}

impl DbShard {
    pub(super) fn new() -> Self {
        let key_count = Arc::new(AtomicUsize::new(0));
        Self {
            entries: Mutex::new(ShardCache::new(key_count.clone())),
            key_count,
        }
    }
}

/// The key-value map of one shard, with key-count accounting.
#[derive(Debug)]
pub struct ShardCache {
    store: HashMap<Bytes, StoredValue>,
    key_counter: Arc<AtomicUsize>,
}

impl ShardCache {
    fn new(key_counter: Arc<AtomicUsize>) -> Self {
        Self {
            store: HashMap::new(),
            key_counter,
        }
    }

    /// Inserts a key-value pair, returning the displaced value if the key
    /// already existed. The old value object is disposed by the caller
    /// dropping it.
    pub fn put(&mut self, key: Bytes, value: StoredValue) -> Option<StoredValue> {
        let old = self.store.insert(key, value);
        if old.is_none() {
            self.key_counter.fetch_add(1, Ordering::Relaxed);
        }
        old
    }

    /// Removes a key, returning its value if present.
    pub fn pop(&mut self, key: &Bytes) -> Option<StoredValue> {
        let popped = self.store.remove(key);
        if popped.is_some() {
            self.key_counter.fetch_sub(1, Ordering::Relaxed);
        }
        popped
    }

    /// Looks at a value without expiry handling.
    pub fn peek(&self, key: &Bytes) -> Option<&StoredValue> {
        self.store.get(key)
    }

    /// Reads a value, lazily deleting it if expired. A read that observes
    /// an expired entry behaves as if the key were absent.
    pub fn get(&mut self, key: &Bytes) -> Option<&StoredValue> {
        if self.expire_if_needed(key) {
            return None;
        }
        self.store.get(key)
    }

    /// Mutable read with the same lazy-expiry behavior as `get`.
    pub fn get_mut(&mut self, key: &Bytes) -> Option<&mut StoredValue> {
        if self.expire_if_needed(key) {
            return None;
        }
        self.store.get_mut(key)
    }

    /// Gets a mutable reference, inserting the value produced by `f` if the
    /// key is absent (or lazily expired).
    pub fn get_or_insert_with_mut<F>(&mut self, key: Bytes, f: F) -> &mut StoredValue
    where
        F: FnOnce() -> StoredValue,
    {
        self.expire_if_needed(&key);
        if !self.store.contains_key(&key) {
            self.put(key.clone(), f());
        }
        self.store.get_mut(&key).unwrap()
    }

    /// Deletes the key if its value is expired. Returns whether it did.
    fn expire_if_needed(&mut self, key: &Bytes) -> bool {
        if self.store.get(key).is_some_and(|v| v.is_expired()) {
            self.pop(key);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.key_counter.store(0, Ordering::Relaxed);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &StoredValue)> {
        self.store.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::data_types::DataValue;
    use std::time::{Duration, Instant};

    fn cache() -> ShardCache {
        ShardCache::new(Arc::new(AtomicUsize::new(0)))
    }

    #[test]
    fn get_deletes_expired_entries() {
        let mut shard = cache();
        let mut value = StoredValue::new(DataValue::String(Bytes::from_static(b"v")));
        value.expiry = Some(Instant::now() - Duration::from_millis(5));
        shard.put(Bytes::from_static(b"k"), value);
        assert!(shard.get(&Bytes::from_static(b"k")).is_none());
        assert!(shard.peek(&Bytes::from_static(b"k")).is_none());
        assert_eq!(shard.len(), 0);
    }

    #[test]
    fn put_replaces_and_counts_once() {
        let mut shard = cache();
        let key = Bytes::from_static(b"k");
        assert!(shard
            .put(key.clone(), StoredValue::new(DataValue::Integer(1)))
            .is_none());
        let old = shard.put(key.clone(), StoredValue::new(DataValue::Integer(2)));
        assert_eq!(old.map(|v| v.data), Some(DataValue::Integer(1)));
        assert_eq!(shard.len(), 1);
    }
}

// src/core/storage/db/core.rs

//! `Db`: a single keyspace composed of multiple independently locked shards.

use super::shard::DbShard;
use super::transaction::TransactionState;
use bytes::Bytes;
use dashmap::DashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// The number of shards per database.
pub const NUM_SHARDS: usize = 16;

#[derive(Debug)]
pub struct Db {
    pub shards: Vec<Arc<DbShard>>,
    /// Queued-transaction state per session ID.
    pub tx_states: Arc<DashMap<u64, TransactionState>>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum PushDirection {
    Left,
    Right,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum PopDirection {
    Left,
    Right,
}

impl Db {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Arc::new(DbShard::new())).collect();
        Self {
            shards,
            tx_states: Arc::new(DashMap::new()),
        }
    }

    /// Calculates the shard index for a given key using hashing.
    pub fn get_shard_index(&self, key: &Bytes) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    pub fn get_shard(&self, index: usize) -> &Arc<DbShard> {
        &self.shards[index]
    }

    /// Total key count across shards. O(1), reads the atomic counters.
    pub fn key_count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.key_count.load(Ordering::Relaxed))
            .sum()
    }

    /// Clears all data from all shards.
    pub async fn clear_all_shards(&self) {
        for shard in &self.shards {
            shard.entries.lock().await.clear();
        }
    }

    /// Inserts a value during snapshot load, bypassing command dispatch.
    pub async fn insert_value_from_load(
        &self,
        key: Bytes,
        value: crate::core::storage::data_types::StoredValue,
    ) {
        let shard_index = self.get_shard_index(&key);
        let mut guard = self.shards[shard_index].entries.lock().await;
        guard.put(key, value);
    }

    // --- Transaction state management ---

    pub fn start_transaction(&self, session_id: u64) {
        self.tx_states
            .insert(session_id, TransactionState::new());
    }

    pub fn take_transaction_state(&self, session_id: u64) -> Option<TransactionState> {
        self.tx_states.remove(&session_id).map(|(_, state)| state)
    }

    pub fn discard_transaction(&self, session_id: u64) -> bool {
        self.tx_states.remove(&session_id).is_some()
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}

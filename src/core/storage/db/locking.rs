// src/core/storage/db/locking.rs

use super::core::{Db, NUM_SHARDS};
use super::shard::ShardCache;
use crate::core::commands::command_trait::CommandExt;
use crate::core::Command;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::MutexGuard;

/// `ExecutionLocks` holds the `MutexGuard`s needed to execute a command.
/// The variants correspond to the locking strategies a command may require.
pub enum ExecutionLocks<'a> {
    /// A lock on a single database shard.
    Single {
        shard_index: usize,
        guard: MutexGuard<'a, ShardCache>,
    },
    /// Locks on multiple specific shards, keyed by shard index.
    Multi {
        guards: BTreeMap<usize, MutexGuard<'a, ShardCache>>,
    },
    /// Locks on every shard.
    All {
        guards: Vec<MutexGuard<'a, ShardCache>>,
    },
    /// No locks are required.
    None,
}

impl Db {
    /// Determines and acquires the appropriate locks for a command based on
    /// the keys it operates on.
    pub async fn determine_locks_for_command<'a>(
        &'a self,
        command: &Command,
    ) -> ExecutionLocks<'a> {
        match command {
            // KEYS and SAVE need a consistent snapshot of the whole keyspace.
            Command::Keys(_) | Command::Save(_) => ExecutionLocks::All {
                guards: self.lock_all_shards().await,
            },
            _ => {
                let keys = command.get_keys();
                match keys.len() {
                    0 => ExecutionLocks::None,
                    1 => {
                        let shard_index = self.get_shard_index(&keys[0]);
                        ExecutionLocks::Single {
                            shard_index,
                            guard: self.get_shard(shard_index).entries.lock().await,
                        }
                    }
                    _ => ExecutionLocks::Multi {
                        guards: self.lock_shards_for_keys(&keys).await,
                    },
                }
            }
        }
    }

    /// Locks the shards covering `keys`, acquiring them in ascending index
    /// order so that concurrent multi-key commands cannot deadlock.
    pub async fn lock_shards_for_keys<'a>(
        &'a self,
        keys: &[Bytes],
    ) -> BTreeMap<usize, MutexGuard<'a, ShardCache>> {
        let indices: BTreeSet<usize> = keys.iter().map(|key| self.get_shard_index(key)).collect();
        let mut guards = BTreeMap::new();
        for index in indices {
            guards.insert(index, self.shards[index].entries.lock().await);
        }
        guards
    }

    /// Locks all shards in a fixed order (0 to NUM_SHARDS-1).
    pub async fn lock_all_shards<'a>(&'a self) -> Vec<MutexGuard<'a, ShardCache>> {
        let mut guards = Vec::with_capacity(NUM_SHARDS);
        for i in 0..NUM_SHARDS {
            guards.push(self.shards[i].entries.lock().await);
        }
        guards
    }
}

// src/core/storage/db/context.rs

//! The execution context handed to every command handler: the shared server
//! state, the database, and the shard locks acquired for the command.

use super::core::Db;
use super::locking::ExecutionLocks;
use super::shard::{DbShard, ShardCache};
use crate::core::state::ServerState;
use crate::core::{Command, OpalDBError};
use std::sync::Arc;
use tokio::sync::MutexGuard;

pub struct ExecutionContext<'a> {
    pub state: Arc<ServerState>,
    pub locks: ExecutionLocks<'a>,
    pub db: &'a Arc<Db>,
    pub command: Option<Command>,
    pub session_id: u64,
}

impl<'a> ExecutionContext<'a> {
    /// Returns the shard and guard for single-key commands.
    pub fn get_single_shard_context_mut(
        &mut self,
    ) -> Result<(&'a Arc<DbShard>, &mut MutexGuard<'a, ShardCache>), OpalDBError> {
        match &mut self.locks {
            ExecutionLocks::Single { shard_index, guard } => {
                Ok((self.db.get_shard(*shard_index), guard))
            }
            _ => Err(OpalDBError::Internal(
                "single-shard lock required for this command".into(),
            )),
        }
    }

    /// The guard covering `key` when multiple shards are locked, falling
    /// back to the single guard when only one is held.
    pub fn guard_for_key(
        &mut self,
        key: &bytes::Bytes,
    ) -> Option<&mut MutexGuard<'a, ShardCache>> {
        let shard_index = self.db.get_shard_index(key);
        match &mut self.locks {
            ExecutionLocks::Single {
                shard_index: held, ..
            } if *held != shard_index => None,
            ExecutionLocks::Single { guard, .. } => Some(guard),
            ExecutionLocks::Multi { guards } => guards.get_mut(&shard_index),
            ExecutionLocks::All { guards } => guards.get_mut(shard_index),
            ExecutionLocks::None => None,
        }
    }

    /// Drops all held locks. Blocking commands call this before suspending
    /// so that writers can reach the keys they wait on.
    pub fn release_locks(&mut self) {
        self.locks = ExecutionLocks::None;
    }

    /// Re-acquires the locks for the context's command after a blocking
    /// wait ends.
    pub async fn reacquire_locks_for_command(&mut self) -> Result<(), OpalDBError> {
        let command = self
            .command
            .clone()
            .ok_or_else(|| OpalDBError::Internal("no command to reacquire locks for".into()))?;
        self.locks = self.db.determine_locks_for_command(&command).await;
        Ok(())
    }
}

// src/core/commands/list/lpush.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::parse_key_and_values;
use crate::core::commands::list::logic::list_push_logic;
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::{ExecutionContext, PushDirection};
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct LPush {
    pub key: Bytes,
    pub values: Vec<Bytes>,
}

impl ParseCommand for LPush {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        let (key, values) = parse_key_and_values(args, 2, "lpush")?;
        Ok(LPush { key, values })
    }
}

#[async_trait]
impl ExecutableCommand for LPush {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let new_len = list_push_logic(ctx, &self.key, &self.values, PushDirection::Left)?;
        serve_blocked_readers(ctx, &self.key)?;
        Ok((
            RespValue::Integer(new_len as i64),
            WriteOutcome::Write { keys_modified: 1 },
        ))
    }
}

impl CommandSpec for LPush {
    fn name(&self) -> &'static str {
        "lpush"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        args.extend(self.values.iter().cloned());
        args
    }
}

/// Hands freshly pushed elements to any blocked BLPOP readers of `key`,
/// removing the key again if the hand-offs drained it. Shared by LPUSH and
/// RPUSH; runs while the push still holds the shard lock.
pub(super) fn serve_blocked_readers(
    ctx: &mut ExecutionContext<'_>,
    key: &Bytes,
) -> Result<(), OpalDBError> {
    let state = ctx.state.clone();
    let (_, guard) = ctx.get_single_shard_context_mut()?;
    let drained = {
        let Some(entry) = guard.get_mut(key) else {
            return Ok(());
        };
        let DataValue::List(list) = &mut entry.data else {
            return Ok(());
        };
        state.blocker_manager.serve_waiters(key, list);
        list.is_empty()
    };
    if drained {
        guard.pop(key);
    }
    Ok(())
}

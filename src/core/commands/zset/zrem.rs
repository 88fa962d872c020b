// src/core/commands/zset/zrem.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::parse_key_and_values;
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct ZRem {
    pub key: Bytes,
    pub members: Vec<Bytes>,
}

impl ParseCommand for ZRem {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        let (key, members) = parse_key_and_values(args, 2, "zrem")?;
        Ok(ZRem { key, members })
    }
}

#[async_trait]
impl ExecutableCommand for ZRem {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;

        let (removed, emptied) = {
            let Some(entry) = guard.get_mut(&self.key) else {
                return Ok((RespValue::Integer(0), WriteOutcome::DidNotWrite));
            };
            let DataValue::SortedSet(zset) = &mut entry.data else {
                return Err(OpalDBError::WrongType);
            };
            let mut removed = 0i64;
            for member in &self.members {
                if zset.remove(member) {
                    removed += 1;
                }
            }
            (removed, zset.is_empty())
        };
        if emptied {
            guard.pop(&self.key);
        }

        let outcome = if removed > 0 {
            WriteOutcome::Write { keys_modified: 1 }
        } else {
            WriteOutcome::DidNotWrite
        };
        Ok((RespValue::Integer(removed), outcome))
    }
}

impl CommandSpec for ZRem {
    fn name(&self) -> &'static str {
        "zrem"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        args.extend(self.members.iter().cloned());
        args
    }
}

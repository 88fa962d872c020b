// src/core/commands/list/rpush.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::parse_key_and_values;
use crate::core::commands::list::logic::list_push_logic;
use crate::core::commands::list::lpush::serve_blocked_readers;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::{ExecutionContext, PushDirection};
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct RPush {
    pub key: Bytes,
    pub values: Vec<Bytes>,
}

impl ParseCommand for RPush {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        let (key, values) = parse_key_and_values(args, 2, "rpush")?;
        Ok(RPush { key, values })
    }
}

#[async_trait]
impl ExecutableCommand for RPush {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let new_len = list_push_logic(ctx, &self.key, &self.values, PushDirection::Right)?;
        serve_blocked_readers(ctx, &self.key)?;
        Ok((
            RespValue::Integer(new_len as i64),
            WriteOutcome::Write { keys_modified: 1 },
        ))
    }
}

impl CommandSpec for RPush {
    fn name(&self) -> &'static str {
        "rpush"
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

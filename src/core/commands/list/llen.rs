// src/core/commands/list/llen.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct LLen {
    pub key: Bytes,
}

impl ParseCommand for LLen {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 1, "llen")?;
        Ok(LLen {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for LLen {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;
        let len = match guard.get(&self.key) {
            None => 0,
            Some(entry) => match &entry.data {
                DataValue::List(list) => list.len() as i64,
                _ => return Err(OpalDBError::WrongType),
            },
        };
        Ok((RespValue::Integer(len), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for LLen {
    fn name(&self) -> &'static str {
        "llen"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
}

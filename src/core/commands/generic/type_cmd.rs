// src/core/commands/generic/type_cmd.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    pub key: Bytes,
}

impl ParseCommand for TypeInfo {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 1, "type")?;
        Ok(TypeInfo {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for TypeInfo {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;
        let type_name = guard
            .get(&self.key)
            .map_or("none", |entry| entry.data.type_name());
        Ok((
            RespValue::SimpleString(type_name.into()),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for TypeInfo {
    fn name(&self) -> &'static str {
        "type"
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

// src/core/commands/zset/zcard.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::commands::zset::zrange::lookup_zset;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct ZCard {
    pub key: Bytes,
}

impl ParseCommand for ZCard {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 1, "zcard")?;
        Ok(ZCard {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for ZCard {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;
        let card = lookup_zset(guard, &self.key)?.map_or(0, |zset| zset.len() as i64);
        Ok((RespValue::Integer(card), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for ZCard {
    fn name(&self) -> &'static str {
        "zcard"
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

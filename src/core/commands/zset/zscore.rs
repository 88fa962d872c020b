// src/core/commands/zset/zscore.rs

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
pub struct ZScore {
    pub key: Bytes,
    pub member: Bytes,
}

impl ParseCommand for ZScore {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 2, "zscore")?;
        Ok(ZScore {
            key: extract_bytes(&args[0])?,
            member: extract_bytes(&args[1])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for ZScore {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;
        let response = match lookup_zset(guard, &self.key)? {
            None => RespValue::Null,
            Some(zset) => match zset.score(&self.member) {
                Some(score) => RespValue::BulkString(format_score(score).into()),
                None => RespValue::Null,
            },
        };
        Ok((response, WriteOutcome::DidNotWrite))
    }
}

/// Scores render in their shortest decimal form, integers without a
/// fractional part.
pub(super) fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e17 {
        format!("{}", score as i64)
    } else {
        format!("{score}")
    }
}

impl CommandSpec for ZScore {
    fn name(&self) -> &'static str {
        "zscore"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone(), self.member.clone()]
    }
}

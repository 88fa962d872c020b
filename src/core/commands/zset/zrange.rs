// src/core/commands/zset/zrange.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::commands::zset::zscore::format_score;
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::{ExecutionContext, ShardCache};
use crate::core::storage::zset::SortedSet;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::MutexGuard;

#[derive(Debug, Clone, Default)]
pub struct ZRange {
    pub key: Bytes,
    pub start: i64,
    pub stop: i64,
    pub with_scores: bool,
}

impl ParseCommand for ZRange {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.len() != 3 && args.len() != 4 {
            return Err(OpalDBError::WrongArgumentCount("zrange".to_string()));
        }
        let with_scores = if args.len() == 4 {
            if !extract_string(&args[3])?.eq_ignore_ascii_case("withscores") {
                return Err(OpalDBError::SyntaxError);
            }
            true
        } else {
            false
        };
        Ok(ZRange {
            key: extract_bytes(&args[0])?,
            start: extract_string(&args[1])?
                .parse()
                .map_err(|_| OpalDBError::NotAnInteger)?,
            stop: extract_string(&args[2])?
                .parse()
                .map_err(|_| OpalDBError::NotAnInteger)?,
            with_scores,
        })
    }
}

/// Resolves `key` to its sorted set, treating absent/expired keys as `None`
/// and other kinds as a wrong-type error.
pub(super) fn lookup_zset<'g>(
    guard: &'g mut MutexGuard<'_, ShardCache>,
    key: &Bytes,
) -> Result<Option<&'g SortedSet>, OpalDBError> {
    match guard.get(key) {
        None => Ok(None),
        Some(entry) => match &entry.data {
            DataValue::SortedSet(zset) => Ok(Some(zset)),
            _ => Err(OpalDBError::WrongType),
        },
    }
}

#[async_trait]
impl ExecutableCommand for ZRange {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;
        let Some(zset) = lookup_zset(guard, &self.key)? else {
            return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
        };

        let entries = zset.range(self.start, self.stop);
        let mut items = Vec::with_capacity(entries.len() * if self.with_scores { 2 } else { 1 });
        for entry in entries {
            items.push(RespValue::BulkString(entry.member));
            if self.with_scores {
                items.push(RespValue::BulkString(format_score(entry.score).into()));
            }
        }
        Ok((RespValue::Array(items), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for ZRange {
    fn name(&self) -> &'static str {
        "zrange"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![
            self.key.clone(),
            self.start.to_string().into(),
            self.stop.to_string().into(),
        ];
        if self.with_scores {
            args.push(Bytes::from_static(b"WITHSCORES"));
        }
        args
    }
}

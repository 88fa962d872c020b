// src/core/commands/generic/keys.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::{ExecutionContext, ExecutionLocks};
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `KEYS pattern`. Only the `*` wildcard is supported; any other pattern
/// yields the empty set.
#[derive(Debug, Clone, Default)]
pub struct Keys {
    pub pattern: Bytes,
}

impl ParseCommand for Keys {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 1, "keys")?;
        Ok(Keys {
            pattern: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Keys {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let ExecutionLocks::All { guards } = &ctx.locks else {
            return Err(OpalDBError::Internal("KEYS requires all-shard locks".into()));
        };

        if self.pattern.as_ref() != b"*" {
            return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
        }

        let mut keys = Vec::new();
        for guard in guards {
            for (key, value) in guard.iter() {
                if !value.is_expired() {
                    keys.push(RespValue::BulkString(key.clone()));
                }
            }
        }
        Ok((RespValue::Array(keys), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for Keys {
    fn name(&self) -> &'static str {
        "keys"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.pattern.clone()]
    }
}

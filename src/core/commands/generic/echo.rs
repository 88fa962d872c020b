// src/core/commands/generic/echo.rs

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
pub struct Echo {
    pub message: Bytes,
}

impl ParseCommand for Echo {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 1, "echo")?;
        Ok(Echo {
            message: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Echo {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        Ok((
            RespValue::BulkString(self.message.clone()),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.message.clone()]
    }
}

// src/core/commands/generic/quit.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `QUIT`: replies `+OK`, then the connection handler closes the stream.
#[derive(Debug, Clone, Default)]
pub struct Quit;

impl ParseCommand for Quit {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if !args.is_empty() {
            return Err(OpalDBError::WrongArgumentCount("quit".to_string()));
        }
        Ok(Quit)
    }
}

#[async_trait]
impl ExecutableCommand for Quit {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        Ok((
            RespValue::SimpleString("OK".into()),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for Quit {
    fn name(&self) -> &'static str {
        "quit"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![]
    }
}

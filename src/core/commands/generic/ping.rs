// src/core/commands/generic/ping.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct Ping {
    pub message: Option<Bytes>,
}

impl ParseCommand for Ping {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        match args.len() {
            0 => Ok(Ping { message: None }),
            1 => Ok(Ping {
                message: Some(extract_bytes(&args[0])?),
            }),
            _ => Err(OpalDBError::WrongArgumentCount("ping".to_string())),
        }
    }
}

#[async_trait]
impl ExecutableCommand for Ping {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let response = match &self.message {
            None => RespValue::SimpleString("PONG".into()),
            Some(msg) => RespValue::BulkString(msg.clone()),
        };
        Ok((response, WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        self.message.clone().map_or(vec![], |m| vec![m])
    }
}

// src/core/commands/generic/publish.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `PUBLISH channel message` — replies with the number of subscribers that
/// received the message.
#[derive(Debug, Clone, Default)]
pub struct Publish {
    pub channel: Bytes,
    pub message: Bytes,
}

impl ParseCommand for Publish {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 2, "publish")?;
        Ok(Publish {
            channel: extract_bytes(&args[0])?,
            message: extract_bytes(&args[1])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Publish {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let receivers = ctx
            .state
            .pubsub
            .publish(&self.channel, self.message.clone());
        Ok((
            RespValue::Integer(receivers as i64),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for Publish {
    fn name(&self) -> &'static str {
        "publish"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::PUBSUB | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.channel.clone(), self.message.clone()]
    }
}

// src/core/commands/generic/unsubscribe.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `UNSUBSCRIBE [channel ...]` — with no channels, unsubscribes from all.
#[derive(Debug, Clone, Default)]
pub struct Unsubscribe {
    pub channels: Vec<Bytes>,
}

impl ParseCommand for Unsubscribe {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        let channels = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(Unsubscribe { channels })
    }
}

#[async_trait]
impl ExecutableCommand for Unsubscribe {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        Err(OpalDBError::Internal(
            "UNSUBSCRIBE is handled by the router".into(),
        ))
    }
}

impl CommandSpec for Unsubscribe {
    fn name(&self) -> &'static str {
        "unsubscribe"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::PUBSUB | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        self.channels.clone()
    }
}

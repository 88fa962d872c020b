// src/core/commands/generic/subscribe.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `SUBSCRIBE channel [channel ...]` — transitions the session into
/// sub-mode; executed at the router level because it mutates session state.
#[derive(Debug, Clone, Default)]
pub struct Subscribe {
    pub channels: Vec<Bytes>,
}

impl ParseCommand for Subscribe {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.is_empty() {
            return Err(OpalDBError::WrongArgumentCount("subscribe".to_string()));
        }
        let channels = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(Subscribe { channels })
    }
}

#[async_trait]
impl ExecutableCommand for Subscribe {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        Err(OpalDBError::Internal(
            "SUBSCRIBE is handled by the router".into(),
        ))
    }
}

impl CommandSpec for Subscribe {
    fn name(&self) -> &'static str {
        "subscribe"
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

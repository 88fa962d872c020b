// src/core/commands/generic/punsubscribe.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `PUNSUBSCRIBE [pattern ...]` — with no patterns, unsubscribes from all.
#[derive(Debug, Clone, Default)]
pub struct PUnsubscribe {
    pub patterns: Vec<Bytes>,
}

impl ParseCommand for PUnsubscribe {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        let patterns = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(PUnsubscribe { patterns })
    }
}

#[async_trait]
impl ExecutableCommand for PUnsubscribe {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        Err(OpalDBError::Internal(
            "PUNSUBSCRIBE is handled by the router".into(),
        ))
    }
}

impl CommandSpec for PUnsubscribe {
    fn name(&self) -> &'static str {
        "punsubscribe"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::PUBSUB | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        self.patterns.clone()
    }
}

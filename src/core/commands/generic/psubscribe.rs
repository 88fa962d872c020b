// src/core/commands/generic/psubscribe.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `PSUBSCRIBE pattern [pattern ...]` — glob-style channel subscriptions.
#[derive(Debug, Clone, Default)]
pub struct PSubscribe {
    pub patterns: Vec<Bytes>,
}

impl ParseCommand for PSubscribe {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.is_empty() {
            return Err(OpalDBError::WrongArgumentCount("psubscribe".to_string()));
        }
        let patterns = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(PSubscribe { patterns })
    }
}

#[async_trait]
impl ExecutableCommand for PSubscribe {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        Err(OpalDBError::Internal(
            "PSUBSCRIBE is handled by the router".into(),
        ))
    }
}

impl CommandSpec for PSubscribe {
    fn name(&self) -> &'static str {
        "psubscribe"
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

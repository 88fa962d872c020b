// src/core/commands/generic/replconf.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `REPLCONF ...` — replication-handshake configuration. The router (and,
/// on a follower, the replication worker) interprets the subcommand.
#[derive(Debug, Clone, Default)]
pub struct Replconf {
    pub args: Vec<String>,
}

impl ParseCommand for Replconf {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.is_empty() {
            return Err(OpalDBError::WrongArgumentCount("replconf".to_string()));
        }
        let str_args = args
            .iter()
            .map(extract_string)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Replconf { args: str_args })
    }
}

#[async_trait]
impl ExecutableCommand for Replconf {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        Err(OpalDBError::Internal(
            "REPLCONF is handled by the router".into(),
        ))
    }
}

impl CommandSpec for Replconf {
    fn name(&self) -> &'static str {
        "replconf"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        self.args.iter().map(|s| s.clone().into()).collect()
    }
}

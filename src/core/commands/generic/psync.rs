// src/core/commands/generic/psync.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `PSYNC <replid> <offset>` — a follower requesting synchronization. The
/// connection handler hands the socket off to a dedicated replica handler,
/// so this command never executes through the normal path.
#[derive(Debug, Clone, Default)]
pub struct Psync {
    pub replication_id: String,
    pub offset: String,
}

impl ParseCommand for Psync {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.len() != 2 {
            return Err(OpalDBError::WrongArgumentCount("psync".to_string()));
        }
        Ok(Psync {
            replication_id: extract_string(&args[0])?,
            offset: extract_string(&args[1])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Psync {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        Err(OpalDBError::ReplicationError(
            "PSYNC should be handled by the connection handler".into(),
        ))
    }
}

impl CommandSpec for Psync {
    fn name(&self) -> &'static str {
        "psync"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![
            self.replication_id.clone().into(),
            self.offset.clone().into(),
        ]
    }
}

// src/core/commands/generic/save.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::persistence::rdb;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::{ExecutionContext, ExecutionLocks};
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `SAVE`: a synchronous snapshot of the whole keyspace, encoded under
/// all-shard locks and written via the temp-then-rename procedure.
#[derive(Debug, Clone, Default)]
pub struct Save;

impl ParseCommand for Save {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if !args.is_empty() {
            return Err(OpalDBError::WrongArgumentCount("save".to_string()));
        }
        Ok(Save)
    }
}

#[async_trait]
impl ExecutableCommand for Save {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let encoded = {
            let ExecutionLocks::All { guards } = &ctx.locks else {
                return Err(OpalDBError::Internal("SAVE requires all-shard locks".into()));
            };
            rdb::encode_keyspace(guards)?
        };
        // Locks can be dropped before touching the filesystem.
        ctx.release_locks();

        let path = ctx.state.config.snapshot_path();
        rdb::write_snapshot_file(&path, &encoded).await?;
        ctx.state.persistence.mark_saved();

        Ok((
            RespValue::SimpleString("OK".into()),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for Save {
    fn name(&self) -> &'static str {
        "save"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![]
    }
}

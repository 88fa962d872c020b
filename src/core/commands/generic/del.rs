// src/core/commands/generic/del.rs

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
pub struct Del {
    pub keys: Vec<Bytes>,
}

impl ParseCommand for Del {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.is_empty() {
            return Err(OpalDBError::WrongArgumentCount("del".to_string()));
        }
        let keys = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(Del { keys })
    }
}

#[async_trait]
impl ExecutableCommand for Del {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let mut deleted = 0u64;
        for key in &self.keys {
            let Some(guard) = ctx.guard_for_key(key) else {
                return Err(OpalDBError::Internal("no lock held for key".into()));
            };
            // Expired entries count as already gone.
            let live = guard.get(key).is_some();
            if live && guard.pop(key).is_some() {
                deleted += 1;
            }
        }
        let outcome = if deleted > 0 {
            WriteOutcome::Delete {
                keys_deleted: deleted,
            }
        } else {
            WriteOutcome::DidNotWrite
        };
        Ok((RespValue::Integer(deleted as i64), outcome))
    }
}

impl CommandSpec for Del {
    fn name(&self) -> &'static str {
        "del"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        self.keys.clone()
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        self.keys.clone()
    }
}

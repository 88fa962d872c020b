// src/core/commands/list/blpop.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// `BLPOP key [key ...] timeout` — the timeout is in seconds, fractional
/// allowed, 0 meaning wait forever.
#[derive(Debug, Clone, Default)]
pub struct BLPop {
    pub keys: Vec<Bytes>,
    pub timeout: Duration,
}

impl ParseCommand for BLPop {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.len() < 2 {
            return Err(OpalDBError::WrongArgumentCount("blpop".to_string()));
        }

        let timeout_str = match args.last().unwrap() {
            RespFrame::BulkString(bs) => String::from_utf8_lossy(bs).to_string(),
            _ => return Err(OpalDBError::InvalidTimeout),
        };
        let timeout_secs: f64 = timeout_str
            .parse()
            .map_err(|_| OpalDBError::InvalidTimeout)?;
        if timeout_secs < 0.0 || !timeout_secs.is_finite() {
            return Err(OpalDBError::InvalidTimeout);
        }

        let keys: Vec<Bytes> = args[..args.len() - 1]
            .iter()
            .map(extract_bytes)
            .collect::<Result<_, _>>()?;

        let timeout = if timeout_secs == 0.0 {
            Duration::MAX
        } else {
            Duration::from_secs_f64(timeout_secs)
        };

        Ok(BLPop { keys, timeout })
    }
}

#[async_trait]
impl ExecutableCommand for BLPop {
    /// The blocking machinery, including the registration-before-unlock
    /// ordering, lives in the central `BlockerManager`.
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let state = ctx.state.clone();
        state
            .blocker_manager
            .orchestrate_blocking_pop(ctx, &self.keys, self.timeout)
            .await
    }
}

impl CommandSpec for BLPop {
    fn name(&self) -> &'static str {
        "blpop"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        self.keys.clone()
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = self.keys.clone();
        args.push(self.timeout.as_secs_f64().to_string().into());
        args
    }
}

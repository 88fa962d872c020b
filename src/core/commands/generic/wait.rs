// src/core/commands/generic/wait.rs

//! Implements `WAIT numreplicas timeout-ms` on the leader: blocks the
//! calling client until the requested number of followers have acknowledged
//! the replication stream up to the offset current at the time of the call,
//! or until the deadline passes.

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

#[derive(Debug, Clone, Default)]
pub struct Wait {
    pub num_replicas: usize,
    /// Zero means no deadline.
    pub timeout_ms: u64,
}

impl ParseCommand for Wait {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.len() != 2 {
            return Err(OpalDBError::WrongArgumentCount("wait".to_string()));
        }
        Ok(Wait {
            num_replicas: extract_string(&args[0])?
                .parse()
                .map_err(|_| OpalDBError::NotAnInteger)?,
            timeout_ms: extract_string(&args[1])?
                .parse()
                .map_err(|_| OpalDBError::InvalidTimeout)?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Wait {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let state = ctx.state.clone();

        // The wait target is the leader offset at the moment WAIT arrives.
        let target_offset = state.replication.get_replication_offset();
        let count_acked = |state: &crate::core::state::ServerState| {
            state
                .replica_states
                .iter()
                .filter(|entry| entry.value().ack_offset >= target_offset)
                .count()
        };

        let acked = count_acked(&state);
        if acked >= self.num_replicas {
            return Ok((RespValue::Integer(acked as i64), WriteOutcome::DidNotWrite));
        }

        // Ask every follower to report its offset, then wait for the ACK
        // notifications to bring the count up.
        state.request_replica_acks().await?;

        let deadline = if self.timeout_ms == 0 {
            None
        } else {
            Some(Instant::now() + Duration::from_millis(self.timeout_ms))
        };

        loop {
            // Arm the notification before re-counting, so an ACK landing
            // between the check and the await cannot be missed.
            let notified = state.replication.ack_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let acked = count_acked(&state);
            if acked >= self.num_replicas {
                return Ok((RespValue::Integer(acked as i64), WriteOutcome::DidNotWrite));
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if Instant::now() >= deadline
                        || timeout_at(deadline, notified).await.is_err()
                    {
                        // Deadline passed: reply with however many made it.
                        return Ok((
                            RespValue::Integer(count_acked(&state) as i64),
                            WriteOutcome::DidNotWrite,
                        ));
                    }
                }
            }
        }
    }
}

impl CommandSpec for Wait {
    fn name(&self) -> &'static str {
        "wait"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![
            self.num_replicas.to_string().into(),
            self.timeout_ms.to_string().into(),
        ]
    }
}

// src/core/commands/string/set.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, ArgParser};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::{Duration, Instant};

/// The TTL options accepted by `SET`: relative milliseconds (`PX`) or
/// relative seconds (`EX`). Either converts to an absolute expiry instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum TtlOption {
    #[default]
    None,
    Seconds(u64),
    Milliseconds(u64),
}

#[derive(Debug, Clone, Default)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    pub ttl: TtlOption,
}

impl ParseCommand for Set {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.len() < 2 {
            return Err(OpalDBError::WrongArgumentCount("set".to_string()));
        }
        let mut cmd = Set {
            key: extract_bytes(&args[0])?,
            value: extract_bytes(&args[1])?,
            ..Default::default()
        };

        let mut parser = ArgParser::new(&args[2..]);
        loop {
            if let Some(seconds) = parser.match_option("ex")? {
                if cmd.ttl != TtlOption::None {
                    return Err(OpalDBError::SyntaxError);
                }
                cmd.ttl = TtlOption::Seconds(seconds);
            } else if let Some(ms) = parser.match_option("px")? {
                if cmd.ttl != TtlOption::None {
                    return Err(OpalDBError::SyntaxError);
                }
                cmd.ttl = TtlOption::Milliseconds(ms);
            } else {
                break;
            }
        }
        if !parser.remaining_args().is_empty() {
            return Err(OpalDBError::SyntaxError);
        }
        Ok(cmd)
    }
}

#[async_trait]
impl ExecutableCommand for Set {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;

        let new_expiry = match self.ttl {
            TtlOption::Seconds(s) => Some(Instant::now() + Duration::from_secs(s)),
            TtlOption::Milliseconds(ms) => Some(Instant::now() + Duration::from_millis(ms)),
            TtlOption::None => None,
        };

        // An expiry at or before now means the key is effectively deleted.
        if new_expiry.is_some_and(|exp| exp <= Instant::now()) {
            let existed = guard.pop(&self.key).is_some();
            let outcome = if existed {
                WriteOutcome::Delete { keys_deleted: 1 }
            } else {
                WriteOutcome::DidNotWrite
            };
            return Ok((RespValue::SimpleString("OK".into()), outcome));
        }

        // Replacing a prior value disposes the old object, whatever its kind.
        guard.put(
            self.key.clone(),
            StoredValue::with_expiry(DataValue::String(self.value.clone()), new_expiry),
        );
        Ok((
            RespValue::SimpleString("OK".into()),
            WriteOutcome::Write { keys_modified: 1 },
        ))
    }
}

impl CommandSpec for Set {
    fn name(&self) -> &'static str {
        "set"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone(), self.value.clone()];
        match self.ttl {
            TtlOption::Seconds(ttl) => {
                args.extend([Bytes::from_static(b"EX"), ttl.to_string().into()])
            }
            TtlOption::Milliseconds(ttl) => {
                args.extend([Bytes::from_static(b"PX"), ttl.to_string().into()])
            }
            TtlOption::None => {}
        }
        args
    }
}

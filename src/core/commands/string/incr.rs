// src/core/commands/string/incr.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct Incr {
    pub key: Bytes,
}

impl ParseCommand for Incr {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 1, "incr")?;
        Ok(Incr {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Incr {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;

        let incremented_in_place = match guard.get_mut(&self.key) {
            None => None,
            Some(entry) => {
                let current = match &entry.data {
                    DataValue::Integer(i) => *i,
                    DataValue::String(s) => std::str::from_utf8(s)
                        .map_err(|_| OpalDBError::NotAnInteger)?
                        .parse::<i64>()
                        .map_err(|_| OpalDBError::NotAnInteger)?,
                    _ => return Err(OpalDBError::WrongType),
                };
                let incremented = current.checked_add(1).ok_or(OpalDBError::Overflow)?;
                entry.data = DataValue::Integer(incremented);
                Some(incremented)
            }
        };
        let new_value = match incremented_in_place {
            Some(value) => value,
            None => {
                // Absent keys are created as the integer 1.
                guard.put(self.key.clone(), StoredValue::new(DataValue::Integer(1)));
                1
            }
        };

        Ok((
            RespValue::Integer(new_value),
            WriteOutcome::Write { keys_modified: 1 },
        ))
    }
}

impl CommandSpec for Incr {
    fn name(&self) -> &'static str {
        "incr"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
}

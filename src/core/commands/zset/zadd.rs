// src/core/commands/zset/zadd.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::zset::SortedSet;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct Zadd {
    pub key: Bytes,
    pub members: Vec<(f64, Bytes)>,
}

impl ParseCommand for Zadd {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.len() < 3 || args.len() % 2 != 1 {
            return Err(OpalDBError::WrongArgumentCount("zadd".to_string()));
        }
        let key = extract_bytes(&args[0])?;
        let members = args[1..]
            .chunks_exact(2)
            .map(|chunk| -> Result<(f64, Bytes), OpalDBError> {
                let score = extract_string(&chunk[0])?
                    .parse::<f64>()
                    .map_err(|_| OpalDBError::NotAFloat)?;
                Ok((score, extract_bytes(&chunk[1])?))
            })
            .collect::<Result<_, _>>()?;
        Ok(Zadd { key, members })
    }
}

#[async_trait]
impl ExecutableCommand for Zadd {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;

        if let Some(entry) = guard.get(&self.key) {
            if !matches!(entry.data, DataValue::SortedSet(_)) {
                return Err(OpalDBError::WrongType);
            }
        }

        let entry = guard.get_or_insert_with_mut(self.key.clone(), || {
            StoredValue::new(DataValue::SortedSet(SortedSet::new()))
        });
        let DataValue::SortedSet(zset) = &mut entry.data else {
            return Err(OpalDBError::WrongType);
        };

        let mut added = 0i64;
        for (score, member) in &self.members {
            if zset.add(*score, member.clone()) {
                added += 1;
            }
        }

        Ok((
            RespValue::Integer(added),
            WriteOutcome::Write { keys_modified: 1 },
        ))
    }
}

impl CommandSpec for Zadd {
    fn name(&self) -> &'static str {
        "zadd"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        for (score, member) in &self.members {
            args.push(score.to_string().into());
            args.push(member.clone());
        }
        args
    }
}

// src/core/commands/streams/xrange.rs

//! Implements the `XRANGE` command: an inclusive range scan over a stream,
//! with `-` and `+` denoting the smallest and largest possible IDs.

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::stream::{StreamEntry, StreamId};
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// A range bound as given on the wire: an ID or an infinity sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    NegInfinity,
    PosInfinity,
    Id(StreamId),
}

impl RangeBound {
    pub fn parse(s: &str) -> Result<Self, OpalDBError> {
        match s {
            "-" => Ok(RangeBound::NegInfinity),
            "+" => Ok(RangeBound::PosInfinity),
            _ => Ok(RangeBound::Id(s.parse()?)),
        }
    }

    fn resolve_lo(self) -> StreamId {
        match self {
            RangeBound::NegInfinity => StreamId::ZERO,
            RangeBound::PosInfinity => StreamId::MAX,
            RangeBound::Id(id) => id,
        }
    }

    fn resolve_hi(self) -> StreamId {
        match self {
            RangeBound::NegInfinity => StreamId::ZERO,
            RangeBound::PosInfinity => StreamId::MAX,
            RangeBound::Id(id) => id,
        }
    }

    fn to_arg(self) -> Bytes {
        match self {
            RangeBound::NegInfinity => Bytes::from_static(b"-"),
            RangeBound::PosInfinity => Bytes::from_static(b"+"),
            RangeBound::Id(id) => id.to_string().into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct XRange {
    pub key: Bytes,
    pub start: RangeBound,
    pub end: RangeBound,
}

impl Default for XRange {
    fn default() -> Self {
        Self {
            key: Bytes::new(),
            start: RangeBound::NegInfinity,
            end: RangeBound::PosInfinity,
        }
    }
}

impl ParseCommand for XRange {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        validate_arg_count(args, 3, "xrange")?;
        Ok(XRange {
            key: extract_bytes(&args[0])?,
            start: RangeBound::parse(&extract_string(&args[1])?)?,
            end: RangeBound::parse(&extract_string(&args[2])?)?,
        })
    }
}

/// Formats one entry as the `[id, [field, value, ...]]` array shape shared
/// by XRANGE and XREAD replies.
pub fn format_entry(entry: &StreamEntry) -> RespValue {
    let mut fields = Vec::with_capacity(entry.fields.len() * 2);
    for (field, value) in &entry.fields {
        fields.push(RespValue::BulkString(field.clone()));
        fields.push(RespValue::BulkString(value.clone()));
    }
    RespValue::Array(vec![
        RespValue::BulkString(entry.id.to_string().into()),
        RespValue::Array(fields),
    ])
}

#[async_trait]
impl ExecutableCommand for XRange {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;
        let Some(entry) = guard.get(&self.key) else {
            return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
        };
        let DataValue::Stream(stream) = &entry.data else {
            return Err(OpalDBError::WrongType);
        };

        let items = stream
            .range(self.start.resolve_lo(), self.end.resolve_hi())
            .into_iter()
            .map(format_entry)
            .collect();
        Ok((RespValue::Array(items), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for XRange {
    fn name(&self) -> &'static str {
        "xrange"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone(), self.start.to_arg(), self.end.to_arg()]
    }
}

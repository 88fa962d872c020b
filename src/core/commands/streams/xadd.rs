// src/core/commands/streams/xadd.rs

//! Implements the `XADD` command, the fundamental write operation for the
//! stream type. Appends one entry of field-value pairs under a new ID that
//! is auto-generated (`*`), sequence-generated (`<ms>-*`), or explicit.

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::stream::{Stream, StreamId, StreamIdSpec};
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct XAdd {
    pub key: Bytes,
    pub id_spec: StreamIdSpec,
    pub fields: IndexMap<Bytes, Bytes>,
}

impl Default for XAdd {
    fn default() -> Self {
        Self {
            key: Bytes::new(),
            id_spec: StreamIdSpec::Auto,
            fields: IndexMap::new(),
        }
    }
}

impl XAdd {
    /// Used by the snapshot codec and tests to rebuild entries with their
    /// original explicit IDs.
    pub fn new_internal(key: Bytes, id: StreamId, fields: IndexMap<Bytes, Bytes>) -> Self {
        Self {
            key,
            id_spec: StreamIdSpec::Explicit(id),
            fields,
        }
    }
}

impl ParseCommand for XAdd {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.len() < 4 {
            return Err(OpalDBError::WrongArgumentCount("xadd".to_string()));
        }
        let key = extract_bytes(&args[0])?;
        let id_spec = StreamIdSpec::parse(&extract_string(&args[1])?)?;

        let field_args = &args[2..];
        if field_args.is_empty() || field_args.len() % 2 != 0 {
            return Err(OpalDBError::WrongArgumentCount("xadd".to_string()));
        }
        let fields = field_args
            .chunks_exact(2)
            .map(|chunk| Ok((extract_bytes(&chunk[0])?, extract_bytes(&chunk[1])?)))
            .collect::<Result<_, OpalDBError>>()?;

        Ok(XAdd {
            key,
            id_spec,
            fields,
        })
    }
}

#[async_trait]
impl ExecutableCommand for XAdd {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let state = ctx.state.clone();
        let (_, guard) = ctx.get_single_shard_context_mut()?;

        if let Some(entry) = guard.get(&self.key) {
            if !matches!(entry.data, DataValue::Stream(_)) {
                return Err(OpalDBError::WrongType);
            }
        }

        let entry = guard.get_or_insert_with_mut(self.key.clone(), || {
            StoredValue::new(DataValue::Stream(Stream::new()))
        });
        let DataValue::Stream(stream) = &mut entry.data else {
            return Err(OpalDBError::WrongType);
        };

        let new_id = stream.add_entry(self.id_spec, self.fields.clone())?;

        // Wake any XREAD BLOCK clients watching this stream.
        state.stream_blocker_manager.notify(&self.key);

        Ok((
            RespValue::BulkString(new_id.to_string().into()),
            WriteOutcome::Write { keys_modified: 1 },
        ))
    }
}

impl CommandSpec for XAdd {
    fn name(&self) -> &'static str {
        "xadd"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        let id_arg = match self.id_spec {
            StreamIdSpec::Auto => "*".to_string(),
            StreamIdSpec::AutoSequence(ms) => format!("{ms}-*"),
            StreamIdSpec::Explicit(id) => id.to_string(),
        };
        args.push(id_arg.into());
        for (field, value) in &self.fields {
            args.push(field.clone());
            args.push(value.clone());
        }
        args
    }
}

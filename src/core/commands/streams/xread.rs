// src/core/commands/streams/xread.rs

//! Implements the `XREAD` command for reading entries strictly after a
//! given ID from one or more streams, optionally blocking until data
//! arrives (`BLOCK <ms>`).

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::commands::streams::xrange::format_entry;
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::stream::{StreamEntry, StreamId};
use crate::core::stream_blocking::StreamBlockerResult;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct XRead {
    pub streams: Vec<(Bytes, StreamId)>,
    /// `BLOCK` argument, in milliseconds; zero means wait forever.
    pub block_timeout: Option<Duration>,
}

impl ParseCommand for XRead {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        let mut cmd = XRead::default();
        let mut i = 0;

        while i < args.len() {
            let arg = extract_string(&args[i])?;
            match arg.to_ascii_lowercase().as_str() {
                "block" => {
                    i += 1;
                    if i >= args.len() {
                        return Err(OpalDBError::SyntaxError);
                    }
                    let ms: u64 = extract_string(&args[i])?
                        .parse()
                        .map_err(|_| OpalDBError::InvalidTimeout)?;
                    cmd.block_timeout = Some(if ms == 0 {
                        Duration::MAX
                    } else {
                        Duration::from_millis(ms)
                    });
                    i += 1;
                }
                "streams" => {
                    i += 1;
                    break;
                }
                _ => return Err(OpalDBError::SyntaxError),
            }
        }

        // The remainder is `key... id...`, split evenly.
        let remaining = &args[i..];
        if remaining.is_empty() || remaining.len() % 2 != 0 {
            return Err(OpalDBError::WrongArgumentCount("xread".to_string()));
        }
        let num_streams = remaining.len() / 2;
        for (key_frame, id_frame) in remaining[..num_streams]
            .iter()
            .zip(remaining[num_streams..].iter())
        {
            let key = extract_bytes(key_frame)?;
            let id: StreamId = extract_string(id_frame)?.parse()?;
            cmd.streams.push((key, id));
        }

        Ok(cmd)
    }
}

#[async_trait]
impl ExecutableCommand for XRead {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        // Phase 1: non-blocking read attempt.
        let initial_results = self.read_from_streams(ctx)?;
        if !initial_results.is_empty() || self.block_timeout.is_none() {
            let response = if initial_results.is_empty() {
                RespValue::NullArray
            } else {
                Self::format_results(initial_results)
            };
            return Ok((response, WriteOutcome::DidNotWrite));
        }

        // Phase 2: suspend until an XADD lands or the deadline passes.
        let timeout = self.block_timeout.unwrap();
        let keys: Vec<Bytes> = self.streams.iter().map(|(k, _)| k.clone()).collect();
        let state = ctx.state.clone();
        let block_result = state
            .stream_blocker_manager
            .block_on(ctx, &keys, timeout)
            .await;

        match block_result {
            StreamBlockerResult::TimedOut => {
                Ok((RespValue::NullArray, WriteOutcome::DidNotWrite))
            }
            StreamBlockerResult::Woken => {
                // The manager reacquired locks and verified real progress;
                // re-read to build the reply.
                let results = self.read_from_streams(ctx)?;
                let response = if results.is_empty() {
                    RespValue::NullArray
                } else {
                    Self::format_results(results)
                };
                Ok((response, WriteOutcome::DidNotWrite))
            }
        }
    }
}

impl XRead {
    /// Reads, per stream, the entries strictly after the given start ID.
    fn read_from_streams(
        &self,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Vec<(Bytes, Vec<StreamEntry>)>, OpalDBError> {
        let mut results = Vec::new();
        for (key, start_id) in &self.streams {
            let Some(guard) = ctx.guard_for_key(key) else {
                return Err(OpalDBError::Internal("no lock held for stream key".into()));
            };
            let Some(entry) = guard.get(key) else {
                continue;
            };
            let DataValue::Stream(stream) = &entry.data else {
                return Err(OpalDBError::WrongType);
            };
            let entries: Vec<StreamEntry> = stream
                .read_after(*start_id)
                .into_iter()
                .cloned()
                .collect();
            if !entries.is_empty() {
                results.push((key.clone(), entries));
            }
        }
        Ok(results)
    }

    /// Builds the nested `[[stream, [entries...]], ...]` reply shape.
    fn format_results(results: Vec<(Bytes, Vec<StreamEntry>)>) -> RespValue {
        let streams = results
            .into_iter()
            .map(|(stream_name, entries)| {
                let formatted = entries.iter().map(format_entry).collect();
                RespValue::Array(vec![
                    RespValue::BulkString(stream_name),
                    RespValue::Array(formatted),
                ])
            })
            .collect();
        RespValue::Array(streams)
    }
}

impl CommandSpec for XRead {
    fn name(&self) -> &'static str {
        "xread"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY | CommandFlags::NO_PROPAGATE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        self.streams.iter().map(|(k, _)| k.clone()).collect()
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = Vec::new();
        if let Some(block) = self.block_timeout {
            let ms = if block == Duration::MAX {
                0
            } else {
                block.as_millis() as u64
            };
            args.extend([Bytes::from_static(b"BLOCK"), ms.to_string().into()]);
        }
        args.push(Bytes::from_static(b"STREAMS"));
        for (key, _) in &self.streams {
            args.push(key.clone());
        }
        for (_, id) in &self.streams {
            args.push(id.to_string().into());
        }
        args
    }
}

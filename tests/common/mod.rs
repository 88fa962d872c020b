// tests/common/mod.rs

//! Shared helpers for the integration-style tests: building a server state
//! and running commands through the same dispatch path the router uses.

use bytes::Bytes;
use opaldb::config::Config;
use opaldb::core::commands::command_trait::{CommandExt, WriteOutcome};
use opaldb::core::protocol::RespFrame;
use opaldb::core::state::ServerState;
use opaldb::core::storage::db::ExecutionContext;
use opaldb::core::{Command, OpalDBError, RespValue};
use std::sync::Arc;

pub fn test_state() -> Arc<ServerState> {
    ServerState::initialize(Config::default()).expect("state initialization")
}

pub fn frame_of(parts: &[&str]) -> RespFrame {
    RespFrame::Array(
        parts
            .iter()
            .map(|p| RespFrame::BulkString(Bytes::from(p.to_string())))
            .collect(),
    )
}

/// Parses and executes one command against `state`, mirroring the router's
/// lock acquisition.
pub async fn run_command(
    state: &Arc<ServerState>,
    parts: &[&str],
) -> Result<(RespValue, WriteOutcome), OpalDBError> {
    let command = Command::try_from(frame_of(parts))?;
    let db = state.db.clone();
    let locks = db.determine_locks_for_command(&command).await;
    let mut ctx = ExecutionContext {
        state: state.clone(),
        locks,
        db: &db,
        command: Some(command.clone()),
        session_id: 1,
    };
    command.execute(&mut ctx).await
}

pub async fn run_ok(state: &Arc<ServerState>, parts: &[&str]) -> RespValue {
    run_command(state, parts)
        .await
        .unwrap_or_else(|e| panic!("command {parts:?} failed: {e}"))
        .0
}

pub fn bulk(s: &str) -> RespValue {
    RespValue::BulkString(Bytes::from(s.to_string()))
}

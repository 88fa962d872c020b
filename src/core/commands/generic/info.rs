// src/core/commands/generic/info.rs

use crate::config::ReplicationRole;
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::state::ServerState;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Implements the INFO command to provide server information and statistics.
#[derive(Debug, Clone, Default)]
pub struct Info {
    pub section: Option<String>,
}

impl ParseCommand for Info {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        match args.len() {
            0 => Ok(Info { section: None }),
            1 => Ok(Info {
                section: Some(extract_string(&args[0])?.to_ascii_lowercase()),
            }),
            _ => Err(OpalDBError::WrongArgumentCount("info".to_string())),
        }
    }
}

/// Gathers information from the relevant parts of the server state.
fn get_info_string(state: &ServerState, section: &Option<String>) -> String {
    let mut info = String::new();
    let all_sections = section.is_none() || section.as_deref() == Some("all");

    if all_sections || section.as_deref() == Some("server") {
        info.push_str("# Server\r\n");
        info.push_str(&format!("opaldb_version:{}\r\n", env!("CARGO_PKG_VERSION")));
        info.push_str(&format!("tcp_port:{}\r\n", state.config.port));
        info.push_str("\r\n");
    }

    if all_sections || section.as_deref() == Some("replication") {
        info.push_str("# Replication\r\n");
        match &state.config.replication {
            ReplicationRole::Leader => {
                info.push_str("role:master\r\n");
                info.push_str(&format!(
                    "connected_slaves:{}\r\n",
                    state.replica_states.len()
                ));
            }
            ReplicationRole::Follower { host, port } => {
                info.push_str("role:slave\r\n");
                info.push_str(&format!("master_host:{host}\r\n"));
                info.push_str(&format!("master_port:{port}\r\n"));
                info.push_str(&format!(
                    "connected_slaves:{}\r\n",
                    state.replica_states.len()
                ));
            }
        }
        info.push_str(&format!(
            "master_replid:{}\r\n",
            state.replication.replication_info.master_replid
        ));
        info.push_str(&format!(
            "master_repl_offset:{}\r\n",
            state.replication.get_replication_offset()
        ));
        info.push_str("\r\n");
    }

    if all_sections || section.as_deref() == Some("keyspace") {
        info.push_str("# Keyspace\r\n");
        info.push_str(&format!("db0:keys={}\r\n", state.db.key_count()));
        info.push_str("\r\n");
    }

    info
}

#[async_trait]
impl ExecutableCommand for Info {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let info_string = get_info_string(&ctx.state, &self.section);
        Ok((
            RespValue::BulkString(info_string.into()),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for Info {
    fn name(&self) -> &'static str {
        "info"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE | CommandFlags::READONLY
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        self.section.clone().map_or(vec![], |s| vec![s.into()])
    }
}

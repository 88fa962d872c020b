// src/core/handler/actions/connection.rs

use crate::core::commands::generic::Replconf;
use crate::core::handler::command_router::RouteResponse;
use crate::core::state::ServerState;
use crate::core::{OpalDBError, RespValue};
use std::net::SocketAddr;
use std::sync::Arc;

/// Handles `REPLCONF` on the leader side.
///
/// `listening-port` and `capa` advertisements from a follower's handshake
/// are acknowledged with `+OK`; an `ACK <offset>` updates the follower's
/// recorded offset (and wakes pending WAITs) and gets no reply.
pub fn handle_replconf(
    cmd: &Replconf,
    state: &Arc<ServerState>,
    addr: &SocketAddr,
) -> Result<RouteResponse, OpalDBError> {
    if cmd
        .args
        .first()
        .is_some_and(|a| a.eq_ignore_ascii_case("ack"))
    {
        if let Some(offset) = cmd.args.get(1).and_then(|s| s.parse::<u64>().ok()) {
            state.record_replica_ack(*addr, offset);
        }
        return Ok(RouteResponse::NoOp);
    }
    Ok(RouteResponse::Single(RespValue::SimpleString("OK".into())))
}

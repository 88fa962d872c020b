// src/server/initialization.rs

//! Server initialization: state setup, snapshot loading, and the listener
//! bind. Failures here abort startup.

use super::context::ServerContext;
use crate::config::{Config, ReplicationRole};
use crate::core::persistence::rdb;
use crate::core::state::ServerState;
use anyhow::{anyhow, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::info;

pub async fn setup(config: Config) -> Result<ServerContext> {
    let (shutdown_tx, _) = broadcast::channel(1);

    let state = ServerState::initialize(config)
        .map_err(|e| anyhow!("failed to initialize server state: {e}"))?;
    info!("Server state initialized.");

    match &state.config.replication {
        ReplicationRole::Leader => info!("Server starting as replication leader."),
        ReplicationRole::Follower { host, port } => {
            info!("Server starting as follower of {host}:{port}.")
        }
    }

    // Leaders restore their keyspace from the local snapshot. Followers
    // skip it; their state arrives via the full resync.
    if matches!(state.config.replication, ReplicationRole::Leader) {
        let path = state.config.snapshot_path();
        rdb::load_snapshot_file(&path, &state.db)
            .await
            .map_err(|e| anyhow!("failed to load snapshot: {e}"))?;
    }

    let bind_addr = ("0.0.0.0", state.config.port);
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| anyhow!("failed to bind port {}: {e}", state.config.port))?;
    info!("OpalDB listening on port {}", state.config.port);

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

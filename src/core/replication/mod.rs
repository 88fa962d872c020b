// src/core/replication/mod.rs

//! The replication subsystem. A server is either a leader or a follower
//! for its lifetime: leaders run the backlog feeder that turns published
//! write commands into the replication byte stream, and followers run the
//! worker that connects out to the leader and applies it.

use crate::config::ReplicationRole;
use crate::core::events::UnitOfWork;
use crate::core::state::ServerState;
use crate::core::Command;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod backlog;
pub mod handler;
pub mod worker;

/// Spawns the replication task matching the configured role.
pub fn setup_replication(
    state: Arc<ServerState>,
    shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    match &state.config.replication {
        ReplicationRole::Leader => {
            info!("Server starting as replication LEADER. Spawning backlog feeder.");
            tokio::spawn(run_backlog_feeder(state, shutdown_rx))
        }
        ReplicationRole::Follower { .. } => {
            info!("Server starting as replication FOLLOWER. Spawning replica worker.");
            let worker = worker::ReplicaWorker::new(state);
            tokio::spawn(worker.run(shutdown_rx))
        }
    }
}

/// Leader-side task: listens to the event bus and feeds every successful
/// write command (as its raw request frame) into the replication backlog,
/// advancing the global offset.
async fn run_backlog_feeder(state: Arc<ServerState>, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut event_rx = state.event_bus.subscribe_for_replication();
    info!("Replication backlog feeder task is running.");

    loop {
        tokio::select! {
            result = event_rx.recv() => {
                match result {
                    Ok(work) => {
                        let commands = match work {
                            UnitOfWork::Command(cmd) => vec![*cmd],
                            UnitOfWork::Transaction(write_commands) => {
                                if write_commands.is_empty() {
                                    continue;
                                }
                                // Wrap in MULTI/EXEC so followers apply the
                                // block atomically.
                                let mut full_tx = Vec::with_capacity(write_commands.len() + 2);
                                full_tx.push(Command::Multi);
                                full_tx.extend(write_commands);
                                full_tx.push(Command::Exec);
                                full_tx
                            }
                        };

                        for cmd in commands {
                            let frame: crate::core::protocol::RespFrame = cmd.into();
                            if let Err(e) = state.feed_replication_frame(frame).await {
                                warn!("Failed to feed replication frame: {e}");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            "Replication feeder lagged; {} write events dropped. \
                             Followers may need a full resync.",
                            n
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event bus closed. Replication feeder shutting down.");
                        return;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Replication backlog feeder shutting down.");
                return;
            }
        }
    }
}

// src/server/context.rs

//! The assembled runtime context handed from initialization to the accept
//! loop.

use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<()>,
}

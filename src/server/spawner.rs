// src/server/spawner.rs

//! Spawns the server's long-running background tasks.

use super::context::ServerContext;
use crate::core::persistence::saver::SnapshotSaverTask;
use crate::core::pubsub::channel_purger::ChannelPurgerTask;
use crate::core::replication;
use tracing::info;

pub fn spawn_all(ctx: &mut ServerContext) {
    let state = &ctx.state;
    let shutdown_tx = &ctx.shutdown_tx;

    // Periodic snapshot save when writes have accumulated.
    let saver = SnapshotSaverTask::new(state.clone());
    let shutdown_rx_saver = shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        saver.run(shutdown_rx_saver).await;
    });

    // Empty Pub/Sub channel cleanup.
    let purger = ChannelPurgerTask::new(state.clone());
    let shutdown_rx_purge = shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        purger.run(shutdown_rx_purge).await;
    });

    // The replication role task (backlog feeder or replica worker).
    let repl_state = state.clone();
    let shutdown_rx_repl = shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        let handle = replication::setup_replication(repl_state, shutdown_rx_repl);
        let _ = handle.await;
    });

    info!("All background tasks have been spawned.");
}

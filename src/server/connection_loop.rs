// src/server/connection_loop.rs

//! The main accept loop and the graceful-shutdown sequence.

use super::context::ServerContext;
use crate::connection::ConnectionHandler;
use crate::core::persistence::saver::SnapshotSaverTask;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Waits for SIGINT or SIGTERM.
async fn await_shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to create SIGINT stream");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to create SIGTERM stream");
    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
    }
}

pub async fn run(mut ctx: ServerContext) {
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = await_shutdown_signal() => break,

            // A background task ending unexpectedly is fatal.
            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(()) => info!("A background task completed."),
                    Err(e) => {
                        error!("Background task panicked: {e:?}. Shutting down.");
                        break;
                    }
                }
            }

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        info!("Accepted new connection from {}", addr);
                        session_id_counter = session_id_counter.wrapping_add(1);
                        let session_id = session_id_counter;
                        let state = ctx.state.clone();
                        let shutdown_rx = ctx.shutdown_tx.subscribe();

                        client_tasks.spawn(async move {
                            let mut handler = ConnectionHandler::new(
                                socket, addr, state, session_id, shutdown_rx,
                            );
                            if let Err(e) = handler.run().await {
                                warn!("Connection from {} terminated: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            }

            // Reap completed client tasks.
            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("A client handler panicked: {e:?}");
                    }
                }
            }
        }
    }

    // --- Graceful shutdown ---
    info!("Shutting down. Signalling all tasks.");
    let _ = ctx.shutdown_tx.send(());

    client_tasks.shutdown().await;
    info!("All client connections closed.");

    // Persist pending writes before exiting.
    if ctx.state.persistence.dirty_keys() > 0 {
        info!(
            "Performing final snapshot save ({} dirty keys)...",
            ctx.state.persistence.dirty_keys()
        );
        if let Err(e) = SnapshotSaverTask::perform_save(&ctx.state).await {
            error!("Final snapshot save on shutdown failed: {e}");
        }
    }

    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    }
    info!("Server shutdown complete.");
}

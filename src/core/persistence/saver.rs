// src/core/persistence/saver.rs

//! The background snapshot saver: periodically persists the keyspace when
//! writes have accumulated, and performs the final save on shutdown.

use crate::core::persistence::rdb;
use crate::core::state::ServerState;
use crate::core::OpalDBError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

/// How often the saver checks the dirty-key counter.
const SAVE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct SnapshotSaverTask {
    state: Arc<ServerState>,
}

impl SnapshotSaverTask {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(SAVE_CHECK_INTERVAL);
        // The first tick fires immediately; skip it so startup isn't
        // followed by a pointless save.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.state.persistence.dirty_keys() == 0 {
                        continue;
                    }
                    if let Err(e) = Self::perform_save(&self.state).await {
                        error!("Periodic snapshot save failed: {e}");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Snapshot saver shutting down.");
                    return;
                }
            }
        }
    }

    /// Encodes the keyspace under all-shard locks and writes it through the
    /// temp-then-rename procedure.
    pub async fn perform_save(state: &Arc<ServerState>) -> Result<(), OpalDBError> {
        let encoded = {
            let guards = state.db.lock_all_shards().await;
            rdb::encode_keyspace(&guards)?
        };
        let path = state.config.snapshot_path();
        rdb::write_snapshot_file(&path, &encoded).await?;
        state.persistence.mark_saved();
        info!(
            "Snapshot saved to {} ({} bytes)",
            path.display(),
            encoded.len()
        );
        Ok(())
    }
}

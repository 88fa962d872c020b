// src/core/pubsub/channel_purger.rs

//! A periodic maintenance task that removes Pub/Sub channels with no
//! remaining subscribers.

use crate::core::state::ServerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub struct ChannelPurgerTask {
    state: Arc<ServerState>,
}

impl ChannelPurgerTask {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.state.pubsub.purge_empty_channels();
                }
                _ = shutdown_rx.recv() => {
                    info!("Channel purger task shutting down.");
                    return;
                }
            }
        }
    }
}

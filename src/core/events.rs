// src/core/events.rs

//! The event bus that propagates successfully executed write commands to
//! the replication subsystem.

use crate::core::Command;
use tokio::sync::broadcast::{self, Sender as BroadcastSender};
use tracing::debug;

/// Capacity of the replication broadcast channel; sized to absorb bursts of
/// writes without lagging the backlog feeder.
const BROADCAST_BUS_CAPACITY: usize = 16384;

/// A unit of work propagated to followers: a single write command, or a
/// whole transaction applied atomically.
#[derive(Debug, Clone)]
pub enum UnitOfWork {
    Command(Box<Command>),
    Transaction(Vec<Command>),
}

/// The central distribution hub for write operations.
#[derive(Debug)]
pub struct EventBus {
    replication_sender: BroadcastSender<UnitOfWork>,
}

impl EventBus {
    pub fn new() -> Self {
        let (replication_sender, _) = broadcast::channel(BROADCAST_BUS_CAPACITY);
        Self { replication_sender }
    }

    /// Publishes a unit of work. Having no subscribers (no followers yet)
    /// is not an error.
    pub fn publish(&self, uow: UnitOfWork) {
        if self.replication_sender.send(uow).is_err() {
            debug!("Published a unit of work with no active replication subscribers.");
        }
    }

    /// A new receiver for the replication backlog feeder.
    pub fn subscribe_for_replication(&self) -> broadcast::Receiver<UnitOfWork> {
        self.replication_sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

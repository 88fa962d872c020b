// src/core/state/core.rs

//! Defines the central `ServerState` struct holding all shared server-wide
//! state.

use super::persistence::PersistenceState;
use super::replication::{ReplicaStateInfo, ReplicationState};
use crate::config::Config;
use crate::core::blocking::BlockerManager;
use crate::core::events::EventBus;
use crate::core::protocol::RespFrame;
use crate::core::pubsub::PubSubManager;
use crate::core::replication::backlog::ReplicationBacklog;
use crate::core::storage::db::Db;
use crate::core::stream_blocking::StreamBlockerManager;
use crate::core::OpalDBError;
use bytes::Bytes;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;

/// The central struct holding all shared, server-wide state. Wrapped in an
/// `Arc` and handed to every connection task and background task.
#[derive(Debug)]
pub struct ServerState {
    /// The keyspace, sharded internally.
    pub db: Arc<Db>,
    /// The immutable runtime configuration.
    pub config: Config,
    /// The manager for all publish-subscribe channels and patterns.
    pub pubsub: PubSubManager,
    /// Propagates write commands to the replication feeder.
    pub event_bus: Arc<EventBus>,
    /// Manages clients blocked on list commands (BLPOP).
    pub blocker_manager: Arc<BlockerManager>,
    /// Manages clients blocked on stream commands (XREAD BLOCK).
    pub stream_blocker_manager: Arc<StreamBlockerManager>,
    /// A circular buffer of recent write frames for follower streaming.
    pub replication_backlog: ReplicationBacklog,
    /// Runtime state of every connected follower, keyed by peer address.
    pub replica_states: Arc<DashMap<SocketAddr, ReplicaStateInfo>>,
    /// Notified whenever the leader's replication offset advances.
    pub replication_offset_receiver: watch::Receiver<u64>,
    /// Replication identity, offsets, and the ACK notifier.
    pub replication: ReplicationState,
    /// Snapshot bookkeeping.
    pub persistence: PersistenceState,
}

impl ServerState {
    /// Initializes the entire server state from the given configuration.
    pub fn initialize(config: Config) -> Result<Arc<ServerState>, OpalDBError> {
        // A fresh 40-hex-character replication ID for this instance.
        let mut replid_bytes = [0u8; 20];
        getrandom::getrandom(&mut replid_bytes)
            .map_err(|e| OpalDBError::Internal(e.to_string()))?;
        let master_replid = hex::encode(replid_bytes);

        let (replication_backlog, replication_offset_receiver) = ReplicationBacklog::new();

        Ok(Arc::new(Self {
            db: Arc::new(Db::new()),
            config,
            pubsub: PubSubManager::new(),
            event_bus: Arc::new(EventBus::new()),
            blocker_manager: Arc::new(BlockerManager::new()),
            stream_blocker_manager: Arc::new(StreamBlockerManager::new()),
            replication_backlog,
            replica_states: Arc::new(DashMap::new()),
            replication_offset_receiver,
            replication: ReplicationState::new(master_replid),
            persistence: PersistenceState::new(),
        }))
    }

    /// Appends a frame to the replication stream: advances the global
    /// offset by the frame's encoded length and adds it to the backlog, so
    /// every follower handler picks it up.
    pub async fn feed_replication_frame(&self, frame: RespFrame) -> Result<(), OpalDBError> {
        let encoded_len = frame.encode_to_vec()?.len() as u64;
        let command_offset = self
            .replication
            .replication_info
            .master_repl_offset
            .fetch_add(encoded_len, Ordering::SeqCst);
        self.replication_backlog
            .add(command_offset, frame, encoded_len as usize)
            .await;
        Ok(())
    }

    /// Broadcasts `REPLCONF GETACK *` to every follower through the
    /// replication stream. Used by WAIT.
    pub async fn request_replica_acks(&self) -> Result<(), OpalDBError> {
        let frame = RespFrame::Array(vec![
            RespFrame::BulkString(Bytes::from_static(b"REPLCONF")),
            RespFrame::BulkString(Bytes::from_static(b"GETACK")),
            RespFrame::BulkString(Bytes::from_static(b"*")),
        ]);
        self.feed_replication_frame(frame).await
    }

    /// Records a follower's acknowledged offset and wakes pending WAITs.
    pub fn record_replica_ack(&self, addr: SocketAddr, offset: u64) {
        if let Some(mut replica_state) = self.replica_states.get_mut(&addr) {
            replica_state.value_mut().ack_offset = offset;
            replica_state.value_mut().last_ack_time = std::time::Instant::now();
        }
        self.replication.ack_notify.notify_waiters();
    }

    /// Removes a follower slot on disconnect and re-evaluates pending WAITs.
    pub fn remove_replica(&self, addr: &SocketAddr) {
        self.replica_states.remove(addr);
        self.replication.ack_notify.notify_waiters();
    }
}

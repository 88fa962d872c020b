// src/core/state/replication.rs

//! State definitions related to replication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Notify;

/// The synchronization state of a follower connected to this leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaSyncState {
    /// The follower is waiting for (or receiving) the full snapshot.
    AwaitingFullSync,
    /// The follower is online and receiving the live command stream.
    Online,
}

/// Runtime information about a connected follower, kept by the leader.
#[derive(Debug, Clone)]
pub struct ReplicaStateInfo {
    pub sync_state: ReplicaSyncState,
    /// The last replication offset acknowledged by the follower.
    pub ack_offset: u64,
    /// When the last acknowledgment arrived.
    pub last_ack_time: Instant,
}

/// This server's identity as a replication leader.
#[derive(Debug)]
pub struct ReplicationInfo {
    /// The 40-hex-character replication ID of this instance.
    pub master_replid: String,
    /// Bytes of write-command stream produced since role assignment.
    /// Strictly non-decreasing.
    pub master_repl_offset: AtomicU64,
}

/// Follower-side knowledge of the leader it replicates from.
#[derive(Debug, Default, Clone)]
pub struct LeaderInfo {
    pub master_replid: String,
    /// Bytes of replication stream this follower has applied.
    pub processed_offset: u64,
}

/// The central replication state, shared by both roles.
#[derive(Debug)]
pub struct ReplicationState {
    pub replication_info: ReplicationInfo,
    /// Set on a follower once the handshake has established the leader.
    pub leader_info: tokio::sync::Mutex<Option<LeaderInfo>>,
    /// Signalled whenever a follower ACK arrives; WAIT listens on this.
    pub ack_notify: Notify,
}

impl ReplicationState {
    pub fn new(master_replid: String) -> Self {
        Self {
            replication_info: ReplicationInfo {
                master_replid,
                master_repl_offset: AtomicU64::new(0),
            },
            leader_info: tokio::sync::Mutex::new(None),
            ack_notify: Notify::new(),
        }
    }

    /// Atomically reads the current replication offset.
    pub fn get_replication_offset(&self) -> u64 {
        self.replication_info
            .master_repl_offset
            .load(Ordering::SeqCst)
    }
}

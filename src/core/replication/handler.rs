// src/core/replication/handler.rs

//! Handles an incoming connection from a follower that has sent `PSYNC`.
//!
//! The connection handler hands the TCP stream off to this handler, whose
//! job is the synchronization lifecycle of that single follower: reply
//! `+FULLRESYNC <replid> <offset>`, ship the keyspace snapshot as a
//! length-prefixed bulk (`$<len>\r\n<bytes>`, no trailing newline), then
//! stream live command frames from the replication backlog. The read half
//! of the socket consumes `REPLCONF ACK <offset>` frames and records them
//! in the follower table for WAIT.

use crate::core::persistence::rdb;
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::state::{ReplicaStateInfo, ReplicaSyncState, ServerState};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Manages the synchronization and command streaming for one follower.
pub struct ReplicaHandler {
    state: Arc<ServerState>,
    addr: SocketAddr,
    stream: TcpStream,
}

impl ReplicaHandler {
    pub fn new(state: Arc<ServerState>, addr: SocketAddr, stream: TcpStream) -> Self {
        Self {
            state,
            addr,
            stream,
        }
    }

    /// The entry point for the handed-off connection. Cleans up the
    /// follower slot on every exit path.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        // Register the follower slot before the transfer starts.
        self.state.replica_states.insert(
            self.addr,
            ReplicaStateInfo {
                sync_state: ReplicaSyncState::AwaitingFullSync,
                ack_offset: 0,
                last_ack_time: Instant::now(),
            },
        );

        let sync_start_offset = match self.do_full_resync().await {
            Ok(offset) => offset,
            Err(e) => {
                warn!("Full resync for follower {} failed: {}", self.addr, e);
                self.state.remove_replica(&self.addr);
                return;
            }
        };

        if let Some(mut entry) = self.state.replica_states.get_mut(&self.addr) {
            entry.value_mut().sync_state = ReplicaSyncState::Online;
        }
        info!(
            "Follower {} is online after full resync at offset {}.",
            self.addr, sync_start_offset
        );

        // Split the socket: the read half collects ACKs while the write
        // half streams the backlog. Either side ending tears the pair down.
        let (read_half, write_half) = self.stream.into_split();
        let state = self.state.clone();
        let addr = self.addr;

        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("Replica handler for {} received shutdown signal.", addr);
            }
            _ = consume_acks(state.clone(), addr, read_half) => {
                debug!("ACK stream from follower {} ended.", addr);
            }
            _ = stream_live_updates(state.clone(), addr, write_half, sync_start_offset) => {
                debug!("Live update stream to follower {} ended.", addr);
            }
        }

        info!(
            "Replica handler for {} terminating. Removing its slot.",
            addr
        );
        state.remove_replica(&addr);
    }

    /// Sends the FULLRESYNC header and the snapshot payload. Returns the
    /// replication offset the live stream starts from.
    async fn do_full_resync(&mut self) -> Result<u64, anyhow::Error> {
        let master_replid = self
            .state
            .replication
            .replication_info
            .master_replid
            .clone();
        let master_repl_offset = self.state.replication.get_replication_offset();

        let header = format!("+FULLRESYNC {master_replid} {master_repl_offset}\r\n");
        self.stream.write_all(header.as_bytes()).await?;

        let snapshot = {
            let guards = self.state.db.lock_all_shards().await;
            rdb::encode_keyspace(&guards)?
        };
        info!(
            "Shipping snapshot ({} bytes) to follower {}.",
            snapshot.len(),
            self.addr
        );

        // The framing is `$<len>\r\n<bytes>` with no trailing newline.
        let prefix = format!("${}\r\n", snapshot.len());
        self.stream.write_all(prefix.as_bytes()).await?;
        self.stream.write_all(&snapshot).await?;
        self.stream.flush().await?;

        Ok(master_repl_offset)
    }
}

/// Reads `REPLCONF ACK` frames from the follower and records the offsets.
async fn consume_acks(state: Arc<ServerState>, addr: SocketAddr, read_half: OwnedReadHalf) {
    let mut framed = FramedRead::new(read_half, RespFrameCodec);
    while let Some(result) = framed.next().await {
        match result {
            Ok(RespFrame::Array(parts)) => {
                if let Some(offset) = parse_ack(&parts) {
                    debug!("Follower {} acknowledged offset {}.", addr, offset);
                    state.record_replica_ack(addr, offset);
                }
            }
            Ok(other) => {
                debug!(
                    "Ignoring unexpected frame from follower {}: {:?}",
                    addr, other
                );
            }
            Err(e) => {
                warn!("Error reading from follower {}: {}", addr, e);
                return;
            }
        }
    }
}

fn parse_ack(parts: &[RespFrame]) -> Option<u64> {
    let as_str = |frame: &RespFrame| -> Option<String> {
        match frame {
            RespFrame::BulkString(b) => Some(String::from_utf8_lossy(b).to_string()),
            _ => None,
        }
    };
    if parts.len() == 3
        && as_str(&parts[0])?.eq_ignore_ascii_case("replconf")
        && as_str(&parts[1])?.eq_ignore_ascii_case("ack")
    {
        as_str(&parts[2])?.parse().ok()
    } else {
        None
    }
}

/// Streams live frames from the backlog to the follower's write half.
async fn stream_live_updates(
    state: Arc<ServerState>,
    addr: SocketAddr,
    mut write_half: OwnedWriteHalf,
    mut last_known_offset: u64,
) {
    let mut offset_receiver = state.replication_offset_receiver.clone();
    info!(
        "Follower {} receiving live updates from offset {}.",
        addr, last_known_offset
    );

    loop {
        if offset_receiver.changed().await.is_err() {
            warn!(
                "Replication offset channel closed; stopping stream to {}.",
                addr
            );
            return;
        }

        let current_global_offset = *offset_receiver.borrow();
        if last_known_offset >= current_global_offset {
            continue;
        }

        let Some(frames) = state.replication_backlog.get_since(last_known_offset).await else {
            warn!(
                "Follower {} fell behind the backlog. Closing to force a full resync.",
                addr
            );
            return;
        };

        for (frame_offset, frame) in frames {
            match frame.encode_to_vec() {
                Ok(encoded) => {
                    if write_half.write_all(&encoded).await.is_err() {
                        warn!("Lost connection to follower {} during streaming.", addr);
                        return;
                    }
                    last_known_offset = frame_offset + encoded.len() as u64;
                }
                Err(e) => {
                    warn!("Failed to encode replication frame: {e}. Closing {}.", addr);
                    return;
                }
            }
        }
    }
}

// src/core/replication/worker.rs

//! The replication worker for a follower server.
//!
//! Owns the whole lifecycle of the follower's connection to its leader:
//! connect, perform the four-step handshake (PING, REPLCONF listening-port,
//! REPLCONF capa, PSYNC), receive and load the full snapshot, then apply
//! the continuous stream of write commands while tracking the processed
//! byte offset. Reconnects with exponential backoff.

use crate::config::ReplicationRole;
use crate::core::commands::command_trait::{CommandExt, CommandFlags};
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::state::{LeaderInfo, ServerState};
use crate::core::storage::db::ExecutionContext;
use crate::core::{Command, OpalDBError};
use bytes::BytesMut;
use futures::StreamExt;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// The main worker task for a follower server.
pub struct ReplicaWorker {
    state: Arc<ServerState>,
    /// Set while the leader stream is inside a MULTI/EXEC block.
    is_in_transaction: bool,
    queued_tx_commands: Vec<Command>,
}

impl ReplicaWorker {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self {
            state,
            is_in_transaction: false,
            queued_tx_commands: Vec::new(),
        }
    }

    /// The run loop: manages connection state and reconnection backoff.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Replica worker started.");
        let mut current_delay = INITIAL_RECONNECT_DELAY;

        loop {
            tokio::select! {
                result = self.handle_connection_cycle() => {
                    match result {
                        Err(e) => warn!("Replication cycle failed: {e}. Reconnecting..."),
                        Ok(()) => {
                            info!("Connection to leader closed cleanly. Reconnecting...");
                            current_delay = INITIAL_RECONNECT_DELAY;
                        }
                    }

                    // Jitter avoids a thundering herd when the leader
                    // restarts with many followers.
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
                    let wait_time = current_delay + jitter;
                    info!("Will try to reconnect to leader in {wait_time:?}");

                    tokio::select! {
                        _ = tokio::time::sleep(wait_time) => {}
                        _ = shutdown_rx.recv() => {
                            info!("Replica worker shutting down during backoff.");
                            return;
                        }
                    }
                    current_delay = (current_delay * 2).min(MAX_RECONNECT_DELAY);
                }
                _ = shutdown_rx.recv() => {
                    info!("Replica worker shutting down.");
                    return;
                }
            }
        }
    }

    /// One connection lifecycle: connect, handshake, snapshot, stream.
    async fn handle_connection_cycle(&mut self) -> Result<(), OpalDBError> {
        let ReplicationRole::Follower { host, port } = &self.state.config.replication else {
            return Err(OpalDBError::Internal(
                "replica worker running on a leader".into(),
            ));
        };
        let my_port = self.state.config.port;

        self.is_in_transaction = false;
        self.queued_tx_commands.clear();

        let addr = format!("{host}:{port}");
        info!("Attempting to connect to leader at {}", addr);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| OpalDBError::ReplicationError(format!("failed to connect: {e}")))?;
        info!("Connected to leader. Starting handshake...");

        let (read_half, mut write_half) = stream.into_split();
        let mut framed_reader = FramedRead::new(read_half, RespFrameCodec);

        self.perform_handshake(&mut framed_reader, &mut write_half, my_port)
            .await?;

        // The snapshot arrives as raw bytes; un-frame the reader, consume
        // exactly the announced length, and re-frame what remains so that
        // commands sharing the final read are parsed from the remainder.
        let mut remainder = framed_reader.read_buffer().clone();
        let mut read_half = framed_reader.into_inner();
        self.receive_and_load_snapshot(&mut read_half, &mut remainder)
            .await?;
        info!("Full resync successful; snapshot loaded.");

        let mut framed_reader = FramedRead::new(read_half, RespFrameCodec);
        framed_reader.read_buffer_mut().unsplit(remainder);

        let writer = Arc::new(Mutex::new(write_half));
        self.process_command_stream(&mut framed_reader, writer).await;

        Ok(())
    }

    async fn perform_handshake(
        &mut self,
        framed: &mut FramedRead<OwnedReadHalf, RespFrameCodec>,
        writer: &mut OwnedWriteHalf,
        my_port: u16,
    ) -> Result<(), OpalDBError> {
        // Step 0: PING
        writer.write_all(b"*1\r\n$4\r\nPING\r\n").await?;
        self.expect_simple_string(framed, "PONG").await?;
        debug!("Handshake step 1/4 (PING) successful.");

        // Step 1: REPLCONF listening-port
        let replconf_port = RespFrame::Array(vec![
            RespFrame::BulkString("REPLCONF".into()),
            RespFrame::BulkString("listening-port".into()),
            RespFrame::BulkString(my_port.to_string().into()),
        ])
        .encode_to_vec()?;
        writer.write_all(&replconf_port).await?;
        self.expect_simple_string(framed, "OK").await?;
        debug!("Handshake step 2/4 (REPLCONF listening-port) successful.");

        // Step 2: REPLCONF capa psync2
        let replconf_capa = RespFrame::Array(vec![
            RespFrame::BulkString("REPLCONF".into()),
            RespFrame::BulkString("capa".into()),
            RespFrame::BulkString("psync2".into()),
        ])
        .encode_to_vec()?;
        writer.write_all(&replconf_capa).await?;
        self.expect_simple_string(framed, "OK").await?;
        debug!("Handshake step 3/4 (REPLCONF capa) successful.");

        // Step 3: PSYNC ? -1
        let psync = RespFrame::Array(vec![
            RespFrame::BulkString("PSYNC".into()),
            RespFrame::BulkString("?".into()),
            RespFrame::BulkString("-1".into()),
        ])
        .encode_to_vec()?;
        writer.write_all(&psync).await?;

        let response = framed.next().await.ok_or_else(|| {
            OpalDBError::ReplicationError("connection closed during PSYNC".into())
        })??;
        let RespFrame::SimpleString(s) = response else {
            return Err(OpalDBError::ReplicationError(format!(
                "expected simple string for PSYNC, got {response:?}"
            )));
        };
        if !s.starts_with("FULLRESYNC") {
            return Err(OpalDBError::ReplicationError(format!(
                "unexpected PSYNC response: {s}"
            )));
        }
        self.handle_fullresync_response(&s).await?;
        debug!("Handshake step 4/4 (PSYNC) successful.");
        Ok(())
    }

    async fn handle_fullresync_response(&mut self, response: &str) -> Result<(), OpalDBError> {
        let parts: Vec<&str> = response.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(OpalDBError::ReplicationError(
                "invalid FULLRESYNC format".into(),
            ));
        }
        let replid = parts[1].to_string();
        let offset: u64 = parts[2].parse().map_err(|_| {
            OpalDBError::ReplicationError("invalid offset in FULLRESYNC".into())
        })?;
        info!("Leader ordered full resync. replid={replid}, offset={offset}.");
        *self.state.replication.leader_info.lock().await = Some(LeaderInfo {
            master_replid: replid,
            processed_offset: offset,
        });
        Ok(())
    }

    /// Consumes the `$<len>\r\n` prefix and exactly `<len>` snapshot bytes
    /// (starting with whatever the handshake read already buffered in
    /// `remainder`), then loads them into the keyspace.
    async fn receive_and_load_snapshot(
        &mut self,
        reader: &mut OwnedReadHalf,
        remainder: &mut BytesMut,
    ) -> Result<(), OpalDBError> {
        // Read the `$<len>\r\n` line, pulling bytes as needed.
        let header_end = loop {
            if let Some(pos) = remainder.windows(2).position(|w| w == b"\r\n") {
                break pos;
            }
            let mut chunk = [0u8; 4096];
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(OpalDBError::ReplicationError(
                    "connection closed before snapshot header".into(),
                ));
            }
            remainder.extend_from_slice(&chunk[..n]);
        };

        let header = remainder.split_to(header_end + 2);
        if header.first() != Some(&b'$') {
            return Err(OpalDBError::ReplicationError(format!(
                "expected snapshot length prefix, got: {}",
                String::from_utf8_lossy(&header)
            )));
        }
        let len_str = std::str::from_utf8(&header[1..header.len() - 2])
            .map_err(|_| OpalDBError::ReplicationError("bad snapshot length".into()))?;
        let snapshot_len: usize = len_str
            .parse()
            .map_err(|_| OpalDBError::ReplicationError("bad snapshot length".into()))?;
        info!("Receiving snapshot of {snapshot_len} bytes from leader...");

        // Consume exactly `snapshot_len` bytes; the remainder (if the tail
        // of a read extended past the snapshot) stays for the command
        // stream.
        let mut snapshot = BytesMut::with_capacity(snapshot_len);
        let take = snapshot_len.min(remainder.len());
        snapshot.extend_from_slice(&remainder.split_to(take));
        while snapshot.len() < snapshot_len {
            // Reads are capped at the bytes still owed, so the command
            // stream following the snapshot is never consumed here.
            let mut chunk = vec![0u8; (snapshot_len - snapshot.len()).min(64 * 1024)];
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(OpalDBError::ReplicationError(
                    "connection closed mid-snapshot".into(),
                ));
            }
            snapshot.extend_from_slice(&chunk[..n]);
        }

        crate::core::persistence::rdb::load_snapshot_bytes(snapshot.freeze(), &self.state.db)
            .await?;
        Ok(())
    }

    async fn process_command_stream(
        &mut self,
        framed_reader: &mut FramedRead<OwnedReadHalf, RespFrameCodec>,
        writer: Arc<Mutex<OwnedWriteHalf>>,
    ) {
        info!("In sync with leader; processing the command stream.");
        while let Some(result) = framed_reader.next().await {
            if let Err(e) = self.handle_leader_frame(result, &writer).await {
                error!("Error handling frame from leader: {e}. Disconnecting.");
                self.is_in_transaction = false;
                self.queued_tx_commands.clear();
                break;
            }
        }
    }

    async fn handle_leader_frame(
        &mut self,
        result: Result<RespFrame, OpalDBError>,
        writer: &Arc<Mutex<OwnedWriteHalf>>,
    ) -> Result<(), OpalDBError> {
        let frame = result?;
        let frame_len = frame.encode_to_vec().map(|v| v.len()).unwrap_or(0) as u64;
        let command = Command::try_from(frame)?;
        debug!("Received command from leader: {}", command.name());

        self.apply_command_or_transaction(command, writer).await?;

        // The offset never advances past bytes that have been fully parsed.
        if let Some(info) = self.state.replication.leader_info.lock().await.as_mut() {
            info.processed_offset += frame_len;
        }

        Ok(())
    }

    async fn apply_command_or_transaction(
        &mut self,
        command: Command,
        writer: &Arc<Mutex<OwnedWriteHalf>>,
    ) -> Result<(), OpalDBError> {
        match &command {
            Command::Multi => {
                if self.is_in_transaction {
                    return Err(OpalDBError::ReplicationError("nested MULTI received".into()));
                }
                self.is_in_transaction = true;
                self.queued_tx_commands.clear();
                return Ok(());
            }
            Command::Exec => {
                if !self.is_in_transaction {
                    return Err(OpalDBError::ReplicationError("EXEC without MULTI".into()));
                }
                let commands = std::mem::take(&mut self.queued_tx_commands);
                self.is_in_transaction = false;
                for command in commands {
                    self.apply_single_command(command).await?;
                }
                return Ok(());
            }
            Command::Discard => {
                self.is_in_transaction = false;
                self.queued_tx_commands.clear();
                return Ok(());
            }
            _ => {}
        }

        if self.is_in_transaction {
            self.queued_tx_commands.push(command);
            return Ok(());
        }

        if let Command::Replconf(replconf) = &command {
            if replconf
                .args
                .first()
                .is_some_and(|arg| arg.eq_ignore_ascii_case("getack"))
            {
                let offset = self
                    .state
                    .replication
                    .leader_info
                    .lock()
                    .await
                    .as_ref()
                    .map_or(0, |info| info.processed_offset);
                self.send_ack(writer.clone(), offset).await;
                return Ok(());
            }
        }

        self.apply_single_command(command).await
    }

    /// Applies one replicated write to the local keyspace. Non-write
    /// commands in the stream (e.g. PING heartbeats) are ignored.
    async fn apply_single_command(&mut self, command: Command) -> Result<(), OpalDBError> {
        if !command.get_flags().contains(CommandFlags::WRITE) {
            return Ok(());
        }

        let db = self.state.db.clone();
        let locks = db.determine_locks_for_command(&command).await;
        let mut ctx = ExecutionContext {
            state: self.state.clone(),
            locks,
            db: &db,
            command: Some(command.clone()),
            session_id: 0,
        };

        if let Err(e) = command.execute(&mut ctx).await {
            error!(
                "Failed to apply replicated command '{}': {e}. Clearing local data.",
                command.name()
            );
            self.state.db.clear_all_shards().await;
            *self.state.replication.leader_info.lock().await = None;
            return Err(OpalDBError::ReplicationError(format!(
                "failed to apply replicated command: {e}"
            )));
        }
        Ok(())
    }

    async fn send_ack(&self, writer: Arc<Mutex<OwnedWriteHalf>>, ack_offset: u64) {
        let ack = RespFrame::Array(vec![
            RespFrame::BulkString("REPLCONF".into()),
            RespFrame::BulkString("ACK".into()),
            RespFrame::BulkString(ack_offset.to_string().into()),
        ]);
        if let Ok(encoded) = ack.encode_to_vec() {
            if let Err(e) = writer.lock().await.write_all(&encoded).await {
                error!("Failed to send ACK to leader: {e}");
            } else {
                debug!("Sent ACK to leader with offset {ack_offset}");
            }
        }
    }

    async fn expect_simple_string(
        &self,
        framed: &mut FramedRead<OwnedReadHalf, RespFrameCodec>,
        expected: &str,
    ) -> Result<(), OpalDBError> {
        let frame = framed.next().await.ok_or_else(|| {
            OpalDBError::ReplicationError("connection closed during handshake".into())
        })??;
        match frame {
            RespFrame::SimpleString(s) if s.eq_ignore_ascii_case(expected) => Ok(()),
            RespFrame::Error(e) => Err(OpalDBError::ReplicationError(format!(
                "leader returned error: {e}"
            ))),
            _ => Err(OpalDBError::ReplicationError(format!(
                "expected '{expected}', got: {frame:?}"
            ))),
        }
    }
}

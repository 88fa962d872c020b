// tests/replication_test.rs

//! Replication tests: backlog bookkeeping, WAIT semantics, and an
//! end-to-end leader/follower pair over real sockets.

mod common;

use common::{run_command, run_ok, test_state};
use opaldb::config::{Config, ReplicationRole};
use opaldb::core::protocol::RespFrame;
use opaldb::core::state::{ReplicaStateInfo, ReplicaSyncState};
use opaldb::core::RespValue;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_feed_replication_frame_advances_offset() {
    let state = test_state();
    assert_eq!(state.replication.get_replication_offset(), 0);

    let frame = RespFrame::Array(vec![
        RespFrame::BulkString("SET".into()),
        RespFrame::BulkString("a".into()),
        RespFrame::BulkString("1".into()),
    ]);
    let encoded_len = frame.encode_to_vec().unwrap().len() as u64;
    state.feed_replication_frame(frame.clone()).await.unwrap();
    assert_eq!(state.replication.get_replication_offset(), encoded_len);

    // The backlog returns the frame with its starting offset.
    let frames = state.replication_backlog.get_since(0).await.unwrap();
    assert_eq!(frames, vec![(0, frame)]);
}

#[tokio::test]
async fn test_backlog_rejects_evicted_offsets() {
    let state = test_state();
    // A 3MB payload overflows the 2MB backlog, evicting itself once the
    // next frame arrives.
    let big = RespFrame::BulkString(bytes::Bytes::from(vec![b'x'; 3 * 1024 * 1024]));
    state.feed_replication_frame(big).await.unwrap();
    let small = RespFrame::SimpleString("PING".into());
    state.feed_replication_frame(small).await.unwrap();
    assert!(state.replication_backlog.get_since(0).await.is_none());
}

#[tokio::test]
async fn test_wait_returns_zero_without_followers() {
    let state = test_state();
    run_ok(&state, &["SET", "a", "1"]).await;

    let started = Instant::now();
    let (resp, _) = run_command(&state, &["WAIT", "1", "200"]).await.unwrap();
    assert_eq!(resp, RespValue::Integer(0));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(2000));
}

#[tokio::test]
async fn test_wait_counts_acked_followers() {
    let state = test_state();
    let addr: SocketAddr = "127.0.0.1:41234".parse().unwrap();
    state.replica_states.insert(
        addr,
        ReplicaStateInfo {
            sync_state: ReplicaSyncState::Online,
            ack_offset: 0,
            last_ack_time: Instant::now(),
        },
    );

    // Follower already at the current offset (0): WAIT is satisfied
    // immediately.
    let (resp, _) = run_command(&state, &["WAIT", "1", "1000"]).await.unwrap();
    assert_eq!(resp, RespValue::Integer(1));

    // Advance the leader; the follower's ACK now lags the target.
    run_ok(&state, &["SET", "a", "1"]).await;
    state
        .feed_replication_frame(RespFrame::SimpleString("noop".into()))
        .await
        .unwrap();

    let waiter_state = state.clone();
    let waiter =
        tokio::spawn(async move { run_command(&waiter_state, &["WAIT", "1", "3000"]).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    // The follower acknowledges everything so far; the pending WAIT is
    // re-evaluated on receipt.
    state.record_replica_ack(addr, u64::MAX / 2);

    let (resp, _) = waiter.await.unwrap().unwrap();
    assert_eq!(resp, RespValue::Integer(1));
}

// --- End-to-end leader/follower pair ---

/// A minimal RESP test client.
struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    async fn connect(port: u16) -> Self {
        let mut last_err = None;
        for _ in 0..50 {
            match TcpStream::connect(("127.0.0.1", port)).await {
                Ok(stream) => return Self { stream },
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        panic!("could not connect to 127.0.0.1:{port}: {last_err:?}");
    }

    async fn send(&mut self, parts: &[&str]) -> String {
        let mut request = format!("*{}\r\n", parts.len());
        for part in parts {
            request.push_str(&format!("${}\r\n{}\r\n", part.len(), part));
        }
        self.stream.write_all(request.as_bytes()).await.unwrap();

        let mut buf = vec![0u8; 64 * 1024];
        let n = tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).to_string()
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_leader_follower_end_to_end() {
    let tmp_leader = tempfile::tempdir().unwrap();
    let tmp_follower = tempfile::tempdir().unwrap();
    let leader_port = free_port();
    let follower_port = free_port();

    let leader_config = Config {
        port: leader_port,
        dir: tmp_leader.path().to_string_lossy().to_string(),
        ..Default::default()
    };
    let follower_config = Config {
        port: follower_port,
        dir: tmp_follower.path().to_string_lossy().to_string(),
        replication: ReplicationRole::Follower {
            host: "127.0.0.1".to_string(),
            port: leader_port,
        },
        ..Default::default()
    };

    let leader = tokio::spawn(opaldb::server::run(leader_config));
    let mut leader_client = TestClient::connect(leader_port).await;

    // Seed a key before the follower attaches; it must arrive via the
    // snapshot transfer.
    assert_eq!(leader_client.send(&["SET", "seeded", "early"]).await, "+OK\r\n");

    let follower = tokio::spawn(opaldb::server::run(follower_config));
    let mut follower_client = TestClient::connect(follower_port).await;

    // Wait for the follower to appear in the leader's follower table.
    let mut connected = false;
    for _ in 0..50 {
        let info = leader_client.send(&["INFO", "replication"]).await;
        if info.contains("connected_slaves:1") {
            connected = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(connected, "follower never registered with the leader");

    // A write after attach replicates through the live stream.
    assert_eq!(leader_client.send(&["SET", "a", "1"]).await, "+OK\r\n");

    // WAIT blocks until the follower acknowledges the write.
    let wait_reply = leader_client.send(&["WAIT", "1", "2000"]).await;
    assert_eq!(wait_reply, ":1\r\n", "WAIT did not observe the follower ACK");

    // Both the snapshot-shipped key and the streamed key are readable on
    // the follower.
    assert_eq!(
        follower_client.send(&["GET", "seeded"]).await,
        "$5\r\nearly\r\n"
    );
    let mut streamed = String::new();
    for _ in 0..50 {
        streamed = follower_client.send(&["GET", "a"]).await;
        if streamed == "$1\r\n1\r\n" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(streamed, "$1\r\n1\r\n");

    leader.abort();
    follower.abort();
}

// tests/unit_xread_test.rs

mod common;

use bytes::Bytes;
use common::{bulk, run_command, run_ok, test_state};
use opaldb::core::commands::command_trait::ParseCommand;
use opaldb::core::commands::streams::XRead;
use opaldb::core::protocol::RespFrame;
use opaldb::core::RespValue;
use std::time::{Duration, Instant};

fn args(parts: &[&str]) -> Vec<RespFrame> {
    parts
        .iter()
        .map(|p| RespFrame::BulkString(Bytes::from(p.to_string())))
        .collect()
}

#[tokio::test]
async fn test_xread_parse_streams_and_block() {
    let cmd = XRead::parse(&args(&["STREAMS", "a", "b", "1-0", "2-0"])).unwrap();
    assert_eq!(cmd.streams.len(), 2);
    assert_eq!(cmd.streams[0].0, Bytes::from_static(b"a"));
    assert_eq!(cmd.streams[1].1.to_string(), "2-0");
    assert!(cmd.block_timeout.is_none());

    // The BLOCK argument is in milliseconds.
    let cmd = XRead::parse(&args(&["BLOCK", "1500", "STREAMS", "a", "0-0"])).unwrap();
    assert_eq!(cmd.block_timeout, Some(Duration::from_millis(1500)));
}

#[tokio::test]
async fn test_xread_parse_rejects_uneven_streams() {
    assert!(XRead::parse(&args(&["STREAMS", "a", "b", "1-0"])).is_err());
    assert!(XRead::parse(&args(&["STREAMS"])).is_err());
    assert!(XRead::parse(&args(&["BLOCK", "abc", "STREAMS", "a", "0-0"])).is_err());
}

#[tokio::test]
async fn test_xread_returns_entries_strictly_after_id() {
    let state = test_state();
    run_ok(&state, &["XADD", "s", "1-0", "f", "a"]).await;
    run_ok(&state, &["XADD", "s", "1-1", "f", "b"]).await;
    run_ok(&state, &["XADD", "s", "2-0", "f", "c"]).await;

    let reply = run_ok(&state, &["XREAD", "STREAMS", "s", "1-0"]).await;
    let RespValue::Array(streams) = reply else {
        panic!("expected array");
    };
    let RespValue::Array(stream_result) = &streams[0] else {
        panic!("expected stream result");
    };
    assert_eq!(stream_result[0], bulk("s"));
    let RespValue::Array(entries) = &stream_result[1] else {
        panic!("expected entries");
    };
    // 1-0 itself is excluded; 1-1 and 2-0 follow it.
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_xread_without_data_and_without_block_is_null() {
    let state = test_state();
    let (resp, _) = run_command(&state, &["XREAD", "STREAMS", "s", "0-0"])
        .await
        .unwrap();
    assert_eq!(resp, RespValue::NullArray);
}

#[tokio::test]
async fn test_xread_block_times_out() {
    let state = test_state();
    let started = Instant::now();
    let (resp, _) = run_command(&state, &["XREAD", "BLOCK", "100", "STREAMS", "s", "0-0"])
        .await
        .unwrap();
    assert_eq!(resp, RespValue::NullArray);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_xread_block_woken_by_xadd() {
    let state = test_state();
    run_ok(&state, &["XADD", "s", "1-0", "f", "old"]).await;

    let reader_state = state.clone();
    let reader = tokio::spawn(async move {
        run_command(
            &reader_state,
            &["XREAD", "BLOCK", "5000", "STREAMS", "s", "1-0"],
        )
        .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    run_ok(&state, &["XADD", "s", "2-0", "f", "new"]).await;

    let (resp, _) = reader.await.unwrap().unwrap();
    let RespValue::Array(streams) = resp else {
        panic!("expected array, got null (reader was not woken)");
    };
    let RespValue::Array(stream_result) = &streams[0] else {
        panic!("expected stream result");
    };
    let RespValue::Array(entries) = &stream_result[1] else {
        panic!("expected entries");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0],
        RespValue::Array(vec![
            bulk("2-0"),
            RespValue::Array(vec![bulk("f"), bulk("new")]),
        ])
    );
}

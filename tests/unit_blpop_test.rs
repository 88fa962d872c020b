// tests/unit_blpop_test.rs

mod common;

use bytes::Bytes;
use common::{bulk, run_command, run_ok, test_state};
use opaldb::core::commands::command_trait::ParseCommand;
use opaldb::core::commands::list::BLPop;
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
async fn test_blpop_parse_fractional_seconds() {
    let cmd = BLPop::parse(&args(&["q", "0.25"])).unwrap();
    assert_eq!(cmd.keys, vec![Bytes::from_static(b"q")]);
    assert_eq!(cmd.timeout, Duration::from_millis(250));
}

#[tokio::test]
async fn test_blpop_parse_zero_waits_forever() {
    let cmd = BLPop::parse(&args(&["q", "0"])).unwrap();
    assert_eq!(cmd.timeout, Duration::MAX);
}

#[tokio::test]
async fn test_blpop_parse_rejects_bad_timeout() {
    assert!(BLPop::parse(&args(&["q", "-1"])).is_err());
    assert!(BLPop::parse(&args(&["q", "nan"])).is_err());
    assert!(BLPop::parse(&args(&["q"])).is_err());
}

#[tokio::test]
async fn test_blpop_immediate_when_data_present() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "q", "hello"]).await;
    assert_eq!(
        run_ok(&state, &["BLPOP", "q", "1"]).await,
        RespValue::Array(vec![bulk("q"), bulk("hello")])
    );
}

#[tokio::test]
async fn test_blpop_times_out_with_null_array() {
    let state = test_state();
    let started = Instant::now();
    let (resp, _) = run_command(&state, &["BLPOP", "q", "0.1"]).await.unwrap();
    assert_eq!(resp, RespValue::NullArray);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_blpop_woken_by_push() {
    let state = test_state();

    let waiter_state = state.clone();
    let waiter = tokio::spawn(async move {
        run_command(&waiter_state, &["BLPOP", "q", "5"]).await
    });

    // Give the waiter time to register before pushing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let push_reply = run_ok(&state, &["RPUSH", "q", "hello"]).await;
    assert_eq!(push_reply, RespValue::Integer(1));

    let (resp, _) = waiter.await.unwrap().unwrap();
    assert_eq!(resp, RespValue::Array(vec![bulk("q"), bulk("hello")]));

    // The handed-off element never stays in the list.
    assert_eq!(run_ok(&state, &["LLEN", "q"]).await, RespValue::Integer(0));
}

#[tokio::test]
async fn test_blpop_waiters_served_in_fifo_order() {
    let state = test_state();

    let s1 = state.clone();
    let first = tokio::spawn(async move { run_command(&s1, &["BLPOP", "q", "5"]).await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    let s2 = state.clone();
    let second = tokio::spawn(async move { run_command(&s2, &["BLPOP", "q", "5"]).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    run_ok(&state, &["RPUSH", "q", "a", "b"]).await;

    let (resp1, _) = first.await.unwrap().unwrap();
    let (resp2, _) = second.await.unwrap().unwrap();
    assert_eq!(resp1, RespValue::Array(vec![bulk("q"), bulk("a")]));
    assert_eq!(resp2, RespValue::Array(vec![bulk("q"), bulk("b")]));
}

// tests/unit_set_test.rs

mod common;

use bytes::Bytes;
use common::{bulk, run_command, run_ok, test_state};
use opaldb::core::commands::command_trait::ParseCommand;
use opaldb::core::commands::string::set::{Set, TtlOption};
use opaldb::core::protocol::RespFrame;
use opaldb::core::{OpalDBError, RespValue};
use std::time::Duration;

fn args(parts: &[&str]) -> Vec<RespFrame> {
    parts
        .iter()
        .map(|p| RespFrame::BulkString(Bytes::from(p.to_string())))
        .collect()
}

#[tokio::test]
async fn test_set_parse_simple() {
    let cmd = Set::parse(&args(&["key", "value"])).unwrap();
    assert_eq!(cmd.key, Bytes::from_static(b"key"));
    assert_eq!(cmd.value, Bytes::from_static(b"value"));
    assert_eq!(cmd.ttl, TtlOption::None);
}

#[tokio::test]
async fn test_set_parse_px_and_ex() {
    let cmd = Set::parse(&args(&["key", "value", "PX", "100"])).unwrap();
    assert_eq!(cmd.ttl, TtlOption::Milliseconds(100));
    let cmd = Set::parse(&args(&["key", "value", "ex", "5"])).unwrap();
    assert_eq!(cmd.ttl, TtlOption::Seconds(5));
}

#[tokio::test]
async fn test_set_parse_rejects_garbage() {
    assert!(Set::parse(&args(&["key"])).is_err());
    assert!(Set::parse(&args(&["key", "value", "PX"])).is_err());
    assert!(Set::parse(&args(&["key", "value", "WHAT", "1"])).is_err());
    assert!(Set::parse(&args(&["key", "value", "PX", "abc"])).is_err());
}

#[tokio::test]
async fn test_set_then_get() {
    let state = test_state();
    assert_eq!(
        run_ok(&state, &["SET", "foo", "bar"]).await,
        RespValue::SimpleString("OK".into())
    );
    assert_eq!(run_ok(&state, &["GET", "foo"]).await, bulk("bar"));
}

#[tokio::test]
async fn test_set_overwrites_other_kinds() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "k", "a"]).await;
    run_ok(&state, &["SET", "k", "v"]).await;
    assert_eq!(run_ok(&state, &["GET", "k"]).await, bulk("v"));
    assert_eq!(
        run_ok(&state, &["TYPE", "k"]).await,
        RespValue::SimpleString("string".into())
    );
}

#[tokio::test]
async fn test_set_with_px_expires() {
    let state = test_state();
    run_ok(&state, &["SET", "foo", "bar", "PX", "40"]).await;
    assert_eq!(run_ok(&state, &["GET", "foo"]).await, bulk("bar"));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(run_ok(&state, &["GET", "foo"]).await, RespValue::Null);

    // The expired key must not appear in KEYS * either.
    assert_eq!(run_ok(&state, &["KEYS", "*"]).await, RespValue::Array(vec![]));
}

#[tokio::test]
async fn test_set_px_zero_means_absent() {
    let state = test_state();
    run_ok(&state, &["SET", "foo", "bar", "PX", "0"]).await;
    assert_eq!(run_ok(&state, &["GET", "foo"]).await, RespValue::Null);
}

#[tokio::test]
async fn test_get_wrong_type_errors() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "mylist", "a"]).await;
    let err = run_command(&state, &["GET", "mylist"]).await.unwrap_err();
    assert_eq!(err, OpalDBError::WrongType);
}

// tests/unit_xadd_test.rs

mod common;

use bytes::Bytes;
use common::{bulk, run_command, run_ok, test_state};
use opaldb::core::commands::command_trait::ParseCommand;
use opaldb::core::commands::streams::XAdd;
use opaldb::core::protocol::RespFrame;
use opaldb::core::storage::stream::StreamIdSpec;
use opaldb::core::{OpalDBError, RespValue};

fn args(parts: &[&str]) -> Vec<RespFrame> {
    parts
        .iter()
        .map(|p| RespFrame::BulkString(Bytes::from(p.to_string())))
        .collect()
}

#[tokio::test]
async fn test_xadd_parse_id_forms() {
    let cmd = XAdd::parse(&args(&["s", "*", "f", "v"])).unwrap();
    assert_eq!(cmd.id_spec, StreamIdSpec::Auto);

    let cmd = XAdd::parse(&args(&["s", "5-*", "f", "v"])).unwrap();
    assert_eq!(cmd.id_spec, StreamIdSpec::AutoSequence(5));

    let cmd = XAdd::parse(&args(&["s", "1-1", "f", "v"])).unwrap();
    assert!(matches!(cmd.id_spec, StreamIdSpec::Explicit(id) if id.to_string() == "1-1"));
}

#[tokio::test]
async fn test_xadd_parse_rejects_odd_fields() {
    assert!(XAdd::parse(&args(&["s", "*", "f"])).is_err());
    assert!(XAdd::parse(&args(&["s", "*"])).is_err());
    assert!(XAdd::parse(&args(&["s", "not-an-id", "f", "v"])).is_err());
}

#[tokio::test]
async fn test_xadd_explicit_and_monotonic_errors() {
    let state = test_state();
    assert_eq!(run_ok(&state, &["XADD", "s", "1-1", "f", "v"]).await, bulk("1-1"));

    let err = run_command(&state, &["XADD", "s", "1-1", "f", "v"])
        .await
        .unwrap_err();
    assert_eq!(err, OpalDBError::StreamIdTooSmall);
    assert_eq!(
        err.to_string(),
        "ERR The ID specified in XADD is equal or smaller than the target stream top item"
    );

    let err = run_command(&state, &["XADD", "s", "0-0", "f", "v"])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "ERR The ID specified in XADD must be greater than 0-0"
    );

    // Failed inserts leave the stream untouched.
    assert_eq!(run_ok(&state, &["XLEN", "s"]).await, RespValue::Integer(1));
}

#[tokio::test]
async fn test_xadd_auto_sequence_rules() {
    let state = test_state();
    assert_eq!(run_ok(&state, &["XADD", "s", "5-5", "f", "v"]).await, bulk("5-5"));
    assert_eq!(run_ok(&state, &["XADD", "s", "5-*", "f", "v"]).await, bulk("5-6"));

    // At a fresh timestamp the sequence restarts at 0.
    assert_eq!(run_ok(&state, &["XADD", "s", "7-*", "f", "v"]).await, bulk("7-0"));

    // Timestamp zero starts at sequence 1, never 0-0.
    assert_eq!(run_ok(&state, &["XADD", "z", "0-*", "f", "v"]).await, bulk("0-1"));
}

#[tokio::test]
async fn test_xrange_full_span() {
    let state = test_state();
    run_ok(&state, &["XADD", "s", "1-1", "field", "value"]).await;

    let reply = run_ok(&state, &["XRANGE", "s", "-", "+"]).await;
    let RespValue::Array(entries) = reply else {
        panic!("expected array");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0],
        RespValue::Array(vec![
            bulk("1-1"),
            RespValue::Array(vec![bulk("field"), bulk("value")]),
        ])
    );
}

#[tokio::test]
async fn test_xrange_bounds_are_numeric() {
    let state = test_state();
    for id in ["9-0", "10-0", "11-0"] {
        run_ok(&state, &["XADD", "s", id, "f", "v"]).await;
    }
    let reply = run_ok(&state, &["XRANGE", "s", "9", "10"]).await;
    let RespValue::Array(entries) = reply else {
        panic!("expected array");
    };
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_xadd_wrong_type_guard() {
    let state = test_state();
    run_ok(&state, &["SET", "s", "v"]).await;
    let err = run_command(&state, &["XADD", "s", "*", "f", "v"])
        .await
        .unwrap_err();
    assert_eq!(err, OpalDBError::WrongType);
}

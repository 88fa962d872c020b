// tests/unit_incr_test.rs

mod common;

use common::{run_command, run_ok, test_state};
use opaldb::core::{OpalDBError, RespValue};

#[tokio::test]
async fn test_incr_creates_missing_key_as_one() {
    let state = test_state();
    assert_eq!(run_ok(&state, &["INCR", "n"]).await, RespValue::Integer(1));
    assert_eq!(run_ok(&state, &["INCR", "n"]).await, RespValue::Integer(2));
}

#[tokio::test]
async fn test_incr_parses_decimal_strings() {
    let state = test_state();
    run_ok(&state, &["SET", "n", "41"]).await;
    assert_eq!(run_ok(&state, &["INCR", "n"]).await, RespValue::Integer(42));
    assert_eq!(run_ok(&state, &["GET", "n"]).await, common::bulk("42"));
}

#[tokio::test]
async fn test_incr_rejects_non_numeric() {
    let state = test_state();
    run_ok(&state, &["SET", "n", "forty-one"]).await;
    let err = run_command(&state, &["INCR", "n"]).await.unwrap_err();
    assert_eq!(err, OpalDBError::NotAnInteger);
}

#[tokio::test]
async fn test_incr_rejects_wrong_kind() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "l", "x"]).await;
    let err = run_command(&state, &["INCR", "l"]).await.unwrap_err();
    assert_eq!(err, OpalDBError::WrongType);
}

#[tokio::test]
async fn test_incr_overflow() {
    let state = test_state();
    run_ok(&state, &["SET", "n", &i64::MAX.to_string()]).await;
    let err = run_command(&state, &["INCR", "n"]).await.unwrap_err();
    assert_eq!(err, OpalDBError::Overflow);
}

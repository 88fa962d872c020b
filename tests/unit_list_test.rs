// tests/unit_list_test.rs

mod common;

use common::{bulk, run_command, run_ok, test_state};
use opaldb::core::{OpalDBError, RespValue};

#[tokio::test]
async fn test_push_and_length() {
    let state = test_state();
    assert_eq!(
        run_ok(&state, &["RPUSH", "l", "a", "b"]).await,
        RespValue::Integer(2)
    );
    assert_eq!(
        run_ok(&state, &["LPUSH", "l", "z"]).await,
        RespValue::Integer(3)
    );
    assert_eq!(run_ok(&state, &["LLEN", "l"]).await, RespValue::Integer(3));
}

#[tokio::test]
async fn test_pop_both_ends() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "l", "a", "b", "c"]).await;
    assert_eq!(run_ok(&state, &["LPOP", "l"]).await, bulk("a"));
    assert_eq!(run_ok(&state, &["RPOP", "l"]).await, bulk("c"));
    assert_eq!(run_ok(&state, &["LLEN", "l"]).await, RespValue::Integer(1));
}

#[tokio::test]
async fn test_pop_with_count_returns_array() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "l", "a", "b", "c"]).await;
    assert_eq!(
        run_ok(&state, &["LPOP", "l", "2"]).await,
        RespValue::Array(vec![bulk("a"), bulk("b")])
    );
}

#[tokio::test]
async fn test_pop_empty_returns_null_and_removes_key() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "l", "only"]).await;
    assert_eq!(run_ok(&state, &["LPOP", "l"]).await, bulk("only"));
    // The drained list key is gone entirely.
    assert_eq!(
        run_ok(&state, &["TYPE", "l"]).await,
        RespValue::SimpleString("none".into())
    );
    assert_eq!(run_ok(&state, &["LPOP", "l"]).await, RespValue::Null);
}

#[tokio::test]
async fn test_lrange_clamps_and_negatives() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "l", "a", "b", "c", "d"]).await;
    assert_eq!(
        run_ok(&state, &["LRANGE", "l", "0", "-1"]).await,
        RespValue::Array(vec![bulk("a"), bulk("b"), bulk("c"), bulk("d")])
    );
    assert_eq!(
        run_ok(&state, &["LRANGE", "l", "-2", "100"]).await,
        RespValue::Array(vec![bulk("c"), bulk("d")])
    );
    assert_eq!(
        run_ok(&state, &["LRANGE", "l", "3", "1"]).await,
        RespValue::Array(vec![])
    );
    assert_eq!(
        run_ok(&state, &["LRANGE", "missing", "0", "-1"]).await,
        RespValue::Array(vec![])
    );
}

#[tokio::test]
async fn test_list_wrong_type_guard() {
    let state = test_state();
    run_ok(&state, &["SET", "s", "v"]).await;
    for parts in [
        &["RPUSH", "s", "x"][..],
        &["LPOP", "s"][..],
        &["LLEN", "s"][..],
        &["LRANGE", "s", "0", "-1"][..],
    ] {
        let err = run_command(&state, parts).await.unwrap_err();
        assert_eq!(err, OpalDBError::WrongType, "for {parts:?}");
    }
}

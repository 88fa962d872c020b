// tests/unit_zset_test.rs

mod common;

use common::{bulk, run_command, run_ok, test_state};
use opaldb::core::{OpalDBError, RespValue};

#[tokio::test]
async fn test_zadd_counts_new_members() {
    let state = test_state();
    assert_eq!(
        run_ok(&state, &["ZADD", "z", "1", "a", "2", "b"]).await,
        RespValue::Integer(2)
    );
    // Updating an existing member does not count as an addition.
    assert_eq!(
        run_ok(&state, &["ZADD", "z", "5", "a"]).await,
        RespValue::Integer(0)
    );
    assert_eq!(run_ok(&state, &["ZCARD", "z"]).await, RespValue::Integer(2));
}

#[tokio::test]
async fn test_zscore_and_zrank() {
    let state = test_state();
    run_ok(&state, &["ZADD", "z", "1", "a", "2", "b", "3", "c"]).await;
    assert_eq!(run_ok(&state, &["ZSCORE", "z", "b"]).await, bulk("2"));
    assert_eq!(run_ok(&state, &["ZRANK", "z", "c"]).await, RespValue::Integer(2));
    assert_eq!(run_ok(&state, &["ZRANK", "z", "nope"]).await, RespValue::Null);
    assert_eq!(run_ok(&state, &["ZSCORE", "missing", "a"]).await, RespValue::Null);
}

#[tokio::test]
async fn test_zrange_orders_by_score_then_member() {
    let state = test_state();
    run_ok(&state, &["ZADD", "z", "2", "b", "1", "z1", "1", "a1"]).await;
    assert_eq!(
        run_ok(&state, &["ZRANGE", "z", "0", "-1"]).await,
        RespValue::Array(vec![bulk("a1"), bulk("z1"), bulk("b")])
    );
    assert_eq!(
        run_ok(&state, &["ZRANGE", "z", "0", "-1", "WITHSCORES"]).await,
        RespValue::Array(vec![
            bulk("a1"),
            bulk("1"),
            bulk("z1"),
            bulk("1"),
            bulk("b"),
            bulk("2"),
        ])
    );
}

#[tokio::test]
async fn test_zrem_removes_and_cleans_up() {
    let state = test_state();
    run_ok(&state, &["ZADD", "z", "1", "a", "2", "b"]).await;
    assert_eq!(
        run_ok(&state, &["ZREM", "z", "a", "missing"]).await,
        RespValue::Integer(1)
    );
    assert_eq!(run_ok(&state, &["ZCARD", "z"]).await, RespValue::Integer(1));
    run_ok(&state, &["ZREM", "z", "b"]).await;
    // The emptied key disappears.
    assert_eq!(
        run_ok(&state, &["TYPE", "z"]).await,
        RespValue::SimpleString("none".into())
    );
}

#[tokio::test]
async fn test_zset_wrong_type_guard() {
    let state = test_state();
    run_ok(&state, &["SET", "k", "v"]).await;
    let err = run_command(&state, &["ZADD", "k", "1", "m"]).await.unwrap_err();
    assert_eq!(err, OpalDBError::WrongType);
}

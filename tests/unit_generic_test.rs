// tests/unit_generic_test.rs

mod common;

use common::{bulk, run_command, run_ok, test_state};
use opaldb::core::{OpalDBError, RespValue};

#[tokio::test]
async fn test_ping_and_echo() {
    let state = test_state();
    assert_eq!(
        run_ok(&state, &["PING"]).await,
        RespValue::SimpleString("PONG".into())
    );
    assert_eq!(run_ok(&state, &["PING", "hi"]).await, bulk("hi"));
    assert_eq!(run_ok(&state, &["ECHO", "hello"]).await, bulk("hello"));
}

#[tokio::test]
async fn test_del_counts_only_existing() {
    let state = test_state();
    run_ok(&state, &["SET", "a", "1"]).await;
    run_ok(&state, &["SET", "b", "2"]).await;
    assert_eq!(
        run_ok(&state, &["DEL", "a", "b", "missing"]).await,
        RespValue::Integer(2)
    );
    assert_eq!(run_ok(&state, &["GET", "a"]).await, RespValue::Null);
}

#[tokio::test]
async fn test_type_reports_symbolic_tags() {
    let state = test_state();
    run_ok(&state, &["SET", "s", "v"]).await;
    run_ok(&state, &["RPUSH", "l", "v"]).await;
    run_ok(&state, &["XADD", "x", "1-0", "f", "v"]).await;
    run_ok(&state, &["ZADD", "z", "1", "m"]).await;

    for (key, tag) in [("s", "string"), ("l", "list"), ("x", "stream"), ("z", "zset"), ("nope", "none")] {
        assert_eq!(
            run_ok(&state, &["TYPE", key]).await,
            RespValue::SimpleString(tag.into()),
            "for key {key}"
        );
    }
}

#[tokio::test]
async fn test_keys_star_only() {
    let state = test_state();
    run_ok(&state, &["SET", "a", "1"]).await;
    run_ok(&state, &["SET", "b", "2"]).await;

    let RespValue::Array(mut keys) = run_ok(&state, &["KEYS", "*"]).await else {
        panic!("expected array");
    };
    keys.sort_by_key(|k| format!("{k:?}"));
    assert_eq!(keys, vec![bulk("a"), bulk("b")]);

    // Any other pattern yields the empty set.
    assert_eq!(
        run_ok(&state, &["KEYS", "a*"]).await,
        RespValue::Array(vec![])
    );
}

#[tokio::test]
async fn test_config_get_reflects_startup_params() {
    let state = test_state();
    assert_eq!(
        run_ok(&state, &["CONFIG", "GET", "dir"]).await,
        RespValue::Array(vec![bulk("dir"), bulk("/tmp")])
    );
    assert_eq!(
        run_ok(&state, &["CONFIG", "GET", "dbfilename"]).await,
        RespValue::Array(vec![bulk("dbfilename"), bulk("dump.rdb")])
    );
    assert_eq!(
        run_ok(&state, &["CONFIG", "GET", "unsupported"]).await,
        RespValue::Array(vec![])
    );
}

#[tokio::test]
async fn test_info_contains_replication_fields() {
    let state = test_state();
    let RespValue::BulkString(info) = run_ok(&state, &["INFO", "replication"]).await else {
        panic!("expected bulk string");
    };
    let info = String::from_utf8(info.to_vec()).unwrap();
    assert!(info.contains("role:master"));
    assert!(info.contains("connected_slaves:0"));
    assert!(info.contains("master_replid:"));
    assert!(info.contains("master_repl_offset:0"));
}

#[tokio::test]
async fn test_unknown_command_error() {
    let state = test_state();
    let err = run_command(&state, &["FROBNICATE", "x"]).await.unwrap_err();
    assert_eq!(err, OpalDBError::UnknownCommand("frobnicate".into()));
    assert!(err.to_string().starts_with("ERR unknown command"));
}

#[tokio::test]
async fn test_wrong_arity_error_message() {
    let state = test_state();
    let err = run_command(&state, &["GET"]).await.unwrap_err();
    assert!(err
        .to_string()
        .starts_with("ERR wrong number of arguments for 'get'"));
}

// tests/unit_transaction_test.rs

mod common;

use common::{bulk, run_ok, test_state};
use opaldb::core::handler::transaction_handler::TransactionHandler;
use opaldb::core::protocol::RespFrame;
use opaldb::core::{Command, RespValue};
use std::sync::Arc;

fn parse(parts: &[&str]) -> Command {
    Command::try_from(common::frame_of(parts)).unwrap()
}

#[tokio::test]
async fn test_multi_queue_exec_flow() {
    let state = test_state();
    let db = state.db.clone();
    let mut handler = TransactionHandler::new(state.clone(), &db, 7);

    assert_eq!(
        handler.handle_multi().unwrap(),
        RespValue::SimpleString("OK".into())
    );
    assert_eq!(
        handler.handle_queueing(parse(&["SET", "x", "1"])).unwrap(),
        RespValue::SimpleString("QUEUED".into())
    );
    assert_eq!(
        handler.handle_queueing(parse(&["INCR", "x"])).unwrap(),
        RespValue::SimpleString("QUEUED".into())
    );

    let result = handler.handle_exec().await.unwrap();
    assert_eq!(
        result,
        RespValue::Array(vec![
            RespValue::SimpleString("OK".into()),
            RespValue::Integer(2),
        ])
    );

    // The queued sequence produced the same keyspace as direct execution.
    assert_eq!(run_ok(&state, &["GET", "x"]).await, bulk("2"));
}

#[tokio::test]
async fn test_discard_drops_the_queue() {
    let state = test_state();
    let db = state.db.clone();
    let mut handler = TransactionHandler::new(state.clone(), &db, 7);

    handler.handle_multi().unwrap();
    handler.handle_queueing(parse(&["SET", "x", "1"])).unwrap();
    assert_eq!(
        handler.handle_discard().unwrap(),
        RespValue::SimpleString("OK".into())
    );

    assert_eq!(run_ok(&state, &["GET", "x"]).await, RespValue::Null);
    // EXEC after DISCARD is an error.
    assert!(handler.handle_exec().await.is_err());
}

#[tokio::test]
async fn test_exec_without_multi_errors() {
    let state = test_state();
    let db = state.db.clone();
    let mut handler = TransactionHandler::new(state.clone(), &db, 7);
    assert!(handler.handle_exec().await.is_err());
    assert!(handler.handle_discard().is_err());
}

#[tokio::test]
async fn test_errored_transaction_aborts_on_exec() {
    let state = test_state();
    let db = state.db.clone();
    let mut handler = TransactionHandler::new(state.clone(), &db, 7);

    handler.handle_multi().unwrap();
    handler.handle_queueing(parse(&["SET", "x", "1"])).unwrap();
    handler.mark_error();

    let result = handler.handle_exec().await.unwrap();
    assert!(matches!(result, RespValue::Error(msg) if msg.starts_with("EXECABORT")));
    assert_eq!(run_ok(&state, &["GET", "x"]).await, RespValue::Null);
}

#[tokio::test]
async fn test_runtime_error_takes_its_reply_slot() {
    let state = test_state();
    run_ok(&state, &["RPUSH", "l", "v"]).await;

    let db = state.db.clone();
    let mut handler = TransactionHandler::new(state.clone(), &db, 7);
    handler.handle_multi().unwrap();
    handler.handle_queueing(parse(&["INCR", "l"])).unwrap();
    handler.handle_queueing(parse(&["SET", "x", "ok"])).unwrap();

    let RespValue::Array(replies) = handler.handle_exec().await.unwrap() else {
        panic!("expected array");
    };
    assert!(matches!(&replies[0], RespValue::Error(msg) if msg.starts_with("WRONGTYPE")));
    assert_eq!(replies[1], RespValue::SimpleString("OK".into()));
    assert_eq!(run_ok(&state, &["GET", "x"]).await, bulk("ok"));
}

#[tokio::test]
async fn test_nested_multi_is_rejected() {
    let state = test_state();
    let db: Arc<_> = state.db.clone();
    let handler = TransactionHandler::new(state.clone(), &db, 7);
    handler.handle_multi().unwrap();
    assert!(handler.handle_multi().is_err());
}

#[tokio::test]
async fn test_control_commands_parse_without_args_only() {
    assert!(matches!(parse(&["MULTI"]), Command::Multi));
    assert!(matches!(parse(&["exec"]), Command::Exec));
    assert!(Command::try_from(RespFrame::Array(vec![
        RespFrame::BulkString("MULTI".into()),
        RespFrame::BulkString("extra".into()),
    ]))
    .is_err());
}

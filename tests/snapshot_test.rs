// tests/snapshot_test.rs

//! Snapshot save/load round-trips through the real file path, including the
//! temp-then-rename procedure and the backup file.

mod common;

use common::{bulk, run_ok, test_state};
use opaldb::config::Config;
use opaldb::core::persistence::rdb;
use opaldb::core::persistence::saver::SnapshotSaverTask;
use opaldb::core::state::ServerState;
use opaldb::core::RespValue;
use std::sync::Arc;

fn state_with_dir(dir: &std::path::Path) -> Arc<ServerState> {
    let config = Config {
        dir: dir.to_string_lossy().to_string(),
        ..Default::default()
    };
    ServerState::initialize(config).unwrap()
}

#[tokio::test]
async fn test_save_then_load_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let state = state_with_dir(tmp.path());

    run_ok(&state, &["SET", "greeting", "Hello"]).await;
    run_ok(&state, &["RPUSH", "fruits", "apple", "banana"]).await;
    run_ok(&state, &["XADD", "s", "1-0", "f", "v1"]).await;
    run_ok(&state, &["XADD", "s", "2-0", "f", "v2"]).await;
    run_ok(&state, &["SET", "answer", "42"]).await;

    SnapshotSaverTask::perform_save(&state).await.unwrap();
    assert!(state.config.snapshot_path().exists());
    assert_eq!(state.persistence.dirty_keys(), 0);

    // A fresh database loads the same contents.
    let restored = state_with_dir(tmp.path());
    rdb::load_snapshot_file(&restored.config.snapshot_path(), &restored.db)
        .await
        .unwrap();

    assert_eq!(run_ok(&restored, &["GET", "greeting"]).await, bulk("Hello"));
    assert_eq!(run_ok(&restored, &["GET", "answer"]).await, bulk("42"));
    assert_eq!(
        run_ok(&restored, &["LRANGE", "fruits", "0", "-1"]).await,
        RespValue::Array(vec![bulk("apple"), bulk("banana")])
    );
    assert_eq!(
        run_ok(&restored, &["XLEN", "s"]).await,
        RespValue::Integer(2)
    );
    let RespValue::Array(entries) = run_ok(&restored, &["XRANGE", "s", "-", "+"]).await else {
        panic!("expected array");
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0],
        RespValue::Array(vec![
            bulk("1-0"),
            RespValue::Array(vec![bulk("f"), bulk("v1")]),
        ])
    );

    // Appending after a load respects the restored last-ID.
    let reply = run_ok(&restored, &["XADD", "s", "2-*", "f", "v3"]).await;
    assert_eq!(reply, bulk("2-1"));
}

#[tokio::test]
async fn test_expired_keys_are_not_saved() {
    let tmp = tempfile::tempdir().unwrap();
    let state = state_with_dir(tmp.path());

    run_ok(&state, &["SET", "stays", "1"]).await;
    run_ok(&state, &["SET", "goes", "2", "PX", "20"]).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    SnapshotSaverTask::perform_save(&state).await.unwrap();

    let restored = state_with_dir(tmp.path());
    rdb::load_snapshot_file(&restored.config.snapshot_path(), &restored.db)
        .await
        .unwrap();
    assert_eq!(run_ok(&restored, &["GET", "stays"]).await, bulk("1"));
    assert_eq!(run_ok(&restored, &["GET", "goes"]).await, RespValue::Null);
}

#[tokio::test]
async fn test_second_save_keeps_a_backup() {
    let tmp = tempfile::tempdir().unwrap();
    let state = state_with_dir(tmp.path());

    run_ok(&state, &["SET", "k", "v1"]).await;
    SnapshotSaverTask::perform_save(&state).await.unwrap();
    run_ok(&state, &["SET", "k", "v2"]).await;
    SnapshotSaverTask::perform_save(&state).await.unwrap();

    let path = state.config.snapshot_path();
    let backup = path.with_extension("rdb.bak");
    assert!(path.exists());
    assert!(backup.exists(), "expected backup at {}", backup.display());
}

#[tokio::test]
async fn test_missing_snapshot_starts_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let state = state_with_dir(tmp.path());
    rdb::load_snapshot_file(&state.config.snapshot_path(), &state.db)
        .await
        .unwrap();
    assert_eq!(run_ok(&state, &["KEYS", "*"]).await, RespValue::Array(vec![]));
}

#[tokio::test]
async fn test_corrupt_snapshot_fails_load() {
    let tmp = tempfile::tempdir().unwrap();
    let state = state_with_dir(tmp.path());
    tokio::fs::write(state.config.snapshot_path(), b"REDIS0009\x7Bgarbage")
        .await
        .unwrap();
    assert!(
        rdb::load_snapshot_file(&state.config.snapshot_path(), &state.db)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_save_fails_when_zset_present() {
    let tmp = tempfile::tempdir().unwrap();
    let state = state_with_dir(tmp.path());
    run_ok(&state, &["ZADD", "z", "1", "m"]).await;
    assert!(SnapshotSaverTask::perform_save(&state).await.is_err());
    // The failed save leaves no snapshot behind.
    assert!(!state.config.snapshot_path().exists());
}

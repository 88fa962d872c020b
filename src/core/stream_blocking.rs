// src/core/stream_blocking.rs

//! Manages clients blocked waiting for new entries on one or more streams,
//! for `XREAD` with the `BLOCK` option.
//!
//! Unlike the list manager, stream waiters are not handed a value: XADD
//! wakes every waiter, and each woken client re-reads its streams from its
//! own start IDs. To suppress spurious wakeups, the waiter records each
//! stream's last-assigned ID before blocking and verifies that one of them
//! advanced after waking.

use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::stream::StreamId;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

/// The outcome of a stream blocking wait.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamBlockerResult {
    /// New data arrived on at least one watched stream.
    Woken,
    /// The deadline passed (or the wakeup turned out to be spurious).
    TimedOut,
}

type Waker = oneshot::Sender<()>;
type SharedWaker = Arc<Mutex<Option<Waker>>>;

#[derive(Clone, Debug)]
struct WaiterInfo {
    session_id: u64,
    waker: SharedWaker,
}

/// Manages all clients currently blocked on stream reads.
#[derive(Debug, Default)]
pub struct StreamBlockerManager {
    waiters: DashMap<Bytes, VecDeque<WaiterInfo>>,
}

impl StreamBlockerManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Blocks on `keys` until an XADD lands or the timeout expires.
    ///
    /// The waker is registered *before* the locks are released so an XADD
    /// in the gap cannot be missed; after waking, the locks are reacquired
    /// and the recorded last-IDs are compared to detect real progress.
    pub async fn block_on(
        self: &Arc<Self>,
        ctx: &mut ExecutionContext<'_>,
        keys: &[Bytes],
        wait_timeout: Duration,
    ) -> StreamBlockerResult {
        let (tx, rx) = oneshot::channel();
        let shared_waker = Arc::new(Mutex::new(Some(tx)));
        let waiter_info = WaiterInfo {
            session_id: ctx.session_id,
            waker: shared_waker.clone(),
        };

        let initial_ids = self.snapshot_last_ids(ctx, keys);

        for key in keys {
            self.waiters
                .entry(key.clone())
                .or_default()
                .push_back(waiter_info.clone());
        }
        debug!(
            "Session {}: registered to block on streams: {:?}",
            ctx.session_id, keys
        );

        ctx.release_locks();
        let block_result = timeout(wait_timeout, rx).await;

        self.remove_waiter(keys, &shared_waker);

        if block_result.is_err() {
            return StreamBlockerResult::TimedOut;
        }

        // Reacquire and verify that a watched stream actually advanced.
        if ctx.reacquire_locks_for_command().await.is_err() {
            return StreamBlockerResult::TimedOut;
        }
        let current_ids = self.snapshot_last_ids(ctx, keys);
        let advanced = keys.iter().any(|key| {
            current_ids.get(key).copied().flatten() > initial_ids.get(key).copied().flatten()
        });
        if advanced {
            StreamBlockerResult::Woken
        } else {
            StreamBlockerResult::TimedOut
        }
    }

    /// Records each stream's last-assigned ID under the currently held locks.
    fn snapshot_last_ids(
        &self,
        ctx: &mut ExecutionContext<'_>,
        keys: &[Bytes],
    ) -> HashMap<Bytes, Option<StreamId>> {
        let mut ids = HashMap::with_capacity(keys.len());
        for key in keys {
            let last = ctx
                .guard_for_key(key)
                .and_then(|guard| guard.get(key))
                .and_then(|entry| match &entry.data {
                    DataValue::Stream(s) => s.last_id,
                    _ => None,
                });
            ids.insert(key.clone(), last);
        }
        ids
    }

    /// Wakes every client waiting on `key`. Called by XADD.
    pub fn notify(&self, key: &Bytes) {
        if let Some(mut queue) = self.waiters.get_mut(key) {
            if queue.is_empty() {
                return;
            }
            debug!(
                "Notifying {} waiters for stream '{}'",
                queue.len(),
                String::from_utf8_lossy(key)
            );
            while let Some(info) = queue.pop_front() {
                if let Ok(mut guard) = info.waker.lock() {
                    if let Some(waker) = guard.take() {
                        let _ = waker.send(());
                    }
                }
            }
        }
    }

    fn remove_waiter(&self, keys: &[Bytes], waker_to_remove: &SharedWaker) {
        for key in keys {
            if let Some(mut queue) = self.waiters.get_mut(key) {
                queue.retain(|info| !Arc::ptr_eq(&info.waker, waker_to_remove));
                if queue.is_empty() {
                    drop(queue);
                    self.waiters.remove(key);
                }
            }
        }
    }

    /// Removes all wakers for a session upon client disconnection.
    pub fn remove_waiters_for_session(&self, session_id: u64) {
        self.waiters.iter_mut().for_each(|mut queue| {
            queue.retain(|info| info.session_id != session_id);
        });
        self.waiters.retain(|_, queue| !queue.is_empty());
    }
}

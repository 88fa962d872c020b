// src/core/blocking.rs

//! Manages clients that are blocked waiting for data on list keys (BLPOP).
//!
//! A blocked client is plain data: a waker registered in a per-key queue.
//! List write commands serve waiters directly by popping the freshly pushed
//! elements and sending them through the waker, so a woken client never has
//! to race other readers for the value.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::commands::list::logic::list_pop_logic;
use crate::core::storage::db::{ExecutionContext, PopDirection};
use crate::core::{OpalDBError, RespValue};
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

/// The value handed to a woken client: the key that received data and the
/// element popped for it.
#[derive(Debug, Clone)]
pub struct PoppedValue {
    pub key: Bytes,
    pub value: Bytes,
}

/// The waker delivers the popped value, so the woken client does not re-read.
type Waker = oneshot::Sender<PoppedValue>;

/// A shareable waker slot. The `Option` allows it to be `take()`-n so it
/// fires at most once.
type SharedWaker = Arc<Mutex<Option<Waker>>>;

/// A waiting client, with its session ID for disconnect cleanup.
#[derive(Clone, Debug)]
struct WaiterInfo {
    session_id: u64,
    waker: SharedWaker,
}

/// Manages all clients currently blocked on list operations.
#[derive(Debug, Default)]
pub struct BlockerManager {
    // Key: the list key being watched. Value: FIFO queue of waiters.
    waiters: DashMap<Bytes, VecDeque<WaiterInfo>>,
}

impl BlockerManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Orchestrates a blocking left-pop across `keys`.
    ///
    /// 1. Attempts a non-blocking pop on every key first.
    /// 2. Registers the waker *before* releasing the shard locks, so a push
    ///    landing between the check and the wait cannot be missed.
    /// 3. Releases locks and waits for a hand-off or the deadline.
    pub async fn orchestrate_blocking_pop(
        self: &Arc<Self>,
        ctx: &mut ExecutionContext<'_>,
        keys: &[Bytes],
        wait_timeout: Duration,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        for key in keys {
            let (resp, outcome) = list_pop_logic(ctx, key, PopDirection::Left)?;
            if resp != RespValue::Null {
                return Ok((
                    RespValue::Array(vec![RespValue::BulkString(key.clone()), resp]),
                    outcome,
                ));
            }
        }

        let (tx, rx) = oneshot::channel();
        let shared_waker = Arc::new(Mutex::new(Some(tx)));
        let waiter_info = WaiterInfo {
            session_id: ctx.session_id,
            waker: shared_waker.clone(),
        };
        for key in keys {
            self.waiters
                .entry(key.clone())
                .or_default()
                .push_back(waiter_info.clone());
        }
        debug!(
            "Session {}: registered to block on list keys: {:?}",
            ctx.session_id, keys
        );

        ctx.release_locks();
        let block_result = timeout(wait_timeout, rx).await;

        self.remove_waiter(keys, &shared_waker);

        match block_result {
            Ok(Ok(popped)) => Ok((
                RespValue::Array(vec![
                    RespValue::BulkString(popped.key),
                    RespValue::BulkString(popped.value),
                ]),
                // The notifying push already accounted for the write.
                WriteOutcome::DidNotWrite,
            )),
            // Timed out, or the waker was dropped during shutdown.
            _ => Ok((RespValue::NullArray, WriteOutcome::DidNotWrite)),
        }
    }

    /// Called by LPUSH/RPUSH after inserting into the list, while the shard
    /// lock is still held. Pops one element per live waiter (oldest first)
    /// and hands it off; elements whose receiver vanished go back onto the
    /// front of the list.
    pub fn serve_waiters(&self, key: &Bytes, list: &mut VecDeque<Bytes>) {
        let Some(mut queue) = self.waiters.get_mut(key) else {
            return;
        };
        while !list.is_empty() {
            let Some(info) = queue.pop_front() else {
                break;
            };
            let Some(waker) = info.waker.lock().unwrap().take() else {
                // Stale waiter; its receiver already gave up.
                continue;
            };
            let value = list.pop_front().unwrap();
            let popped = PoppedValue {
                key: key.clone(),
                value: value.clone(),
            };
            if waker.send(popped).is_err() {
                list.push_front(value);
            } else {
                debug!(
                    "Handed off value to a blocked reader of list '{}'",
                    String::from_utf8_lossy(key)
                );
            }
        }
        if queue.is_empty() {
            drop(queue);
            self.waiters.remove(key);
        }
    }

    /// Removes a specific waker from all associated key queues.
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

// src/core/replication/backlog.rs

//! The replication backlog: a fixed-size, in-memory circular buffer of
//! recent write frames tagged with their starting replication offsets.
//! Follower handlers read from it to stream live updates, and a `watch`
//! channel signals every offset advance.

use crate::core::protocol::RespFrame;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::debug;

/// Backlog capacity in bytes. A follower that falls further behind than
/// this is disconnected to force a new full sync.
const BACKLOG_CAPACITY: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ReplicationBacklog {
    inner: Arc<Mutex<Inner>>,
    /// Notifies listeners (follower handlers, WAIT) that the leader's
    /// replication offset advanced.
    offset_notifier_tx: Arc<watch::Sender<u64>>,
}

#[derive(Debug)]
struct Inner {
    /// `(starting offset, frame)` tuples, oldest first.
    buffer: VecDeque<(u64, RespFrame)>,
    /// The offset of the first frame still present.
    first_offset: u64,
    capacity: usize,
    current_size: usize,
}

impl ReplicationBacklog {
    pub fn new() -> (Self, watch::Receiver<u64>) {
        let (tx, rx) = watch::channel(0u64);
        (
            Self {
                inner: Arc::new(Mutex::new(Inner {
                    buffer: VecDeque::new(),
                    first_offset: 0,
                    capacity: BACKLOG_CAPACITY,
                    current_size: 0,
                })),
                offset_notifier_tx: Arc::new(tx),
            },
            rx,
        )
    }

    /// Appends a frame whose encoded length is `frame_len`, evicting from
    /// the front until the buffer fits its capacity again, then notifies
    /// offset listeners.
    pub async fn add(&self, offset: u64, frame: RespFrame, frame_len: usize) {
        let mut inner = self.inner.lock().await;

        if inner.buffer.is_empty() {
            inner.first_offset = offset;
        }

        let new_offset_end = offset + frame_len as u64;
        inner.buffer.push_back((offset, frame));
        inner.current_size += frame_len;

        while inner.current_size > inner.capacity {
            if let Some((_, removed)) = inner.buffer.pop_front() {
                let removed_len = removed.encode_to_vec().map(|v| v.len()).unwrap_or(0);
                inner.current_size = inner.current_size.saturating_sub(removed_len);
                if let Some(first) = inner.buffer.front() {
                    inner.first_offset = first.0;
                }
            } else {
                inner.current_size = 0;
                break;
            }
        }

        self.offset_notifier_tx.send_if_modified(|current| {
            if *current < new_offset_end {
                *current = new_offset_end;
                true
            } else {
                false
            }
        });
    }

    /// All frames starting at or after `since_offset`. `None` when the
    /// requested offset has already been evicted, meaning the follower can
    /// no longer be caught up incrementally.
    pub async fn get_since(&self, since_offset: u64) -> Option<Vec<(u64, RespFrame)>> {
        let inner = self.inner.lock().await;
        if since_offset < inner.first_offset {
            debug!(
                "Requested offset {} predates the backlog (starts at {}).",
                since_offset, inner.first_offset
            );
            return None;
        }
        Some(
            inner
                .buffer
                .iter()
                .filter(|(offset, _)| *offset >= since_offset)
                .cloned()
                .collect(),
        )
    }
}

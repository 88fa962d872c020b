// src/core/state/persistence.rs

//! Snapshot-persistence bookkeeping shared between the command layer and
//! the background saver task.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PersistenceState {
    /// Keys modified since the last successful snapshot save.
    pub dirty_keys_counter: AtomicU64,
}

impl PersistenceState {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn increment_dirty_keys(&self, count: u64) {
        self.dirty_keys_counter.fetch_add(count, Ordering::Relaxed);
    }

    pub fn dirty_keys(&self) -> u64 {
        self.dirty_keys_counter.load(Ordering::Relaxed)
    }

    /// Called after a successful snapshot write.
    pub fn mark_saved(&self) {
        self.dirty_keys_counter.store(0, Ordering::Relaxed);
    }
}

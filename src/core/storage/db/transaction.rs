// src/core/storage/db/transaction.rs

//! Per-session queued-transaction state for MULTI/EXEC/DISCARD.

use crate::core::Command;

/// The state of a transaction opened by MULTI. Commands are queued as parsed
/// `Command`s and replayed through the same dispatcher on EXEC, so queued
/// and immediate execution share one code path.
#[derive(Debug, Default)]
pub struct TransactionState {
    pub in_transaction: bool,
    /// Set when a queued command failed to parse or was rejected; EXEC
    /// aborts the whole transaction in that case.
    pub has_error: bool,
    pub commands: Vec<Command>,
}

impl TransactionState {
    pub fn new() -> Self {
        Self {
            in_transaction: true,
            has_error: false,
            commands: Vec::new(),
        }
    }
}

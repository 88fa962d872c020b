// src/core/handler/transaction_handler.rs

//! Queued-transaction handling for MULTI/EXEC/DISCARD.
//!
//! Between MULTI and EXEC every command is parsed, stored, and answered
//! with `+QUEUED`; EXEC replays the queue through the same dispatcher the
//! immediate path uses, so queued and direct execution cannot diverge.

use crate::core::commands::command_trait::{CommandExt, CommandFlags, WriteOutcome};
use crate::core::events::UnitOfWork;
use crate::core::handler::command_router::rewrite_for_propagation;
use crate::core::state::ServerState;
use crate::core::storage::db::{Db, ExecutionContext};
use crate::core::{Command, OpalDBError, RespValue};
use std::sync::Arc;

pub struct TransactionHandler<'a> {
    state: Arc<ServerState>,
    db: &'a Arc<Db>,
    session_id: u64,
}

impl<'a> TransactionHandler<'a> {
    pub fn new(state: Arc<ServerState>, db: &'a Arc<Db>, session_id: u64) -> Self {
        Self {
            state,
            db,
            session_id,
        }
    }

    /// Handles `MULTI`, opening the queued-command state for the session.
    pub fn handle_multi(&self) -> Result<RespValue, OpalDBError> {
        if let Some(tx_state) = self.db.tx_states.get(&self.session_id) {
            if tx_state.in_transaction {
                return Err(OpalDBError::InvalidState(
                    "MULTI calls can not be nested".to_string(),
                ));
            }
        }
        self.db.start_transaction(self.session_id);
        Ok(RespValue::SimpleString("OK".into()))
    }

    /// Queues a command issued after MULTI, replying `+QUEUED`.
    pub fn handle_queueing(&self, command: Command) -> Result<RespValue, OpalDBError> {
        let mut tx_state = self
            .db
            .tx_states
            .get_mut(&self.session_id)
            .ok_or_else(|| OpalDBError::InvalidState("command queued without MULTI".to_string()))?;

        if tx_state.has_error {
            return Ok(RespValue::Error(
                "EXECABORT Transaction discarded because of previous errors.".to_string(),
            ));
        }

        // Commands that manipulate the session or the transaction itself
        // cannot be deferred.
        let flags = command.get_flags();
        if flags.contains(CommandFlags::TRANSACTION) || flags.contains(CommandFlags::PUBSUB) {
            tx_state.has_error = true;
            return Ok(RespValue::Error(format!(
                "ERR Command '{}' cannot be used in a transaction",
                command.name()
            )));
        }

        tx_state.commands.push(command);
        Ok(RespValue::SimpleString("QUEUED".into()))
    }

    /// Marks the open transaction as failed; EXEC will abort it.
    pub fn mark_error(&self) {
        if let Some(mut tx_state) = self.db.tx_states.get_mut(&self.session_id) {
            tx_state.has_error = true;
        }
    }

    /// Handles `DISCARD`, dropping the queue.
    pub fn handle_discard(&self) -> Result<RespValue, OpalDBError> {
        if !self.db.discard_transaction(self.session_id) {
            return Err(OpalDBError::InvalidState(
                "DISCARD without MULTI".to_string(),
            ));
        }
        Ok(RespValue::SimpleString("OK".into()))
    }

    /// Handles `EXEC`: replays the queued commands in order with queueing
    /// off, collecting each reply into the result array.
    pub async fn handle_exec(&mut self) -> Result<RespValue, OpalDBError> {
        let tx_state = self
            .db
            .take_transaction_state(self.session_id)
            .ok_or_else(|| OpalDBError::InvalidState("EXEC without MULTI".to_string()))?;

        if tx_state.has_error {
            return Ok(RespValue::Error(
                "EXECABORT Transaction discarded because of previous errors.".to_string(),
            ));
        }

        let mut responses = Vec::with_capacity(tx_state.commands.len());
        let mut write_commands = Vec::new();
        let mut total_keys_changed = 0u64;

        for command in tx_state.commands {
            let locks = self.db.determine_locks_for_command(&command).await;
            let mut ctx = ExecutionContext {
                state: self.state.clone(),
                locks,
                db: self.db,
                command: Some(command.clone()),
                session_id: self.session_id,
            };

            match command.execute(&mut ctx).await {
                Ok((resp, outcome)) => {
                    if outcome.did_write()
                        && !command.get_flags().contains(CommandFlags::NO_PROPAGATE)
                    {
                        write_commands.push(rewrite_for_propagation(&command, &resp));
                        match outcome {
                            WriteOutcome::Write { keys_modified } => {
                                total_keys_changed += keys_modified
                            }
                            WriteOutcome::Delete { keys_deleted } => {
                                total_keys_changed += keys_deleted
                            }
                            WriteOutcome::DidNotWrite => {}
                        }
                    }
                    responses.push(resp);
                }
                // A runtime failure aborts nothing already executed; the
                // error simply takes that command's slot in the reply.
                Err(e) => responses.push(RespValue::Error(e.to_string())),
            }
        }

        if !write_commands.is_empty() {
            self.state.persistence.increment_dirty_keys(total_keys_changed);
            self.state
                .event_bus
                .publish(UnitOfWork::Transaction(write_commands));
        }

        Ok(RespValue::Array(responses))
    }
}

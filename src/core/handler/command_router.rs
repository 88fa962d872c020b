// src/core/handler/command_router.rs

//! The central component for routing parsed commands to their handlers.
//!
//! The `Router` receives a parsed `Command` from the connection handler and
//! directs it through the processing pipeline: transaction queueing,
//! session-mutating commands (transactions, subscriptions, replication
//! configuration), and finally the generic execute-and-propagate path.

use super::actions;
use super::transaction_handler::TransactionHandler;
use crate::connection::SessionState;
use crate::core::commands::command_trait::{CommandExt, CommandFlags, WriteOutcome};
use crate::core::commands::streams::XAdd;
use crate::core::events::UnitOfWork;
use crate::core::state::ServerState;
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::stream::StreamId;
use crate::core::{Command, OpalDBError, RespValue};
use std::net::SocketAddr;
use std::sync::Arc;

/// The response types a routed command can produce.
pub enum RouteResponse {
    /// A single RESP value; the common case.
    Single(RespValue),
    /// Multiple values sent back-to-back, as SUBSCRIBE produces.
    Multiple(Vec<RespValue>),
    /// No reply at all (e.g. REPLCONF ACK).
    NoOp,
}

pub struct Router<'a> {
    state: Arc<ServerState>,
    session_id: u64,
    addr: SocketAddr,
    session: &'a mut SessionState,
}

impl<'a> Router<'a> {
    pub fn new(
        state: Arc<ServerState>,
        session_id: u64,
        addr: SocketAddr,
        session: &'a mut SessionState,
    ) -> Self {
        Self {
            state,
            session_id,
            addr,
            session,
        }
    }

    /// The main entry point for routing a command.
    pub async fn route(&mut self, command: Command) -> Result<RouteResponse, OpalDBError> {
        if self.session.is_in_transaction {
            return self.handle_transaction_mode(command).await;
        }
        self.handle_normal_command(command).await
    }

    /// Marks the session's open transaction as failed after a routing-level
    /// error (e.g. a command that failed to parse while queueing).
    pub fn mark_transaction_error(&self) {
        TransactionHandler::new(self.state.clone(), &self.state.db.clone(), self.session_id)
            .mark_error();
    }

    /// Inside MULTI: everything except the transaction-control commands is
    /// queued verbatim.
    async fn handle_transaction_mode(
        &mut self,
        command: Command,
    ) -> Result<RouteResponse, OpalDBError> {
        if matches!(command, Command::Exec | Command::Discard) {
            return self.handle_normal_command(command).await;
        }
        if matches!(command, Command::Multi) {
            return Err(OpalDBError::InvalidState(
                "MULTI calls can not be nested".to_string(),
            ));
        }

        let db = self.state.db.clone();
        TransactionHandler::new(self.state.clone(), &db, self.session_id)
            .handle_queueing(command)
            .map(RouteResponse::Single)
    }

    async fn handle_normal_command(
        &mut self,
        command: Command,
    ) -> Result<RouteResponse, OpalDBError> {
        let state = self.state.clone();
        let db = state.db.clone();

        match command {
            // Transaction control.
            Command::Multi => {
                let response =
                    TransactionHandler::new(state.clone(), &db, self.session_id).handle_multi()?;
                self.session.is_in_transaction = true;
                Ok(RouteResponse::Single(response))
            }
            Command::Exec => {
                self.session.is_in_transaction = false;
                TransactionHandler::new(state.clone(), &db, self.session_id)
                    .handle_exec()
                    .await
                    .map(RouteResponse::Single)
            }
            Command::Discard => {
                self.session.is_in_transaction = false;
                TransactionHandler::new(state.clone(), &db, self.session_id)
                    .handle_discard()
                    .map(RouteResponse::Single)
            }

            // Pub/Sub session transitions.
            Command::Subscribe(cmd) => {
                actions::pubsub::handle_subscribe(cmd.channels, self.session, &state)
            }
            Command::PSubscribe(cmd) => {
                actions::pubsub::handle_psubscribe(cmd.patterns, self.session, &state)
            }
            Command::Unsubscribe(cmd) => {
                actions::pubsub::handle_unsubscribe(cmd.channels, self.session)
            }
            Command::PUnsubscribe(cmd) => {
                actions::pubsub::handle_punsubscribe(cmd.patterns, self.session)
            }

            // Replication plumbing.
            Command::Replconf(ref cmd) => {
                actions::connection::handle_replconf(cmd, &state, &self.addr)
            }
            Command::Psync(_) => Err(OpalDBError::ReplicationError(
                "PSYNC should be handled by the connection handler".into(),
            )),

            // Everything else goes through the generic execution path.
            cmd => self.execute_command(cmd).await,
        }
    }

    /// Executes a command, updates the dirty counter, and propagates
    /// successful writes to the replication stream.
    async fn execute_command(&mut self, command: Command) -> Result<RouteResponse, OpalDBError> {
        let db = self.state.db.clone();
        let locks = db.determine_locks_for_command(&command).await;
        let mut ctx = ExecutionContext {
            state: self.state.clone(),
            locks,
            db: &db,
            command: Some(command.clone()),
            session_id: self.session_id,
        };
        let (resp_value, write_outcome) = command.execute(&mut ctx).await?;
        drop(ctx);

        if write_outcome != WriteOutcome::DidNotWrite {
            match write_outcome {
                WriteOutcome::Write { keys_modified } => {
                    self.state.persistence.increment_dirty_keys(keys_modified)
                }
                WriteOutcome::Delete { keys_deleted } => {
                    self.state.persistence.increment_dirty_keys(keys_deleted)
                }
                WriteOutcome::DidNotWrite => {}
            }

            if !command.get_flags().contains(CommandFlags::NO_PROPAGATE) {
                let propagated = rewrite_for_propagation(&command, &resp_value);
                self.state
                    .event_bus
                    .publish(UnitOfWork::Command(Box::new(propagated)));
            }
        }

        Ok(RouteResponse::Single(resp_value))
    }
}

/// Rewrites a command for safe propagation to followers. An XADD with an
/// auto-generated ID is replaced by one carrying the ID the leader actually
/// assigned (taken from the reply), so followers converge on the same
/// entries instead of generating their own.
pub fn rewrite_for_propagation(command: &Command, response: &RespValue) -> Command {
    if let (Command::XAdd(xadd), RespValue::BulkString(id_bytes)) = (command, response) {
        if let Ok(id) = std::str::from_utf8(id_bytes)
            .unwrap_or("")
            .parse::<StreamId>()
        {
            return Command::XAdd(XAdd::new_internal(
                xadd.key.clone(),
                id,
                xadd.fields.clone(),
            ));
        }
    }
    command.clone()
}

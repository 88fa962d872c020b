// src/core/commands/command_trait.rs

//! Defines the core traits for all executable commands.

use crate::core::storage::db::ExecutionContext;
use crate::core::protocol::RespFrame;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bitflags::bitflags;
use bytes::Bytes;

bitflags! {
    /// Flags describing the properties and behavior of a command, used by
    /// the router, transaction handler, and replication subsystem.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct CommandFlags: u32 {
        /// The command modifies the dataset.
        const WRITE        = 1 << 0;
        /// The command only reads data.
        const READONLY     = 1 << 1;
        /// An administrative command.
        const ADMIN        = 1 << 2;
        /// A command related to the Pub/Sub system.
        const PUBSUB       = 1 << 3;
        /// The command must not be propagated to followers.
        const NO_PROPAGATE = 1 << 4;
        /// A transaction-control command (MULTI, EXEC, DISCARD).
        const TRANSACTION  = 1 << 5;
    }
}

/// The outcome of a write operation, used to decide whether propagation to
/// followers is necessary and to update the dirty-key counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The command did not modify any data.
    DidNotWrite,
    /// The command modified one or more keys.
    Write { keys_modified: u64 },
    /// The command deleted one or more keys.
    Delete { keys_deleted: u64 },
}

impl WriteOutcome {
    pub fn did_write(&self) -> bool {
        !matches!(self, Self::DidNotWrite)
    }
}

/// A composite trait implemented on the `Command` enum, delegating to the
/// per-command implementations.
#[async_trait]
pub trait CommandExt {
    fn get_flags(&self) -> CommandFlags;
    fn get_keys(&self) -> Vec<Bytes>;

    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError>;
}

/// The execution logic of one command, implemented by its struct.
#[async_trait]
pub trait ExecutableCommand {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError>;
}

/// Parsing a command's arguments from the frames following its name.
pub trait ParseCommand: Sized {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError>;
}

/// Static command metadata plus the argument serialization used when a
/// command is re-encoded for replication.
pub trait CommandSpec {
    fn name(&self) -> &'static str;
    fn flags(&self) -> CommandFlags;
    fn get_keys(&self) -> Vec<Bytes>;
    fn to_resp_args(&self) -> Vec<Bytes>;
}

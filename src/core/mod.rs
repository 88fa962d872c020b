// src/core/mod.rs

//! The server core: protocol, storage, commands, blocking, pub/sub,
//! persistence, replication, and shared state.

pub mod blocking;
pub mod commands;
pub mod errors;
pub mod events;
pub mod handler;
pub mod persistence;
pub mod protocol;
pub mod pubsub;
pub mod replication;
pub mod state;
pub mod storage;
pub mod stream_blocking;

pub use commands::Command;
pub use errors::OpalDBError;
pub use protocol::{RespFrame, RespValue};

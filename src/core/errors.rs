// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::num::{ParseFloatError, ParseIntError};
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
/// Using `thiserror` keeps the wire-level message next to each variant; the
/// connection layer renders these directly into RESP error replies.
#[derive(Error, Debug)]
pub enum OpalDBError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete data in stream")]
    IncompleteData,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR syntax error")]
    SyntaxError,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgumentCount(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR {0}")]
    InvalidState(String),

    #[error("ERR timeout is not a float or out of range")]
    InvalidTimeout,

    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdTooSmall,

    #[error("ERR The ID specified in XADD must be greater than 0-0")]
    StreamIdZero,

    #[error("ERR Invalid stream ID specified as stream command argument")]
    InvalidStreamId,

    #[error("Replication Error: {0}")]
    ReplicationError(String),

    #[error("Persistence Error: {0}")]
    PersistenceError(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// The Arc makes cloning cheap and shared.
impl Clone for OpalDBError {
    fn clone(&self) -> Self {
        match self {
            OpalDBError::Io(e) => OpalDBError::Io(Arc::clone(e)),
            OpalDBError::IncompleteData => OpalDBError::IncompleteData,
            OpalDBError::UnknownCommand(s) => OpalDBError::UnknownCommand(s.clone()),
            OpalDBError::SyntaxError => OpalDBError::SyntaxError,
            OpalDBError::WrongArgumentCount(s) => OpalDBError::WrongArgumentCount(s.clone()),
            OpalDBError::WrongType => OpalDBError::WrongType,
            OpalDBError::NotAnInteger => OpalDBError::NotAnInteger,
            OpalDBError::NotAFloat => OpalDBError::NotAFloat,
            OpalDBError::Overflow => OpalDBError::Overflow,
            OpalDBError::InvalidState(s) => OpalDBError::InvalidState(s.clone()),
            OpalDBError::InvalidTimeout => OpalDBError::InvalidTimeout,
            OpalDBError::StreamIdTooSmall => OpalDBError::StreamIdTooSmall,
            OpalDBError::StreamIdZero => OpalDBError::StreamIdZero,
            OpalDBError::InvalidStreamId => OpalDBError::InvalidStreamId,
            OpalDBError::ReplicationError(s) => OpalDBError::ReplicationError(s.clone()),
            OpalDBError::PersistenceError(s) => OpalDBError::PersistenceError(s.clone()),
            OpalDBError::Internal(s) => OpalDBError::Internal(s.clone()),
        }
    }
}

impl PartialEq for OpalDBError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OpalDBError::Io(e1), OpalDBError::Io(e2)) => e1.to_string() == e2.to_string(),
            (OpalDBError::UnknownCommand(s1), OpalDBError::UnknownCommand(s2)) => s1 == s2,
            (OpalDBError::WrongArgumentCount(s1), OpalDBError::WrongArgumentCount(s2)) => s1 == s2,
            (OpalDBError::InvalidState(s1), OpalDBError::InvalidState(s2)) => s1 == s2,
            (OpalDBError::ReplicationError(s1), OpalDBError::ReplicationError(s2)) => s1 == s2,
            (OpalDBError::PersistenceError(s1), OpalDBError::PersistenceError(s2)) => s1 == s2,
            (OpalDBError::Internal(s1), OpalDBError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for OpalDBError {
    fn from(e: std::io::Error) -> Self {
        OpalDBError::Io(Arc::new(e))
    }
}

impl From<std::str::Utf8Error> for OpalDBError {
    fn from(_: std::str::Utf8Error) -> Self {
        OpalDBError::WrongType
    }
}

impl From<std::string::FromUtf8Error> for OpalDBError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        OpalDBError::WrongType
    }
}

impl From<ParseIntError> for OpalDBError {
    fn from(_: ParseIntError) -> Self {
        OpalDBError::NotAnInteger
    }
}

impl From<ParseFloatError> for OpalDBError {
    fn from(_: ParseFloatError) -> Self {
        OpalDBError::NotAFloat
    }
}

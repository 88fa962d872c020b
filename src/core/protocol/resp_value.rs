// src/core/protocol/resp_value.rs

//! Defines a simplified value type for use within the command execution layer.

use bytes::Bytes;

/// `RespValue` is a simplified version of `RespFrame`.
///
/// It is the return type of command execution logic: the command layer only
/// ever *produces* values, so it does not need the full parsing-side protocol
/// machinery. It converts into a `RespFrame` right before hitting the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    BulkString(Bytes),
    Integer(i64),
    Array(Vec<RespValue>),
    Null,
    NullArray,
    Error(String),
}

impl From<RespValue> for super::RespFrame {
    fn from(val: RespValue) -> Self {
        match val {
            RespValue::SimpleString(s) => super::RespFrame::SimpleString(s),
            RespValue::BulkString(b) => super::RespFrame::BulkString(b),
            RespValue::Integer(i) => super::RespFrame::Integer(i),
            RespValue::Array(arr) => {
                super::RespFrame::Array(arr.into_iter().map(Into::into).collect())
            }
            RespValue::Null => super::RespFrame::Null,
            RespValue::NullArray => super::RespFrame::NullArray,
            RespValue::Error(s) => super::RespFrame::Error(s),
        }
    }
}

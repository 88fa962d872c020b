// src/core/storage/data_types.rs

//! Defines the core data structures for storing values in the database,
//! such as `StoredValue` and the `DataValue` tagged union.

use crate::core::storage::stream::Stream;
use crate::core::storage::zset::SortedSet;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Instant;

/// A wrapper for all values stored in the database: the payload plus the
/// optional absolute expiry instant.
#[derive(Debug, PartialEq)]
pub struct StoredValue {
    pub data: DataValue,
    pub expiry: Option<Instant>,
}

impl StoredValue {
    pub fn new(data: DataValue) -> Self {
        Self { data, expiry: None }
    }

    pub fn with_expiry(data: DataValue, expiry: Option<Instant>) -> Self {
        Self { data, expiry }
    }

    /// A value is expired once its expiry instant has passed. Values without
    /// an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= Instant::now())
    }
}

/// The tagged union of every value kind the keyspace can hold.
#[derive(Debug, PartialEq)]
pub enum DataValue {
    String(Bytes),
    /// A decimal-representable value, kept as a native integer so INCR can
    /// avoid reparsing.
    Integer(i64),
    List(VecDeque<Bytes>),
    SortedSet(SortedSet),
    Stream(Stream),
}

impl DataValue {
    /// The symbolic tag reported by TYPE. Integers render as strings, so
    /// they report the string tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) | DataValue::Integer(_) => "string",
            DataValue::List(_) => "list",
            DataValue::SortedSet(_) => "zset",
            DataValue::Stream(_) => "stream",
        }
    }

    /// Renders string-kind payloads to bytes. `None` for non-string kinds.
    pub fn as_string_bytes(&self) -> Option<Bytes> {
        match self {
            DataValue::String(b) => Some(b.clone()),
            DataValue::Integer(i) => Some(Bytes::from(i.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn expiry_semantics() {
        let mut value = StoredValue::new(DataValue::String(Bytes::from_static(b"v")));
        assert!(!value.is_expired());
        value.expiry = Some(Instant::now() - Duration::from_millis(1));
        assert!(value.is_expired());
        value.expiry = Some(Instant::now() + Duration::from_secs(60));
        assert!(!value.is_expired());
    }

    #[test]
    fn type_names() {
        assert_eq!(
            DataValue::String(Bytes::from_static(b"x")).type_name(),
            "string"
        );
        assert_eq!(DataValue::Integer(7).type_name(), "string");
        assert_eq!(DataValue::List(VecDeque::new()).type_name(), "list");
        assert_eq!(DataValue::SortedSet(SortedSet::new()).type_name(), "zset");
        assert_eq!(DataValue::Stream(Stream::new()).type_name(), "stream");
    }

    #[test]
    fn integer_renders_as_decimal() {
        assert_eq!(
            DataValue::Integer(-42).as_string_bytes(),
            Some(Bytes::from_static(b"-42"))
        );
    }
}

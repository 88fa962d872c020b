// src/core/storage/stream.rs

//! The append-only stream value type: entries with monotonically increasing
//! `<ms>-<seq>` IDs, indexed by their ID string in a radix tree.

use super::radix_tree::RadixTree;
use crate::core::OpalDBError;
use bytes::Bytes;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

// --- Stream ID ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamId {
    pub timestamp_ms: u64,
    pub sequence: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId {
        timestamp_ms: 0,
        sequence: 0,
    };
    pub const MAX: StreamId = StreamId {
        timestamp_ms: u64::MAX,
        sequence: u64::MAX,
    };

    pub fn new(timestamp_ms: u64, sequence: u64) -> Self {
        Self {
            timestamp_ms,
            sequence,
        }
    }

    /// The smallest ID strictly greater than `self`. Increments the
    /// sequence; on overflow, bumps the timestamp and resets the sequence.
    pub fn successor(&self) -> Option<StreamId> {
        if self.sequence < u64::MAX {
            Some(StreamId::new(self.timestamp_ms, self.sequence + 1))
        } else if self.timestamp_ms < u64::MAX {
            Some(StreamId::new(self.timestamp_ms + 1, 0))
        } else {
            None
        }
    }
}

impl FromStr for StreamId {
    type Err = OpalDBError;

    /// Parses `<ms>-<seq>`; a bare `<ms>` defaults the sequence to 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            None => {
                let timestamp_ms = s.parse().map_err(|_| OpalDBError::InvalidStreamId)?;
                Ok(StreamId::new(timestamp_ms, 0))
            }
            Some((ts, seq)) => {
                let timestamp_ms = ts.parse().map_err(|_| OpalDBError::InvalidStreamId)?;
                let sequence = seq.parse().map_err(|_| OpalDBError::InvalidStreamId)?;
                Ok(StreamId::new(timestamp_ms, sequence))
            }
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.timestamp_ms, self.sequence)
    }
}

/// The ID argument of an XADD: full auto (`*`), auto-sequence (`<ms>-*`),
/// or fully explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamIdSpec {
    Auto,
    AutoSequence(u64),
    Explicit(StreamId),
}

impl StreamIdSpec {
    pub fn parse(s: &str) -> Result<Self, OpalDBError> {
        if s == "*" {
            return Ok(StreamIdSpec::Auto);
        }
        if let Some(ts) = s.strip_suffix("-*") {
            let timestamp_ms = ts.parse().map_err(|_| OpalDBError::InvalidStreamId)?;
            return Ok(StreamIdSpec::AutoSequence(timestamp_ms));
        }
        Ok(StreamIdSpec::Explicit(s.parse()?))
    }
}

// --- Stream entry ---

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    /// Field-value pairs, in the order the client supplied them.
    pub fields: IndexMap<Bytes, Bytes>,
}

// --- Stream ---

#[derive(Debug, Default, PartialEq)]
pub struct Stream {
    /// Entries keyed by their exact `<ms>-<seq>` string.
    pub entries: RadixTree<StreamEntry>,
    /// The largest ID ever assigned; `None` until the first append.
    pub last_id: Option<StreamId>,
    pub length: u64,
    /// Retained for the snapshot format; 0 means unbounded.
    pub maxlen: u64,
}

impl Stream {
    pub fn new() -> Self {
        Default::default()
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn last(&self) -> StreamId {
        self.last_id.unwrap_or(StreamId::ZERO)
    }

    /// Resolves an ID spec into a concrete new ID, enforcing the monotonic
    /// ordering rules. Does not mutate the stream on error.
    fn generate_id(&self, spec: StreamIdSpec) -> Result<StreamId, OpalDBError> {
        match spec {
            StreamIdSpec::Auto => {
                let last = self.last();
                let mut timestamp_ms = Self::now_ms();
                let sequence = if timestamp_ms == last.timestamp_ms {
                    last.sequence + 1
                } else if timestamp_ms > last.timestamp_ms {
                    0
                } else {
                    // Clock moved backwards: stay on the last timestamp.
                    timestamp_ms = last.timestamp_ms;
                    last.sequence + 1
                };
                Ok(StreamId::new(timestamp_ms, sequence))
            }
            StreamIdSpec::AutoSequence(timestamp_ms) => {
                let last = self.last();
                let sequence = if self.last_id.is_some() && last.timestamp_ms == timestamp_ms {
                    last.sequence + 1
                } else if timestamp_ms == 0 {
                    // 0-0 is reserved, so the first ID at timestamp 0 is 0-1.
                    1
                } else {
                    0
                };
                let id = StreamId::new(timestamp_ms, sequence);
                self.validate_explicit(id)?;
                Ok(id)
            }
            StreamIdSpec::Explicit(id) => {
                self.validate_explicit(id)?;
                Ok(id)
            }
        }
    }

    fn validate_explicit(&self, id: StreamId) -> Result<(), OpalDBError> {
        if id == StreamId::ZERO {
            return Err(OpalDBError::StreamIdZero);
        }
        if id <= self.last() {
            return Err(OpalDBError::StreamIdTooSmall);
        }
        Ok(())
    }

    /// Appends an entry, returning its assigned ID. On any ID error the
    /// stream is left unchanged.
    pub fn add_entry(
        &mut self,
        spec: StreamIdSpec,
        fields: IndexMap<Bytes, Bytes>,
    ) -> Result<StreamId, OpalDBError> {
        let id = self.generate_id(spec)?;
        let entry = StreamEntry { id, fields };
        self.entries.insert(id.to_string().as_bytes(), entry);
        self.last_id = Some(id);
        self.length += 1;
        Ok(id)
    }

    /// Inserts a fully-formed entry during snapshot load, bypassing the
    /// monotonicity checks (the file records `last_id` separately).
    pub fn insert_loaded_entry(&mut self, entry: StreamEntry) {
        self.entries.insert(entry.id.to_string().as_bytes(), entry);
        self.length += 1;
    }

    pub fn get(&self, id: StreamId) -> Option<&StreamEntry> {
        self.entries.get(id.to_string().as_bytes())
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Inclusive range query under the numeric `(ms, seq)` order.
    ///
    /// The index is enumerated through the radix tree's full-span scan (the
    /// `-`/`+` sentinels of the range API) and bounds are applied to the
    /// parsed IDs: the decimal ID strings are not lexicographically ordered
    /// across digit-count boundaries, so the numeric filter is what upholds
    /// the ID ordering invariant.
    pub fn range(&self, lo: StreamId, hi: StreamId) -> Vec<&StreamEntry> {
        let mut results: Vec<&StreamEntry> = self
            .entries
            .range(b"0-0".as_ref(), max_id_sentinel())
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.id >= lo && entry.id <= hi)
            .collect();
        results.sort_by_key(|e| e.id);
        results
    }

    /// Entries strictly after `id`: the successor ID scanned to infinity.
    pub fn read_after(&self, id: StreamId) -> Vec<&StreamEntry> {
        match id.successor() {
            Some(start) => self.range(start, StreamId::MAX),
            None => vec![],
        }
    }
}

/// The upper sentinel handed to the radix-tree range scan: lexicographically
/// above any decimal `<ms>-<seq>` string.
fn max_id_sentinel() -> &'static [u8] {
    b"99999999999999999999-99999999999999999999"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> IndexMap<Bytes, Bytes> {
        pairs
            .iter()
            .map(|(k, v)| (Bytes::from(k.to_string()), Bytes::from(v.to_string())))
            .collect()
    }

    #[test]
    fn explicit_ids_must_increase() {
        let mut stream = Stream::new();
        let id = stream
            .add_entry(StreamIdSpec::parse("1-1").unwrap(), fields(&[("f", "v")]))
            .unwrap();
        assert_eq!(id, StreamId::new(1, 1));

        let err = stream
            .add_entry(StreamIdSpec::parse("1-1").unwrap(), fields(&[("f", "v")]))
            .unwrap_err();
        assert_eq!(err, OpalDBError::StreamIdTooSmall);
        assert_eq!(stream.len(), 1);
        assert_eq!(stream.last_id, Some(StreamId::new(1, 1)));
        assert!(stream.get(StreamId::new(1, 1)).is_some());
        assert!(stream.get(StreamId::new(1, 2)).is_none());
    }

    #[test]
    fn zero_zero_is_rejected() {
        let mut stream = Stream::new();
        let err = stream
            .add_entry(StreamIdSpec::parse("0-0").unwrap(), fields(&[("f", "v")]))
            .unwrap_err();
        assert_eq!(err, OpalDBError::StreamIdZero);
        assert!(stream.is_empty());
    }

    #[test]
    fn auto_sequence_continues_same_timestamp() {
        let mut stream = Stream::new();
        stream
            .add_entry(StreamIdSpec::parse("5-0").unwrap(), fields(&[("a", "1")]))
            .unwrap();
        let id = stream
            .add_entry(StreamIdSpec::parse("5-*").unwrap(), fields(&[("a", "2")]))
            .unwrap();
        assert_eq!(id, StreamId::new(5, 1));
    }

    #[test]
    fn auto_sequence_at_zero_timestamp_starts_at_one() {
        let mut stream = Stream::new();
        let id = stream
            .add_entry(StreamIdSpec::parse("0-*").unwrap(), fields(&[("a", "1")]))
            .unwrap();
        assert_eq!(id, StreamId::new(0, 1));
    }

    #[test]
    fn auto_sequence_behind_last_is_rejected() {
        let mut stream = Stream::new();
        stream
            .add_entry(StreamIdSpec::parse("9-0").unwrap(), fields(&[("a", "1")]))
            .unwrap();
        let err = stream
            .add_entry(StreamIdSpec::parse("3-*").unwrap(), fields(&[("a", "2")]))
            .unwrap_err();
        assert_eq!(err, OpalDBError::StreamIdTooSmall);
    }

    #[test]
    fn full_auto_ids_strictly_increase() {
        let mut stream = Stream::new();
        let mut prev = StreamId::ZERO;
        for _ in 0..100 {
            let id = stream
                .add_entry(StreamIdSpec::Auto, fields(&[("k", "v")]))
                .unwrap();
            assert!(id > prev);
            prev = id;
        }
    }

    #[test]
    fn range_is_numeric_across_digit_widths() {
        let mut stream = Stream::new();
        for ms in [9u64, 10, 11] {
            stream
                .add_entry(
                    StreamIdSpec::Explicit(StreamId::new(ms, 0)),
                    fields(&[("k", "v")]),
                )
                .unwrap();
        }
        let ids: Vec<StreamId> = stream
            .range(StreamId::new(9, 0), StreamId::new(10, u64::MAX))
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![StreamId::new(9, 0), StreamId::new(10, 0)]);
    }

    #[test]
    fn read_after_is_strictly_greater() {
        let mut stream = Stream::new();
        for seq in 0..3 {
            stream
                .add_entry(
                    StreamIdSpec::Explicit(StreamId::new(1, seq)),
                    fields(&[("k", "v")]),
                )
                .unwrap();
        }
        let ids: Vec<StreamId> = stream
            .read_after(StreamId::new(1, 0))
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![StreamId::new(1, 1), StreamId::new(1, 2)]);
    }

    #[test]
    fn read_after_sequence_overflow_rolls_timestamp() {
        let id = StreamId::new(7, u64::MAX);
        assert_eq!(id.successor(), Some(StreamId::new(8, 0)));
    }
}

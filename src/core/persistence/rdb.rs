// src/core/persistence/rdb.rs

//! The binary snapshot codec.
//!
//! File layout: the 9-byte magic (`REDIS` + 4-character version), one or
//! more database sections introduced by `0xFE <db-number>`, key/value
//! records of `[type tag][key][value body]`, and a `0xFF` terminator.
//! Lengths use a variable-width prefix (6-bit, 14-bit, or 32-bit forms);
//! small integers inside string values may use the 2-byte `0xF0` form.
//!
//! Saving buffers through a 6 KiB writer and writes via a temporary path
//! that is renamed over the target, keeping one `.bak` backup. Loading is a
//! single forward pass.

use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::{Db, ShardCache};
use crate::core::storage::stream::{Stream, StreamEntry, StreamId};
use crate::core::OpalDBError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::MutexGuard;
use tracing::{info, warn};

const RDB_MAGIC: &[u8] = b"REDIS";
const RDB_VERSION: &[u8] = b"0009";

const RDB_OPCODE_SELECTDB: u8 = 0xFE;
const RDB_OPCODE_EOF: u8 = 0xFF;
/// Marker for the 2-byte signed-int8 string encoding.
const RDB_ENC_INT8: u8 = 0xF0;

const RDB_TYPE_STRING: u8 = 0x00;
const RDB_TYPE_LIST: u8 = 0x01;
/// Reserved tags: declared for sets, sorted sets, and hashes, refused on
/// save until those bodies are specified.
const RDB_TYPE_SET: u8 = 0x02;
const RDB_TYPE_ZSET: u8 = 0x03;
const RDB_TYPE_HASH: u8 = 0x04;
const RDB_TYPE_STREAM: u8 = 0x0F;

/// The save path buffers file writes through this many bytes.
const SAVE_BUFFER_SIZE: usize = 6 * 1024;

// --- Length and string encoding ---

fn write_length(buf: &mut BytesMut, len: u64) -> Result<(), OpalDBError> {
    if len < (1 << 6) {
        // 6-bit: 00LLLLLL
        buf.put_u8(len as u8);
    } else if len < (1 << 14) {
        // 14-bit: 01LLLLLL LLLLLLLL
        buf.put_u8(((len >> 8) as u8 & 0x3F) | 0x40);
        buf.put_u8(len as u8);
    } else if len <= u32::MAX as u64 {
        // 32-bit: 10...... followed by 4 bytes big-endian
        buf.put_u8(0x80);
        buf.put_u32(len as u32);
    } else {
        return Err(OpalDBError::PersistenceError(
            "length exceeds the 32-bit snapshot limit".into(),
        ));
    }
    Ok(())
}

fn read_length(cursor: &mut Bytes) -> Result<u64, OpalDBError> {
    if !cursor.has_remaining() {
        return Err(corrupt("unexpected end of file reading length"));
    }
    let first = cursor.get_u8();
    match (first & 0xC0) >> 6 {
        0b00 => Ok(u64::from(first & 0x3F)),
        0b01 => {
            if !cursor.has_remaining() {
                return Err(corrupt("unexpected end of file reading 14-bit length"));
            }
            let second = cursor.get_u8();
            Ok((u64::from(first & 0x3F) << 8) | u64::from(second))
        }
        0b10 => {
            if cursor.remaining() < 4 {
                return Err(corrupt("unexpected end of file reading 32-bit length"));
            }
            Ok(u64::from(cursor.get_u32()))
        }
        _ => Err(corrupt("unknown length encoding")),
    }
}

fn write_string(buf: &mut BytesMut, s: &[u8]) -> Result<(), OpalDBError> {
    write_length(buf, s.len() as u64)?;
    buf.put_slice(s);
    Ok(())
}

fn read_string(cursor: &mut Bytes) -> Result<Bytes, OpalDBError> {
    let len = read_length(cursor)? as usize;
    if cursor.remaining() < len {
        return Err(corrupt("unexpected end of file reading string"));
    }
    Ok(cursor.split_to(len))
}

fn corrupt(msg: &str) -> OpalDBError {
    OpalDBError::PersistenceError(format!("corrupt snapshot: {msg}"))
}

// --- Value bodies ---

/// Writes the value body of an integer: the 2-byte `0xF0` form when it fits
/// a signed byte, a decimal string otherwise.
fn write_integer_body(buf: &mut BytesMut, value: i64) -> Result<(), OpalDBError> {
    if (i8::MIN as i64..=i8::MAX as i64).contains(&value) {
        buf.put_u8(RDB_ENC_INT8);
        buf.put_i8(value as i8);
        Ok(())
    } else {
        write_string(buf, value.to_string().as_bytes())
    }
}

fn write_value(buf: &mut BytesMut, value: &DataValue) -> Result<(), OpalDBError> {
    match value {
        DataValue::String(s) => write_string(buf, s),
        DataValue::Integer(i) => write_integer_body(buf, *i),
        DataValue::List(list) => {
            write_length(buf, list.len() as u64)?;
            for item in list {
                write_string(buf, item)?;
            }
            Ok(())
        }
        DataValue::Stream(stream) => write_stream_body(buf, stream),
        DataValue::SortedSet(_) => Err(OpalDBError::PersistenceError(
            "sorted sets are not yet encodable in the snapshot format".into(),
        )),
    }
}

fn type_tag(value: &DataValue) -> u8 {
    match value {
        DataValue::String(_) | DataValue::Integer(_) => RDB_TYPE_STRING,
        DataValue::List(_) => RDB_TYPE_LIST,
        DataValue::SortedSet(_) => RDB_TYPE_ZSET,
        DataValue::Stream(_) => RDB_TYPE_STREAM,
    }
}

/// Stream body: entry count, last-ID string, max-length, then per entry the
/// ID string, field count, and the field/value pairs.
fn write_stream_body(buf: &mut BytesMut, stream: &Stream) -> Result<(), OpalDBError> {
    write_length(buf, stream.length)?;
    let last_id = stream
        .last_id
        .map(|id| id.to_string())
        .unwrap_or_default();
    write_string(buf, last_id.as_bytes())?;
    write_length(buf, stream.maxlen)?;

    for entry in stream.range(StreamId::ZERO, StreamId::MAX) {
        write_stream_entry(buf, entry)?;
    }
    Ok(())
}

fn write_stream_entry(buf: &mut BytesMut, entry: &StreamEntry) -> Result<(), OpalDBError> {
    write_string(buf, entry.id.to_string().as_bytes())?;
    write_length(buf, entry.fields.len() as u64)?;
    for (field, value) in &entry.fields {
        write_string(buf, field)?;
        write_string(buf, value)?;
    }
    Ok(())
}

fn read_stream_body(cursor: &mut Bytes) -> Result<Stream, OpalDBError> {
    let entry_count = read_length(cursor)?;
    let last_id_raw = read_string(cursor)?;
    let maxlen = read_length(cursor)?;

    let mut stream = Stream::new();
    stream.maxlen = maxlen;
    if !last_id_raw.is_empty() {
        let last_id: StreamId = std::str::from_utf8(&last_id_raw)
            .map_err(|_| corrupt("stream last-ID is not valid UTF-8"))?
            .parse()
            .map_err(|_| corrupt("stream last-ID is malformed"))?;
        stream.last_id = Some(last_id);
    }

    for _ in 0..entry_count {
        let id_raw = read_string(cursor)?;
        let id: StreamId = std::str::from_utf8(&id_raw)
            .map_err(|_| corrupt("stream entry ID is not valid UTF-8"))?
            .parse()
            .map_err(|_| corrupt("stream entry ID is malformed"))?;
        let field_count = read_length(cursor)?;
        let mut fields = IndexMap::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let field = read_string(cursor)?;
            let value = read_string(cursor)?;
            fields.insert(field, value);
        }
        stream.insert_loaded_entry(StreamEntry { id, fields });
    }
    Ok(stream)
}

// --- Whole-keyspace encode/decode ---

/// Serializes the keyspace (under all-shard guards) into snapshot bytes.
/// Expired entries are skipped.
pub fn encode_keyspace(
    guards: &[MutexGuard<'_, ShardCache>],
) -> Result<Bytes, OpalDBError> {
    let mut buf = BytesMut::new();
    buf.put_slice(RDB_MAGIC);
    buf.put_slice(RDB_VERSION);

    buf.put_u8(RDB_OPCODE_SELECTDB);
    buf.put_u8(0);

    for guard in guards {
        for (key, value) in guard.iter() {
            if value.is_expired() {
                continue;
            }
            buf.put_u8(type_tag(&value.data));
            write_string(&mut buf, key)?;
            write_value(&mut buf, &value.data)?;
        }
    }

    buf.put_u8(RDB_OPCODE_EOF);
    Ok(buf.freeze())
}

/// Parses snapshot bytes into key/value pairs, one forward pass.
pub fn decode_keyspace(data: Bytes) -> Result<Vec<(Bytes, StoredValue)>, OpalDBError> {
    let mut cursor = data;
    if cursor.remaining() < RDB_MAGIC.len() + RDB_VERSION.len() {
        return Err(corrupt("file shorter than the header"));
    }
    let magic = cursor.split_to(RDB_MAGIC.len());
    if magic != RDB_MAGIC {
        return Err(corrupt("bad magic"));
    }
    cursor.advance(RDB_VERSION.len());

    let mut pairs = Vec::new();
    loop {
        if !cursor.has_remaining() {
            return Err(corrupt("file ended without the EOF terminator"));
        }
        let tag = cursor.get_u8();
        match tag {
            RDB_OPCODE_EOF => break,
            RDB_OPCODE_SELECTDB => {
                if !cursor.has_remaining() {
                    return Err(corrupt("truncated database section"));
                }
                // A single keyspace: the database number is consumed and
                // ignored.
                cursor.advance(1);
            }
            RDB_TYPE_STRING => {
                let key = read_string(&mut cursor)?;
                let value = read_string_value(&mut cursor)?;
                pairs.push((key, StoredValue::new(value)));
            }
            RDB_TYPE_LIST => {
                let key = read_string(&mut cursor)?;
                let count = read_length(&mut cursor)?;
                let mut list = std::collections::VecDeque::with_capacity(count as usize);
                for _ in 0..count {
                    list.push_back(read_string(&mut cursor)?);
                }
                pairs.push((key, StoredValue::new(DataValue::List(list))));
            }
            RDB_TYPE_STREAM => {
                let key = read_string(&mut cursor)?;
                let stream = read_stream_body(&mut cursor)?;
                pairs.push((key, StoredValue::new(DataValue::Stream(stream))));
            }
            RDB_TYPE_SET | RDB_TYPE_ZSET | RDB_TYPE_HASH => {
                return Err(corrupt("reserved value type tag"));
            }
            _ => return Err(corrupt("unknown value type tag")),
        }
    }
    Ok(pairs)
}

/// Reads a string-kind value body, which is either the `0xF0` int8 form or
/// a length-prefixed string.
fn read_string_value(cursor: &mut Bytes) -> Result<DataValue, OpalDBError> {
    if !cursor.has_remaining() {
        return Err(corrupt("truncated string value"));
    }
    if cursor[0] == RDB_ENC_INT8 {
        cursor.advance(1);
        if !cursor.has_remaining() {
            return Err(corrupt("truncated int8 value"));
        }
        let value = cursor.get_i8();
        return Ok(DataValue::Integer(value as i64));
    }
    Ok(DataValue::String(read_string(cursor)?))
}

// --- File I/O ---

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".bak");
    PathBuf::from(os)
}

/// Writes encoded snapshot bytes to `path` via a temporary file, keeping a
/// `.bak` copy of the previous snapshot. If the final rename fails, the
/// backup is restored.
pub async fn write_snapshot_file(path: &Path, encoded: &Bytes) -> Result<(), OpalDBError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let temp_path = path.with_extension(format!("tmp.{}", rand::random::<u32>()));
    let result = write_buffered(&temp_path, encoded).await;
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    let backup = backup_path(path);
    let had_previous = fs::metadata(path).await.is_ok();
    if had_previous {
        fs::rename(path, &backup).await?;
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        warn!("Snapshot rename failed: {e}. Attempting to restore the backup.");
        let _ = fs::remove_file(&temp_path).await;
        if had_previous {
            if let Err(restore_err) = fs::rename(&backup, path).await {
                return Err(OpalDBError::PersistenceError(format!(
                    "snapshot rename failed ({e}) and backup restore failed ({restore_err})"
                )));
            }
        }
        return Err(e.into());
    }
    Ok(())
}

async fn write_buffered(path: &Path, encoded: &Bytes) -> Result<(), OpalDBError> {
    let file = fs::File::create(path).await?;
    let mut writer = BufWriter::with_capacity(SAVE_BUFFER_SIZE, file);
    writer.write_all(encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Loads the snapshot at `path` into the database at startup. A missing
/// file starts the server with an empty keyspace; a corrupt one is fatal.
pub async fn load_snapshot_file(path: &Path, db: &Arc<Db>) -> Result<(), OpalDBError> {
    let data = match fs::read(path).await {
        Ok(data) => Bytes::from(data),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(
                "Snapshot file not found at {}. Starting with an empty database.",
                path.display()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let pairs = decode_keyspace(data)?;
    let loaded = pairs.len();
    for (key, value) in pairs {
        db.insert_value_from_load(key, value).await;
    }
    info!(
        "Loaded {} keys from snapshot at {}",
        loaded,
        path.display()
    );
    Ok(())
}

/// Loads snapshot bytes received over the wire (a full resync) into the
/// database, replacing the current contents.
pub async fn load_snapshot_bytes(data: Bytes, db: &Arc<Db>) -> Result<(), OpalDBError> {
    let pairs = decode_keyspace(data)?;
    db.clear_all_shards().await;
    for (key, value) in pairs {
        db.insert_value_from_load(key, value).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::stream::StreamIdSpec;

    fn encode_pairs(pairs: Vec<(Bytes, StoredValue)>) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(RDB_MAGIC);
        buf.put_slice(RDB_VERSION);
        buf.put_u8(RDB_OPCODE_SELECTDB);
        buf.put_u8(0);
        for (key, value) in &pairs {
            buf.put_u8(type_tag(&value.data));
            write_string(&mut buf, key).unwrap();
            write_value(&mut buf, &value.data).unwrap();
        }
        buf.put_u8(RDB_OPCODE_EOF);
        buf.freeze()
    }

    #[test]
    fn length_encoding_round_trip() {
        for len in [0u64, 1, 63, 64, 300, 16383, 16384, 1_000_000, u32::MAX as u64] {
            let mut buf = BytesMut::new();
            write_length(&mut buf, len).unwrap();
            let mut cursor = buf.freeze();
            assert_eq!(read_length(&mut cursor).unwrap(), len);
            assert!(!cursor.has_remaining());
        }
    }

    #[test]
    fn length_width_selection() {
        let mut buf = BytesMut::new();
        write_length(&mut buf, 10).unwrap();
        assert_eq!(buf.len(), 1);
        let mut buf = BytesMut::new();
        write_length(&mut buf, 1000).unwrap();
        assert_eq!(buf.len(), 2);
        let mut buf = BytesMut::new();
        write_length(&mut buf, 100_000).unwrap();
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn small_integer_uses_two_byte_form() {
        let mut buf = BytesMut::new();
        write_integer_body(&mut buf, -5).unwrap();
        assert_eq!(buf.as_ref(), &[RDB_ENC_INT8, (-5i8) as u8]);

        let mut cursor = buf.freeze();
        assert_eq!(
            read_string_value(&mut cursor).unwrap(),
            DataValue::Integer(-5)
        );
    }

    #[test]
    fn large_integer_falls_back_to_decimal_text() {
        let mut buf = BytesMut::new();
        write_integer_body(&mut buf, 4242).unwrap();
        let mut cursor = buf.freeze();
        assert_eq!(
            read_string_value(&mut cursor).unwrap(),
            DataValue::String(Bytes::from_static(b"4242"))
        );
    }

    #[test]
    fn keyspace_round_trip_preserves_types_and_order() {
        let mut stream = Stream::new();
        stream
            .add_entry(
                StreamIdSpec::Explicit(StreamId::new(1, 0)),
                [(Bytes::from_static(b"f"), Bytes::from_static(b"v1"))]
                    .into_iter()
                    .collect(),
            )
            .unwrap();
        stream
            .add_entry(
                StreamIdSpec::Explicit(StreamId::new(2, 0)),
                [(Bytes::from_static(b"f"), Bytes::from_static(b"v2"))]
                    .into_iter()
                    .collect(),
            )
            .unwrap();

        let pairs = vec![
            (
                Bytes::from_static(b"greeting"),
                StoredValue::new(DataValue::String(Bytes::from_static(b"Hello"))),
            ),
            (
                Bytes::from_static(b"fruits"),
                StoredValue::new(DataValue::List(
                    [Bytes::from_static(b"apple"), Bytes::from_static(b"banana")]
                        .into_iter()
                        .collect(),
                )),
            ),
            (
                Bytes::from_static(b"s"),
                StoredValue::new(DataValue::Stream(stream)),
            ),
        ];

        let encoded = encode_pairs(pairs);
        let decoded = decode_keyspace(encoded).unwrap();
        assert_eq!(decoded.len(), 3);

        assert_eq!(
            decoded[0].1.data,
            DataValue::String(Bytes::from_static(b"Hello"))
        );
        let DataValue::List(list) = &decoded[1].1.data else {
            panic!("expected a list");
        };
        assert_eq!(
            list.iter().cloned().collect::<Vec<_>>(),
            vec![Bytes::from_static(b"apple"), Bytes::from_static(b"banana")]
        );
        let DataValue::Stream(stream) = &decoded[2].1.data else {
            panic!("expected a stream");
        };
        assert_eq!(stream.length, 2);
        assert_eq!(stream.last_id, Some(StreamId::new(2, 0)));
        let ids: Vec<StreamId> = stream
            .range(StreamId::ZERO, StreamId::MAX)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![StreamId::new(1, 0), StreamId::new(2, 0)]);
    }

    #[test]
    fn unknown_tag_aborts_load() {
        let mut buf = BytesMut::new();
        buf.put_slice(RDB_MAGIC);
        buf.put_slice(RDB_VERSION);
        buf.put_u8(0x7B);
        assert!(decode_keyspace(buf.freeze()).is_err());
    }

    #[test]
    fn reserved_zset_tag_aborts_load() {
        let mut buf = BytesMut::new();
        buf.put_slice(RDB_MAGIC);
        buf.put_slice(RDB_VERSION);
        buf.put_u8(RDB_TYPE_ZSET);
        assert!(decode_keyspace(buf.freeze()).is_err());
    }

    #[test]
    fn bad_magic_aborts_load() {
        let data = Bytes::from_static(b"NOTRDB123\xFF");
        assert!(decode_keyspace(data).is_err());
    }

    #[test]
    fn missing_terminator_aborts_load() {
        let mut buf = BytesMut::new();
        buf.put_slice(RDB_MAGIC);
        buf.put_slice(RDB_VERSION);
        assert!(decode_keyspace(buf.freeze()).is_err());
    }

    #[test]
    fn sorted_sets_are_refused_on_save() {
        let mut buf = BytesMut::new();
        let zset = crate::core::storage::zset::SortedSet::new();
        let result = write_value(&mut buf, &DataValue::SortedSet(zset));
        assert!(matches!(result, Err(OpalDBError::PersistenceError(_))));
    }
}

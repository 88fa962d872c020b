// src/core/protocol/resp_frame.rs

//! Implements the RESP (REdis Serialization Protocol) frame structure and the
//! corresponding `Encoder` and `Decoder` for network communication.

use crate::core::OpalDBError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// The CRLF (Carriage Return, Line Feed) sequence used to terminate lines in RESP.
const CRLF: &[u8] = b"\r\n";
const CRLF_LEN: usize = 2;

// Protocol-level limits to prevent denial-of-service from malformed frames.
const MAX_FRAME_ELEMENTS: usize = 1_024 * 1_024;
const MAX_BULK_STRING_SIZE: usize = 512 * 1024 * 1024; // 512MB

/// An enum representing a single frame in the RESP protocol.
/// This is the low-level representation of data exchanged between client and server.
#[derive(Debug, Clone, PartialEq)]
pub enum RespFrame {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Null,
    NullArray,
    Array(Vec<RespFrame>),
}

impl RespFrame {
    /// A convenience method to encode a frame into a `Vec<u8>`.
    /// Used by replication, where a complete byte vector (and its exact
    /// length, for offset accounting) is needed.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, OpalDBError> {
        let mut buf = BytesMut::new();
        RespFrameCodec.encode(self.clone(), &mut buf)?;
        Ok(buf.to_vec())
    }
}

/// A `tokio_util::codec` implementation for encoding and decoding `RespFrame`s.
#[derive(Debug)]
pub struct RespFrameCodec;

impl Encoder<RespFrame> for RespFrameCodec {
    type Error = OpalDBError;

    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            RespFrame::SimpleString(s) => {
                dst.extend_from_slice(b"+");
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Error(s) => {
                dst.extend_from_slice(b"-");
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Integer(i) => {
                dst.extend_from_slice(b":");
                dst.extend_from_slice(i.to_string().as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::BulkString(b) => {
                dst.extend_from_slice(b"$");
                dst.extend_from_slice(b.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(&b);
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Null => {
                dst.extend_from_slice(b"$-1\r\n");
            }
            RespFrame::NullArray => {
                dst.extend_from_slice(b"*-1\r\n");
            }
            RespFrame::Array(arr) => {
                dst.extend_from_slice(b"*");
                dst.extend_from_slice(arr.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                for frame in arr {
                    self.encode(frame, dst)?;
                }
            }
        }
        Ok(())
    }
}

impl Decoder for RespFrameCodec {
    type Item = RespFrame;
    type Error = OpalDBError;

    /// Decodes a `RespFrame` from a `BytesMut` buffer.
    ///
    /// Returns `Ok(None)` if the buffer does not yet contain a full frame,
    /// letting the `Framed` stream wait for more data without consuming bytes.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match parse_frame(src) {
            Ok((frame, len)) => {
                src.advance(len);
                Ok(Some(frame))
            }
            Err(OpalDBError::IncompleteData) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// The main parsing entry point. Inspects the type prefix byte and
/// dispatches to the appropriate parsing function.
fn parse_frame(src: &[u8]) -> Result<(RespFrame, usize), OpalDBError> {
    if src.is_empty() {
        return Err(OpalDBError::IncompleteData);
    }
    match src[0] {
        b'+' => parse_simple_string(src),
        b'-' => parse_error(src),
        b':' => parse_integer(src),
        b'$' => parse_bulk_string(src),
        b'*' => parse_array(src),
        _ => Err(OpalDBError::SyntaxError),
    }
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(CRLF_LEN).position(|window| window == CRLF)
}

fn parse_line(src: &[u8]) -> Result<(&[u8], usize), OpalDBError> {
    find_crlf(src)
        .map(|pos| (&src[..pos], pos + CRLF_LEN))
        .ok_or(OpalDBError::IncompleteData)
}

/// Parses a decimal integer line, rejecting trailing non-digit characters.
fn parse_decimal(line: &[u8]) -> Result<i64, OpalDBError> {
    let s = std::str::from_utf8(line).map_err(|_| OpalDBError::SyntaxError)?;
    s.parse::<i64>().map_err(|_| OpalDBError::SyntaxError)
}

fn parse_simple_string(src: &[u8]) -> Result<(RespFrame, usize), OpalDBError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((
        RespFrame::SimpleString(String::from_utf8_lossy(line).to_string()),
        len + 1,
    ))
}

fn parse_error(src: &[u8]) -> Result<(RespFrame, usize), OpalDBError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((
        RespFrame::Error(String::from_utf8_lossy(line).to_string()),
        len + 1,
    ))
}

fn parse_integer(src: &[u8]) -> Result<(RespFrame, usize), OpalDBError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((RespFrame::Integer(parse_decimal(line)?), len + 1))
}

fn parse_bulk_string(src: &[u8]) -> Result<(RespFrame, usize), OpalDBError> {
    let (line, len_of_line) = parse_line(&src[1..])?;
    let str_len = parse_decimal(line)? as isize;

    // Null Bulk String ($-1\r\n).
    if str_len == -1 {
        return Ok((RespFrame::Null, len_of_line + 1));
    }
    if str_len < 0 {
        return Err(OpalDBError::SyntaxError);
    }

    let str_len = str_len as usize;
    if str_len > MAX_BULK_STRING_SIZE {
        return Err(OpalDBError::SyntaxError);
    }

    let total_len_prefix = len_of_line + 1;
    // The entire payload plus its trailing CRLF must be in the buffer.
    if src.len() < total_len_prefix + str_len + CRLF_LEN {
        return Err(OpalDBError::IncompleteData);
    }
    if &src[total_len_prefix + str_len..total_len_prefix + str_len + CRLF_LEN] != CRLF {
        return Err(OpalDBError::SyntaxError);
    }

    let data = Bytes::copy_from_slice(&src[total_len_prefix..total_len_prefix + str_len]);
    Ok((RespFrame::BulkString(data), total_len_prefix + str_len + CRLF_LEN))
}

fn parse_array(src: &[u8]) -> Result<(RespFrame, usize), OpalDBError> {
    let (line, len_of_line) = parse_line(&src[1..])?;
    let arr_len = parse_decimal(line)? as isize;

    // Null Array (*-1\r\n).
    if arr_len == -1 {
        return Ok((RespFrame::NullArray, len_of_line + 1));
    }
    if arr_len < 0 {
        return Err(OpalDBError::SyntaxError);
    }

    let arr_len = arr_len as usize;
    if arr_len > MAX_FRAME_ELEMENTS {
        return Err(OpalDBError::SyntaxError);
    }

    let mut frames = Vec::with_capacity(arr_len);
    let mut cursor = len_of_line + 1;

    for _ in 0..arr_len {
        let (frame, frame_len) = parse_frame(&src[cursor..])?;
        frames.push(frame);
        cursor += frame_len;
    }

    Ok((RespFrame::Array(frames), cursor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> (Vec<RespFrame>, usize) {
        let mut buf = BytesMut::from(input);
        let mut codec = RespFrameCodec;
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = codec.decode(&mut buf) {
            frames.push(frame);
        }
        (frames, buf.len())
    }

    #[test]
    fn decodes_command_array() {
        let (frames, rest) = decode_all(b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n");
        assert_eq!(rest, 0);
        assert_eq!(
            frames,
            vec![RespFrame::Array(vec![
                RespFrame::BulkString(Bytes::from_static(b"ECHO")),
                RespFrame::BulkString(Bytes::from_static(b"hello")),
            ])]
        );
    }

    #[test]
    fn partial_input_consumes_nothing() {
        let mut buf = BytesMut::from(&b"*2\r\n$4\r\nECHO\r\n$5\r\nhel"[..]);
        let before = buf.len();
        let result = RespFrameCodec.decode(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn null_bulk_and_null_array() {
        let (frames, _) = decode_all(b"$-1\r\n*-1\r\n");
        assert_eq!(frames, vec![RespFrame::Null, RespFrame::NullArray]);
    }

    #[test]
    fn integer_with_trailing_garbage_is_rejected() {
        let mut buf = BytesMut::from(&b":12x\r\n"[..]);
        assert!(RespFrameCodec.decode(&mut buf).is_err());
    }

    #[test]
    fn unknown_prefix_is_a_protocol_error() {
        let mut buf = BytesMut::from(&b"@oops\r\n"[..]);
        assert!(RespFrameCodec.decode(&mut buf).is_err());
    }

    #[test]
    fn encode_decode_round_trip() {
        let frame = RespFrame::Array(vec![
            RespFrame::SimpleString("OK".into()),
            RespFrame::Integer(-42),
            RespFrame::BulkString(Bytes::from_static(b"payload")),
            RespFrame::Null,
        ]);
        let encoded = frame.encode_to_vec().unwrap();
        let (frames, rest) = decode_all(&encoded);
        assert_eq!(rest, 0);
        assert_eq!(frames, vec![frame]);
    }
}

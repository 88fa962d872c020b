// src/core/commands/helpers.rs

//! Helper functions for parsing command arguments from `RespFrame`s.
//! These keep per-command parsers small and their error handling uniform.

use crate::core::protocol::RespFrame;
use crate::core::OpalDBError;
use bytes::Bytes;
use std::str::FromStr;

/// A helper struct to parse command arguments sequentially, used for
/// commands with optional flags and option-value pairs.
pub struct ArgParser<'a> {
    args: &'a [RespFrame],
    cursor: usize,
}

impl<'a> ArgParser<'a> {
    pub fn new(args: &'a [RespFrame]) -> Self {
        Self { args, cursor: 0 }
    }

    /// Consumes the next argument if it matches `flag_name` (case-insensitive).
    pub fn match_flag(&mut self, flag_name: &str) -> bool {
        if let Some(arg_str) = self.peek_str() {
            if arg_str.eq_ignore_ascii_case(flag_name) {
                self.cursor += 1;
                return true;
            }
        }
        false
    }

    /// Consumes `opt_name` plus its value if the next argument matches,
    /// parsing the value into `T`.
    pub fn match_option<T>(&mut self, opt_name: &str) -> Result<Option<T>, OpalDBError>
    where
        T: FromStr,
    {
        if let Some(arg_str) = self.peek_str() {
            if arg_str.eq_ignore_ascii_case(opt_name) {
                if self.cursor + 1 >= self.args.len() {
                    return Err(OpalDBError::SyntaxError);
                }
                let value_str = extract_string(&self.args[self.cursor + 1])?;
                let parsed = value_str
                    .parse::<T>()
                    .map_err(|_| OpalDBError::SyntaxError)?;
                self.cursor += 2;
                return Ok(Some(parsed));
            }
        }
        Ok(None)
    }

    pub fn remaining_args(&self) -> &'a [RespFrame] {
        &self.args[self.cursor..]
    }

    fn peek_str(&self) -> Option<String> {
        self.args
            .get(self.cursor)
            .and_then(|frame| extract_string(frame).ok())
    }
}

/// Extracts a `String` from a `RespFrame::BulkString`.
pub fn extract_string(frame: &RespFrame) -> Result<String, OpalDBError> {
    if let RespFrame::BulkString(bs) = frame {
        String::from_utf8(bs.to_vec()).map_err(|_| OpalDBError::WrongType)
    } else {
        Err(OpalDBError::WrongType)
    }
}

/// Extracts `Bytes` from a `RespFrame::BulkString`.
pub fn extract_bytes(frame: &RespFrame) -> Result<Bytes, OpalDBError> {
    match frame {
        RespFrame::BulkString(bs) => Ok(bs.clone()),
        _ => Err(OpalDBError::WrongType),
    }
}

/// Validates an exact argument count.
pub fn validate_arg_count(
    args: &[RespFrame],
    expected: usize,
    cmd: &str,
) -> Result<(), OpalDBError> {
    if args.len() != expected {
        Err(OpalDBError::WrongArgumentCount(cmd.to_string()))
    } else {
        Ok(())
    }
}

/// Parses `COMMAND key value1 [value2 ...]`-shaped argument lists.
pub fn parse_key_and_values(
    args: &[RespFrame],
    min_args: usize,
    cmd: &str,
) -> Result<(Bytes, Vec<Bytes>), OpalDBError> {
    if args.len() < min_args {
        return Err(OpalDBError::WrongArgumentCount(cmd.to_string()));
    }
    let key = extract_bytes(&args[0])?;
    let values = args[1..]
        .iter()
        .map(extract_bytes)
        .collect::<Result<_, _>>()?;
    Ok((key, values))
}

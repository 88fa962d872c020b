// src/core/commands/list/logic.rs

//! Shared push/pop logic used by the list commands and the blocking
//! manager's wake-up path.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::{ExecutionContext, PopDirection, PushDirection};
use crate::core::{OpalDBError, RespValue};
use bytes::Bytes;
use std::collections::VecDeque;

/// Pushes `values` onto the list at `key`, creating it if absent. Returns
/// the resulting list length. Wrong-kind values fail without mutating.
pub fn list_push_logic(
    ctx: &mut ExecutionContext<'_>,
    key: &Bytes,
    values: &[Bytes],
    direction: PushDirection,
) -> Result<usize, OpalDBError> {
    let Some(guard) = ctx.guard_for_key(key) else {
        return Err(OpalDBError::Internal("no lock held for list key".into()));
    };

    if let Some(entry) = guard.get(key) {
        if !matches!(entry.data, DataValue::List(_)) {
            return Err(OpalDBError::WrongType);
        }
    }

    let entry = guard.get_or_insert_with_mut(key.clone(), || {
        StoredValue::new(DataValue::List(VecDeque::new()))
    });
    let DataValue::List(list) = &mut entry.data else {
        return Err(OpalDBError::WrongType);
    };
    for value in values {
        match direction {
            PushDirection::Left => list.push_front(value.clone()),
            PushDirection::Right => list.push_back(value.clone()),
        }
    }
    Ok(list.len())
}

/// Pops a single element from the list at `key`. Returns `Null` when the
/// key is absent or the list is empty. The key is removed once drained.
pub fn list_pop_logic(
    ctx: &mut ExecutionContext<'_>,
    key: &Bytes,
    direction: PopDirection,
) -> Result<(RespValue, WriteOutcome), OpalDBError> {
    let Some(guard) = ctx.guard_for_key(key) else {
        return Err(OpalDBError::Internal("no lock held for list key".into()));
    };

    let (popped, drained) = {
        let Some(entry) = guard.get_mut(key) else {
            return Ok((RespValue::Null, WriteOutcome::DidNotWrite));
        };
        let DataValue::List(list) = &mut entry.data else {
            return Err(OpalDBError::WrongType);
        };
        let popped = match direction {
            PopDirection::Left => list.pop_front(),
            PopDirection::Right => list.pop_back(),
        };
        (popped, list.is_empty())
    };
    if drained {
        guard.pop(key);
    }

    match popped {
        Some(value) => {
            let outcome = if drained {
                WriteOutcome::Delete { keys_deleted: 1 }
            } else {
                WriteOutcome::Write { keys_modified: 1 }
            };
            Ok((RespValue::BulkString(value), outcome))
        }
        None => Ok((RespValue::Null, WriteOutcome::DidNotWrite)),
    }
}

/// Pops up to `count` elements, returning them as an array value.
pub fn list_pop_count_logic(
    ctx: &mut ExecutionContext<'_>,
    key: &Bytes,
    direction: PopDirection,
    count: usize,
) -> Result<(RespValue, WriteOutcome), OpalDBError> {
    let Some(guard) = ctx.guard_for_key(key) else {
        return Err(OpalDBError::Internal("no lock held for list key".into()));
    };

    let (popped, drained) = {
        let Some(entry) = guard.get_mut(key) else {
            return Ok((RespValue::Null, WriteOutcome::DidNotWrite));
        };
        let DataValue::List(list) = &mut entry.data else {
            return Err(OpalDBError::WrongType);
        };
        let mut popped = Vec::with_capacity(count.min(list.len()));
        for _ in 0..count {
            let value = match direction {
                PopDirection::Left => list.pop_front(),
                PopDirection::Right => list.pop_back(),
            };
            match value {
                Some(v) => popped.push(RespValue::BulkString(v)),
                None => break,
            }
        }
        (popped, list.is_empty())
    };
    if drained {
        guard.pop(key);
    }

    if popped.is_empty() {
        return Ok((RespValue::Null, WriteOutcome::DidNotWrite));
    }
    let outcome = if drained {
        WriteOutcome::Delete { keys_deleted: 1 }
    } else {
        WriteOutcome::Write {
            keys_modified: popped.len() as u64,
        }
    };
    Ok((RespValue::Array(popped), outcome))
}

// src/core/commands/mod.rs

//! This module defines all supported commands, organizes them into
//! categories, and provides the central `Command` enum encapsulating their
//! parsed state. The `define_commands!` macro generates the enum and its
//! core implementations from a single compile-time table.

use crate::core::commands::command_trait::{
    CommandExt, CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[macro_use]
mod command_def;

pub mod command_trait;
pub mod generic;
pub mod helpers;
pub mod list;
pub mod streams;
pub mod string;
pub mod zset;

define_commands! {
    control: {
        (Multi, "multi"),
        (Exec, "exec"),
        (Discard, "discard"),
    },
    standard: {
        // --- Generic commands ---
        (Ping, Ping, generic, "ping"),
        (Echo, Echo, generic, "echo"),
        (Del, Del, generic, "del"),
        (TypeInfo, TypeInfo, generic, "type"),
        (Keys, Keys, generic, "keys"),
        (Config, Config, generic, "config"),
        (Info, Info, generic, "info"),
        (Save, Save, generic, "save"),
        (Quit, Quit, generic, "quit"),
        (Subscribe, Subscribe, generic, "subscribe"),
        (Unsubscribe, Unsubscribe, generic, "unsubscribe"),
        (PSubscribe, PSubscribe, generic, "psubscribe"),
        (PUnsubscribe, PUnsubscribe, generic, "punsubscribe"),
        (Publish, Publish, generic, "publish"),
        (Replconf, Replconf, generic, "replconf"),
        (Psync, Psync, generic, "psync"),
        (Wait, Wait, generic, "wait"),

        // --- String commands ---
        (Get, Get, string, "get"),
        (Set, Set, string, "set"),
        (Incr, Incr, string, "incr"),

        // --- List commands ---
        (LPush, LPush, list, "lpush"),
        (RPush, RPush, list, "rpush"),
        (LPop, LPop, list, "lpop"),
        (RPop, RPop, list, "rpop"),
        (LLen, LLen, list, "llen"),
        (LRange, LRange, list, "lrange"),
        (BLPop, BLPop, list, "blpop"),

        // --- Sorted-set commands ---
        (Zadd, Zadd, zset, "zadd"),
        (ZScore, ZScore, zset, "zscore"),
        (ZRank, ZRank, zset, "zrank"),
        (ZCard, ZCard, zset, "zcard"),
        (ZRange, ZRange, zset, "zrange"),
        (ZRem, ZRem, zset, "zrem"),

        // --- Stream commands ---
        (XAdd, XAdd, streams, "xadd"),
        (XRange, XRange, streams, "xrange"),
        (XLen, XLen, streams, "xlen"),
        (XRead, XRead, streams, "xread"),
    }
}

// src/core/commands/zset/mod.rs

pub mod zadd;
pub mod zcard;
pub mod zrange;
pub mod zrank;
pub mod zrem;
pub mod zscore;

pub use zadd::Zadd;
pub use zcard::ZCard;
pub use zrange::ZRange;
pub use zrank::ZRank;
pub use zrem::ZRem;
pub use zscore::ZScore;

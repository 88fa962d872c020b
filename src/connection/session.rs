// src/connection/session.rs

//! The state associated with a single client session.

use crate::core::pubsub::PMessage;
use bytes::Bytes;
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Per-connection state: the transaction flag and the Pub/Sub subscription
/// bookkeeping. Everything else a session needs lives in `ServerState`.
#[derive(Debug, Default)]
pub struct SessionState {
    /// True while the client is inside a `MULTI`/`EXEC` block.
    pub is_in_transaction: bool,
    /// True while the client is subscribed to at least one channel.
    pub is_subscribed: bool,
    /// True while the client is subscribed to at least one pattern.
    pub is_pattern_subscribed: bool,
    pub subscribed_channels: HashSet<Bytes>,
    pub subscribed_patterns: HashSet<Bytes>,
    /// Receivers for the active subscriptions; dropping one detaches it.
    pub pubsub_receivers: Vec<SubscriptionReceiver>,
}

/// A receiver for either a channel or a pattern subscription.
#[derive(Debug)]
pub enum SubscriptionReceiver {
    Channel(Bytes, broadcast::Receiver<Bytes>),
    Pattern(Bytes, broadcast::Receiver<PMessage>),
}

impl SessionState {
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether the session is in sub-mode, restricting the command set.
    pub fn in_sub_mode(&self) -> bool {
        self.is_subscribed || self.is_pattern_subscribed
    }
}

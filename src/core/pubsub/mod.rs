// src/core/pubsub/mod.rs

//! The publish-subscribe system: channel and pattern subscriptions and
//! message broadcasting.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::debug;

pub mod channel_purger;
pub mod handler;

/// The capacity of each individual broadcast channel.
const CHANNEL_CAPACITY: usize = 128;

/// A message delivered to pattern subscribers:
/// (matching pattern, original channel, message body).
pub type PMessage = (Bytes, Bytes, Bytes);

/// `PubSubManager` is the central hub for all Pub/Sub functionality, mapping
/// channels (and patterns) to broadcast senders. A session subscribes by
/// holding a receiver; subscriber counts are receiver counts.
#[derive(Debug, Default)]
pub struct PubSubManager {
    channels: DashMap<Bytes, Arc<Sender<Bytes>>>,
    pattern_channels: DashMap<Bytes, Arc<Sender<PMessage>>>,
}

impl PubSubManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Subscribes to a channel, creating it on first use.
    pub fn subscribe(&self, channel_name: &Bytes) -> Receiver<Bytes> {
        self.channels
            .entry(channel_name.clone())
            .or_insert_with(|| Arc::new(broadcast::channel(CHANNEL_CAPACITY).0))
            .value()
            .subscribe()
    }

    /// Subscribes to a glob-style pattern.
    pub fn subscribe_pattern(&self, pattern: &Bytes) -> Receiver<PMessage> {
        self.pattern_channels
            .entry(pattern.clone())
            .or_insert_with(|| Arc::new(broadcast::channel(CHANNEL_CAPACITY).0))
            .value()
            .subscribe()
    }

    /// Publishes a message to direct subscribers of `channel_name` and to
    /// subscribers of every matching pattern. Returns the receiver count.
    pub fn publish(&self, channel_name: &Bytes, message: Bytes) -> usize {
        let mut receivers = 0;

        if let Some(channel) = self.channels.get(channel_name) {
            receivers += channel.send(message.clone()).unwrap_or(0);
        }

        for entry in self.pattern_channels.iter() {
            let pattern = entry.key();
            if glob_match(pattern, channel_name) {
                let pmessage: PMessage = (pattern.clone(), channel_name.clone(), message.clone());
                receivers += entry.value().send(pmessage).unwrap_or(0);
            }
        }

        receivers
    }

    /// Drops channels and patterns that no longer have any subscribers.
    pub fn purge_empty_channels(&self) -> usize {
        let mut purged_count = 0;
        self.channels.retain(|_, sender| {
            if sender.receiver_count() == 0 {
                purged_count += 1;
                false
            } else {
                true
            }
        });
        self.pattern_channels.retain(|_, sender| {
            if sender.receiver_count() == 0 {
                purged_count += 1;
                false
            } else {
                true
            }
        });
        if purged_count > 0 {
            debug!("Purged {} empty Pub/Sub channels and patterns.", purged_count);
        }
        purged_count
    }

    pub fn subscriber_count(&self, channel_name: &Bytes) -> usize {
        self.channels
            .get(channel_name)
            .map_or(0, |s| s.receiver_count())
    }
}

/// Glob matching for channel patterns: `*` (any run), `?` (any one byte),
/// and literal bytes.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star_p, mut star_t) = (None, 0usize);

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star_p = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star_p {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matching() {
        assert!(glob_match(b"*", b"anything"));
        assert!(glob_match(b"news.*", b"news.sports"));
        assert!(!glob_match(b"news.*", b"weather.today"));
        assert!(glob_match(b"n?ws", b"news"));
        assert!(!glob_match(b"n?ws", b"nws"));
        assert!(glob_match(b"a*c*e", b"abcde"));
        assert!(glob_match(b"exact", b"exact"));
        assert!(!glob_match(b"exact", b"exactly"));
    }

    #[test]
    fn publish_counts_subscribers() {
        let manager = PubSubManager::new();
        let _rx1 = manager.subscribe(&Bytes::from_static(b"chan"));
        let _rx2 = manager.subscribe(&Bytes::from_static(b"chan"));
        let _prx = manager.subscribe_pattern(&Bytes::from_static(b"ch*"));
        let delivered = manager.publish(&Bytes::from_static(b"chan"), Bytes::from_static(b"m"));
        assert_eq!(delivered, 3);
    }

    #[test]
    fn purge_removes_abandoned_channels() {
        let manager = PubSubManager::new();
        {
            let _rx = manager.subscribe(&Bytes::from_static(b"temp"));
            assert_eq!(manager.subscriber_count(&Bytes::from_static(b"temp")), 1);
        }
        assert_eq!(manager.purge_empty_channels(), 1);
        assert_eq!(manager.subscriber_count(&Bytes::from_static(b"temp")), 0);
    }
}

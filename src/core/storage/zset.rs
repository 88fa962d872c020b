// src/core/storage/zset.rs

//! The sorted-set value type: a skip list ordered by `(score, member)`
//! paired with a hash map for O(1) member-to-score lookups. Both structures
//! are updated together within each operation.

use super::skiplist::SkipList;
use bytes::Bytes;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ZSetEntry {
    pub score: f64,
    pub member: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    skiplist: SkipList,
    members: HashMap<Bytes, f64>,
}

impl SortedSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Adds or updates a member. Returns `true` if the member is new.
    pub fn add(&mut self, score: f64, member: Bytes) -> bool {
        if let Some(old_score) = self.members.insert(member.clone(), score) {
            // Same pair: nothing to move in the skip list.
            if old_score == score {
                return false;
            }
            self.skiplist.delete(old_score, &member);
            self.skiplist.insert(score, member);
            return false;
        }
        self.skiplist.insert(score, member);
        true
    }

    /// Removes a member. Returns `true` if it was present.
    pub fn remove(&mut self, member: &Bytes) -> bool {
        match self.members.remove(member) {
            Some(score) => self.skiplist.delete(score, member),
            None => false,
        }
    }

    pub fn score(&self, member: &Bytes) -> Option<f64> {
        self.members.get(member).copied()
    }

    /// 0-based rank of a member under the `(score, member)` order.
    pub fn rank(&self, member: &Bytes) -> Option<usize> {
        let score = self.score(member)?;
        self.skiplist.rank(score, member)
    }

    /// Returns entries by rank range, with negative indices counting from
    /// the end and out-of-range bounds clamped.
    pub fn range(&self, start: i64, stop: i64) -> Vec<ZSetEntry> {
        let len = self.len() as i64;
        if len == 0 {
            return vec![];
        }
        let start = if start < 0 { len + start } else { start }.max(0);
        let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
        if start > stop || start >= len {
            return vec![];
        }
        self.skiplist
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|(score, member)| ZSetEntry {
                score,
                member: member.clone(),
            })
            .collect()
    }
}

impl PartialEq for SortedSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .skiplist
                .iter()
                .zip(other.skiplist.iter())
                .all(|((s1, m1), (s2, m2))| s1 == s2 && m1 == m2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_update_and_score() {
        let mut zset = SortedSet::new();
        assert!(zset.add(1.0, Bytes::from_static(b"a")));
        assert!(!zset.add(2.0, Bytes::from_static(b"a")));
        assert_eq!(zset.score(&Bytes::from_static(b"a")), Some(2.0));
        assert_eq!(zset.len(), 1);
    }

    #[test]
    fn rank_reflects_score_updates() {
        let mut zset = SortedSet::new();
        zset.add(1.0, Bytes::from_static(b"a"));
        zset.add(2.0, Bytes::from_static(b"b"));
        zset.add(3.0, Bytes::from_static(b"c"));
        assert_eq!(zset.rank(&Bytes::from_static(b"c")), Some(2));
        zset.add(0.5, Bytes::from_static(b"c"));
        assert_eq!(zset.rank(&Bytes::from_static(b"c")), Some(0));
    }

    #[test]
    fn range_clamps_and_handles_negatives() {
        let mut zset = SortedSet::new();
        for (i, m) in ["a", "b", "c", "d"].iter().enumerate() {
            zset.add(i as f64, Bytes::from(m.to_string()));
        }
        let all: Vec<_> = zset.range(0, -1).iter().map(|e| e.member.clone()).collect();
        assert_eq!(all, vec!["a", "b", "c", "d"]);
        let tail: Vec<_> = zset.range(-2, 100).iter().map(|e| e.member.clone()).collect();
        assert_eq!(tail, vec!["c", "d"]);
        assert!(zset.range(3, 1).is_empty());
    }

    #[test]
    fn remove_keeps_structures_in_sync() {
        let mut zset = SortedSet::new();
        zset.add(1.0, Bytes::from_static(b"a"));
        zset.add(2.0, Bytes::from_static(b"b"));
        assert!(zset.remove(&Bytes::from_static(b"a")));
        assert!(!zset.remove(&Bytes::from_static(b"a")));
        assert_eq!(zset.len(), 1);
        assert_eq!(zset.rank(&Bytes::from_static(b"b")), Some(0));
    }
}

// src/core/storage/skiplist.rs

//! A probabilistic skip list ordered by `(score, member)`, with the score
//! ascending and ties broken by the member's lexicographic order.
//!
//! Nodes live in an arena (`Vec`) and link to each other by index, with a
//! free list recycling deleted slots. Slot 0 is the head sentinel and is
//! never removed.

use bytes::Bytes;
use rand::Rng;
use std::cmp::Ordering;

/// The maximum number of levels a node can span.
pub const SKIPLIST_MAXLEVEL: usize = 32;
/// The probability of promoting a node one level higher.
pub const SKIPLIST_P: f64 = 0.25;

/// Sentinel index meaning "no node".
const NIL: usize = usize::MAX;

#[derive(Debug, Clone)]
struct SkipNode {
    score: f64,
    member: Bytes,
    /// `forward[i]` is the next node at level `i`, or `NIL`.
    forward: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct SkipList {
    nodes: Vec<SkipNode>,
    free: Vec<usize>,
    level: usize,
    length: usize,
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    pub fn new() -> Self {
        let head = SkipNode {
            score: 0.0,
            member: Bytes::new(),
            forward: vec![NIL; SKIPLIST_MAXLEVEL],
        };
        Self {
            nodes: vec![head],
            free: Vec::new(),
            level: 1,
            length: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn random_level() -> usize {
        let mut rng = rand::thread_rng();
        let mut level = 1;
        while rng.gen::<f64>() < SKIPLIST_P && level < SKIPLIST_MAXLEVEL {
            level += 1;
        }
        level
    }

    fn compare(a_score: f64, a_member: &Bytes, b_score: f64, b_member: &Bytes) -> Ordering {
        a_score
            .partial_cmp(&b_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_member.cmp(b_member))
    }

    /// Fills `update` with, per level, the last node strictly before
    /// `(score, member)`. Returns the index of the first candidate node.
    fn find_update_vector(&self, score: f64, member: &Bytes, update: &mut [usize]) -> usize {
        let mut current = 0;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[current].forward[i];
                if next != NIL
                    && Self::compare(self.nodes[next].score, &self.nodes[next].member, score, member)
                        == Ordering::Less
                {
                    current = next;
                } else {
                    break;
                }
            }
            update[i] = current;
        }
        self.nodes[current].forward[0]
    }

    /// Inserts `(score, member)`. If the exact pair already exists this is a
    /// no-op; callers replacing a member's score must `delete` the old pair
    /// first, which is what `SortedSet` does.
    pub fn insert(&mut self, score: f64, member: Bytes) {
        let mut update = [0usize; SKIPLIST_MAXLEVEL];
        let candidate = self.find_update_vector(score, &member, &mut update);

        if candidate != NIL
            && Self::compare(
                self.nodes[candidate].score,
                &self.nodes[candidate].member,
                score,
                &member,
            ) == Ordering::Equal
        {
            return;
        }

        let level = Self::random_level();
        if level > self.level {
            for slot in update.iter_mut().take(level).skip(self.level) {
                *slot = 0;
            }
            self.level = level;
        }

        let node = SkipNode {
            score,
            member,
            forward: vec![NIL; level],
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        for i in 0..level {
            self.nodes[idx].forward[i] = self.nodes[update[i]].forward[i];
            self.nodes[update[i]].forward[i] = idx;
        }
        self.length += 1;
    }

    /// Removes `(score, member)`. Returns whether the pair was present.
    pub fn delete(&mut self, score: f64, member: &Bytes) -> bool {
        let mut update = [0usize; SKIPLIST_MAXLEVEL];
        let candidate = self.find_update_vector(score, member, &mut update);

        if candidate == NIL
            || Self::compare(
                self.nodes[candidate].score,
                &self.nodes[candidate].member,
                score,
                member,
            ) != Ordering::Equal
        {
            return false;
        }

        for i in 0..self.level {
            if self.nodes[update[i]].forward[i] == candidate {
                self.nodes[update[i]].forward[i] = self.nodes[candidate].forward[i];
            }
        }

        while self.level > 1 && self.nodes[0].forward[self.level - 1] == NIL {
            self.level -= 1;
        }

        self.nodes[candidate].member = Bytes::new();
        self.free.push(candidate);
        self.length -= 1;
        true
    }

    /// Exact-pair lookup.
    pub fn find(&self, score: f64, member: &Bytes) -> bool {
        let mut update = [0usize; SKIPLIST_MAXLEVEL];
        let candidate = self.find_update_vector(score, member, &mut update);
        candidate != NIL
            && Self::compare(
                self.nodes[candidate].score,
                &self.nodes[candidate].member,
                score,
                member,
            ) == Ordering::Equal
    }

    /// 0-based position of `(score, member)` in the total order.
    pub fn rank(&self, score: f64, member: &Bytes) -> Option<usize> {
        let mut current = self.nodes[0].forward[0];
        let mut rank = 0;
        while current != NIL {
            match Self::compare(
                self.nodes[current].score,
                &self.nodes[current].member,
                score,
                member,
            ) {
                Ordering::Equal => return Some(rank),
                Ordering::Less => {
                    rank += 1;
                    current = self.nodes[current].forward[0];
                }
                Ordering::Greater => return None,
            }
        }
        None
    }

    /// In-order iteration over `(score, member)` pairs.
    pub fn iter(&self) -> SkipListIter<'_> {
        SkipListIter {
            list: self,
            current: self.nodes[0].forward[0],
        }
    }
}

pub struct SkipListIter<'a> {
    list: &'a SkipList,
    current: usize,
}

impl<'a> Iterator for SkipListIter<'a> {
    type Item = (f64, &'a Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == NIL {
            return None;
        }
        let node = &self.list.nodes[self.current];
        self.current = node.forward[0];
        Some((node.score, &node.member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(list: &SkipList) -> Vec<(f64, Bytes)> {
        list.iter().map(|(s, m)| (s, m.clone())).collect()
    }

    #[test]
    fn orders_by_score_then_member() {
        let mut list = SkipList::new();
        list.insert(2.0, Bytes::from_static(b"b"));
        list.insert(1.0, Bytes::from_static(b"z"));
        list.insert(2.0, Bytes::from_static(b"a"));
        list.insert(1.0, Bytes::from_static(b"a"));
        assert_eq!(
            members(&list),
            vec![
                (1.0, Bytes::from_static(b"a")),
                (1.0, Bytes::from_static(b"z")),
                (2.0, Bytes::from_static(b"a")),
                (2.0, Bytes::from_static(b"b")),
            ]
        );
    }

    #[test]
    fn delete_and_rank() {
        let mut list = SkipList::new();
        for (score, member) in [(1.0, "a"), (2.0, "b"), (3.0, "c"), (4.0, "d")] {
            list.insert(score, Bytes::from(member.to_string()));
        }
        assert_eq!(list.rank(3.0, &Bytes::from_static(b"c")), Some(2));
        assert!(list.delete(2.0, &Bytes::from_static(b"b")));
        assert!(!list.delete(2.0, &Bytes::from_static(b"b")));
        assert_eq!(list.len(), 3);
        assert_eq!(list.rank(3.0, &Bytes::from_static(b"c")), Some(1));
        assert!(!list.find(2.0, &Bytes::from_static(b"b")));
    }

    #[test]
    fn many_inserts_stay_sorted() {
        let mut list = SkipList::new();
        for i in (0..500).rev() {
            list.insert(i as f64, Bytes::from(format!("m{i:04}")));
        }
        assert_eq!(list.len(), 500);
        let collected = members(&list);
        for window in collected.windows(2) {
            assert!(window[0].0 <= window[1].0);
        }
    }

    #[test]
    fn slot_reuse_after_delete() {
        let mut list = SkipList::new();
        list.insert(1.0, Bytes::from_static(b"a"));
        list.insert(2.0, Bytes::from_static(b"b"));
        assert!(list.delete(1.0, &Bytes::from_static(b"a")));
        list.insert(3.0, Bytes::from_static(b"c"));
        assert_eq!(
            members(&list),
            vec![
                (2.0, Bytes::from_static(b"b")),
                (3.0, Bytes::from_static(b"c")),
            ]
        );
    }
}

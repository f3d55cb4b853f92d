//! Cycle-based alarm scheduling.
//!
//! Components that act at a future cycle (timer underflows, shift clocks)
//! register an alarm instead of being ticked every cycle. Each alarm key has
//! at most one pending deadline; setting it again replaces the old one.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry<K> {
    at: Ticks,
    seq: u64,
    key: K,
}

/// Min-ordered queue of `(cycle, key)` alarms.
///
/// Cancelled or replaced entries stay in the heap and are discarded lazily
/// when they reach the top. Alarms due on the same cycle fire in the order
/// they were set.
#[derive(Debug, Clone)]
pub struct AlarmQueue<K> {
    heap: BinaryHeap<Reverse<Entry<K>>>,
    /// Live deadline per key: `(cycle, seq)`.
    live: Vec<(K, Ticks, u64)>,
    next_seq: u64,
}

impl<K: Copy + Ord> AlarmQueue<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: Vec::new(),
            next_seq: 0,
        }
    }

    /// Schedule `key` to fire at `at`, replacing any pending deadline.
    pub fn set(&mut self, key: K, at: Ticks) {
        let seq = self.next_seq;
        self.next_seq += 1;
        match self.live.iter_mut().find(|(k, _, _)| *k == key) {
            Some(slot) => *slot = (key, at, seq),
            None => self.live.push((key, at, seq)),
        }
        self.heap.push(Reverse(Entry { at, seq, key }));
    }

    /// Cancel the pending deadline for `key`, if any.
    pub fn cancel(&mut self, key: K) {
        self.live.retain(|(k, _, _)| *k != key);
    }

    /// Cancel every pending alarm.
    pub fn clear(&mut self) {
        self.live.clear();
        self.heap.clear();
    }

    /// Pending deadline for `key`.
    #[must_use]
    pub fn pending(&self, key: K) -> Option<Ticks> {
        self.live
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|&(_, at, _)| at)
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_due(&self) -> Option<Ticks> {
        self.live.iter().map(|&(_, at, _)| at).min()
    }

    /// Remove and return the earliest alarm due at or before `now`.
    pub fn pop_due(&mut self, now: Ticks) -> Option<(Ticks, K)> {
        while let Some(Reverse(top)) = self.heap.peek().copied() {
            if !self.is_live(&top) {
                self.heap.pop();
                continue;
            }
            if top.at > now {
                return None;
            }
            self.heap.pop();
            self.cancel(top.key);
            return Some((top.at, top.key));
        }
        None
    }

    fn is_live(&self, entry: &Entry<K>) -> bool {
        self.live
            .iter()
            .any(|&(k, _, seq)| k == entry.key && seq == entry.seq)
    }
}

impl<K: Copy + Ord> Default for AlarmQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Key {
        A,
        B,
    }

    #[test]
    fn fires_in_cycle_order() {
        let mut q = AlarmQueue::new();
        q.set(Key::B, Ticks(20));
        q.set(Key::A, Ticks(10));
        assert_eq!(q.next_due(), Some(Ticks(10)));
        assert_eq!(q.pop_due(Ticks(5)), None);
        assert_eq!(q.pop_due(Ticks(25)), Some((Ticks(10), Key::A)));
        assert_eq!(q.pop_due(Ticks(25)), Some((Ticks(20), Key::B)));
        assert_eq!(q.pop_due(Ticks(25)), None);
    }

    #[test]
    fn set_replaces_stale_deadline() {
        let mut q = AlarmQueue::new();
        q.set(Key::A, Ticks(10));
        q.set(Key::A, Ticks(30));
        assert_eq!(q.pending(Key::A), Some(Ticks(30)));
        assert_eq!(q.pop_due(Ticks(15)), None);
        assert_eq!(q.pop_due(Ticks(30)), Some((Ticks(30), Key::A)));
    }

    #[test]
    fn cancel_suppresses_alarm() {
        let mut q = AlarmQueue::new();
        q.set(Key::A, Ticks(10));
        q.cancel(Key::A);
        assert_eq!(q.next_due(), None);
        assert_eq!(q.pop_due(Ticks(100)), None);
    }

    #[test]
    fn same_cycle_fires_in_set_order() {
        let mut q = AlarmQueue::new();
        q.set(Key::B, Ticks(10));
        q.set(Key::A, Ticks(10));
        assert_eq!(q.pop_due(Ticks(10)), Some((Ticks(10), Key::B)));
        assert_eq!(q.pop_due(Ticks(10)), Some((Ticks(10), Key::A)));
    }
}

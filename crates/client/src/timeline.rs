//! Per-channel message timeline keyed by sequence number.

use cohort_protocol::Message;
use std::collections::BTreeMap;

pub const DEFAULT_CAPACITY: usize = 500;

/// Merges history pages and live frames; a sequence number is held once.
///
/// Only the most recent `capacity` messages are retained. Everything at or
/// below the eviction floor still counts as seen, so an evicted message that
/// shows up again is treated as a duplicate.
#[derive(Debug, Clone)]
pub struct Timeline {
    messages: BTreeMap<i64, Message>,
    capacity: usize,
    floor: i64,
    /// Highest sequence number held or acknowledged by a join
    synced_through: i64,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { messages: BTreeMap::new(), capacity: capacity.max(1), floor: 0, synced_through: 0 }
    }

    /// Returns false when the sequence number was already seen
    pub fn insert(&mut self, message: Message) -> bool {
        if self.seen(message.seq) {
            return false;
        }
        self.synced_through = self.synced_through.max(message.seq);
        self.messages.insert(message.seq, message);
        self.trim();
        true
    }

    /// Insert a batch in any order; returns the newly added messages, ascending.
    /// The result is not cut to `capacity`.
    pub fn merge(&mut self, messages: impl IntoIterator<Item = Message>) -> Vec<Message> {
        let mut added: Vec<Message> = messages.into_iter().filter(|message| !self.seen(message.seq)).collect();
        added.sort_by_key(|message| message.seq);
        added.dedup_by_key(|message| message.seq);

        for message in &added {
            self.synced_through = self.synced_through.max(message.seq);
            self.messages.insert(message.seq, message.clone());
        }
        self.trim();
        added
    }

    /// Record a join acknowledgement: everything up to `last_seq` predates the
    /// join and is not a gap.
    pub fn acknowledge(&mut self, last_seq: i64) {
        self.synced_through = self.synced_through.max(last_seq);
    }

    /// Where gap recovery resumes after an outage
    pub fn synced_through(&self) -> i64 {
        self.synced_through
    }

    pub fn contains(&self, seq: i64) -> bool {
        self.messages.contains_key(&seq)
    }

    pub fn last_seq(&self) -> Option<i64> {
        self.messages.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ascending by sequence number
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    fn seen(&self, seq: i64) -> bool {
        seq <= self.floor || self.messages.contains_key(&seq)
    }

    fn trim(&mut self) {
        while self.messages.len() > self.capacity {
            match self.messages.pop_first() {
                Some((seq, _)) => self.floor = self.floor.max(seq),
                None => break,
            }
        }
    }
}

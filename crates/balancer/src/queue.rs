//! Bounded admission queue ordered by due time, then admission order.
//!
//! Keys are `(due, seq)` pairs: `seq` grows with every admission, so items due
//! at the same time drain first-in first-out.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::types::ItemId;

/// A due time in seconds with a total order.
#[derive(Debug, Clone, Copy)]
pub struct DueTime(pub f64);

impl PartialEq for DueTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DueTime {}

impl PartialOrd for DueTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DueTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Position of an item in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueueKey {
    pub due: DueTime,
    pub seq: u64,
}

impl QueueKey {
    pub fn due_at(&self) -> f64 {
        self.due.0
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.due.0 <= now
    }
}

/// Returned when an admission would exceed the queue capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull {
    pub capacity: usize,
}

/// Ordered holding area for items waiting for their next execution slot.
#[derive(Debug)]
pub struct AdmissionQueue {
    entries: BTreeMap<QueueKey, ItemId>,
    capacity: usize,
    next_seq: u64,
}

impl AdmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity,
            next_seq: 0,
        }
    }

    /// Admit an item due at `due_at`.
    pub fn push(&mut self, due_at: f64, item: ItemId) -> Result<QueueKey, QueueFull> {
        if self.is_full() {
            return Err(QueueFull {
                capacity: self.capacity,
            });
        }
        let key = QueueKey {
            due: DueTime(due_at),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, item);
        Ok(key)
    }

    /// Remove the entry at `key`, if still queued.
    pub fn remove(&mut self, key: &QueueKey) -> Option<ItemId> {
        self.entries.remove(key)
    }

    /// The earliest entry, due or not.
    pub fn peek_next_due(&self) -> Option<(QueueKey, ItemId)> {
        self.entries.iter().next().map(|(k, id)| (*k, *id))
    }

    /// Remove and return the earliest entry if it is due at `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<(QueueKey, ItemId)> {
        match self.peek_next_due() {
            Some((key, _)) if key.is_due(now) => self.entries.remove_entry(&key),
            _ => None,
        }
    }

    /// Number of entries due at `now`.
    pub fn due_count(&self, now: f64) -> usize {
        self.due_iter(now).count()
    }

    /// Keys of the first `limit` entries due at `now`, in drain order.
    pub fn due_keys(&self, now: f64, limit: usize) -> Vec<QueueKey> {
        self.due_iter(now).take(limit).map(|(k, _)| *k).collect()
    }

    fn due_iter(&self, now: f64) -> impl Iterator<Item = (&QueueKey, &ItemId)> {
        self.entries.iter().take_while(move |(k, _)| k.is_due(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn contains(&self, key: &QueueKey) -> bool {
        self.entries.contains_key(key)
    }
}

//! Ordered process containers
//!
//! `WaitQueue` backs the priority levels, the reply and receive wait sets
//! and every semaphore's wait set. Processes enter at the back and leave
//! from the front; membership is searched by process id through the arena.

use std::collections::VecDeque;

use slab::Slab;

use crate::types::{Process, ProcessId, ProcessKey};

/// Returned when a bounded queue is full
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFull;

/// FIFO container of arena keys with an optional capacity
#[derive(Clone, Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<ProcessKey>,
    capacity: Option<usize>,
}

impl WaitQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue that holds at most `capacity` entries
    pub fn bounded(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: Some(capacity),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another entry would be rejected
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.entries.len() >= cap)
    }

    /// Append at the back
    pub fn push(&mut self, key: ProcessKey) -> Result<(), QueueFull> {
        if self.is_full() {
            return Err(QueueFull);
        }
        self.entries.push_back(key);
        Ok(())
    }

    /// Remove the longest-waiting entry
    pub fn pop(&mut self) -> Option<ProcessKey> {
        self.entries.pop_front()
    }

    /// Index of the first entry whose process has `pid`
    pub fn position(&self, processes: &Slab<Process>, pid: ProcessId) -> Option<usize> {
        self.entries
            .iter()
            .position(|&key| processes.get(key).is_some_and(|p| p.pid == pid))
    }

    /// Arena key of the first entry whose process has `pid`
    pub fn find(&self, processes: &Slab<Process>, pid: ProcessId) -> Option<ProcessKey> {
        self.position(processes, pid).map(|index| self.entries[index])
    }

    /// Index of `key`, if queued here
    pub fn index_of(&self, key: ProcessKey) -> Option<usize> {
        self.entries.iter().position(|&k| k == key)
    }

    /// Whether `key` is queued here
    pub fn contains(&self, key: ProcessKey) -> bool {
        self.entries.contains(&key)
    }

    /// Remove the entry at `index`
    pub fn remove(&mut self, index: usize) -> Option<ProcessKey> {
        self.entries.remove(index)
    }

    /// Put an entry back at `index`, bypassing the capacity check.
    ///
    /// Only used to undo a `remove` when the follow-up admission fails.
    pub fn restore(&mut self, index: usize, key: ProcessKey) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, key);
    }

    /// Entries front to back (dispatch order)
    pub fn iter(&self) -> impl Iterator<Item = ProcessKey> + '_ {
        self.entries.iter().copied()
    }
}

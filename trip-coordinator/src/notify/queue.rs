//! Internally synchronized priority queue of pending messages.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::message::{MessageId, PendingMessage};

/// Heap entry ordered so the most urgent message is the heap maximum.
#[derive(Debug)]
struct Entry(PendingMessage);

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.urgency_cmp(&self.0)
    }
}

/// Priority queue of [`PendingMessage`]s.
///
/// Safe to share between tasks: every operation takes the internal lock,
/// and the lock is never held across an `.await`. At most one entry per
/// [`MessageId`] is kept.
#[derive(Debug, Default)]
pub struct MessageQueue {
    heap: Mutex<BinaryHeap<Entry>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BinaryHeap<Entry>> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a message, replacing any entry with the same id.
    ///
    /// Returns true if an existing entry was replaced.
    pub fn push(&self, msg: PendingMessage) -> bool {
        let mut heap = self.lock();
        let before = heap.len();
        heap.retain(|e| e.0.id != msg.id);
        let replaced = heap.len() != before;
        heap.push(Entry(msg));
        replaced
    }

    /// The most urgent message, without removing it.
    pub fn peek(&self) -> Option<PendingMessage> {
        self.lock().peek().map(|e| e.0.clone())
    }

    /// Remove and return the most urgent message.
    pub fn pop(&self) -> Option<PendingMessage> {
        self.lock().pop().map(|e| e.0)
    }

    /// Remove every message matching `pred`, returning them most urgent
    /// first.
    pub fn drain_matching(&self, mut pred: impl FnMut(&PendingMessage) -> bool) -> Vec<PendingMessage> {
        let mut heap = self.lock();
        let (mut removed, kept): (Vec<Entry>, Vec<Entry>) =
            std::mem::take(&mut *heap).into_iter().partition(|e| pred(&e.0));
        *heap = kept.into_iter().collect();
        removed.sort_by(|a, b| b.cmp(a));
        removed.into_iter().map(|e| e.0).collect()
    }

    /// The queued message with this id.
    pub fn get(&self, id: MessageId) -> Option<PendingMessage> {
        self.lock().iter().find(|e| e.0.id == id).map(|e| e.0.clone())
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.lock().iter().any(|e| e.0.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

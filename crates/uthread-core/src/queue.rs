//! FIFO queue of green thread ids
//!
//! Used for the ready queue and for every mutex / condition variable wait
//! list. Threads are referenced by id rather than linked through their
//! records, so a queue never holds pointers into the thread arena.

use std::collections::VecDeque;
use crate::constants::QUEUE_PREALLOC;
use crate::id::GreenId;

/// Append-at-tail, remove-from-head queue of thread ids
#[derive(Debug, Clone)]
pub struct IdQueue {
    items: VecDeque<GreenId>,
}

impl IdQueue {
    /// Create a queue with the default preallocated capacity
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_PREALLOC)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append to the tail
    #[inline]
    pub fn push(&mut self, id: GreenId) {
        cfg_if::cfg_if! {
            if #[cfg(feature = "debug-assertions")] {
                assert!(!self.items.contains(&id), "{} queued twice", id);
            }
        }
        self.items.push_back(id);
    }

    /// Remove from the head
    #[inline]
    pub fn pop(&mut self) -> Option<GreenId> {
        self.items.pop_front()
    }

    #[inline]
    pub fn peek(&self) -> Option<GreenId> {
        self.items.front().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Grow so that `total` ids fit without further allocation
    pub fn reserve_total(&mut self, total: usize) {
        if total > self.items.capacity() {
            self.items.reserve(total - self.items.len());
        }
    }
}

impl Default for IdQueue {
    fn default() -> Self {
        Self::new()
    }
}

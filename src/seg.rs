//! Unbounded MPMC queue adapter.
//!
//! A thin wrapper over `crossbeam_queue::SegQueue` that speaks this
//! crate's uniform contract. Used where a queue needs no cardinality
//! contract at all: any number of producers and consumers, no capacity
//! planning, segment allocation amortized across elements.

use crossbeam_queue::SegQueue;

use crate::queue::{Dequeue, Enqueue, Full};

/// Unbounded MPMC queue.
pub struct UnboundedQueue<T> {
    inner: SegQueue<T>,
}

impl<T> Default for UnboundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UnboundedQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Appends an element. Unbounded, so this always succeeds.
    #[inline]
    pub fn push(&self, item: T) {
        self.inner.push(item);
    }

    /// Removes and returns the oldest element, if any.
    #[inline]
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Send> Enqueue<T> for UnboundedQueue<T> {
    /// Never fails; present so the adapter satisfies the uniform contract.
    #[inline]
    fn try_enqueue(&self, item: T) -> Result<(), Full<T>> {
        self.push(item);
        Ok(())
    }
}

impl<T: Send> Dequeue<T> for UnboundedQueue<T> {
    #[inline]
    fn try_dequeue(&mut self) -> Option<T> {
        self.pop()
    }

    #[inline]
    fn len(&self) -> usize {
        UnboundedQueue::len(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        UnboundedQueue::is_empty(self)
    }
}

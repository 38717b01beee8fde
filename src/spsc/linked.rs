//! Core unbounded SPSC linked queue algorithm.
//!
//! # Algorithm
//!
//! A singly linked list with a permanently-empty sentinel at the consumer
//! end. `consumer_node` always points at an already-consumed node; the next
//! live element sits in its successor. The producer appends by linking the
//! current tail's `next` with a release store, then advancing its own
//! `producer_node` field plainly (nothing else reads or writes that field
//! with any timing requirement).
//!
//! The consumer takes the successor's value, self-links the node it is
//! leaving behind (tombstone), advances, and frees the old node. The
//! tombstone lets a concurrent count walk detect that it has fallen behind
//! the consumer and stop with a partial count instead of chasing the chain
//! into freed memory.
//!
//! # Safety
//!
//! Exactly one producer and one consumer. The safe handles in
//! [`crate::spsc`] enforce the cardinality through non-`Sync`, non-`Clone`
//! endpoints; calling the raw operations from two threads on the same side
//! is undefined behavior.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::pad::CachePadded;

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    /// `None` for the sentinel and for consumed nodes.
    value: UnsafeCell<Option<T>>,
}

impl<T> Node<T> {
    fn new(value: Option<T>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: AtomicPtr::new(ptr::null_mut()),
            value: UnsafeCell::new(value),
        }))
    }
}

/// Core unbounded SPSC linked queue.
pub(crate) struct LinkedQueue<T> {
    producer_node: CachePadded<AtomicPtr<Node<T>>>,
    consumer_node: CachePadded<AtomicPtr<Node<T>>>,
}

impl<T> LinkedQueue<T> {
    pub(crate) fn new() -> Self {
        let sentinel = Node::new(None);
        Self {
            producer_node: CachePadded::new(AtomicPtr::new(sentinel)),
            consumer_node: CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    /// Appends an item. Never fails; allocates one node.
    ///
    /// # Safety
    ///
    /// Caller must be the only thread pushing (single producer).
    pub(crate) unsafe fn push(&self, item: T) {
        let node = Node::new(Some(item));
        let prev = self.producer_node.load(Ordering::Relaxed);
        // SAFETY: prev is the node this producer appended last (or the
        // sentinel). The consumer cannot free it before observing a
        // non-null next, which is exactly the store below.
        unsafe { (*prev).next.store(node, Ordering::Release) };
        self.producer_node.store(node, Ordering::Relaxed);
    }

    /// Removes and returns the head element, if any.
    ///
    /// # Safety
    ///
    /// Caller must be the only thread popping, peeking, or counting
    /// (single consumer).
    pub(crate) unsafe fn pop(&self) -> Option<T> {
        let current = self.consumer_node.load(Ordering::Relaxed);
        // SAFETY: only the consumer frees nodes, and it has not freed its
        // own current node.
        let next = unsafe { (*current).next.load(Ordering::Acquire) };
        if next.is_null() {
            return None;
        }
        // SAFETY: the acquire load above synchronizes with the producer's
        // release link, so next's value write is visible. Taking through
        // the UnsafeCell is exclusive: only the consumer touches values.
        let item = unsafe { (*(*next).value.get()).take() };
        // Tombstone, then step off the node before freeing it.
        unsafe { (*current).next.store(current, Ordering::Release) };
        self.consumer_node.store(next, Ordering::Relaxed);
        // SAFETY: current is no longer reachable from either end.
        drop(unsafe { Box::from_raw(current) });
        item
    }

    /// Returns a pointer to the head element's value without removing it.
    ///
    /// # Safety
    ///
    /// Single consumer. The pointer is valid until the next consumer-side
    /// removal.
    pub(crate) unsafe fn peek(&self) -> Option<*const T> {
        let current = self.consumer_node.load(Ordering::Relaxed);
        // SAFETY: as in pop, the consumer's current node is alive.
        let next = unsafe { (*current).next.load(Ordering::Acquire) };
        if next.is_null() {
            return None;
        }
        // SAFETY: value was published by the release link and only the
        // consumer removes it.
        unsafe { (*(*next).value.get()).as_ref().map(|value| value as *const T) }
    }

    /// Walks from the consumer node toward the producer node, counting
    /// live nodes. Stops with a partial count on a tombstone.
    ///
    /// # Safety
    ///
    /// Single consumer. The walk dereferences nodes the consumer has not
    /// freed yet; a producer-side caller could race with the consumer
    /// freeing them.
    pub(crate) unsafe fn len(&self) -> usize {
        let mut chaser = self.consumer_node.load(Ordering::Acquire);
        let produced = self.producer_node.load(Ordering::Acquire);
        let mut count = 0usize;
        while chaser != produced && !chaser.is_null() {
            // SAFETY: nodes between consumer_node and producer_node are
            // alive while the sole consumer is here instead of in pop.
            let next = unsafe { (*chaser).next.load(Ordering::Acquire) };
            if next == chaser {
                // Fell behind a concurrent dequeue; partial count.
                return count;
            }
            if next.is_null() {
                break;
            }
            chaser = next;
            count += 1;
        }
        count
    }

    /// Pointer-identity emptiness check. Safe from either end: no node is
    /// dereferenced.
    pub(crate) fn is_empty(&self) -> bool {
        let consumer = self.consumer_node.load(Ordering::Acquire);
        let producer = self.producer_node.load(Ordering::Acquire);
        consumer == producer
    }
}

impl<T> Drop for LinkedQueue<T> {
    fn drop(&mut self) {
        // &mut self: both endpoints are gone, the chain from consumer_node
        // forward is the sentinel plus all unconsumed nodes.
        let mut current = self.consumer_node.load(Ordering::Relaxed);
        while !current.is_null() {
            // SAFETY: nodes on the live chain were leaked via Box::into_raw
            // and are freed exactly once here.
            let node = unsafe { Box::from_raw(current) };
            current = node.next.load(Ordering::Relaxed);
        }
    }
}

// SAFETY: the queue transfers whole elements between the two endpoint
// threads; the push/pop protocol above keeps each node single-writer at
// every point in its life.
unsafe impl<T: Send> Send for LinkedQueue<T> {}
unsafe impl<T: Send> Sync for LinkedQueue<T> {}

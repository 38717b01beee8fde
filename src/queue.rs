//! Uniform queue contract shared by every structure in the crate.
//!
//! Scheduling code is written against these traits so a local run queue can
//! be swapped between, say, the array deque and the linked deque without
//! touching call sites. Non-blocking operations never panic on contention or
//! fullness; a rejected element travels back to the caller inside the error.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

/// Enqueue failed because the queue is at capacity.
///
/// Carries the rejected element so the caller can retry or reroute it
/// without a clone.
#[derive(thiserror::Error)]
#[error("queue is full")]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the rejected element.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

/// Outcome of a weak enqueue attempt that refuses to loop on contention.
#[derive(Debug)]
pub enum WeakPush<T> {
    /// The queue was full; the element is handed back.
    Full(T),
    /// Another producer won the claim race; the element is handed back and
    /// the caller may retry immediately.
    Contended(T),
}

impl<T> WeakPush<T> {
    /// Returns the rejected element.
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            WeakPush::Full(item) | WeakPush::Contended(item) => item,
        }
    }
}

/// Deadline for blocking enqueue/dequeue variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Spin until the operation succeeds.
    Infinite,
    /// Spin for at most this long.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::Duration(duration)
    }
}

/// Producer side of the contract.
pub trait Enqueue<T> {
    /// Attempts to append an element, handing it back if the queue is full.
    fn try_enqueue(&self, item: T) -> Result<(), Full<T>>;
}

/// Consumer side of the contract.
///
/// Takes `&mut self`: every consumer role in this crate is single-threaded
/// and the exclusive borrow keeps two consumer calls from overlapping even
/// through a shared handle.
pub trait Dequeue<T> {
    /// Removes and returns the element at the head, if any.
    fn try_dequeue(&mut self) -> Option<T>;

    /// Number of elements currently in the queue.
    ///
    /// Concurrent queues can only answer for a moment that has already
    /// passed; treat the result as an estimate unless the caller is the
    /// only thread touching the queue.
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards all elements reachable from the consumer side.
    fn clear(&mut self) {
        while self.try_dequeue().is_some() {}
    }
}

/// Consumer-side inspection without removal.
pub trait Peek<T>: Dequeue<T> {
    /// Returns a reference to the head element without removing it.
    ///
    /// The `&mut self` borrow keeps the element in place for the lifetime
    /// of the reference: nothing else on the consumer side can dequeue it.
    fn try_peek(&mut self) -> Option<&T>;
}

/// Removal from the opposite end, for work-stealing thieves.
pub trait DequeueLast<T> {
    /// Removes and returns an element from the end opposite the one
    /// [`Dequeue`] serves, if any.
    fn try_dequeue_last(&self) -> Option<T>;
}

/// Rounds a requested capacity up to the next power of two, with a floor
/// of one, so index masking can replace modulo on the hot path.
#[inline]
pub(crate) fn capacity_for(requested: usize) -> usize {
    requested.max(1).next_power_of_two()
}

/// Marker that removes `Sync` from a handle while keeping it `Send`.
///
/// Moving the handle to another thread is fine; sharing it between threads
/// is not, and that is exactly the single-threaded role contract.
pub(crate) type PhantomUnsync = PhantomData<Cell<&'static ()>>;

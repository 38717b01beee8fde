//! Unbounded lock-free SPSC queue for inter-thread handoff.
//!
//! # Overview
//!
//! - [`Producer`] - write end (single producer per queue)
//! - [`Consumer`] - read end (single consumer per queue)
//! - Unbounded: enqueue never fails, each element costs one allocation
//!
//! The cardinality contract is enforced by the handles: both ends are
//! [`Send`] but not [`Sync`] and not `Clone`, so each side lives on exactly
//! one thread at a time.
//!
//! # Example
//!
//! ```
//! use skiff::queue::{Dequeue, Enqueue};
//!
//! let (producer, mut consumer) = skiff::spsc::channel::<u64>();
//!
//! producer.enqueue(42);
//! assert_eq!(consumer.try_dequeue(), Some(42));
//! ```

pub(crate) mod linked;

use std::hint;
use std::sync::Arc;

use minstant::Instant;

use crate::queue::{Dequeue, Enqueue, Full, Peek, PhantomUnsync, Timeout};
use linked::LinkedQueue;

/// Write end of the SPSC queue.
///
/// # Thread Safety
///
/// `Producer` is [`Send`] but **not** [`Sync`]:
/// - Can transfer ownership to another thread
/// - Cannot share `&Producer` (no concurrent enqueues)
pub struct Producer<T: Send> {
    queue: Arc<LinkedQueue<T>>,
    _unsync: PhantomUnsync,
}

/// Read end of the SPSC queue.
///
/// Only one consumer exists per queue. See [`Producer`] for thread safety
/// details (same semantics apply).
pub struct Consumer<T: Send> {
    queue: Arc<LinkedQueue<T>>,
    _unsync: PhantomUnsync,
}

/// Creates a new unbounded SPSC channel.
///
/// Returns a `(Producer, Consumer)` pair. The endpoints can be sent to
/// different threads but neither can be shared or cloned.
#[must_use]
pub fn channel<T: Send>() -> (Producer<T>, Consumer<T>) {
    let queue = Arc::new(LinkedQueue::new());

    let producer = Producer {
        queue: Arc::clone(&queue),
        _unsync: std::marker::PhantomData,
    };

    let consumer = Consumer {
        queue,
        _unsync: std::marker::PhantomData,
    };

    (producer, consumer)
}

impl<T: Send> Producer<T> {
    /// Appends an element. Unbounded, so this always succeeds.
    #[inline]
    pub fn enqueue(&self, item: T) {
        // SAFETY: Producer is not Sync and not Clone, so this is the only
        // thread on the producer side of the queue.
        unsafe { self.queue.push(item) };
    }

    /// Pointer-identity emptiness check, safe from the producer side.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T: Send> Enqueue<T> for Producer<T> {
    /// Never fails; present so SPSC endpoints satisfy the uniform contract.
    #[inline]
    fn try_enqueue(&self, item: T) -> Result<(), Full<T>> {
        self.enqueue(item);
        Ok(())
    }
}

impl<T: Send> Consumer<T> {
    /// Spins until an element is available, then dequeues.
    ///
    /// Returns `None` on timeout.
    #[must_use]
    pub fn dequeue_blocking(&mut self, timeout: Timeout) -> Option<T> {
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };
        loop {
            if let Some(item) = self.try_dequeue() {
                return Some(item);
            }
            if let Some(dl) = deadline
                && Instant::now() > dl
            {
                return None;
            }
            hint::spin_loop();
        }
    }
}

impl<T: Send> Dequeue<T> for Consumer<T> {
    #[inline]
    fn try_dequeue(&mut self) -> Option<T> {
        // SAFETY: Consumer is not Sync and not Clone, so this is the only
        // thread on the consumer side of the queue.
        unsafe { self.queue.pop() }
    }

    #[inline]
    fn len(&self) -> usize {
        // SAFETY: consumer side; the walk only visits nodes this thread
        // has not freed.
        unsafe { self.queue.len() }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T: Send> Peek<T> for Consumer<T> {
    #[inline]
    fn try_peek(&mut self) -> Option<&T> {
        // SAFETY: sole consumer, and the &mut borrow keeps the head node in
        // place while the reference lives.
        unsafe { self.queue.peek().map(|value| &*value) }
    }
}

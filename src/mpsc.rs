//! Bounded lock-free MPSC queue for inter-thread handoff.
//!
//! # Overview
//!
//! - [`Producer`] - write end, shared: `Clone` + `Sync`, any number of threads
//! - [`Consumer`] - read end, exactly one (`Send` but not `Sync`, not `Clone`)
//!
//! Capacity is fixed at construction and rounded up to the next power of two.
//! A full queue is backpressure, not an error condition: the rejected element
//! rides back to the caller inside [`Full`].
//!
//! # Example
//!
//! ```
//! use skiff::queue::{Dequeue, Enqueue};
//!
//! let (producer, mut consumer) = skiff::mpsc::channel::<u64>(1024);
//!
//! // Any producer thread
//! producer.try_enqueue(42).expect("queue full");
//!
//! // The consumer thread
//! assert_eq!(consumer.try_dequeue(), Some(42));
//! ```

pub(crate) mod ring;

use std::hint;
use std::sync::Arc;

use minstant::Instant;

use crate::queue::{Dequeue, Enqueue, Full, Peek, PhantomUnsync, Timeout, WeakPush, capacity_for};
use ring::Ring;

/// Write end of the MPSC queue.
///
/// Cloneable and shareable: enqueues from any number of threads race on the
/// producer index and the loser of a claim retries internally.
pub struct Producer<T: Send> {
    ring: Arc<Ring<T>>,
}

impl<T: Send> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
        }
    }
}

/// Read end of the MPSC queue.
///
/// # Thread Safety
///
/// `Consumer` is [`Send`] but **not** [`Sync`] and not `Clone`:
/// - Can transfer ownership to another thread
/// - Cannot share `&Consumer` (no concurrent dequeues)
pub struct Consumer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

/// Creates a new bounded MPSC channel.
///
/// `capacity` is rounded up to the next power of two (minimum 1). Returns a
/// `(Producer, Consumer)` pair; clone the producer for additional writers.
#[must_use]
pub fn channel<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let ring = Arc::new(Ring::new(capacity_for(capacity)));

    let producer = Producer {
        ring: Arc::clone(&ring),
    };

    let consumer = Consumer {
        ring,
        _unsync: std::marker::PhantomData,
    };

    (producer, consumer)
}

impl<T: Send> Producer<T> {
    /// Queue capacity after power-of-two rounding.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of elements currently in the queue (moment-in-time estimate).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Single-attempt enqueue that reports a lost claim race instead of
    /// retrying it.
    ///
    /// # Errors
    ///
    /// Returns [`WeakPush::Full`] or [`WeakPush::Contended`], both carrying
    /// the element.
    #[inline]
    pub fn weak_enqueue(&self, item: T) -> Result<(), WeakPush<T>> {
        self.ring.push_weak(item)
    }

    /// Spins until space is available, then enqueues.
    ///
    /// # Errors
    ///
    /// Returns the element on timeout.
    pub fn enqueue_blocking(&self, mut item: T, timeout: Timeout) -> Result<(), T> {
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };
        loop {
            match self.ring.push(item) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    item = returned;
                    if let Some(dl) = deadline
                        && Instant::now() > dl
                    {
                        return Err(item);
                    }
                    hint::spin_loop();
                }
            }
        }
    }
}

impl<T: Send> Enqueue<T> for Producer<T> {
    /// Attempts to enqueue an item (lock-free).
    ///
    /// # Errors
    ///
    /// Returns [`Full`] carrying the element if the queue is at capacity.
    #[inline]
    fn try_enqueue(&self, item: T) -> Result<(), Full<T>> {
        self.ring.push(item).map_err(Full)
    }
}

impl<T: Send> Consumer<T> {
    /// Queue capacity after power-of-two rounding.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

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
        // thread on the consumer side of the ring.
        unsafe { self.ring.pop() }
    }

    #[inline]
    fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<T: Send> Peek<T> for Consumer<T> {
    #[inline]
    fn try_peek(&mut self) -> Option<&T> {
        // SAFETY: sole consumer, and the &mut borrow keeps consumer-side
        // removal off the slot while the reference lives. Producers never
        // touch a published slot again until the consumer nulls it.
        unsafe { self.ring.peek().map(|element| &*element) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_basic_enqueue_dequeue() {
        let (producer, mut consumer) = channel::<u64>(8);

        assert!(producer.try_enqueue(42).is_ok());
        assert_eq!(consumer.try_dequeue(), Some(42));
        assert_eq!(consumer.try_dequeue(), None);
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let (producer, consumer) = channel::<u64>(1000);
        assert_eq!(producer.capacity(), 1024);
        assert_eq!(consumer.capacity(), 1024);

        let (producer, _consumer) = channel::<u64>(0);
        assert_eq!(producer.capacity(), 1);
    }

    #[test]
    fn test_backpressure_boundary() {
        let (producer, mut consumer) = channel::<u64>(4);

        for i in 0..4 {
            assert!(producer.try_enqueue(i).is_ok(), "Failed to enqueue {i}");
        }

        let rejected = producer.try_enqueue(999).unwrap_err();
        assert_eq!(rejected.into_inner(), 999);

        // One dequeue opens exactly one slot.
        assert_eq!(consumer.try_dequeue(), Some(0));
        assert!(producer.try_enqueue(4).is_ok());
        assert!(producer.try_enqueue(5).is_err());
    }

    #[test]
    fn test_weak_enqueue_full() {
        let (producer, _consumer) = channel::<u64>(2);

        assert!(producer.weak_enqueue(1).is_ok());
        assert!(producer.weak_enqueue(2).is_ok());
        match producer.weak_enqueue(3) {
            Err(WeakPush::Full(item)) => assert_eq!(item, 3),
            other => panic!("expected full, got {other:?}"),
        }
    }

    #[test]
    fn test_peek_does_not_remove() {
        let (producer, mut consumer) = channel::<String>(8);

        assert_eq!(consumer.try_peek(), None);

        producer.try_enqueue("head".to_string()).unwrap();
        producer.try_enqueue("next".to_string()).unwrap();

        assert_eq!(consumer.try_peek().map(String::as_str), Some("head"));
        assert_eq!(consumer.try_peek().map(String::as_str), Some("head"));
        assert_eq!(consumer.len(), 2);

        assert_eq!(consumer.try_dequeue(), Some("head".to_string()));
        assert_eq!(consumer.try_peek().map(String::as_str), Some("next"));
    }

    #[test]
    fn test_count_and_is_empty() {
        let (producer, mut consumer) = channel::<u64>(8);

        assert!(consumer.is_empty());
        for i in 0..5 {
            producer.try_enqueue(i).unwrap();
        }
        assert_eq!(consumer.len(), 5);
        assert_eq!(producer.len(), 5);

        consumer.clear();
        assert!(consumer.is_empty());
        assert_eq!(consumer.try_dequeue(), None);
    }

    #[test]
    fn test_blocking_timeout() {
        let (producer, mut consumer) = channel::<u64>(2);

        assert_eq!(
            consumer.dequeue_blocking(Duration::from_millis(5).into()),
            None
        );

        producer.try_enqueue(1).unwrap();
        producer.try_enqueue(2).unwrap();
        assert_eq!(
            producer.enqueue_blocking(3, Duration::from_millis(5).into()),
            Err(3)
        );

        assert_eq!(consumer.dequeue_blocking(Timeout::Infinite), Some(1));
        assert!(producer.enqueue_blocking(3, Timeout::Infinite).is_ok());
    }

    #[test]
    fn test_cloned_producers() {
        let (producer, mut consumer) = channel::<u64>(64);
        let num_producers = 4;
        let items_per_producer = 1000u64;

        let mut handles = vec![];
        for p in 0..num_producers {
            let producer = producer.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..items_per_producer {
                    let value = p * items_per_producer + i;
                    while producer.try_enqueue(value).is_err() {
                        std::thread::yield_now();
                    }
                }
            }));
        }

        let total = num_producers * items_per_producer;
        let mut seen = vec![false; total as usize];
        let mut received = 0u64;
        while received < total {
            if let Some(value) = consumer.try_dequeue() {
                assert!(!seen[value as usize], "Duplicate value {value}");
                seen[value as usize] = true;
                received += 1;
            } else {
                std::thread::yield_now();
            }
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_per_producer_order() {
        let (producer, mut consumer) = channel::<(u64, u64)>(32);

        let mut handles = vec![];
        for p in 0..3u64 {
            let producer = producer.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..500u64 {
                    while producer.try_enqueue((p, i)).is_err() {
                        std::thread::yield_now();
                    }
                }
            }));
        }

        let mut last_seen = [None::<u64>; 3];
        let mut received = 0;
        while received < 1500 {
            if let Some((p, i)) = consumer.try_dequeue() {
                if let Some(prev) = last_seen[p as usize] {
                    assert!(i > prev, "Producer {p} reordered: {prev} then {i}");
                }
                last_seen[p as usize] = Some(i);
                received += 1;
            } else {
                std::thread::yield_now();
            }
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

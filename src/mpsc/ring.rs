//! Core lock-free MPSC ring buffer algorithm.
//!
//! This module provides a bounded MPSC (Multi-Producer Single-Consumer)
//! circular array queue over boxed elements.
//!
//! # Algorithm
//!
//! Producers race on a shared producer index and the winner owns the slot:
//!
//! - A producer checks fullness against a cached copy of the consumer index,
//!   refreshing the cache from the real index only when the cached view says
//!   full. Producers share the cache line of the cache, not the consumer's.
//! - The winner of a `compare_exchange` on the producer index publishes the
//!   element pointer into its slot with a release store.
//! - The consumer reads its own index plainly, acquires the slot pointer, and
//!   a null pointer with a lagging producer index means a producer claimed
//!   the slot but has not published yet. The consumer spins on that slot
//!   rather than skipping it, so FIFO order holds per producer.
//! - Null is the "empty slot" sentinel, which is why elements live behind a
//!   pointer rather than inline.
//!
//! # Safety
//!
//! The producer side is lock-free for multiple concurrent producers.
//! The consumer side requires exactly one consumer (single consumer
//! invariant); the safe wrapper in [`crate::mpsc`] enforces it through a
//! non-`Sync`, non-`Clone` handle.

use std::hint;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use crate::pad::CachePadded;
use crate::queue::WeakPush;

/// Slots of dead padding on each side of the live buffer region, so the
/// first and last live slots never share a cache line with neighboring
/// allocations.
const REF_BUFFER_PAD: usize = 16;

/// A slot in the ring buffer.
///
/// Holds either null (empty, or claimed but not yet published) or a pointer
/// produced by `Box::into_raw`. The named accessors spell out the access
/// strength used at each call site.
struct Slot<T> {
    element: AtomicPtr<T>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            element: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Plain load, no ordering. Only valid where the caller already owns
    /// the slot (consumer re-reads, drop).
    #[inline]
    fn load_plain(&self) -> *mut T {
        self.element.load(Ordering::Relaxed)
    }

    /// Volatile load: acquires the producer's publishing store.
    #[inline]
    fn load_volatile(&self) -> *mut T {
        self.element.load(Ordering::Acquire)
    }

    /// Plain store. Only valid where the caller already owns the slot.
    #[inline]
    fn store_plain(&self, ptr: *mut T) {
        self.element.store(ptr, Ordering::Relaxed);
    }

    /// Ordered store: publishes the element to the consumer.
    #[inline]
    fn store_ordered(&self, ptr: *mut T) {
        self.element.store(ptr, Ordering::Release);
    }
}

/// Producer-side state.
///
/// The consumer cache lives next to the producer index on purpose: both are
/// written by producers, and keeping them on one line means the fullness
/// check does not touch the consumer's line until the cached view says full.
struct ProducerState {
    /// Next position to claim. Producers race on this with CAS.
    index: AtomicU64,
    /// Producer-side snapshot of the consumer index.
    consumer_cache: AtomicU64,
}

impl ProducerState {
    const fn new() -> Self {
        Self {
            index: AtomicU64::new(0),
            consumer_cache: AtomicU64::new(0),
        }
    }
}

/// Consumer-side state. Only the consumer writes the index.
struct ConsumerState {
    index: AtomicU64,
}

impl ConsumerState {
    const fn new() -> Self {
        Self {
            index: AtomicU64::new(0),
        }
    }
}

/// Core bounded MPSC ring buffer.
pub(crate) struct Ring<T> {
    producer: CachePadded<ProducerState>,
    consumer: CachePadded<ConsumerState>,
    mask: u64,
    buffer: Box<[Slot<T>]>,
}

impl<T> Ring<T> {
    /// Creates a ring with the given capacity, which must be a power of two.
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let buffer = (0..capacity + 2 * REF_BUFFER_PAD)
            .map(|_| Slot::new())
            .collect();
        Self {
            producer: CachePadded::new(ProducerState::new()),
            consumer: CachePadded::new(ConsumerState::new()),
            mask: capacity as u64 - 1,
            buffer,
        }
    }

    #[inline]
    fn slot(&self, index: u64) -> &Slot<T> {
        &self.buffer[REF_BUFFER_PAD + (index & self.mask) as usize]
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        (self.mask + 1) as usize
    }

    /// Attempts to push an item, retrying claim races until the item is in
    /// or the queue is observed full.
    ///
    /// Lock-free for multiple concurrent producers. On `Err` the item is
    /// handed back untouched.
    pub(crate) fn push(&self, item: T) -> Result<(), T> {
        let capacity = self.mask + 1;
        let element = Box::into_raw(Box::new(item));
        loop {
            let pi = self.producer.index.load(Ordering::Acquire);
            let cached = self.producer.consumer_cache.load(Ordering::Relaxed);
            if pi >= cached + capacity {
                // Cached view says full; refresh from the real consumer
                // index before giving up.
                let ci = self.consumer.index.load(Ordering::Acquire);
                if pi >= ci + capacity {
                    // SAFETY: the box was created above and never published.
                    let item = *unsafe { Box::from_raw(element) };
                    return Err(item);
                }
                self.producer.consumer_cache.store(ci, Ordering::Relaxed);
            }
            if self
                .producer
                .index
                .compare_exchange_weak(pi, pi + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // Claim won: slot pi is ours until the release store below.
                self.slot(pi).store_ordered(element);
                return Ok(());
            }
            // Another producer claimed pi first; retry with a fresh index.
        }
    }

    /// Single-attempt push that distinguishes "full" from "lost the claim
    /// race", for callers that prefer to reroute over spinning.
    pub(crate) fn push_weak(&self, item: T) -> Result<(), WeakPush<T>> {
        let capacity = self.mask + 1;
        let pi = self.producer.index.load(Ordering::Acquire);
        let cached = self.producer.consumer_cache.load(Ordering::Relaxed);
        if pi >= cached + capacity {
            let ci = self.consumer.index.load(Ordering::Acquire);
            if pi >= ci + capacity {
                return Err(WeakPush::Full(item));
            }
            self.producer.consumer_cache.store(ci, Ordering::Relaxed);
        }
        if self
            .producer
            .index
            .compare_exchange(pi, pi + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WeakPush::Contended(item));
        }
        self.slot(pi).store_ordered(Box::into_raw(Box::new(item)));
        Ok(())
    }

    /// Attempts to pop the element at the consumer index.
    ///
    /// If the slot is null but the producer index is ahead, a producer has
    /// claimed the slot without publishing yet; this spins until the element
    /// appears rather than returning a spurious `None`.
    ///
    /// # Safety
    ///
    /// Caller must be the only thread popping or peeking (single consumer).
    pub(crate) unsafe fn pop(&self) -> Option<T> {
        let ci = self.consumer.index.load(Ordering::Relaxed);
        let slot = self.slot(ci);
        let mut element = slot.load_volatile();
        if element.is_null() {
            if ci == self.producer.index.load(Ordering::Acquire) {
                return None;
            }
            // In-flight push at this slot; its store is imminent.
            loop {
                element = slot.load_volatile();
                if !element.is_null() {
                    break;
                }
                hint::spin_loop();
            }
        }
        slot.store_plain(ptr::null_mut());
        self.consumer.index.store(ci + 1, Ordering::Release);
        // SAFETY: element came from Box::into_raw in push, and nulling the
        // slot before advancing makes this the sole extraction of it.
        Some(*unsafe { Box::from_raw(element) })
    }

    /// Returns a pointer to the element at the consumer index without
    /// removing it, waiting out an in-flight push the same way `pop` does.
    ///
    /// # Safety
    ///
    /// Caller must be the only thread popping or peeking (single consumer).
    /// The pointer is valid until the next consumer-side removal.
    pub(crate) unsafe fn peek(&self) -> Option<*mut T> {
        let ci = self.consumer.index.load(Ordering::Relaxed);
        let slot = self.slot(ci);
        let mut element = slot.load_volatile();
        if element.is_null() {
            if ci == self.producer.index.load(Ordering::Acquire) {
                return None;
            }
            loop {
                element = slot.load_volatile();
                if !element.is_null() {
                    break;
                }
                hint::spin_loop();
            }
        }
        Some(element)
    }

    /// Number of elements, stabilized against a concurrently moving
    /// consumer by re-reading until two consumer reads agree.
    pub(crate) fn len(&self) -> usize {
        let mut before = self.consumer.index.load(Ordering::Acquire);
        loop {
            let pi = self.producer.index.load(Ordering::Acquire);
            let after = self.consumer.index.load(Ordering::Acquire);
            if before == after {
                // pi was read between two identical consumer reads, and the
                // consumer never runs ahead of claimed slots, so pi >= after.
                return (pi - after) as usize;
            }
            before = after;
        }
    }

    /// Emptiness check that reads the consumer index strictly before the
    /// producer index, so growth in between errs toward "not empty".
    pub(crate) fn is_empty(&self) -> bool {
        let ci = self.consumer.index.load(Ordering::Acquire);
        let pi = self.producer.index.load(Ordering::Acquire);
        ci == pi
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        // &mut self: every push has completed, so each claimed slot is
        // published and holds a live box.
        let ci = self.consumer.index.load(Ordering::Relaxed);
        let pi = self.producer.index.load(Ordering::Relaxed);
        for index in ci..pi {
            let element = self.slot(index).load_plain();
            if !element.is_null() {
                // SAFETY: published pointers come from Box::into_raw and
                // nothing else can extract them once we hold &mut.
                drop(unsafe { Box::from_raw(element) });
            }
        }
    }
}

// SAFETY: Ring hands whole elements across threads, so T: Send suffices.
// Producer-side fields are atomics coordinated by CAS, the consumer index
// is written by the sole consumer, and slot contents transfer ownership
// through the publish/extract protocol above.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

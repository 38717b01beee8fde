//! Growable array-based work-stealing deque.
//!
//! # Algorithm
//!
//! A circular array indexed by a monotonically increasing `head` (thief
//! end) and `tail` (owner end). The owner pushes and pops at the tail with
//! no lock as long as at least two slots separate it from the head; near
//! that boundary, and for every steal, a spin lock serializes the slow
//! path. Owner pop and thief steal resolve their race at the one-element
//! boundary through a Dekker-style handshake: each side publishes its
//! speculative index claim with a sequentially consistent swap, then reads
//! the other side's index. The total order on those four accesses
//! guarantees at least one side observes the conflict and backs off.
//!
//! The array doubles when full, realigning live elements from index zero.
//! When `tail` reaches `i32::MAX` both indices are rebased by masking off
//! the high bits under the lock, which preserves their relative order
//! because the live span never exceeds the mask.
//!
//! # Safety
//!
//! Exactly one owner thread pushes and pops. The [`Worker`] handle
//! enforces this (not `Sync`, not `Clone`); any number of [`Stealer`]
//! clones may steal concurrently.

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::pad::CachePadded;
use crate::queue::{Dequeue, DequeueLast, Enqueue, Full, PhantomUnsync, capacity_for};
use crate::steal::spin::SpinLock;
use crate::trace::{debug, trace};

/// Default capacity when none is requested.
const INITIAL_CAPACITY: usize = 32;

struct Buffer<T> {
    slots: Box<[UnsafeCell<Option<T>>]>,
    mask: i32,
}

impl<T> Buffer<T> {
    fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two() && capacity >= 2);
        let slots = (0..capacity).map(|_| UnsafeCell::new(None)).collect();
        Self {
            slots,
            mask: capacity as i32 - 1,
        }
    }

    /// Raw pointer to the `Option` slot for an index.
    #[inline]
    fn slot(&self, index: i32) -> *mut Option<T> {
        self.slots[(index & self.mask) as usize].get()
    }
}

struct Inner<T> {
    /// Owner end. Written by the owner only.
    tail: CachePadded<AtomicI32>,
    /// Thief end. Written by thieves (and by the owner during rebase).
    head: CachePadded<AtomicI32>,
    /// Replaced wholesale on growth, only ever by the owner under the lock.
    buffer: UnsafeCell<Buffer<T>>,
    foreign_lock: SpinLock,
}

// SAFETY: slot access is partitioned by the index protocol above; buffer
// replacement and all thief-side slot access happen under foreign_lock.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Inner<T> {
    fn new(capacity: usize) -> Self {
        Self {
            tail: CachePadded::new(AtomicI32::new(0)),
            head: CachePadded::new(AtomicI32::new(0)),
            buffer: UnsafeCell::new(Buffer::new(capacity)),
            foreign_lock: SpinLock::new(),
        }
    }

    /// Appends at the tail, growing if needed. Never fails.
    ///
    /// # Safety
    ///
    /// Owner thread only.
    unsafe fn push(&self, item: T) {
        let buffer = self.buffer.get();
        let mut tail = self.tail.load(Ordering::Relaxed);
        if tail == i32::MAX {
            // Rebase both indices. Masking preserves head <= tail because
            // the live span is at most mask elements wide.
            let guard = self.foreign_lock.lock();
            // SAFETY: owner thread, holding the lock.
            let mask = unsafe { (*buffer).mask };
            let head = self.head.load(Ordering::Relaxed);
            self.head.store(head & mask, Ordering::Relaxed);
            tail &= mask;
            self.tail.store(tail, Ordering::Relaxed);
            trace!(head = head & mask, tail, "rebased deque indices");
            drop(guard);
        }

        let head = self.head.load(Ordering::Acquire);
        // SAFETY: only the owner replaces the buffer, and it is not doing
        // so right now.
        let mask = unsafe { (*buffer).mask };
        if tail < head.wrapping_add(mask) {
            // At least two free slots: thieves cannot reach this one.
            // SAFETY: slot `tail` is unclaimed and owner-exclusive.
            unsafe { *(*buffer).slot(tail) = Some(item) };
            self.tail.store(tail + 1, Ordering::Release);
        } else {
            let _guard = self.foreign_lock.lock();
            let head = self.head.load(Ordering::Relaxed);
            let count = tail - head;
            if count >= mask {
                let old_capacity = mask as usize + 1;
                let new = Buffer::new(old_capacity * 2);
                for i in 0..count {
                    // SAFETY: indices head..tail are live and, under the
                    // lock, untouched by thieves.
                    unsafe { *new.slot(i) = (*(*buffer).slot(head + i)).take() };
                }
                debug!(
                    old_capacity,
                    new_capacity = old_capacity * 2,
                    len = count,
                    "grew deque buffer"
                );
                self.head.store(0, Ordering::Relaxed);
                tail = count;
                self.tail.store(tail, Ordering::Relaxed);
                // SAFETY: owner thread under the lock; thieves only read
                // the buffer while holding the same lock.
                unsafe { *buffer = new };
            }
            // SAFETY: owner under the lock; slot `tail` is unclaimed.
            unsafe { *(*buffer).slot(tail) = Some(item) };
            self.tail.store(tail + 1, Ordering::Release);
        }
    }

    /// Removes the most recently pushed element (LIFO for the owner).
    ///
    /// # Safety
    ///
    /// Owner thread only.
    unsafe fn pop(&self) -> Option<T> {
        loop {
            let mut tail = self.tail.load(Ordering::Relaxed);
            if self.head.load(Ordering::Relaxed) >= tail {
                return None;
            }
            tail -= 1;
            // Publish the claim before looking at head. SeqCst pairs with
            // the thief's head swap: one of us must see the other.
            self.tail.swap(tail, Ordering::SeqCst);
            if self.head.load(Ordering::SeqCst) <= tail {
                // SAFETY: no thief can claim index `tail` after the swap
                // above was ordered before its head check.
                let item = unsafe { (*(*self.buffer.get()).slot(tail)).take() };
                match item {
                    Some(item) => return Some(item),
                    // A thief emptied the slot before backing off its
                    // index claim. The element is gone; try the next one.
                    None => continue,
                }
            }
            // Boundary case: a thief may own this element. Resolve under
            // the lock.
            let _guard = self.foreign_lock.lock();
            if self.head.load(Ordering::Relaxed) <= tail {
                // SAFETY: owner under the lock; the slot is ours.
                let item = unsafe { (*(*self.buffer.get()).slot(tail)).take() };
                match item {
                    Some(item) => return Some(item),
                    None => continue,
                }
            }
            // Stolen. Undo the speculative decrement; the deque is empty.
            self.tail.store(tail + 1, Ordering::Release);
            return None;
        }
    }

    /// Steals the oldest element. Fails rather than waits: a held lock
    /// (busy owner or another thief) reads as `None`.
    fn steal(&self) -> Option<T> {
        let _guard = self.foreign_lock.try_lock()?;
        let head = self.head.load(Ordering::Relaxed);
        if head >= self.tail.load(Ordering::SeqCst) {
            // Empty. Bailing here also keeps the claim below from pushing
            // head past i32::MAX while both indices sit at the ceiling
            // waiting for the owner's next push to rebase them.
            return None;
        }
        // Same handshake as pop, from the other end. head < tail here, so
        // the increment cannot overflow.
        self.head.swap(head + 1, Ordering::SeqCst);
        if head < self.tail.load(Ordering::SeqCst) {
            // SAFETY: holding the lock, and the index claim above keeps
            // the owner's pop off slot `head`.
            let item = unsafe { (*(*self.buffer.get()).slot(head)).take() };
            if item.is_some() {
                return item;
            }
        }
        // Lost the boundary race; restore the claim.
        self.head.store(head, Ordering::Release);
        None
    }

    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.saturating_sub(head).max(0) as usize
    }
}

/// Owner end of the deque.
///
/// # Thread Safety
///
/// `Worker` is [`Send`] but **not** [`Sync`] and not `Clone`: the owner's
/// lock-free fast paths assume a single thread on this end.
pub struct Worker<T: Send> {
    inner: Arc<Inner<T>>,
    _unsync: PhantomUnsync,
}

/// Thief end of the deque. Clone freely; steals serialize on the lock.
pub struct Stealer<T: Send> {
    inner: Arc<Inner<T>>,
}

impl<T: Send> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Creates a work-stealing deque with the default initial capacity.
#[must_use]
pub fn deque<T: Send>() -> (Worker<T>, Stealer<T>) {
    deque_with_capacity(INITIAL_CAPACITY)
}

/// Creates a work-stealing deque with an initial capacity, rounded up to a
/// power of two (minimum 2). The deque grows past it on demand.
#[must_use]
pub fn deque_with_capacity<T: Send>(capacity: usize) -> (Worker<T>, Stealer<T>) {
    let inner = Arc::new(Inner::new(capacity_for(capacity).max(2)));

    let worker = Worker {
        inner: Arc::clone(&inner),
        _unsync: std::marker::PhantomData,
    };

    let stealer = Stealer { inner };

    (worker, stealer)
}

impl<T: Send> Worker<T> {
    /// Returns a new thief handle for this deque.
    #[must_use]
    pub fn stealer(&self) -> Stealer<T> {
        Stealer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Current backing array capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        // SAFETY: only this owner replaces the buffer.
        let mask = unsafe { (*self.inner.buffer.get()).mask };
        mask as usize + 1
    }
}

impl<T: Send> Enqueue<T> for Worker<T> {
    /// Never fails; the deque grows instead of rejecting.
    #[inline]
    fn try_enqueue(&self, item: T) -> Result<(), Full<T>> {
        // SAFETY: Worker is not Sync and not Clone, so this is the only
        // owner-side thread.
        unsafe { self.inner.push(item) };
        Ok(())
    }
}

impl<T: Send> Dequeue<T> for Worker<T> {
    #[inline]
    fn try_dequeue(&mut self) -> Option<T> {
        // SAFETY: sole owner-side thread, as above.
        unsafe { self.inner.pop() }
    }

    #[inline]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<T: Send> Stealer<T> {
    /// Number of elements (moment-in-time estimate).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> DequeueLast<T> for Stealer<T> {
    #[inline]
    fn try_dequeue_last(&self) -> Option<T> {
        self.inner.steal()
    }
}

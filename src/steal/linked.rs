//! Lock-free linked-node work-stealing deque.
//!
//! # Algorithm
//!
//! A singly-published linked list with back pointers, built on epoch-based
//! reclamation. `head` points at a consumed node acting as a sentinel;
//! `tail` points at (or just behind) the last linked node. Enqueue links a
//! new node onto the tail's successor with a CAS, helping a lagging tail
//! forward first, Michael-Scott style.
//!
//! Element removal is decoupled from list surgery: every node carries a
//! claim state, and whichever remover wins the `LIVE -> CLAIMED` CAS owns
//! the value. Head pops advance `head` structurally and then claim; tail
//! steals walk backward from `tail` over `prev` links claiming the first
//! live node they find, never modifying the list. Claimed nodes linger
//! until the head sweeps past them, at which point they are retired to the
//! epoch collector. The backward walk stops at the current `head`, so it
//! never touches a retired node.
//!
//! Any number of threads may call any operation; there is no owner here,
//! which is why this variant has no `Worker`/`Stealer` split.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};

use crate::pad::CachePadded;
use crate::queue::{Dequeue, DequeueLast, Enqueue, Full};

/// Node ids wrap back to zero past this bound, keeping them small enough
/// to read in a debugger while still catching skipped links in debug
/// builds.
const ID_REBASE_LIMIT: i32 = i16::MAX as i32;

const LIVE: u8 = 0;
const CLAIMED: u8 = 1;

#[inline]
fn next_id(prev: i32) -> i32 {
    if prev >= ID_REBASE_LIMIT { 0 } else { prev + 1 }
}

struct Node<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    state: AtomicU8,
    id: i32,
    prev: Atomic<Node<T>>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn live(value: T) -> Self {
        Self {
            value: UnsafeCell::new(MaybeUninit::new(value)),
            state: AtomicU8::new(LIVE),
            id: 0,
            prev: Atomic::null(),
            next: Atomic::null(),
        }
    }

    fn sentinel() -> Self {
        Self {
            value: UnsafeCell::new(MaybeUninit::uninit()),
            state: AtomicU8::new(CLAIMED),
            id: 0,
            prev: Atomic::null(),
            next: Atomic::null(),
        }
    }

    /// Wins or loses the value exactly once.
    #[inline]
    fn claim(&self) -> bool {
        self.state
            .compare_exchange(LIVE, CLAIMED, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

/// Unbounded lock-free deque over linked nodes.
///
/// Fully concurrent: share it behind an `Arc` and call any operation from
/// any thread.
pub struct LinkedDeque<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
}

// SAFETY: list surgery is CAS-only, value ownership transfers through the
// single-winner claim protocol, and node lifetime is managed by the epoch
// collector.
unsafe impl<T: Send> Send for LinkedDeque<T> {}
unsafe impl<T: Send> Sync for LinkedDeque<T> {}

impl<T> Default for LinkedDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LinkedDeque<T> {
    #[must_use]
    pub fn new() -> Self {
        // SAFETY: the sentinel is not shared with anyone yet.
        let sentinel = Owned::new(Node::sentinel()).into_shared(unsafe { epoch::unprotected() });
        Self {
            head: CachePadded::new(Atomic::from(sentinel)),
            tail: CachePadded::new(Atomic::from(sentinel)),
        }
    }

    /// Appends at the tail. Never fails; allocates one node.
    pub fn push(&self, item: T) {
        let guard = &epoch::pin();
        let mut node = Owned::new(Node::live(item));
        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: tail is always at or ahead of head, hence not retired.
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);
            if !next.is_null() {
                // Tail is lagging; help it forward and retry.
                let _ = self
                    .tail
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
                continue;
            }
            node.id = next_id(tail_ref.id);
            node.prev.store(tail, Ordering::Relaxed);
            match tail_ref.next.compare_exchange(
                Shared::null(),
                node,
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(new) => {
                    let _ = self.tail.compare_exchange(
                        tail,
                        new,
                        Ordering::Release,
                        Ordering::Relaxed,
                        guard,
                    );
                    return;
                }
                Err(err) => node = err.new,
            }
        }
    }

    /// Removes the oldest live element, if any.
    pub fn pop_first(&self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            // SAFETY: the current head is never retired while reachable.
            let head_ref = unsafe { head.deref() };
            let next = head_ref.next.load(Ordering::Acquire, guard);
            if next.is_null() {
                return None;
            }
            let tail = self.tail.load(Ordering::Acquire, guard);
            if head == tail {
                // Tail lags behind a linked node; help before advancing
                // head past it.
                let _ = self
                    .tail
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
                continue;
            }
            // SAFETY: next is ahead of head, hence live under the pin.
            let next_ref = unsafe { next.deref() };
            debug_assert_eq!(next_ref.id, next_id(head_ref.id));
            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire, guard)
                .is_ok()
            {
                // SAFETY: the old head is unreachable from head, and the
                // backward walk in pop_last stops at the new head before
                // ever stepping onto it.
                unsafe { guard.defer_destroy(head) };
                if next_ref.claim() {
                    // SAFETY: the claim CAS makes this the sole reader of
                    // the value, and the acquire chain to the linking CAS
                    // makes the write visible.
                    return Some(unsafe { (*next_ref.value.get()).assume_init_read() });
                }
                // Already taken by a tail steal; the node we advanced onto
                // is just the new sentinel. Keep looking.
            }
        }
    }

    /// Removes the newest live element, if any, walking back from the
    /// tail over nodes a head pop may already have claimed.
    pub fn pop_last(&self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: tail is never behind head, hence not retired.
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);
            if !next.is_null() {
                let _ = self
                    .tail
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
                continue;
            }

            let head = self.head.load(Ordering::Acquire, guard);
            let mut cursor = tail;
            loop {
                if cursor == head {
                    // Nothing live between head and tail.
                    return None;
                }
                // SAFETY: cursor is strictly ahead of the head snapshot,
                // so it was not retired before this pin.
                let cursor_ref = unsafe { cursor.deref() };
                if cursor_ref.claim() {
                    // SAFETY: sole claimer; value write is visible through
                    // the acquire loads that led here.
                    return Some(unsafe { (*cursor_ref.value.get()).assume_init_read() });
                }
                let prev = cursor_ref.prev.load(Ordering::Acquire, guard);
                if prev.is_null() {
                    return None;
                }
                cursor = prev;
            }
        }
    }

    /// Walks from the head testing `predicate` against the running count
    /// of live elements, returning as soon as it is satisfied.
    ///
    /// Lets a caller ask "are there at least N items?" without paying for
    /// a full walk. The count is a moment-in-time estimate.
    pub fn evaluate_count<F: FnMut(usize) -> bool>(&self, mut predicate: F) -> bool {
        let guard = &epoch::pin();
        let mut count = 0usize;
        if predicate(count) {
            return true;
        }
        let mut cursor = self.head.load(Ordering::Acquire, guard);
        while !cursor.is_null() {
            // SAFETY: reachable from head under the pin.
            let node = unsafe { cursor.deref() };
            if node.state.load(Ordering::Acquire) == LIVE {
                count += 1;
                if predicate(count) {
                    return true;
                }
            }
            cursor = node.next.load(Ordering::Acquire, guard);
        }
        false
    }

    /// Number of live elements (moment-in-time estimate, full walk).
    #[must_use]
    pub fn len(&self) -> usize {
        let guard = &epoch::pin();
        let mut count = 0usize;
        let mut cursor = self.head.load(Ordering::Acquire, guard);
        while !cursor.is_null() {
            // SAFETY: reachable from head under the pin.
            let node = unsafe { cursor.deref() };
            if node.state.load(Ordering::Acquire) == LIVE {
                count += 1;
            }
            cursor = node.next.load(Ordering::Acquire, guard);
        }
        count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.evaluate_count(|count| count >= 1)
    }
}

impl<T> Drop for LinkedDeque<T> {
    fn drop(&mut self) {
        // SAFETY: &mut self, no other thread can be pinned on this deque.
        let guard = unsafe { epoch::unprotected() };
        let mut cursor = self.head.load(Ordering::Relaxed, guard);
        while !cursor.is_null() {
            // SAFETY: nodes from head forward were never retired; each is
            // freed exactly once here.
            unsafe {
                let node = cursor.deref();
                let next = node.next.load(Ordering::Relaxed, guard);
                if node.state.load(Ordering::Relaxed) == LIVE {
                    (*node.value.get()).assume_init_drop();
                }
                drop(cursor.into_owned());
                cursor = next;
            }
        }
    }
}

impl<T: Send> Enqueue<T> for LinkedDeque<T> {
    /// Never fails; present so the deque satisfies the uniform contract.
    #[inline]
    fn try_enqueue(&self, item: T) -> Result<(), Full<T>> {
        self.push(item);
        Ok(())
    }
}

impl<T: Send> Dequeue<T> for LinkedDeque<T> {
    #[inline]
    fn try_dequeue(&mut self) -> Option<T> {
        self.pop_first()
    }

    #[inline]
    fn len(&self) -> usize {
        LinkedDeque::len(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        LinkedDeque::is_empty(self)
    }
}

impl<T: Send> DequeueLast<T> for LinkedDeque<T> {
    #[inline]
    fn try_dequeue_last(&self) -> Option<T> {
        self.pop_last()
    }
}

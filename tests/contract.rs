//! Contract tests across every queue in the crate.
//!
//! Written against the traits in `skiff::queue` wherever possible, so the
//! same assertions hold no matter which structure sits behind the handle.
//!
//! # Running with tracing
//!
//! ```bash
//! RUST_LOG=skiff=trace cargo test --features tracing -- --nocapture
//! ```

use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use skiff::queue::{Dequeue, DequeueLast, Enqueue, Peek};
use skiff::steal::linked::LinkedDeque;

/// Enqueues `0..count`, returning how many the queue accepted before the
/// first rejection.
fn fill<E: Enqueue<u64>>(producer: &E, count: u64) -> u64 {
    for i in 0..count {
        if producer.try_enqueue(i).is_err() {
            return i;
        }
    }
    count
}

#[test]
fn mpsc_backpressure_boundary() {
    let (producer, mut consumer) = skiff::mpsc::channel::<u64>(8);

    assert_eq!(fill(&producer, 100), 8);
    assert_eq!(consumer.len(), 8);

    // Exactly one slot opens per dequeue.
    assert_eq!(consumer.try_dequeue(), Some(0));
    assert!(producer.try_enqueue(100).is_ok());
    assert!(producer.try_enqueue(101).is_err());
}

#[test]
fn mpsc_capacity_rounds_up() {
    let (producer, _consumer) = skiff::mpsc::channel::<u64>(100);
    assert_eq!(producer.capacity(), 128);
}

#[test]
fn mpsc_no_loss_no_duplication() {
    let (producer, mut consumer) = skiff::mpsc::channel::<u64>(128);
    let num_producers = 4u64;
    let per_producer = 10_000u64;
    let barrier = Arc::new(Barrier::new(num_producers as usize));

    let mut handles = vec![];
    for p in 0..num_producers {
        let producer = producer.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..per_producer {
                let value = p * per_producer + i;
                while producer.try_enqueue(value).is_err() {
                    thread::yield_now();
                }
            }
        }));
    }

    let total = num_producers * per_producer;
    let mut seen = vec![false; total as usize];
    let mut received = 0u64;
    while received < total {
        if let Some(value) = consumer.try_dequeue() {
            assert!(!seen[value as usize], "duplicate {value}");
            seen[value as usize] = true;
            received += 1;
        }
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(consumer.is_empty());
}

#[test]
fn mpsc_count_stays_bounded_under_race() {
    let (producer, mut consumer) = skiff::mpsc::channel::<u64>(64);
    let capacity = producer.capacity() as u64;
    let stop = Arc::new(AtomicU64::new(0));

    let observer_producer = producer.clone();
    let observer_stop = Arc::clone(&stop);
    let observer = thread::spawn(move || {
        while observer_stop.load(Ordering::Acquire) == 0 {
            let len = observer_producer.len() as u64;
            assert!(len <= capacity, "len {len} exceeds capacity {capacity}");
        }
    });

    for i in 0..50_000u64 {
        while producer.try_enqueue(i).is_err() {
            thread::yield_now();
        }
        if i % 2 == 0 {
            consumer.try_dequeue();
        }
    }
    stop.store(1, Ordering::Release);
    observer.join().unwrap();
}

#[test]
fn peek_never_mutates() {
    let (producer, mut consumer) = skiff::mpsc::channel::<u64>(8);
    producer.try_enqueue(5).unwrap();
    for _ in 0..10 {
        assert_eq!(consumer.try_peek(), Some(&5));
    }
    assert_eq!(consumer.len(), 1);

    let (producer, mut consumer) = skiff::spsc::channel::<u64>();
    producer.enqueue(5);
    for _ in 0..10 {
        assert_eq!(consumer.try_peek(), Some(&5));
    }
    assert_eq!(consumer.len(), 1);
}

#[test]
fn spsc_strict_fifo_across_threads() {
    let (producer, mut consumer) = skiff::spsc::channel::<u64>();
    let count = 100_000u64;

    let handle = thread::spawn(move || {
        for i in 0..count {
            producer.enqueue(i);
        }
    });

    let mut next = 0u64;
    while next < count {
        if let Some(item) = consumer.try_dequeue() {
            assert_eq!(item, next);
            next += 1;
        }
    }
    handle.join().unwrap();
}

#[test]
fn array_deque_owner_newest_thief_oldest() {
    let (mut worker, stealer) = skiff::steal::array::deque::<u64>();

    worker.try_enqueue(1).unwrap();
    worker.try_enqueue(2).unwrap();
    worker.try_enqueue(3).unwrap();

    // Owner takes the newest, a thief takes the oldest.
    assert_eq!(worker.try_dequeue(), Some(3));
    assert_eq!(stealer.try_dequeue_last(), Some(1));
    assert_eq!(worker.try_dequeue(), Some(2));
    assert_eq!(worker.try_dequeue(), None);
}

#[test]
fn linked_deque_opposite_ends() {
    let deque: LinkedDeque<u64> = LinkedDeque::new();

    deque.push(1);
    deque.push(2);
    deque.push(3);

    assert_eq!(deque.pop_last(), Some(3));
    assert_eq!(deque.pop_first(), Some(1));
    assert_eq!(deque.pop_last(), Some(2));
    assert!(deque.is_empty());
}

#[test]
fn deques_never_reject() {
    let (worker, _stealer) = skiff::steal::array::deque_with_capacity::<u64>(2);
    assert_eq!(fill(&worker, 1_000), 1_000);

    let deque: LinkedDeque<u64> = LinkedDeque::new();
    assert_eq!(fill(&deque, 1_000), 1_000);

    let seg = skiff::seg::UnboundedQueue::<u64>::new();
    assert_eq!(fill(&seg, 1_000), 1_000);
}

#[test]
fn steal_contention_is_nonblocking() {
    // A failed steal must return quickly with None, not wait for the
    // owner; drive the owner through constant slow-path traffic and make
    // sure thieves always come back.
    let (mut worker, stealer) = skiff::steal::array::deque_with_capacity::<u64>(4);
    let pushed = Arc::new(AtomicU64::new(0));
    let stolen = Arc::new(AtomicU64::new(0));

    let mut thieves = vec![];
    for _ in 0..2 {
        let stealer = stealer.clone();
        let stolen = Arc::clone(&stolen);
        let pushed = Arc::clone(&pushed);
        thieves.push(thread::spawn(move || {
            while pushed.load(Ordering::Acquire) < 20_000 {
                if stealer.try_dequeue_last().is_some() {
                    stolen.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    let mut popped = 0u64;
    for i in 0..20_000u64 {
        worker.try_enqueue(i).unwrap();
        pushed.store(i + 1, Ordering::Release);
        if worker.try_dequeue().is_some() {
            popped += 1;
        }
    }
    for thief in thieves {
        thief.join().unwrap();
    }
    while worker.try_dequeue().is_some() {
        popped += 1;
    }
    assert_eq!(popped + stolen.load(Ordering::Relaxed), 20_000);
}

#[test]
fn mpsc_weak_enqueue_reports_full() {
    let (producer, mut consumer) = skiff::mpsc::channel::<u64>(2);

    producer.weak_enqueue(1).unwrap();
    producer.weak_enqueue(2).unwrap();
    assert!(matches!(
        producer.weak_enqueue(3),
        Err(skiff::WeakPush::Full(3))
    ));

    consumer.try_dequeue();
    assert!(producer.weak_enqueue(3).is_ok());
}

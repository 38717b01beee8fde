//! Throughput benchmarks for the queue family, with crossbeam's queues as
//! the baseline.
//!
//! Run with `cargo bench`.

use std::sync::Arc;
use std::thread;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use crossbeam_queue::{ArrayQueue, SegQueue};

use skiff::queue::{Dequeue, DequeueLast, Enqueue};

const OPS: u64 = 100_000;

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread_push_pop");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("mpsc", |b| {
        let (producer, mut consumer) = skiff::mpsc::channel::<u64>(1024);
        b.iter(|| {
            for i in 0..OPS {
                if producer.try_enqueue(i).is_err() {
                    black_box(consumer.try_dequeue());
                }
                black_box(consumer.try_dequeue());
            }
        });
    });

    group.bench_function("spsc", |b| {
        let (producer, mut consumer) = skiff::spsc::channel::<u64>();
        b.iter(|| {
            for i in 0..OPS {
                producer.enqueue(i);
                black_box(consumer.try_dequeue());
            }
        });
    });

    group.bench_function("array_deque_owner", |b| {
        let (mut worker, _stealer) = skiff::steal::array::deque_with_capacity::<u64>(1024);
        b.iter(|| {
            for i in 0..OPS {
                worker.try_enqueue(i).unwrap();
                black_box(worker.try_dequeue());
            }
        });
    });

    group.bench_function("linked_deque", |b| {
        let deque = skiff::steal::linked::LinkedDeque::<u64>::new();
        b.iter(|| {
            for i in 0..OPS {
                deque.push(i);
                black_box(deque.pop_last());
            }
        });
    });

    group.bench_function("unbounded", |b| {
        let queue = skiff::seg::UnboundedQueue::<u64>::new();
        b.iter(|| {
            for i in 0..OPS {
                queue.push(i);
                black_box(queue.pop());
            }
        });
    });

    group.bench_function("crossbeam_array_queue", |b| {
        let queue: ArrayQueue<u64> = ArrayQueue::new(1024);
        b.iter(|| {
            for i in 0..OPS {
                let _ = queue.push(i);
                black_box(queue.pop());
            }
        });
    });

    group.bench_function("crossbeam_seg_queue", |b| {
        let queue: SegQueue<u64> = SegQueue::new();
        b.iter(|| {
            for i in 0..OPS {
                queue.push(i);
                black_box(queue.pop());
            }
        });
    });

    group.finish();
}

fn bench_mpsc_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpsc_contended");

    for producers in [1u64, 2, 4] {
        group.throughput(Throughput::Elements(OPS));
        group.bench_function(format!("{producers}_producers"), |b| {
            b.iter(|| {
                let (producer, mut consumer) = skiff::mpsc::channel::<u64>(1024);
                let per_producer = OPS / producers;

                let mut handles = vec![];
                for _ in 0..producers {
                    let producer = producer.clone();
                    handles.push(thread::spawn(move || {
                        for i in 0..per_producer {
                            while producer.try_enqueue(i).is_err() {
                                std::hint::spin_loop();
                            }
                        }
                    }));
                }

                let mut received = 0;
                while received < producers * per_producer {
                    if consumer.try_dequeue().is_some() {
                        received += 1;
                    }
                }
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_steal_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("work_stealing");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("array_deque_2_thieves", |b| {
        b.iter(|| {
            let (mut worker, stealer) = skiff::steal::array::deque::<u64>();
            let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

            let mut thieves = vec![];
            for _ in 0..2 {
                let stealer = stealer.clone();
                let done = Arc::clone(&done);
                thieves.push(thread::spawn(move || {
                    let mut stolen = 0u64;
                    while !done.load(std::sync::atomic::Ordering::Acquire) {
                        if stealer.try_dequeue_last().is_some() {
                            stolen += 1;
                        }
                    }
                    stolen
                }));
            }

            for i in 0..OPS {
                worker.try_enqueue(i).unwrap();
                if i % 2 == 0 {
                    black_box(worker.try_dequeue());
                }
            }
            while worker.try_dequeue().is_some() {}
            done.store(true, std::sync::atomic::Ordering::Release);
            for thief in thieves {
                black_box(thief.join().unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_thread,
    bench_mpsc_contended,
    bench_steal_throughput
);
criterion_main!(benches);

//! Lock-free and low-lock queues for inter-thread handoff.
//!
//! skiff provides the concurrent queue family an event-driven runtime uses to
//! move tasks and decoded messages between threads. Each structure declares a
//! cardinality contract (how many producers and consumers may touch it
//! concurrently) and relies on that contract instead of mutual exclusion:
//!
//! - [`mpsc`] - bounded multi-producer single-consumer array queue
//! - [`spsc`] - unbounded single-producer single-consumer linked queue
//! - [`steal`] - work-stealing deques, array-based and linked-node variants
//! - [`seg`] - unbounded MPMC adapter over a segmented queue
//!
//! Cardinality is enforced through endpoint handles rather than runtime
//! checks: single-threaded roles are `Send` but not `Sync`, shared roles are
//! `Clone` and `Sync`. All handles speak the uniform contract in [`queue`],
//! so scheduling code stays structure-agnostic.
//!
//! # Example
//!
//! ```
//! use skiff::queue::{Dequeue, Enqueue};
//!
//! let (producer, mut consumer) = skiff::mpsc::channel::<u64>(1024);
//!
//! producer.try_enqueue(7).expect("queue full");
//! assert_eq!(consumer.try_dequeue(), Some(7));
//! assert!(consumer.is_empty());
//! ```
//!
//! # Backpressure
//!
//! A full bounded queue is a normal steady state, not a failure: enqueue
//! returns the rejected element inside [`queue::Full`] and the caller decides
//! whether to retry, queue elsewhere, or drop. None of the hot paths block,
//! allocate locks, or panic.

pub mod mpsc;
pub mod pad;
pub mod queue;
pub mod seg;
pub mod spsc;
pub mod steal;
pub mod trace;

pub use queue::{Dequeue, DequeueLast, Enqueue, Full, Peek, Timeout, WeakPush};
pub use trace::init_tracing;

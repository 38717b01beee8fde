//! Work-stealing deques.
//!
//! A deque per worker thread: the owner pushes and pops new work at the
//! tail (LIFO, cache-warm), idle threads steal the oldest work from the
//! head. Two variants with the same endpoint shape:
//!
//! - [`array`] - growable circular array with a spin-locked slow path.
//!   Steals never block the owner; a busy owner makes a steal attempt fail
//!   instead. This is the default choice.
//! - [`linked`] - lock-free linked nodes with epoch reclamation. No array
//!   copies on growth, at the cost of an allocation per element.
//!
//! Both hand out a `Worker` (owner end, `Send` but not `Sync`) and a
//! cloneable `Stealer` for everyone else.

pub mod array;
pub mod linked;
pub(crate) mod spin;

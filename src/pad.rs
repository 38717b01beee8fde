//! Cache-line layout primitives.
//!
//! The queues in this crate keep producer-affine and consumer-affine hot
//! fields in separate cache lines so that a producer-side index write does
//! not invalidate the line holding consumer-side state on another core.
//! Fields are grouped by writer affinity and each group is wrapped in
//! [`CachePadded`].

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Cache line size assumed for padding and alignment.
pub const CACHE_LINE_SIZE: usize = 64;

/// Pads and aligns a value to a cache line boundary.
#[derive(Default)]
#[repr(align(64))]
pub struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    /// Wraps a value in its own cache line.
    #[inline]
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    /// Unwraps the inner value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

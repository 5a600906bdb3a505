//! An owning typed wrapper over one tracked block.

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};

use crate::Heap;
use crate::block::BlockHandle;

/// An owned value whose lifetime is mirrored by a tracked block.
///
/// `TrackedBox::new` allocates a `size_of::<T>()` block from the heap and the
/// drop deallocates it, so hooks observe one allocation when the box is
/// created and one free when it is dropped - the same traffic a heap-owning
/// container produces per element. Moves transfer the block without any
/// allocator traffic; cloning allocates a fresh block.
///
/// This is the building brick test subjects use to route their ownership
/// through an instrumented heap.
///
/// # Examples
///
/// ```
/// use memhook::{Heap, TrackedBox};
///
/// let heap = Heap::new();
/// let hook = heap.hook();
///
/// let boxed = TrackedBox::new(&heap, 42_u32);
/// assert_eq!(*boxed, 42);
/// assert_eq!(hook.n_allocs(), 1);
///
/// drop(boxed);
/// assert_eq!(hook.n_frees(), 1);
/// ```
pub struct TrackedBox<T> {
    value: Box<T>,
    block: BlockHandle,
    heap: Heap,
}

impl<T> TrackedBox<T> {
    /// Allocates a tracked block of `size_of::<T>()` bytes and takes
    /// ownership of `value`.
    #[must_use]
    pub fn new(heap: &Heap, value: T) -> Self {
        Self {
            value: Box::new(value),
            block: heap.allocate(mem::size_of::<T>()),
            heap: heap.clone(),
        }
    }

    /// The handle of the block mirroring this value's lifetime.
    #[must_use]
    pub fn handle(&self) -> BlockHandle {
        self.block
    }

    /// The heap this box allocates from.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }
}

impl<T> Drop for TrackedBox<T> {
    fn drop(&mut self) {
        self.heap.deallocate(Some(self.block));
    }
}

impl<T> Deref for TrackedBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for TrackedBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Clone> Clone for TrackedBox<T> {
    fn clone(&self) -> Self {
        Self::new(&self.heap, T::clone(&self.value))
    }
}

impl<T: fmt::Debug> fmt::Debug for TrackedBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedBox")
            .field("value", &self.value)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

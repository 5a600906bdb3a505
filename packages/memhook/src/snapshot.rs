//! Frozen replicas of a hook's state.

use std::fmt;

use crate::block::BlockInfo;
use crate::error::{Error, Result};

/// A frozen, read-only replica of a [`Memhook`][crate::Memhook] at a point in
/// time.
///
/// Created by [`Memhook::snapshot`][crate::Memhook::snapshot]. This is the
/// deliberate asymmetry in the ownership model: a live hook co-owns the block
/// records it references, while a snapshot owns only copied metadata. It is
/// not registered with any heap, receives no notifications, holds no block
/// references, and releasing it releases nothing.
///
/// # Examples
///
/// ```
/// use memhook::Heap;
///
/// let heap = Heap::new();
/// let hook = heap.hook();
///
/// let block = heap.allocate(4);
/// let before_free = hook.snapshot();
/// heap.deallocate(Some(block));
///
/// assert_eq!(before_free.n_frees(), 0); // Frozen.
/// assert_eq!(hook.n_frees(), 1); // Still live.
/// ```
#[derive(Clone, Debug)]
pub struct HookSnapshot {
    creation_seq: u64,
    n_allocs: u64,
    n_frees: u64,
    n_enabled_frees: u64,
    n_scoped_frees: u64,
    blocks: Vec<BlockInfo>,
}

impl HookSnapshot {
    pub(crate) fn new(
        creation_seq: u64,
        n_allocs: u64,
        n_frees: u64,
        n_enabled_frees: u64,
        n_scoped_frees: u64,
        blocks: Vec<BlockInfo>,
    ) -> Self {
        Self {
            creation_seq,
            n_allocs,
            n_frees,
            n_enabled_frees,
            n_scoped_frees,
            blocks,
        }
    }

    /// Creation stamp of the hook this snapshot was taken from.
    #[must_use]
    pub fn creation_seq(&self) -> u64 {
        self.creation_seq
    }

    /// Number of distinct blocks recorded at snapshot time.
    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Allocations observed at snapshot time.
    #[must_use]
    pub fn n_allocs(&self) -> u64 {
        self.n_allocs
    }

    /// Frees observed at snapshot time.
    #[must_use]
    pub fn n_frees(&self) -> u64 {
        self.n_frees
    }

    /// Enabled frees observed at snapshot time.
    #[must_use]
    pub fn n_enabled_frees(&self) -> u64 {
        self.n_enabled_frees
    }

    /// Scoped frees observed at snapshot time.
    #[must_use]
    pub fn n_scoped_frees(&self) -> u64 {
        self.n_scoped_frees
    }

    /// Metadata of the `index`-th recorded block, in first-sighting order, as
    /// it was at snapshot time.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<BlockInfo> {
        self.blocks.get(index).copied()
    }

    /// The recorded block with the highest allocation sequence.
    ///
    /// # Errors
    ///
    /// [`Error::NoTransactions`] if no block was recorded at snapshot time.
    pub fn last_transaction(&self) -> Result<BlockInfo> {
        self.latest_allocated().ok_or(Error::NoTransactions)
    }

    /// The most recently allocated of the recorded blocks.
    ///
    /// # Errors
    ///
    /// [`Error::NoAllocations`] if no block was recorded at snapshot time.
    pub fn last_alloc(&self) -> Result<BlockInfo> {
        self.latest_allocated().ok_or(Error::NoAllocations)
    }

    /// The most recently freed of the recorded blocks, as of snapshot time.
    ///
    /// # Errors
    ///
    /// [`Error::NoFrees`] if no recorded block was freed at snapshot time.
    pub fn last_free(&self) -> Result<BlockInfo> {
        self.blocks
            .iter()
            .filter(|block| block.is_freed())
            .max_by_key(|block| block.free_seq())
            .copied()
            .ok_or(Error::NoFrees)
    }

    fn latest_allocated(&self) -> Option<BlockInfo> {
        self.blocks
            .iter()
            .max_by_key(|block| block.alloc_seq())
            .copied()
    }
}

impl fmt::Display for HookSnapshot {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} allocs, {} frees ({} scoped, {} enabled), {} blocks recorded",
            self.n_allocs,
            self.n_frees,
            self.n_scoped_frees,
            self.n_enabled_frees,
            self.blocks.len(),
        )
    }
}

//! Scoped observers that derive allocation statistics from heap events.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::block::{Block, BlockInfo};
use crate::error::{Error, Result};
use crate::{Heap, HookSnapshot};

/// A scoped observer of one [`Heap`]'s allocation traffic.
///
/// A `Memhook` registers with its heap on construction and receives every
/// allocate and free event, synchronously, until it is dropped. From those
/// events it derives counters and keeps a reference to every block it has
/// seen, sharing ownership of the block records so it can keep answering
/// queries about blocks that were freed inside its scope.
///
/// Overlapping hooks are supported, but they observe strict stack discipline:
/// hooks on the same heap must be dropped in reverse registration order.
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
/// assert_eq!(hook.n_allocs(), 1);
/// assert_eq!(hook.n_frees(), 0);
///
/// heap.deallocate(Some(block));
/// assert_eq!(hook.n_frees(), 1);
/// assert_eq!(hook.last_free().unwrap().size(), 4);
/// ```
///
/// # Disabling
///
/// A disabled hook ignores events entirely; re-enabling has no retroactive
/// effect. Blocks the hook recorded earlier still reflect their current freed
/// state when queried, because that state lives in the shared block record:
///
/// ```
/// use memhook::Heap;
///
/// let heap = Heap::new();
/// let hook = heap.hook();
///
/// let block = heap.allocate(4);
/// hook.disable();
/// heap.deallocate(Some(block));
/// hook.enable();
///
/// assert_eq!(hook.n_frees(), 0); // The free went unobserved...
/// assert!(hook.last_free().is_ok()); // ...but the block is known to be freed.
/// ```
///
/// # Counter taxonomy
///
/// * `n_frees` counts every free event delivered while enabled.
/// * `n_scoped_frees` counts the subset whose block was allocated during this
///   hook's lifetime (whether or not the hook observed that allocation).
/// * `n_enabled_frees` counts the subset whose block this hook had already
///   recorded, i.e. it witnessed both ends of the block's life.
#[derive(Debug)]
pub struct Memhook {
    heap: Heap,
    state: Rc<RefCell<HookState>>,
}

impl Memhook {
    pub(crate) fn register(heap: &Heap) -> Self {
        let state = {
            let mut inner = heap.inner().borrow_mut();
            let state = Rc::new(RefCell::new(HookState::new(inner.current_alloc_seq())));
            inner.register_hook(Rc::clone(&state));
            state
        };

        Self {
            heap: heap.clone(),
            state,
        }
    }

    /// Value of the heap's allocation counter when this hook was created.
    ///
    /// Blocks with an allocation sequence at or above this value were
    /// allocated during the hook's lifetime.
    #[must_use]
    pub fn creation_seq(&self) -> u64 {
        self.state.borrow().creation_seq
    }

    /// Whether the hook is currently recording events.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    /// Resumes recording of future events. No retroactive effect.
    pub fn enable(&self) {
        self.state.borrow_mut().enabled = true;
    }

    /// Suspends recording of future events. No retroactive effect.
    pub fn disable(&self) {
        self.state.borrow_mut().enabled = false;
    }

    /// Number of distinct blocks this hook has recorded.
    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.state.borrow().refs.len()
    }

    /// Number of allocations observed while enabled.
    #[must_use]
    pub fn n_allocs(&self) -> u64 {
        self.state.borrow().n_allocs
    }

    /// Number of frees observed while enabled.
    #[must_use]
    pub fn n_frees(&self) -> u64 {
        self.state.borrow().n_frees
    }

    /// Number of observed frees for blocks this hook also saw allocated.
    #[must_use]
    pub fn n_enabled_frees(&self) -> u64 {
        self.state.borrow().n_enabled_frees
    }

    /// Number of observed frees for blocks allocated during this hook's
    /// lifetime, whether or not the hook was enabled at allocation time.
    #[must_use]
    pub fn n_scoped_frees(&self) -> u64 {
        self.state.borrow().n_scoped_frees
    }

    /// Snapshot of the `index`-th recorded block, in first-sighting order.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<BlockInfo> {
        let inner = self.heap.inner().borrow();
        self.state.borrow().refs.get(index).map(|&seq| {
            inner
                .block_info(seq)
                .expect("recorded blocks stay resident while referenced")
        })
    }

    /// The recorded block with the highest allocation sequence.
    ///
    /// # Errors
    ///
    /// [`Error::NoTransactions`] if the hook has recorded no block.
    pub fn last_transaction(&self) -> Result<BlockInfo> {
        latest_allocated(&self.recorded_blocks()).ok_or(Error::NoTransactions)
    }

    /// The most recently allocated of the recorded blocks.
    ///
    /// # Errors
    ///
    /// [`Error::NoAllocations`] if the hook has recorded no block.
    pub fn last_alloc(&self) -> Result<BlockInfo> {
        latest_allocated(&self.recorded_blocks()).ok_or(Error::NoAllocations)
    }

    /// The most recently freed of the recorded blocks.
    ///
    /// # Errors
    ///
    /// [`Error::NoFrees`] if none of the recorded blocks has been freed.
    pub fn last_free(&self) -> Result<BlockInfo> {
        latest_freed(&self.recorded_blocks()).ok_or(Error::NoFrees)
    }

    /// Creates a frozen, read-only replica of this hook's current state.
    ///
    /// The replica is deliberately not a second live tracker: it does not
    /// register with the heap, does not take additional block references, and
    /// never changes again. Use it to capture counters at a point of interest
    /// while the hook keeps observing.
    #[must_use]
    pub fn snapshot(&self) -> HookSnapshot {
        let state = self.state.borrow();
        HookSnapshot::new(
            state.creation_seq,
            state.n_allocs,
            state.n_frees,
            state.n_enabled_frees,
            state.n_scoped_frees,
            self.recorded_blocks(),
        )
    }

    /// Releases every block reference and starts the hook over, as if freshly
    /// created: counters zeroed, creation sequence re-stamped from the heap's
    /// allocation counter, recording enabled.
    pub fn reset(&mut self) {
        let mut inner = self.heap.inner().borrow_mut();
        let mut state = self.state.borrow_mut();

        for seq in mem::take(&mut state.refs) {
            inner.release_reference(seq);
        }

        *state = HookState::new(inner.current_alloc_seq());
    }

    fn recorded_blocks(&self) -> Vec<BlockInfo> {
        let inner = self.heap.inner().borrow();
        self.state
            .borrow()
            .refs
            .iter()
            .map(|&seq| {
                inner
                    .block_info(seq)
                    .expect("recorded blocks stay resident while referenced")
            })
            .collect()
    }
}

impl Drop for Memhook {
    /// Releases every block reference (possibly releasing block storage) and
    /// deregisters from the heap.
    ///
    /// # Panics
    ///
    /// Panics if this hook is not the most recently registered live hook on
    /// its heap; overlapping hooks must be dropped in LIFO order.
    fn drop(&mut self) {
        let mut inner = self.heap.inner().borrow_mut();

        for seq in mem::take(&mut self.state.borrow_mut().refs) {
            inner.release_reference(seq);
        }

        inner.deregister_hook(&self.state);
    }
}

impl fmt::Display for Memhook {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        write!(
            f,
            "{} allocs, {} frees ({} scoped, {} enabled), {} blocks recorded",
            state.n_allocs,
            state.n_frees,
            state.n_scoped_frees,
            state.n_enabled_frees,
            state.refs.len(),
        )
    }
}

fn latest_allocated(blocks: &[BlockInfo]) -> Option<BlockInfo> {
    blocks.iter().max_by_key(|block| block.alloc_seq()).copied()
}

fn latest_freed(blocks: &[BlockInfo]) -> Option<BlockInfo> {
    blocks
        .iter()
        .filter(|block| block.is_freed())
        .max_by_key(|block| block.free_seq())
        .copied()
}

/// The mutable core of a hook, shared between the owning [`Memhook`] and the
/// heap's registry so notifications can reach it.
#[derive(Debug)]
pub(crate) struct HookState {
    creation_seq: u64,
    enabled: bool,
    /// Allocation sequences of the blocks this hook has recorded, in
    /// first-sighting order. One block reference is held per entry.
    refs: Vec<u64>,
    n_allocs: u64,
    n_frees: u64,
    n_enabled_frees: u64,
    n_scoped_frees: u64,
}

impl HookState {
    pub(crate) fn new(creation_seq: u64) -> Self {
        Self {
            creation_seq,
            enabled: true,
            refs: Vec::new(),
            n_allocs: 0,
            n_frees: 0,
            n_enabled_frees: 0,
            n_scoped_frees: 0,
        }
    }

    /// Records one allocate or free event. The event kind is derived from the
    /// block's freed state, which the heap stamps before notifying.
    pub(crate) fn report(&mut self, block: &mut Block) {
        if !self.enabled {
            return;
        }

        let already_recorded = self.refs.contains(&block.alloc_seq());

        if block.is_freed() {
            self.n_frees = increment(self.n_frees);

            // Blocks allocated at or after the creation stamp were born
            // inside this hook's scope.
            if block.alloc_seq() >= self.creation_seq {
                self.n_scoped_frees = increment(self.n_scoped_frees);
            }

            if already_recorded {
                self.n_enabled_frees = increment(self.n_enabled_frees);
            }
        } else {
            self.n_allocs = increment(self.n_allocs);
        }

        if !already_recorded {
            block.increment_refcount();
            self.refs.push(block.alloc_seq());
        }
    }
}

fn increment(counter: u64) -> u64 {
    counter
        .checked_add(1)
        .expect("event counter overflows u64 - this indicates an unrealistic scenario")
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;

    assert_not_impl_any!(Memhook: Send, Sync);

    #[test]
    fn counts_allocations_and_frees_while_enabled() {
        let heap = Heap::new();
        let hook = heap.hook();

        let first = heap.allocate(4);
        let second = heap.allocate(8);
        heap.deallocate(Some(first));

        assert_eq!(hook.n_allocs(), 2);
        assert_eq!(hook.n_frees(), 1);
        assert_eq!(hook.n_blocks(), 2);
        heap.deallocate(Some(second));
    }

    #[test]
    fn disabled_hook_ignores_events() {
        let heap = Heap::new();
        let hook = heap.hook();
        hook.disable();

        let block = heap.allocate(4);
        heap.deallocate(Some(block));

        assert_eq!(hook.n_allocs(), 0);
        assert_eq!(hook.n_frees(), 0);
        assert_eq!(hook.n_blocks(), 0);
        assert!(hook.last_transaction().is_err());
    }

    #[test]
    fn first_sighting_takes_a_single_reference() {
        let heap = Heap::new();
        let hook = heap.hook();

        let block = heap.allocate(4);
        heap.deallocate(Some(block));

        // Seen at allocation and again at free: recorded once.
        assert_eq!(hook.n_blocks(), 1);
        assert_eq!(hook.n_enabled_frees(), 1);
    }

    #[test]
    fn queries_report_missing_blocks_as_errors() {
        let heap = Heap::new();
        let hook = heap.hook();

        assert!(matches!(hook.last_transaction(), Err(Error::NoTransactions)));
        assert!(matches!(hook.last_alloc(), Err(Error::NoAllocations)));
        assert!(matches!(hook.last_free(), Err(Error::NoFrees)));

        let block = heap.allocate(4);
        assert!(hook.last_alloc().is_ok());
        assert!(matches!(hook.last_free(), Err(Error::NoFrees)));
        heap.deallocate(Some(block));
    }

    #[test]
    fn very_first_allocation_is_queryable() {
        // Sequence number zero must not read as "not found".
        let heap = Heap::new();
        let hook = heap.hook();

        let block = heap.allocate(4);

        let last = hook.last_alloc().expect("one allocation was recorded");
        assert_eq!(last.alloc_seq(), 0);
        heap.deallocate(Some(block));
    }

    #[test]
    fn last_queries_track_sequence_maxima() {
        let heap = Heap::new();
        let hook = heap.hook();

        let first = heap.allocate(1);
        let second = heap.allocate(2);
        heap.deallocate(Some(first));

        assert_eq!(hook.last_alloc().expect("recorded").size(), 2);
        assert_eq!(hook.last_free().expect("recorded").size(), 1);

        heap.deallocate(Some(second));
        assert_eq!(hook.last_free().expect("recorded").size(), 2);
    }

    #[test]
    fn block_index_follows_first_sighting_order() {
        let heap = Heap::new();
        let hook = heap.hook();

        let first = heap.allocate(1);
        let second = heap.allocate(2);

        assert_eq!(hook.block(0).expect("recorded").size(), 1);
        assert_eq!(hook.block(1).expect("recorded").size(), 2);
        assert_eq!(hook.block(2), None);

        heap.deallocate(Some(first));
        heap.deallocate(Some(second));
    }

    #[test]
    fn enable_has_no_retroactive_effect() {
        let heap = Heap::new();
        let hook = heap.hook();
        hook.disable();

        let block = heap.allocate(4);
        hook.enable();

        assert_eq!(hook.n_allocs(), 0);
        heap.deallocate(Some(block));
        assert_eq!(hook.n_frees(), 1);
        // The free is scoped (allocated during the hook's lifetime) but not
        // "enabled" (the hook never saw the allocation).
        assert_eq!(hook.n_scoped_frees(), 1);
        assert_eq!(hook.n_enabled_frees(), 0);
    }

    #[test]
    fn drop_releases_block_storage() {
        let heap = Heap::new();

        {
            let hook = heap.hook();
            let block = heap.allocate(4);
            heap.deallocate(Some(block));

            // The hook's reference keeps the freed record resident.
            assert_eq!(hook.n_frees(), 1);
            assert_eq!(heap.live_blocks(), 1);
        }

        assert_eq!(heap.live_blocks(), 0);
        assert_eq!(heap.active_hooks(), 0);
    }

    #[test]
    fn reset_starts_the_hook_over() {
        let heap = Heap::new();
        let mut hook = heap.hook();

        let block = heap.allocate(4);
        heap.deallocate(Some(block));
        assert_eq!(hook.n_blocks(), 1);

        hook.reset();

        assert_eq!(hook.n_allocs(), 0);
        assert_eq!(hook.n_frees(), 0);
        assert_eq!(hook.n_blocks(), 0);
        assert!(hook.is_enabled());
        // The released reference lets the freed record go.
        assert_eq!(heap.live_blocks(), 0);
        // Frees of pre-reset blocks would no longer count as scoped.
        assert_eq!(hook.creation_seq(), heap.allocations());
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn dropping_hooks_out_of_order_panics() {
        let heap = Heap::new();

        let outer = heap.hook();
        let _inner = heap.hook();

        drop(outer);
    }

    #[test]
    #[should_panic(expected = "too many live hooks")]
    fn registering_beyond_capacity_panics() {
        let heap = Heap::builder().max_hooks(2).build();

        let _first = heap.hook();
        let _second = heap.hook();
        let _third = heap.hook();
    }

    #[test]
    fn display_summarizes_counters() {
        let heap = Heap::new();
        let hook = heap.hook();

        let block = heap.allocate(4);
        heap.deallocate(Some(block));

        let rendered = hook.to_string();
        assert!(rendered.contains("1 allocs"));
        assert!(rendered.contains("1 frees"));
    }
}

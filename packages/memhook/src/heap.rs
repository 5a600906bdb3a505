//! The instrumented heap that every tracked allocation routes through.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::block::{Block, BlockHandle, BlockInfo};
use crate::hook::HookState;
use crate::registry::HookRegistry;
use crate::{HeapBuilder, Memhook};

/// An instrumented allocation facility.
///
/// Every allocation made through a `Heap` receives a hidden metadata record
/// (sequence numbers, requested size, free state) and is announced to every
/// [`Memhook`] currently registered with the heap, synchronously and in
/// registration order, before the call returns. Callers receive an opaque
/// [`BlockHandle`] rather than a raw pointer; the handle round-trips to the
/// metadata record in O(1).
///
/// `Heap` is a cheap-to-clone handle to shared state; clones observe the same
/// blocks and hooks. It is a single-threaded facility (`!Send + !Sync`) by
/// design, matching its role as a test instrument rather than a production
/// allocator.
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
///
/// heap.deallocate(Some(block));
/// assert_eq!(hook.n_frees(), 1);
/// ```
///
/// # Fatal misuse
///
/// Double frees, exceeding the hook capacity, and dropping hooks out of LIFO
/// order are programming defects and panic; they are never reported as
/// recoverable errors.
#[derive(Clone, Debug)]
pub struct Heap {
    inner: Rc<RefCell<HeapInner>>,
}

impl Heap {
    /// Creates a heap with the default hook capacity
    /// ([`DEFAULT_MAX_HOOKS`][crate::DEFAULT_MAX_HOOKS]).
    #[expect(
        clippy::new_without_default,
        reason = "heap construction is deliberate; a Default impl invites accidental extra heaps"
    )]
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a heap with non-default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use memhook::Heap;
    ///
    /// let heap = Heap::builder().max_hooks(2).build();
    /// ```
    #[must_use]
    pub fn builder() -> HeapBuilder {
        HeapBuilder::new()
    }

    pub(crate) fn with_max_hooks(max_hooks: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HeapInner {
                blocks: HashMap::new(),
                next_alloc_seq: 0,
                next_free_seq: 0,
                registry: HookRegistry::new(max_hooks),
            })),
        }
    }

    pub(crate) fn inner(&self) -> &Rc<RefCell<HeapInner>> {
        &self.inner
    }

    /// Registers a new hook with this heap.
    ///
    /// The hook starts enabled and with its creation sequence stamped from the
    /// heap's allocation counter, so it can distinguish blocks that predate it
    /// from blocks allocated during its lifetime.
    #[must_use]
    pub fn hook(&self) -> Memhook {
        Memhook::register(self)
    }

    /// Allocates a tracked block of `size` bytes.
    ///
    /// The reserved payload (at least one byte, padded to a 16-byte granule)
    /// is filled with [`DIRTY_PATTERN`][crate::DIRTY_PATTERN], and every
    /// active hook is notified before this call returns.
    ///
    /// A request of zero bytes is legal; the block still reserves storage but
    /// reports a size of zero.
    pub fn allocate(&self, size: usize) -> BlockHandle {
        let mut inner = self.inner.borrow_mut();

        let seq = inner.next_alloc_seq;
        inner.next_alloc_seq = seq
            .checked_add(1)
            .expect("allocation sequence counter overflows u64");

        inner.blocks.insert(seq, Block::new(seq, size));
        inner.notify(seq);

        BlockHandle::new(seq)
    }

    /// Deallocates a tracked block.
    ///
    /// `None` is an allowed no-op, mirroring the `free(NULL)` contract of the
    /// entry points this facility stands in for. Otherwise the block is marked
    /// freed, every active hook is notified, and the record's storage is
    /// released once no hook references it.
    ///
    /// # Panics
    ///
    /// Panics on a double free: passing a handle whose block was already
    /// freed, whether or not its storage is still resident.
    pub fn deallocate(&self, block: Option<BlockHandle>) {
        let Some(handle) = block else {
            return;
        };

        let mut inner = self.inner.borrow_mut();

        match inner.blocks.get(&handle.seq()).map(Block::is_freed) {
            None => panic!(
                "double free detected: block #{} was already freed and its storage released",
                handle.seq(),
            ),
            Some(true) => panic!("double free detected: block #{} is already freed", handle.seq()),
            Some(false) => {}
        }

        let free_seq = inner.next_free_seq;
        inner.next_free_seq = free_seq
            .checked_add(1)
            .expect("free sequence counter overflows u64");

        inner
            .blocks
            .get_mut(&handle.seq())
            .expect("presence verified above")
            .mark_freed(free_seq);

        inner.notify(handle.seq());
        inner.release_if_unreferenced(handle.seq());
    }

    /// Number of block records currently resident in the heap.
    ///
    /// A freed block stays resident while any hook still references it, so
    /// this is the observable signal for storage-release behavior.
    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.inner.borrow().blocks.len()
    }

    /// Number of hooks currently registered with this heap.
    #[must_use]
    pub fn active_hooks(&self) -> usize {
        self.inner.borrow().registry.len()
    }

    /// Total allocations performed through this heap so far.
    #[must_use]
    pub fn allocations(&self) -> u64 {
        self.inner.borrow().next_alloc_seq
    }

    /// Total deallocations performed through this heap so far.
    #[must_use]
    pub fn frees(&self) -> u64 {
        self.inner.borrow().next_free_seq
    }

    /// Metadata snapshot for a block, or `None` if its storage has been
    /// released.
    #[must_use]
    pub fn block_info(&self, block: BlockHandle) -> Option<BlockInfo> {
        self.inner
            .borrow()
            .blocks
            .get(&block.seq())
            .map(Block::info)
    }

    /// Copy of a block's reserved payload bytes, or `None` if its storage has
    /// been released.
    ///
    /// Fresh allocations read back as all
    /// [`DIRTY_PATTERN`][crate::DIRTY_PATTERN] bytes.
    #[must_use]
    pub fn payload_bytes(&self, block: BlockHandle) -> Option<Vec<u8>> {
        self.inner
            .borrow()
            .blocks
            .get(&block.seq())
            .map(|b| b.payload().to_vec())
    }
}

/// Shared state behind a [`Heap`] handle: the block arena, the monotonic
/// sequence counters and the hook registry.
#[derive(Debug)]
pub(crate) struct HeapInner {
    /// Arena of resident block records, keyed by allocation sequence number.
    /// Keys are never reused, so stale handles are detectable.
    blocks: HashMap<u64, Block>,
    next_alloc_seq: u64,
    next_free_seq: u64,
    registry: HookRegistry,
}

impl HeapInner {
    /// Delivers the pending event on `seq` to every active hook, in
    /// registration order. The hooks derive the event kind from the block's
    /// freed state, which has already been stamped by the caller.
    fn notify(&mut self, seq: u64) {
        for hook in self.registry.active() {
            let block = self
                .blocks
                .get_mut(&seq)
                .expect("notified block is resident for the duration of the call");
            hook.borrow_mut().report(block);
        }
    }

    fn release_if_unreferenced(&mut self, seq: u64) {
        let release = self
            .blocks
            .get(&seq)
            .is_some_and(|block| block.refcount() == 0 && block.is_freed());

        if release {
            self.blocks.remove(&seq);
        }
    }

    /// Drops one hook reference to a block, releasing the record if this was
    /// the last reference to an already-freed block.
    pub(crate) fn release_reference(&mut self, seq: u64) {
        let remaining = self
            .blocks
            .get_mut(&seq)
            .expect("referenced block is resident while its refcount is non-zero")
            .decrement_refcount();

        if remaining == 0 {
            self.release_if_unreferenced(seq);
        }
    }

    /// The allocation counter value the next allocation will receive.
    pub(crate) fn current_alloc_seq(&self) -> u64 {
        self.next_alloc_seq
    }

    pub(crate) fn block_info(&self, seq: u64) -> Option<BlockInfo> {
        self.blocks.get(&seq).map(Block::info)
    }

    pub(crate) fn register_hook(&mut self, hook: Rc<RefCell<HookState>>) {
        self.registry.push(hook);
    }

    pub(crate) fn deregister_hook(&mut self, hook: &Rc<RefCell<HookState>>) {
        self.registry.pop(hook);
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::DIRTY_PATTERN;

    // Single-threaded by design: the registry and the sequence counters are
    // not synchronized.
    assert_not_impl_any!(Heap: Send, Sync);

    #[test]
    fn allocate_stamps_strictly_increasing_sequences() {
        let heap = Heap::new();

        let first = heap.allocate(8);
        let second = heap.allocate(8);

        let first = heap.block_info(first).expect("resident");
        let second = heap.block_info(second).expect("resident");
        assert!(second.alloc_seq() > first.alloc_seq());
    }

    #[test]
    fn allocate_dirty_fills_payload() {
        let heap = Heap::new();

        let block = heap.allocate(10);

        let payload = heap.payload_bytes(block).expect("resident");
        assert_eq!(payload.len(), 16);
        assert!(payload.iter().all(|&b| b == DIRTY_PATTERN));
    }

    #[test]
    fn zero_sized_allocation_is_preserved() {
        let heap = Heap::new();

        let block = heap.allocate(0);

        let info = heap.block_info(block).expect("resident");
        assert_eq!(info.size(), 0);
        assert_eq!(heap.payload_bytes(block).expect("resident").len(), 16);
    }

    #[test]
    fn deallocate_none_is_a_no_op() {
        let heap = Heap::new();

        heap.deallocate(None);

        assert_eq!(heap.frees(), 0);
    }

    #[test]
    fn unreferenced_block_is_released_on_free() {
        let heap = Heap::new();

        let block = heap.allocate(4);
        assert_eq!(heap.live_blocks(), 1);

        heap.deallocate(Some(block));

        assert_eq!(heap.live_blocks(), 0);
        assert_eq!(heap.block_info(block), None);
    }

    #[test]
    fn round_trip_marks_freed_exactly_once() {
        let heap = Heap::new();
        let hook = heap.hook();

        let block = heap.allocate(24);
        assert!(!heap.block_info(block).expect("resident").is_freed());

        heap.deallocate(Some(block));

        // The hook keeps the record resident; it is now freed.
        let info = heap.block_info(block).expect("resident");
        assert!(info.is_freed());
        assert_eq!(info.size(), 24);
        drop(hook);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_of_resident_block_panics() {
        let heap = Heap::new();
        let hook = heap.hook();

        let block = heap.allocate(4);
        heap.deallocate(Some(block));

        // Referenced by the hook, so still resident - and still a double free.
        assert_eq!(heap.live_blocks(), 1);
        assert_eq!(hook.n_frees(), 1);
        heap.deallocate(Some(block));
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_of_released_block_panics() {
        let heap = Heap::new();

        let block = heap.allocate(4);
        heap.deallocate(Some(block));
        heap.deallocate(Some(block));
    }

    #[test]
    fn clones_share_state() {
        let heap = Heap::new();
        let alias = heap.clone();

        let block = heap.allocate(4);

        assert_eq!(alias.live_blocks(), 1);
        alias.deallocate(Some(block));
        assert_eq!(heap.live_blocks(), 0);
    }
}

//! Per-allocation metadata records and the opaque handles that name them.

/// The byte value written across every fresh payload.
///
/// Reading payload bytes before writing them surfaces this recognizable
/// pattern instead of whatever happened to be in memory, which turns "works by
/// accident" uninitialized reads into deterministic test failures.
pub const DIRTY_PATTERN: u8 = 0xDC;

/// Payload reservations are rounded up to this granule.
pub(crate) const PAYLOAD_ALIGNMENT: usize = 16;

/// Number of bytes actually reserved for a caller request of `requested` bytes.
///
/// At least one byte is always reserved so that every allocation, including a
/// zero-sized one, has a distinct payload.
pub(crate) fn reserved_len(requested: usize) -> usize {
    requested
        .max(1)
        .checked_next_multiple_of(PAYLOAD_ALIGNMENT)
        .expect("payload reservation size overflows usize")
}

/// An opaque handle naming one tracked allocation within a [`Heap`][crate::Heap].
///
/// Handles are small `Copy` values and remain valid until the block's storage
/// is released. Presenting a handle for a block that has already been freed is
/// a double free and terminates the process, exactly as presenting a stale raw
/// pointer to `free` would.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BlockHandle {
    seq: u64,
}

impl BlockHandle {
    pub(crate) fn new(seq: u64) -> Self {
        Self { seq }
    }

    /// The allocation sequence number doubles as the arena key, so a handle
    /// can never alias a later allocation that reused the same storage.
    pub(crate) fn seq(self) -> u64 {
        self.seq
    }
}

/// A point-in-time snapshot of one block's metadata.
///
/// Returned by the query methods of [`Memhook`][crate::Memhook] and
/// [`Heap`][crate::Heap]. The snapshot does not keep the block alive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockInfo {
    alloc_seq: u64,
    free_seq: Option<u64>,
    size: usize,
}

impl BlockInfo {
    /// Value of the global allocation counter when this block was created.
    #[must_use]
    pub fn alloc_seq(&self) -> u64 {
        self.alloc_seq
    }

    /// Value of the global free counter when this block was freed, or `None`
    /// if the block has not been freed.
    ///
    /// This is deliberately an explicit presence state rather than a zero
    /// sentinel: zero is a legitimate first sequence number.
    #[must_use]
    pub fn free_seq(&self) -> Option<u64> {
        self.free_seq
    }

    /// The byte count the caller requested. Zero-sized requests report zero
    /// here even though at least one byte is reserved internally.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the block has been freed.
    #[must_use]
    pub fn is_freed(&self) -> bool {
        self.free_seq.is_some()
    }
}

/// One tracked heap allocation: hidden metadata plus the reserved payload.
///
/// Storage is co-owned: the record stays resident while any hook still
/// references it, even after the block has been freed, so hooks can keep
/// answering queries about blocks that died inside their scope.
#[derive(Debug)]
pub(crate) struct Block {
    alloc_seq: u64,
    free_seq: Option<u64>,
    size: usize,
    refcount: u32,
    payload: Box<[u8]>,
}

impl Block {
    pub(crate) fn new(alloc_seq: u64, size: usize) -> Self {
        Self {
            alloc_seq,
            free_seq: None,
            size,
            refcount: 0,
            payload: vec![DIRTY_PATTERN; reserved_len(size)].into_boxed_slice(),
        }
    }

    pub(crate) fn alloc_seq(&self) -> u64 {
        self.alloc_seq
    }

    pub(crate) fn is_freed(&self) -> bool {
        self.free_seq.is_some()
    }

    /// Stamps the free sequence number. The caller has already rejected
    /// double frees, so a block is only ever stamped once.
    pub(crate) fn mark_freed(&mut self, free_seq: u64) {
        debug_assert!(self.free_seq.is_none());
        self.free_seq = Some(free_seq);
    }

    pub(crate) fn refcount(&self) -> u32 {
        self.refcount
    }

    pub(crate) fn increment_refcount(&mut self) {
        self.refcount = self
            .refcount
            .checked_add(1)
            .expect("block refcount overflows u32 - this indicates an unrealistic scenario");
    }

    /// Returns the remaining count. The heap releases the record when this
    /// reaches zero on an already-freed block.
    pub(crate) fn decrement_refcount(&mut self) -> u32 {
        self.refcount = self
            .refcount
            .checked_sub(1)
            .expect("block refcount decremented below zero");
        self.refcount
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub(crate) fn info(&self) -> BlockInfo {
        BlockInfo {
            alloc_seq: self.alloc_seq,
            free_seq: self.free_seq,
            size: self.size,
        }
    }
}

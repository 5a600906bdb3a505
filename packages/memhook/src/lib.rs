//! Scoped allocation-tracking hooks for testing memory management logic.
//!
//! This package provides an instrumented [`Heap`] and scoped [`Memhook`]
//! observers that programmatically verify allocation and deallocation
//! behavior: every block allocated through the heap carries hidden metadata
//! (sequence numbers, requested size, free state), and every live hook is
//! notified of every event, synchronously, before the call returns.
//!
//! The core types are:
//! - [`Heap`] - the allocation facility test subjects route through
//! - [`Memhook`] - a scoped observer deriving counters from heap events
//! - [`HookSnapshot`] - a frozen, read-only replica of a hook
//! - [`TrackedBox`] - an owned value whose lifetime is mirrored by a block
//!
//! This package is a test instrument, not a production allocator.
//!
//! # Simple usage
//!
//! ```
//! use memhook::Heap;
//!
//! let heap = Heap::new();
//! let hook = heap.hook();
//!
//! let block = heap.allocate(4);
//! assert_eq!(hook.n_allocs(), 1);
//! assert_eq!(hook.n_frees(), 0);
//!
//! heap.deallocate(Some(block));
//! assert_eq!(hook.n_frees(), 1);
//! ```
//!
//! # Overlapping hooks
//!
//! Any number of hooks (up to the configured capacity, default
//! [`DEFAULT_MAX_HOOKS`]) may observe the same heap at once; each accounts
//! independently. Hooks follow strict stack discipline: they must be dropped
//! in reverse registration order.
//!
//! # Scoped and enabled frees
//!
//! A hook is notified of every free during its lifetime, even for blocks
//! allocated before it existed. *Scoped* frees are the subset whose block was
//! allocated during the hook's lifetime; *enabled* frees are the subset whose
//! allocation the hook itself observed:
//!
//! ```
//! use memhook::Heap;
//!
//! let heap = Heap::new();
//! let before = heap.allocate(4);
//!
//! let hook = heap.hook();
//! heap.deallocate(Some(before));
//!
//! assert_eq!(hook.n_frees(), 1);
//! assert_eq!(hook.n_scoped_frees(), 0); // Allocated before the hook.
//! assert_eq!(hook.n_enabled_frees(), 0); // The hook never saw the allocation.
//! ```
//!
//! # Fatal misuse
//!
//! Double frees, dropping hooks out of LIFO order, and exceeding the hook
//! capacity are defects in the calling code and panic. Only the "nothing
//! qualifying was recorded" block queries return recoverable [`Error`]s.
//!
//! # Thread safety
//!
//! None, by design: the heap and its hooks model a single logical thread of
//! control and are `!Send + !Sync`. [`HookSnapshot`] is plain data and
//! travels freely.

mod block;
mod builder;
mod error;
mod heap;
mod hook;
mod registry;
mod snapshot;
mod tracked_box;

pub use block::{BlockHandle, BlockInfo, DIRTY_PATTERN};
pub use builder::{DEFAULT_MAX_HOOKS, HeapBuilder};
pub use error::Error;
pub use heap::Heap;
pub use hook::Memhook;
pub use snapshot::HookSnapshot;
pub use tracked_box::TrackedBox;

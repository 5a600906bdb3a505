use thiserror::Error;

/// Errors that can occur when querying a [`Memhook`][crate::Memhook] for blocks
/// it has recorded.
///
/// These are ordinary, recoverable errors: a hook that has simply not witnessed
/// a qualifying event yet reports that fact through its `Err` value. Usage
/// defects (double free, registry misuse, capacity exhaustion) are panics
/// instead, because they indicate a bug in the calling code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The hook has not recorded any block at all.
    #[error("no transactions were recorded during the hook's lifetime")]
    NoTransactions,

    /// The hook has not recorded any allocation.
    #[error("no allocations were recorded during the hook's lifetime")]
    NoAllocations,

    /// None of the blocks recorded by the hook have been freed.
    #[error("no frees were recorded during the hook's lifetime")]
    NoFrees,
}

/// A specialized `Result` type for memhook queries, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

//! Error type shared by every fallible table operation.

use thiserror::Error;

/// Failure reported by `HashTbl` operations.
///
/// Not-found is never an error: lookups report it as `Ok(None)` and
/// removals as `Ok(false)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TableError {
    /// The allocator hook refused the request, or the heap could not
    /// satisfy it. The table is unchanged.
    #[error("allocation of {bytes} bytes failed")]
    Alloc { bytes: usize },
    /// The key strategy does not admit this key (e.g. a null pointer).
    #[error("key rejected by the key strategy")]
    InvalidKey,
}

impl From<crate::hooks::AllocError> for TableError {
    fn from(e: crate::hooks::AllocError) -> Self {
        TableError::Alloc { bytes: e.bytes }
    }
}

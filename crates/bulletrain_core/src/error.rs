//! # Core Error Types

use thiserror::Error;

/// Errors from index-addressed pool access.
///
/// Exhaustion is not an error: `acquire` returns `None` instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The index does not address a slot of this pool.
    #[error("slot index {index} out of range for pool of capacity {capacity}")]
    OutOfRange {
        /// The offending index.
        index: usize,
        /// The pool's fixed capacity.
        capacity: usize,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

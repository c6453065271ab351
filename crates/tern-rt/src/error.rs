//! Heap errors

use crate::handle::HeapHandle;
use crate::header::{ElemKind, HeapKind};
use thiserror::Error;

/// Heap access errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// Handle refers to a freed or never-allocated object
    #[error("stale heap handle {0}")]
    StaleHandle(HeapHandle),

    /// Object has a different kind than the operation expects
    #[error("expected {expected} object, found {found}")]
    KindMismatch {
        /// Kind the operation needs
        expected: HeapKind,
        /// Kind of the object
        found: HeapKind,
    },

    /// Array element of the wrong kind
    #[error("expected {expected} element, found {found}")]
    ElemMismatch {
        /// Element kind of the array
        expected: ElemKind,
        /// Element kind supplied
        found: ElemKind,
    },

    /// Array index outside `0..len`
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds {
        /// Requested index
        index: i64,
        /// Array length
        len: usize,
    },

    /// Array length beyond the configured cap, or not allocatable
    #[error("array length {requested} exceeds the limit of {limit} elements")]
    TooLarge {
        /// Requested element count
        requested: usize,
        /// Configured maximum
        limit: usize,
    },

    /// Header failed validation
    #[error("corrupt heap header (magic {magic:#010x})")]
    CorruptHeader {
        /// Magic value found
        magic: u32,
    },

    /// Weak reference slot does not exist
    #[error("invalid weak reference #{0}")]
    InvalidWeak(u32),
}

/// Heap operation result
pub type HeapResult<T> = Result<T, HeapError>;

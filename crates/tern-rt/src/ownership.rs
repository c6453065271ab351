//! Ownership kinds and the retain/release log

use crate::handle::HeapHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a field holds a heap reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// Counts toward the refcount
    Strong,
    /// Tracked in the weak side table, zeroed on destruction
    Weak,
}

/// Ownership transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnershipOp {
    /// Object created with one owner
    Alloc,
    /// Refcount incremented
    Retain,
    /// Refcount decremented
    Release,
    /// Object destroyed
    Free,
}

impl fmt::Display for OwnershipOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OwnershipOp::Alloc => "alloc",
            OwnershipOp::Retain => "retain",
            OwnershipOp::Release => "release",
            OwnershipOp::Free => "free",
        };
        f.write_str(name)
    }
}

/// One recorded transition with the resulting refcount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipEvent {
    /// Affected object
    pub handle: HeapHandle,
    /// Transition
    pub op: OwnershipOp,
    /// Refcount after the transition
    pub refcount: u32,
}

impl fmt::Display for OwnershipEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.op, self.handle, self.refcount)
    }
}

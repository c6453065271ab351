//! Heap object header
//!
//! Every heap object carries a header describing what it is and how many
//! owners it has. Strings and arrays share the same header layout:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HeapHeader                           │
//! │  - magic: u32   (HEAP_MAGIC)         │
//! │  - kind: HeapKind                    │
//! │  - elem: ElemKind                    │
//! │  - refcount: u32                     │
//! │  - len: usize                        │
//! │  - cap: usize                        │
//! ├──────────────────────────────────────┤
//! │ Payload (bytes or elements)          │
//! └──────────────────────────────────────┘
//! ```

use crate::error::{HeapError, HeapResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker stored in every live header
pub const HEAP_MAGIC: u32 = 0x5445_524E;

/// Refcount value for objects that are never freed (string literals)
pub const IMMORTAL_REFCOUNT: u32 = u32::MAX;

/// Object kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeapKind {
    /// UTF-8 string
    String,
    /// Homogeneous array
    Array,
}

impl fmt::Display for HeapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapKind::String => f.write_str("string"),
            HeapKind::Array => f.write_str("array"),
        }
    }
}

/// Array element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElemKind {
    /// Not an array
    None,
    /// `i64` elements
    I64,
    /// `f64` elements
    F64,
    /// Raw pointer-sized words
    Ptr,
    /// String handles, owned by the array
    Str,
}

impl fmt::Display for ElemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElemKind::None => "none",
            ElemKind::I64 => "i64",
            ElemKind::F64 => "f64",
            ElemKind::Ptr => "ptr",
            ElemKind::Str => "str",
        };
        f.write_str(name)
    }
}

/// Header stored with each heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapHeader {
    /// Always [`HEAP_MAGIC`] while the object is live
    pub magic: u32,
    /// Object kind
    pub kind: HeapKind,
    /// Element kind (arrays only)
    pub elem: ElemKind,
    /// Owner count, or [`IMMORTAL_REFCOUNT`]
    pub refcount: u32,
    /// Length in bytes (strings) or elements (arrays)
    pub len: usize,
    /// Reserved capacity, same unit as `len`
    pub cap: usize,
}

impl HeapHeader {
    /// Header for a fresh object with one owner
    pub fn new(kind: HeapKind, elem: ElemKind, len: usize, cap: usize) -> Self {
        Self {
            magic: HEAP_MAGIC,
            kind,
            elem,
            refcount: 1,
            len,
            cap,
        }
    }

    /// Whether this object is never freed
    #[inline]
    pub fn is_immortal(&self) -> bool {
        self.refcount == IMMORTAL_REFCOUNT
    }

    /// Check the magic and the expected kind
    pub fn validate(&self, expected: HeapKind) -> HeapResult<()> {
        if self.magic != HEAP_MAGIC {
            return Err(HeapError::CorruptHeader { magic: self.magic });
        }
        if self.kind != expected {
            return Err(HeapError::KindMismatch {
                expected,
                found: self.kind,
            });
        }
        if self.len > self.cap {
            return Err(HeapError::CorruptHeader { magic: self.magic });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_header() {
        let header = HeapHeader::new(HeapKind::Array, ElemKind::I64, 3, 4);
        assert_eq!(header.magic, HEAP_MAGIC);
        assert_eq!(header.refcount, 1);
        assert!(!header.is_immortal());
        assert!(header.validate(HeapKind::Array).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_headers() {
        let mut header = HeapHeader::new(HeapKind::String, ElemKind::None, 2, 2);
        assert!(matches!(
            header.validate(HeapKind::Array),
            Err(HeapError::KindMismatch { .. })
        ));
        header.magic = 0xDEAD_BEEF;
        assert!(matches!(
            header.validate(HeapKind::String),
            Err(HeapError::CorruptHeader { magic: 0xDEAD_BEEF })
        ));
    }
}

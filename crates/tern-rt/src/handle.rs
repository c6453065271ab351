//! Generation-checked heap handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag bit set in every encoded handle
///
/// Linear-memory addresses never have this bit set, so a pointer-sized word
/// can be classified without consulting the heap.
pub const HANDLE_TAG: u64 = 1 << 63;

const GENERATION_MASK: u32 = 0x7FFF_FFFF;

/// Reference to a heap object
///
/// A handle stays valid while its slot's generation matches. Freeing an
/// object bumps the generation, so old handles are detected as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeapHandle {
    /// Slot index
    pub index: u32,
    /// Slot generation at allocation time
    pub generation: u32,
}

impl HeapHandle {
    /// Create a handle
    pub const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation: generation & GENERATION_MASK,
        }
    }

    /// Encode as a tagged pointer-sized word
    #[inline]
    pub const fn to_bits(self) -> u64 {
        HANDLE_TAG | ((self.generation as u64) << 32) | self.index as u64
    }

    /// Decode a tagged word; `None` when the tag bit is clear
    #[inline]
    pub const fn from_bits(bits: u64) -> Option<Self> {
        if bits & HANDLE_TAG == 0 {
            return None;
        }
        Some(Self {
            index: bits as u32,
            generation: ((bits >> 32) as u32) & GENERATION_MASK,
        })
    }

    /// Whether `bits` carries the handle tag
    #[inline]
    pub const fn is_handle_bits(bits: u64) -> bool {
        bits & HANDLE_TAG != 0
    }

    pub(crate) fn next_generation(generation: u32) -> u32 {
        generation.wrapping_add(1) & GENERATION_MASK
    }
}

impl fmt::Display for HeapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_round_trip() {
        let handle = HeapHandle::new(42, 7);
        let bits = handle.to_bits();
        assert!(HeapHandle::is_handle_bits(bits));
        assert_eq!(HeapHandle::from_bits(bits), Some(handle));
    }

    #[test]
    fn test_untagged_words_are_not_handles() {
        assert_eq!(HeapHandle::from_bits(0), None);
        assert_eq!(HeapHandle::from_bits(0x1000), None);
        assert!(!HeapHandle::is_handle_bits(u32::MAX as u64));
    }

    #[test]
    fn test_generation_wraps_within_mask() {
        assert_eq!(HeapHandle::next_generation(GENERATION_MASK), 0);
        assert_eq!(HeapHandle::new(1, u32::MAX).generation, GENERATION_MASK);
    }
}

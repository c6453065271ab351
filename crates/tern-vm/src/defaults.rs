//! Default constants for interpreter configuration.
//!
//! Centralizes the limits used by [`ResourceLimits`](crate::ResourceLimits)
//! and the linear memory layout.

/// Bytes at the bottom of linear memory that no load or store may touch.
///
/// Address 0 is the null pointer; small offsets from null land here too.
pub const NULL_GUARD_BYTES: u64 = 4096;

/// Default maximum bytes one frame may reserve with `alloca` (64 KiB).
pub const DEFAULT_FRAME_STACK_BYTES: usize = 64 * 1024;

/// Default maximum number of simultaneously active frames.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Default register file size, in slots, shared by all active frames.
pub const DEFAULT_MAX_REGISTERS: usize = 1024 * 64;

/// Default cap on total linear memory in bytes (256 MiB).
pub const DEFAULT_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Alignment of globals and stack allocations.
pub const SLOT_ALIGN: u64 = 8;

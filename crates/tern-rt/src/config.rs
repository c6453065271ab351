//! Heap configuration

/// Heap settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Validate object headers on every access
    pub validate_headers: bool,
    /// Keep every ownership transition in an in-memory log
    pub record_events: bool,
    /// Largest element count an array may be allocated or resized to
    pub max_array_len: usize,
}

/// Default cap on array length (elements)
pub const DEFAULT_MAX_ARRAY_LEN: usize = 1 << 26;

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            validate_headers: cfg!(debug_assertions),
            record_events: false,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
        }
    }
}

impl HeapConfig {
    /// Validation and event recording both enabled
    pub fn debug() -> Self {
        Self {
            validate_headers: true,
            record_events: true,
            ..Self::default()
        }
    }
}

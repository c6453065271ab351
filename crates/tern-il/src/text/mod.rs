//! Textual module format
//!
//! A deterministic, versioned rendering of modules:
//!
//! ```text
//! il 0.2
//! extern @rt_print_i64(i64) -> void
//!
//! func @main() -> i64 {
//! entry:
//!   %v0 = add 2, 2
//!   ret %v0
//! }
//! ```
//!
//! [`write_module`] and [`parse_module`] round-trip: re-serializing a
//! parsed module yields the same text.

pub mod lexer;
mod parser;
mod writer;

pub use parser::parse_module;
pub use writer::{write_instr, write_module, write_value};

use thiserror::Error;

/// Text format error with its position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}:{column}: {message}")]
pub struct ParseError {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
    /// Description
    pub message: String,
}

impl ParseError {
    /// Create an error
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for crate::module::Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&write_module(self))
    }
}

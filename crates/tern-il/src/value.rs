//! Value references and source locations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual register id, unique within a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    /// Register index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into a module's string table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrId(pub u32);

impl StrId {
    /// Table index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where an operand's data comes from
///
/// Values are descriptions, not storage: they have no lifetime of their own.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Virtual register
    Temp(ValueId),
    /// Integer literal, typed by the slot that consumes it
    ConstInt(i64),
    /// `f64` literal
    ConstFloat(f64),
    /// Interned string literal
    ConstStr(StrId),
    /// Address of a named global
    GlobalAddr(String),
    /// The null pointer
    NullPtr,
}

impl Value {
    /// Shorthand for a temp reference
    pub fn temp(id: u32) -> Self {
        Value::Temp(ValueId(id))
    }

    /// Shorthand for a global address
    pub fn global(name: impl Into<String>) -> Self {
        Value::GlobalAddr(name.into())
    }

    /// Register id, if this value is a temp
    pub fn as_temp(&self) -> Option<ValueId> {
        match self {
            Value::Temp(id) => Some(*id),
            _ => None,
        }
    }

    /// Integer literal, if this value is one
    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Value::ConstInt(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<ValueId> for Value {
    fn from(id: ValueId) -> Self {
        Value::Temp(id)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::ConstInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::ConstFloat(v)
    }
}

/// Source position attached to an instruction
///
/// `file` is a producer-defined file id; zero fields mean "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    /// File id
    pub file: u32,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl SourceLoc {
    /// Unknown location
    pub const UNKNOWN: SourceLoc = SourceLoc {
        file: 0,
        line: 0,
        column: 0,
    };

    /// Create a location
    pub const fn new(file: u32, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Whether any component is set
    pub fn is_known(&self) -> bool {
        *self != SourceLoc::UNKNOWN
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

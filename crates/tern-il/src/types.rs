//! Primitive IL types
//!
//! The IL type set is closed: there are no aggregates at this layer.
//! Composite data is laid out by front ends as pointer-plus-offset
//! arithmetic over `ptr`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A primitive IL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// No value
    Void,
    /// 1-bit boolean
    I1,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 64-bit IEEE float
    F64,
    /// Opaque pointer
    Ptr,
    /// Opaque string handle
    Str,
    /// Error value
    Error,
    /// Resume token
    ResumeTok,
}

impl Type {
    /// All types, in declaration order
    pub const ALL: [Type; 10] = [
        Type::Void,
        Type::I1,
        Type::I16,
        Type::I32,
        Type::I64,
        Type::F64,
        Type::Ptr,
        Type::Str,
        Type::Error,
        Type::ResumeTok,
    ];

    /// Textual name used by the IL text format
    pub const fn name(self) -> &'static str {
        match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F64 => "f64",
            Type::Ptr => "ptr",
            Type::Str => "str",
            Type::Error => "error",
            Type::ResumeTok => "resume_tok",
        }
    }

    /// Look up a type by its textual name
    pub fn from_name(name: &str) -> Option<Type> {
        Type::ALL.iter().copied().find(|ty| ty.name() == name)
    }

    /// Size of a value of this type in linear memory
    ///
    /// Handles (`str`, `error`, `resume_tok`) occupy one machine word.
    pub const fn size_in_bytes(self) -> Option<usize> {
        match self {
            Type::Void => None,
            Type::I1 => Some(1),
            Type::I16 => Some(2),
            Type::I32 => Some(4),
            Type::I64 | Type::F64 | Type::Ptr | Type::Str | Type::Error | Type::ResumeTok => {
                Some(8)
            }
        }
    }

    /// Integer kinds, including `i1`
    pub const fn is_integer(self) -> bool {
        matches!(self, Type::I1 | Type::I16 | Type::I32 | Type::I64)
    }

    /// Kinds `load` and `store` can move through linear memory
    pub const fn is_memory(self) -> bool {
        matches!(
            self,
            Type::I1 | Type::I16 | Type::I32 | Type::I64 | Type::F64 | Type::Ptr | Type::Str
        )
    }

    /// Floating point kinds
    pub const fn is_float(self) -> bool {
        matches!(self, Type::F64)
    }

    /// Inclusive value range of an integer kind
    pub const fn int_range(self) -> Option<(i64, i64)> {
        match self {
            Type::I1 => Some((0, 1)),
            Type::I16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Type::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Type::I64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Whether an integer literal can be given this type
    pub fn accepts_int_literal(self, value: i64) -> bool {
        match self.int_range() {
            Some((lo, hi)) => value >= lo && value <= hi,
            None => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown type name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown type '{0}'")]
pub struct UnknownType(pub String);

impl FromStr for Type {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Type::from_name(s).ok_or_else(|| UnknownType(s.to_string()))
    }
}

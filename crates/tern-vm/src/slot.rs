//! Register slot values
//!
//! Every IL type maps to exactly one [`Slot`] variant. Integer kinds narrower
//! than `i64` are held sign-extended in [`Slot::Int`]; `i1` holds 0 or 1.

use crate::trap::{ExecResult, Trap, TrapKind};
use std::fmt;
use tern_il::Type;
use tern_rt::HeapHandle;

/// Runtime error value produced by `trap.err`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorValue {
    /// Trap kind raised by `trap.from_err`
    pub kind: TrapKind,
    /// Program-defined code
    pub code: i32,
    /// Message string, if any
    pub message: Option<HeapHandle>,
}

impl ErrorValue {
    /// Error value for `code`
    ///
    /// Codes that match a [`TrapKind`] code take that kind; every other code
    /// is a [`TrapKind::RuntimeError`].
    pub fn from_code(code: i32, message: Option<HeapHandle>) -> Self {
        Self {
            kind: TrapKind::from_code(code).unwrap_or(TrapKind::RuntimeError),
            code,
            message,
        }
    }
}

/// A register value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    /// No value (void calls and returns)
    Void,
    /// Any integer kind, sign-extended to 64 bits
    Int(i64),
    /// `f64`
    Float(f64),
    /// Linear memory address, or a tagged heap handle for arrays
    Ptr(u64),
    /// String handle; `None` is the null string
    Str(Option<HeapHandle>),
    /// Error value
    Error(ErrorValue),
    /// Resume token
    Tok(u64),
}

impl Slot {
    /// `i1` slot for a boolean
    #[inline]
    pub fn bool(value: bool) -> Slot {
        Slot::Int(value as i64)
    }

    /// Slot for an array or other heap handle passed as `ptr`
    #[inline]
    pub fn handle_ptr(handle: HeapHandle) -> Slot {
        Slot::Ptr(handle.to_bits())
    }

    /// Zero value of `ty`
    pub fn zero(ty: Type) -> Slot {
        match ty {
            Type::Void => Slot::Void,
            Type::I1 | Type::I16 | Type::I32 | Type::I64 => Slot::Int(0),
            Type::F64 => Slot::Float(0.0),
            Type::Ptr => Slot::Ptr(0),
            Type::Str => Slot::Str(None),
            Type::Error => Slot::Error(ErrorValue::from_code(0, None)),
            Type::ResumeTok => Slot::Tok(0),
        }
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Slot::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Slot::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Pointer payload
    pub fn as_ptr(&self) -> Option<u64> {
        match self {
            Slot::Ptr(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<Option<HeapHandle>> {
        match self {
            Slot::Str(h) => Some(*h),
            _ => None,
        }
    }

    /// Whether this slot is a valid value of `ty`
    pub fn fits(&self, ty: Type) -> bool {
        match (self, ty) {
            (Slot::Void, Type::Void) => true,
            (Slot::Int(v), ty) if ty.is_integer() => ty
                .int_range()
                .map_or(false, |(lo, hi)| (lo..=hi).contains(v)),
            (Slot::Float(_), Type::F64)
            | (Slot::Ptr(_), Type::Ptr)
            | (Slot::Str(_), Type::Str)
            | (Slot::Error(_), Type::Error)
            | (Slot::Tok(_), Type::ResumeTok) => true,
            _ => false,
        }
    }

    /// Name of the variant, for messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Slot::Void => "void",
            Slot::Int(_) => "int",
            Slot::Float(_) => "float",
            Slot::Ptr(_) => "ptr",
            Slot::Str(_) => "str",
            Slot::Error(_) => "error",
            Slot::Tok(_) => "resume token",
        }
    }

    pub(crate) fn int(self) -> ExecResult<i64> {
        self.as_int().ok_or_else(|| self.mismatch("int"))
    }

    pub(crate) fn float(self) -> ExecResult<f64> {
        self.as_float().ok_or_else(|| self.mismatch("float"))
    }

    pub(crate) fn ptr(self) -> ExecResult<u64> {
        self.as_ptr().ok_or_else(|| self.mismatch("ptr"))
    }

    pub(crate) fn string(self) -> ExecResult<Option<HeapHandle>> {
        self.as_str().ok_or_else(|| self.mismatch("str"))
    }

    pub(crate) fn error(self) -> ExecResult<ErrorValue> {
        match self {
            Slot::Error(e) => Ok(e),
            other => Err(other.mismatch("error")),
        }
    }

    fn mismatch(&self, expected: &str) -> Trap {
        Trap::invalid(format!("expected {} operand, found {}", expected, self))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Void => f.write_str("void"),
            Slot::Int(v) => write!(f, "{}", v),
            Slot::Float(v) => write!(f, "{:?}", v),
            Slot::Ptr(p) => match HeapHandle::from_bits(*p) {
                Some(h) => write!(f, "ptr {}", h),
                None => write!(f, "ptr {:#x}", p),
            },
            Slot::Str(Some(h)) => write!(f, "str {}", h),
            Slot::Str(None) => f.write_str("str null"),
            Slot::Error(e) => write!(f, "error {} ({})", e.code, e.kind),
            Slot::Tok(t) => write!(f, "tok {}", t),
        }
    }
}

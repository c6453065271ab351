//! Runtime traps
//!
//! A trap aborts the whole run. It carries its kind, the location of the
//! instruction that raised it, and the call stack at that point (innermost
//! frame first).

use serde::{Deserialize, Serialize};
use std::fmt;
use tern_il::SourceLoc;
use thiserror::Error;

/// Trap classification
///
/// The discriminants double as the codes reported by `err.get_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TrapKind {
    /// Integer division or remainder by zero
    DivideByZero = 1,
    /// Checked arithmetic overflow
    Overflow = 2,
    /// Memory or array access out of range
    Bounds = 3,
    /// Checked conversion could not represent the value
    InvalidCast = 4,
    /// Access through the null guard region
    NullPointer = 5,
    /// Call depth, register file or frame stack exhausted
    StackOverflow = 6,
    /// Extern not found in the registry
    UnresolvedExtern = 7,
    /// Registered extern signature differs from the call
    ExternSignatureMismatch = 8,
    /// Host handler reported a failure
    HostError = 9,
    /// Step budget exhausted
    StepLimit = 10,
    /// Explicit trap or error value raised by the program
    RuntimeError = 11,
    /// Entry function missing or called with bad arguments
    InvalidEntry = 12,
    /// Operand values did not match what the instruction requires
    InvalidOperation = 13,
}

impl TrapKind {
    /// Every kind, in code order
    pub const ALL: [TrapKind; 13] = [
        TrapKind::DivideByZero,
        TrapKind::Overflow,
        TrapKind::Bounds,
        TrapKind::InvalidCast,
        TrapKind::NullPointer,
        TrapKind::StackOverflow,
        TrapKind::UnresolvedExtern,
        TrapKind::ExternSignatureMismatch,
        TrapKind::HostError,
        TrapKind::StepLimit,
        TrapKind::RuntimeError,
        TrapKind::InvalidEntry,
        TrapKind::InvalidOperation,
    ];

    /// Numeric code
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Kind for a numeric code
    pub fn from_code(code: i32) -> Option<TrapKind> {
        TrapKind::ALL.iter().copied().find(|k| k.code() == code)
    }

    /// Name as printed in reports
    pub const fn name(self) -> &'static str {
        match self {
            TrapKind::DivideByZero => "DivideByZero",
            TrapKind::Overflow => "Overflow",
            TrapKind::Bounds => "Bounds",
            TrapKind::InvalidCast => "InvalidCast",
            TrapKind::NullPointer => "NullPointer",
            TrapKind::StackOverflow => "StackOverflow",
            TrapKind::UnresolvedExtern => "UnresolvedExtern",
            TrapKind::ExternSignatureMismatch => "ExternSignatureMismatch",
            TrapKind::HostError => "HostError",
            TrapKind::StepLimit => "StepLimit",
            TrapKind::RuntimeError => "RuntimeError",
            TrapKind::InvalidEntry => "InvalidEntry",
            TrapKind::InvalidOperation => "InvalidOperation",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a trap's call stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Function name
    pub function: String,
    /// Block label
    pub block: String,
    /// Instruction index within the block
    pub ip: usize,
    /// Location of that instruction
    pub loc: SourceLoc,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}:{} #{}", self.function, self.block, self.ip)?;
        if self.loc.is_known() {
            write!(f, " (at {})", self.loc)?;
        }
        Ok(())
    }
}

/// Structured runtime failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("trap {kind}: {message}{}", loc_suffix(.loc))]
pub struct Trap {
    /// Classification
    pub kind: TrapKind,
    /// Human-readable detail
    pub message: String,
    /// Location of the trapping instruction
    pub loc: SourceLoc,
    /// Active frames, innermost first
    pub call_stack: Vec<FrameInfo>,
}

fn loc_suffix(loc: &SourceLoc) -> String {
    if loc.is_known() {
        format!(" (at {})", loc)
    } else {
        String::new()
    }
}

impl Trap {
    /// Trap with no location or call stack yet
    pub fn new(kind: TrapKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            loc: SourceLoc::UNKNOWN,
            call_stack: Vec::new(),
        }
    }

    /// Trap kind [`TrapKind::InvalidOperation`]
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::new(TrapKind::InvalidOperation, message)
    }

    /// Multi-line report: the headline followed by one line per frame
    pub fn render(&self) -> String {
        let mut out = self.to_string();
        for frame in &self.call_stack {
            out.push_str("\n  in ");
            out.push_str(&frame.to_string());
        }
        out
    }
}

/// Result of executing interpreter operations
pub type ExecResult<T> = Result<T, Trap>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in TrapKind::ALL {
            assert_eq!(TrapKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(TrapKind::from_code(0), None);
        assert_eq!(TrapKind::DivideByZero.code(), 1);
    }

    #[test]
    fn test_display_and_render() {
        let mut trap = Trap::new(TrapKind::DivideByZero, "division by zero");
        assert_eq!(trap.to_string(), "trap DivideByZero: division by zero");
        trap.loc = SourceLoc::new(1, 4, 9);
        trap.call_stack.push(FrameInfo {
            function: "div".into(),
            block: "entry".into(),
            ip: 0,
            loc: SourceLoc::new(1, 4, 9),
        });
        trap.call_stack.push(FrameInfo {
            function: "main".into(),
            block: "entry".into(),
            ip: 2,
            loc: SourceLoc::UNKNOWN,
        });
        assert_eq!(
            trap.render(),
            "trap DivideByZero: division by zero (at 1:4:9)\n  in @div:entry #0 (at 1:4:9)\n  in @main:entry #2"
        );
    }

    #[test]
    fn test_trap_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&Trap::new(TrapKind::Bounds, "x"));
    }
}

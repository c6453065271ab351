//! Instruction semantics, one module per dispatch category
//!
//! Each module pairs pure helpers (`fn(op, operands) -> ExecResult<_>`)
//! with an `exec_*` handler that reads operands from the frame, applies the
//! helper and writes the result.

pub(crate) mod arithmetic;
pub(crate) mod calls;
pub(crate) mod casts;
pub(crate) mod comparison;
pub(crate) mod control_flow;
pub(crate) mod errors;
pub(crate) mod memory;

use super::Interpreter;
use crate::frame::Frame;
use crate::trap::ExecResult;
use tern_il::Instr;

/// Both operands of a binary integer instruction
#[inline]
pub(crate) fn int_pair<'m>(vm: &Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<(i64, i64)> {
    Ok((
        vm.operand(frame, instr, 0)?.int()?,
        vm.operand(frame, instr, 1)?.int()?,
    ))
}

/// Both operands of a binary float instruction
#[inline]
pub(crate) fn float_pair<'m>(vm: &Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<(f64, f64)> {
    Ok((
        vm.operand(frame, instr, 0)?.float()?,
        vm.operand(frame, instr, 1)?.float()?,
    ))
}

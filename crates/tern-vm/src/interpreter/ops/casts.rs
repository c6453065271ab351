//! Conversions between integer kinds and `f64`

use crate::frame::Frame;
use crate::interpreter::{Flow, Interpreter};
use crate::slot::Slot;
use crate::trap::{ExecResult, Trap, TrapKind};
use tern_il::{Instr, Opcode, Type};

fn range_of(ty: Type) -> ExecResult<(i64, i64)> {
    ty.int_range()
        .ok_or_else(|| Trap::invalid(format!("cast target {} is not an integer type", ty)))
}

/// Round `value` half-to-even and convert to `ty`
///
/// Traps [`TrapKind::InvalidCast`] on NaN, infinities and results outside
/// the target range.
pub(crate) fn fp_to_si(value: f64, ty: Type) -> ExecResult<i64> {
    let (lo, hi) = range_of(ty)?;
    let rounded = value.round_ties_even();
    // `hi as f64` rounds up for i64, so the upper check is exclusive.
    if rounded.is_nan() || rounded < lo as f64 || rounded >= hi as f64 + 1.0 {
        return Err(Trap::new(
            TrapKind::InvalidCast,
            format!("{:?} is not representable as {}", value, ty),
        ));
    }
    Ok(rounded as i64)
}

/// Check that `value` fits in `ty`
pub(crate) fn si_narrow(value: i64, ty: Type) -> ExecResult<i64> {
    let (lo, hi) = range_of(ty)?;
    if value < lo || value > hi {
        return Err(Trap::new(
            TrapKind::InvalidCast,
            format!("{} does not fit in {}", value, ty),
        ));
    }
    Ok(value)
}

pub(crate) fn exec_cast<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    let input = vm.operand(frame, instr, 0)?;
    let value = match instr.op {
        Opcode::Sitofp => Slot::Float(input.int()? as f64),
        Opcode::CastFpToSiRteChk => Slot::Int(fp_to_si(input.float()?, instr.ty)?),
        Opcode::CastSiNarrowChk => Slot::Int(si_narrow(input.int()?, instr.ty)?),
        // Narrow integers are already held sign-extended.
        Opcode::CastSiWiden => Slot::Int(input.int()?),
        Opcode::Zext1 | Opcode::Trunc1 => Slot::Int(input.int()? & 1),
        op => return Err(Trap::invalid(format!("`{}` is not a cast", op))),
    };
    vm.set_result(frame, instr, value)
}

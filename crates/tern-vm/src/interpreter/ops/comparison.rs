//! Integer and float comparisons

use super::{float_pair, int_pair};
use crate::frame::Frame;
use crate::interpreter::{Flow, Interpreter};
use crate::slot::Slot;
use crate::trap::{ExecResult, Trap};
use tern_il::{Instr, Opcode};

/// Signed and unsigned integer comparison
pub(crate) fn compare_ints(op: Opcode, a: i64, b: i64) -> ExecResult<bool> {
    let (ua, ub) = (a as u64, b as u64);
    Ok(match op {
        Opcode::ICmpEq => a == b,
        Opcode::ICmpNe => a != b,
        Opcode::SCmpLt => a < b,
        Opcode::SCmpLe => a <= b,
        Opcode::SCmpGt => a > b,
        Opcode::SCmpGe => a >= b,
        Opcode::UCmpLt => ua < ub,
        Opcode::UCmpLe => ua <= ub,
        Opcode::UCmpGt => ua > ub,
        Opcode::UCmpGe => ua >= ub,
        _ => return Err(Trap::invalid(format!("`{}` is not an integer comparison", op))),
    })
}

/// Ordered float comparison; NaN is unequal to everything
pub(crate) fn compare_floats(op: Opcode, a: f64, b: f64) -> ExecResult<bool> {
    Ok(match op {
        Opcode::FCmpEq => a == b,
        Opcode::FCmpNe => a != b,
        Opcode::FCmpLt => a < b,
        Opcode::FCmpLe => a <= b,
        Opcode::FCmpGt => a > b,
        Opcode::FCmpGe => a >= b,
        _ => return Err(Trap::invalid(format!("`{}` is not a float comparison", op))),
    })
}

fn is_float_compare(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::FCmpEq
            | Opcode::FCmpNe
            | Opcode::FCmpLt
            | Opcode::FCmpLe
            | Opcode::FCmpGt
            | Opcode::FCmpGe
    )
}

pub(crate) fn exec_compare<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    let result = if is_float_compare(instr.op) {
        let (a, b) = float_pair(vm, frame, instr)?;
        compare_floats(instr.op, a, b)?
    } else {
        let (a, b) = int_pair(vm, frame, instr)?;
        compare_ints(instr.op, a, b)?
    };
    vm.set_result(frame, instr, Slot::bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_vs_unsigned() {
        assert!(compare_ints(Opcode::SCmpLt, -1, 0).unwrap());
        assert!(!compare_ints(Opcode::UCmpLt, -1, 0).unwrap());
        assert!(compare_ints(Opcode::UCmpGe, -1, i64::MAX).unwrap());
        assert!(compare_ints(Opcode::ICmpNe, 1, 2).unwrap());
    }

    #[test]
    fn test_nan_is_unordered() {
        let nan = f64::NAN;
        for op in [
            Opcode::FCmpEq,
            Opcode::FCmpLt,
            Opcode::FCmpLe,
            Opcode::FCmpGt,
            Opcode::FCmpGe,
        ] {
            assert!(!compare_floats(op, nan, nan).unwrap(), "{}", op);
            assert!(!compare_floats(op, nan, 1.0).unwrap(), "{}", op);
        }
        assert!(compare_floats(Opcode::FCmpNe, nan, nan).unwrap());
        assert!(compare_floats(Opcode::FCmpLe, -0.0, 0.0).unwrap());
    }

    #[test]
    fn test_category_check() {
        assert!(is_float_compare(Opcode::FCmpGe));
        assert!(!is_float_compare(Opcode::UCmpGe));
        assert!(compare_floats(Opcode::ICmpEq, 1.0, 1.0).is_err());
    }
}

//! Integer, bitwise and float arithmetic

use super::{float_pair, int_pair};
use crate::frame::Frame;
use crate::interpreter::{Flow, Interpreter};
use crate::slot::Slot;
use crate::trap::{ExecResult, Trap, TrapKind};
use tern_il::{Instr, Opcode};

fn overflow(op: Opcode, a: i64, b: i64) -> Trap {
    Trap::new(
        TrapKind::Overflow,
        format!("integer overflow in {} {}, {}", op, a, b),
    )
}

fn divide_by_zero(op: Opcode) -> Trap {
    Trap::new(TrapKind::DivideByZero, format!("division by zero in {}", op))
}

/// Integer arithmetic on `i64`
///
/// `add`, `sub` and `mul` wrap; the `.ovf` forms trap on signed overflow.
/// Division by zero traps for all four division opcodes and
/// `sdiv i64::MIN, -1` traps as an overflow. `srem i64::MIN, -1` is 0.
pub(crate) fn int_arith(op: Opcode, a: i64, b: i64) -> ExecResult<i64> {
    match op {
        Opcode::Add => Ok(a.wrapping_add(b)),
        Opcode::Sub => Ok(a.wrapping_sub(b)),
        Opcode::Mul => Ok(a.wrapping_mul(b)),
        Opcode::IAddOvf => a.checked_add(b).ok_or_else(|| overflow(op, a, b)),
        Opcode::ISubOvf => a.checked_sub(b).ok_or_else(|| overflow(op, a, b)),
        Opcode::IMulOvf => a.checked_mul(b).ok_or_else(|| overflow(op, a, b)),
        Opcode::SDiv => {
            if b == 0 {
                return Err(divide_by_zero(op));
            }
            a.checked_div(b).ok_or_else(|| overflow(op, a, b))
        }
        Opcode::SRem => {
            if b == 0 {
                return Err(divide_by_zero(op));
            }
            Ok(a.wrapping_rem(b))
        }
        Opcode::UDiv => {
            if b == 0 {
                return Err(divide_by_zero(op));
            }
            Ok(((a as u64) / (b as u64)) as i64)
        }
        Opcode::URem => {
            if b == 0 {
                return Err(divide_by_zero(op));
            }
            Ok(((a as u64) % (b as u64)) as i64)
        }
        _ => Err(Trap::invalid(format!("`{}` is not integer arithmetic", op))),
    }
}

/// Bitwise operations on `i64`; shift amounts are taken modulo 64
pub(crate) fn bitwise(op: Opcode, a: i64, b: i64) -> ExecResult<i64> {
    let shift = (b & 63) as u32;
    match op {
        Opcode::And => Ok(a & b),
        Opcode::Or => Ok(a | b),
        Opcode::Xor => Ok(a ^ b),
        Opcode::Shl => Ok(a.wrapping_shl(shift)),
        Opcode::LShr => Ok(((a as u64) >> shift) as i64),
        Opcode::AShr => Ok(a >> shift),
        _ => Err(Trap::invalid(format!("`{}` is not a bitwise operation", op))),
    }
}

/// IEEE float arithmetic; never traps
pub(crate) fn float_arith(op: Opcode, a: f64, b: f64) -> ExecResult<f64> {
    match op {
        Opcode::FAdd => Ok(a + b),
        Opcode::FSub => Ok(a - b),
        Opcode::FMul => Ok(a * b),
        Opcode::FDiv => Ok(a / b),
        _ => Err(Trap::invalid(format!("`{}` is not float arithmetic", op))),
    }
}

pub(crate) fn exec_int_arith<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    let (a, b) = int_pair(vm, frame, instr)?;
    let value = int_arith(instr.op, a, b)?;
    vm.set_result(frame, instr, Slot::Int(value))
}

pub(crate) fn exec_bitwise<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    let (a, b) = int_pair(vm, frame, instr)?;
    let value = bitwise(instr.op, a, b)?;
    vm.set_result(frame, instr, Slot::Int(value))
}

pub(crate) fn exec_float_arith<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    let (a, b) = float_pair(vm, frame, instr)?;
    let value = float_arith(instr.op, a, b)?;
    vm.set_result(frame, instr, Slot::Float(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_and_checked() {
        assert_eq!(int_arith(Opcode::Add, i64::MAX, 1).unwrap(), i64::MIN);
        assert_eq!(int_arith(Opcode::Mul, 3, -4).unwrap(), -12);
        assert_eq!(
            int_arith(Opcode::IAddOvf, i64::MAX, 1).unwrap_err().kind,
            TrapKind::Overflow
        );
        assert_eq!(
            int_arith(Opcode::ISubOvf, i64::MIN, 1).unwrap_err().kind,
            TrapKind::Overflow
        );
        assert_eq!(
            int_arith(Opcode::IMulOvf, i64::MAX, 2).unwrap_err().kind,
            TrapKind::Overflow
        );
        assert_eq!(int_arith(Opcode::IMulOvf, 6, 7).unwrap(), 42);
    }

    #[test]
    fn test_division_edges() {
        for op in [Opcode::SDiv, Opcode::SRem, Opcode::UDiv, Opcode::URem] {
            assert_eq!(int_arith(op, 1, 0).unwrap_err().kind, TrapKind::DivideByZero);
        }
        assert_eq!(
            int_arith(Opcode::SDiv, i64::MIN, -1).unwrap_err().kind,
            TrapKind::Overflow
        );
        assert_eq!(int_arith(Opcode::SRem, i64::MIN, -1).unwrap(), 0);
        assert_eq!(int_arith(Opcode::SDiv, -7, 2).unwrap(), -3);
        assert_eq!(int_arith(Opcode::SRem, -7, 2).unwrap(), -1);
        assert_eq!(int_arith(Opcode::UDiv, -1, 2).unwrap(), i64::MAX);
        assert_eq!(int_arith(Opcode::URem, -1, 10).unwrap(), 5);
    }

    #[test]
    fn test_shifts_are_masked() {
        assert_eq!(bitwise(Opcode::Shl, 1, 65).unwrap(), 2);
        assert_eq!(bitwise(Opcode::LShr, -1, 63).unwrap(), 1);
        assert_eq!(bitwise(Opcode::AShr, -8, 1).unwrap(), -4);
        assert_eq!(bitwise(Opcode::Xor, 0b1100, 0b1010).unwrap(), 0b0110);
    }

    #[test]
    fn test_float_ops() {
        assert_eq!(float_arith(Opcode::FDiv, 1.0, 0.0).unwrap(), f64::INFINITY);
        assert!(float_arith(Opcode::FSub, f64::NAN, 1.0).unwrap().is_nan());
        assert_eq!(
            float_arith(Opcode::Add, 1.0, 1.0).unwrap_err().kind,
            TrapKind::InvalidOperation
        );
    }
}

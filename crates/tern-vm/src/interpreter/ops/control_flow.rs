//! Branches, returns and explicit traps

use crate::frame::Frame;
use crate::interpreter::{Flow, Interpreter};
use crate::slot::Slot;
use crate::trap::{ExecResult, Trap, TrapKind};
use tern_il::{Instr, Opcode, Value};

/// Successor index taken by `switch.i32` for `scrutinee`
///
/// Case values follow the scrutinee in the operand list; case `i` jumps to
/// label `i + 1` and label 0 is the default.
pub(crate) fn switch_target(scrutinee: i64, cases: &[Value]) -> ExecResult<usize> {
    for (i, case) in cases.iter().enumerate() {
        match case {
            Value::ConstInt(v) if *v == scrutinee => return Ok(i + 1),
            Value::ConstInt(_) => {}
            _ => return Err(Trap::invalid("switch case is not an integer constant")),
        }
    }
    Ok(0)
}

pub(crate) fn exec_control<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    match instr.op {
        Opcode::Br => vm.enter_block(frame, instr, 0),
        Opcode::CBr => {
            let taken = if vm.operand(frame, instr, 0)?.int()? != 0 { 0 } else { 1 };
            vm.enter_block(frame, instr, taken)
        }
        Opcode::SwitchI32 => {
            let scrutinee = vm.operand(frame, instr, 0)?.int()?;
            let index = switch_target(scrutinee, instr.operands.get(1..).unwrap_or(&[]))?;
            vm.enter_block(frame, instr, index)
        }
        Opcode::Ret => {
            let value = match instr.operands.first() {
                Some(v) => vm.eval(frame, v)?,
                None => Slot::Void,
            };
            Ok(Flow::Return(value))
        }
        Opcode::Trap => Err(Trap::new(TrapKind::RuntimeError, "explicit trap")),
        Opcode::TrapFromErr => {
            let err = vm.operand(frame, instr, 0)?.error()?;
            let message = match err.message {
                Some(handle) => vm.string_text(handle)?,
                None => format!("error code {}", err.code),
            };
            Err(Trap::new(err.kind, message))
        }
        op => Err(Trap::invalid(format!("`{}` is not a control-flow operation", op))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_target() {
        let cases = [Value::ConstInt(1), Value::ConstInt(2)];
        assert_eq!(switch_target(1, &cases).unwrap(), 1);
        assert_eq!(switch_target(2, &cases).unwrap(), 2);
        assert_eq!(switch_target(3, &cases).unwrap(), 0);
        assert_eq!(switch_target(0, &[]).unwrap(), 0);
        assert!(switch_target(0, &[Value::NullPtr]).is_err());
    }
}

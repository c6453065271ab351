//! Error values

use crate::frame::Frame;
use crate::interpreter::{Flow, Interpreter};
use crate::slot::{ErrorValue, Slot};
use crate::trap::{ExecResult, Trap};
use tern_il::{Instr, Opcode};

pub(crate) fn exec_error_op<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    let value = match instr.op {
        Opcode::TrapErr => {
            let code = vm.operand(frame, instr, 0)?.int()?;
            let message = vm.operand(frame, instr, 1)?.string()?;
            Slot::Error(ErrorValue::from_code(code as i32, message))
        }
        Opcode::ErrGetCode => Slot::Int(vm.operand(frame, instr, 0)?.error()?.code as i64),
        Opcode::ErrGetKind => Slot::Int(vm.operand(frame, instr, 0)?.error()?.kind.code() as i64),
        op => return Err(Trap::invalid(format!("`{}` is not an error operation", op))),
    };
    vm.set_result(frame, instr, value)
}

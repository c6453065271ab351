//! Stack allocation, address arithmetic, loads and stores

use crate::frame::Frame;
use crate::interpreter::{Flow, Interpreter};
use crate::slot::Slot;
use crate::trap::{ExecResult, Trap};
use tern_il::{Instr, Opcode, Type};

pub(crate) fn exec_memory<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    let value = match instr.op {
        Opcode::Alloca => {
            let size = vm.operand(frame, instr, 0)?.int()?;
            if size < 0 {
                return Err(Trap::invalid(format!("alloca of negative size {}", size)));
            }
            let limit = vm.options.limits.frame_stack_bytes;
            Slot::Ptr(vm.memory.stack_alloc(size as u64, frame.stack_base, limit)?)
        }
        Opcode::Gep => {
            let base = vm.operand(frame, instr, 0)?.ptr()?;
            let offset = vm.operand(frame, instr, 1)?.int()?;
            Slot::Ptr(base.wrapping_add(offset as u64))
        }
        Opcode::Load => {
            let addr = vm.operand(frame, instr, 0)?.ptr()?;
            vm.memory.load(addr, instr.ty)?
        }
        Opcode::Store => {
            let addr = vm.operand(frame, instr, 0)?.ptr()?;
            let value = vm.operand(frame, instr, 1)?;
            vm.memory.store(addr, instr.ty, value)?;
            return Ok(Flow::Next);
        }
        Opcode::ConstStr => {
            let addr = vm.operand(frame, instr, 0)?.ptr()?;
            vm.memory.load(addr, Type::Str)?
        }
        op => return Err(Trap::invalid(format!("`{}` is not a memory operation", op))),
    };
    vm.set_result(frame, instr, value)
}

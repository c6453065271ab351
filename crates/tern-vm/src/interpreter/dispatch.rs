//! Dispatch strategies
//!
//! Both strategies route an instruction to the same category handler in
//! [`super::ops`], so they differ only in how the handler is found:
//!
//! - [`DispatchStrategy::Switch`] matches on the opcode directly.
//! - [`DispatchStrategy::Table`] indexes [`HANDLERS`] by the opcode's
//!   static [`DispatchCategory`](tern_il::DispatchCategory).

use super::ops::{arithmetic, calls, casts, comparison, control_flow, errors, memory};
use super::Interpreter;
use crate::frame::Frame;
use crate::options::DispatchStrategy;
use crate::slot::Slot;
use crate::trap::{ExecResult, Trap};
use tern_il::{BlockId, DispatchCategory, FuncId, Instr, Opcode, ValueId};

/// What the main loop does after an instruction
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    /// Advance to the next instruction
    Next,
    /// Continue at the start of a block (parameters already bound)
    Jump(BlockId),
    /// Push a frame for an IL function
    Call {
        func: FuncId,
        args: Vec<Slot>,
        dest: Option<ValueId>,
    },
    /// Pop the current frame
    Return(Slot),
}

/// Category handler
pub(crate) type Handler = for<'m> fn(&mut Interpreter<'m>, &Frame<'m>, &Instr) -> ExecResult<Flow>;

/// Handlers indexed by [`DispatchCategory::index`]
static HANDLERS: [Handler; DispatchCategory::COUNT] = [
    arithmetic::exec_int_arith,
    arithmetic::exec_bitwise,
    arithmetic::exec_float_arith,
    comparison::exec_compare,
    casts::exec_cast,
    memory::exec_memory,
    control_flow::exec_control,
    calls::exec_call,
    errors::exec_error_op,
    exec_internal,
];

#[inline]
pub(crate) fn dispatch<'m>(
    strategy: DispatchStrategy,
    vm: &mut Interpreter<'m>,
    frame: &Frame<'m>,
    instr: &Instr,
) -> ExecResult<Flow> {
    match strategy {
        DispatchStrategy::Switch => switch(vm, frame, instr),
        DispatchStrategy::Table => table(vm, frame, instr),
    }
}

#[inline]
fn table<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    HANDLERS[instr.op.info().dispatch.index()](vm, frame, instr)
}

fn switch<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    match instr.op {
        Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::IAddOvf
        | Opcode::ISubOvf
        | Opcode::IMulOvf
        | Opcode::SDiv
        | Opcode::SRem
        | Opcode::UDiv
        | Opcode::URem => arithmetic::exec_int_arith(vm, frame, instr),

        Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Shl | Opcode::LShr | Opcode::AShr => {
            arithmetic::exec_bitwise(vm, frame, instr)
        }

        Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv => {
            arithmetic::exec_float_arith(vm, frame, instr)
        }

        Opcode::ICmpEq
        | Opcode::ICmpNe
        | Opcode::SCmpLt
        | Opcode::SCmpLe
        | Opcode::SCmpGt
        | Opcode::SCmpGe
        | Opcode::UCmpLt
        | Opcode::UCmpLe
        | Opcode::UCmpGt
        | Opcode::UCmpGe
        | Opcode::FCmpEq
        | Opcode::FCmpNe
        | Opcode::FCmpLt
        | Opcode::FCmpLe
        | Opcode::FCmpGt
        | Opcode::FCmpGe => comparison::exec_compare(vm, frame, instr),

        Opcode::Sitofp
        | Opcode::CastFpToSiRteChk
        | Opcode::CastSiNarrowChk
        | Opcode::CastSiWiden
        | Opcode::Zext1
        | Opcode::Trunc1 => casts::exec_cast(vm, frame, instr),

        Opcode::Alloca | Opcode::Gep | Opcode::Load | Opcode::Store | Opcode::ConstStr => {
            memory::exec_memory(vm, frame, instr)
        }

        Opcode::Br
        | Opcode::CBr
        | Opcode::SwitchI32
        | Opcode::Ret
        | Opcode::Trap
        | Opcode::TrapFromErr => control_flow::exec_control(vm, frame, instr),

        Opcode::Call => calls::exec_call(vm, frame, instr),

        Opcode::TrapErr | Opcode::ErrGetCode | Opcode::ErrGetKind => {
            errors::exec_error_op(vm, frame, instr)
        }

        Opcode::EhPush
        | Opcode::EhPop
        | Opcode::EhEntry
        | Opcode::ResumeSame
        | Opcode::ResumeNext
        | Opcode::ResumeLabel => exec_internal(vm, frame, instr),
    }
}

/// Handler-based recovery opcodes never reach a verified module
fn exec_internal<'m>(_: &mut Interpreter<'m>, _: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    Err(Trap::invalid(format!("`{}` is not executable", instr.op)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_and_table_agree_on_category() {
        // Every opcode the switch routes to a handler must sit in the table
        // slot for its category.
        for &op in Opcode::ALL {
            let category = op.info().dispatch;
            let expected = match op {
                Opcode::Add | Opcode::SDiv | Opcode::IMulOvf => DispatchCategory::IntArith,
                Opcode::Shl | Opcode::Xor => DispatchCategory::Bitwise,
                Opcode::FDiv => DispatchCategory::FloatArith,
                Opcode::FCmpNe | Opcode::UCmpGe => DispatchCategory::Compare,
                Opcode::Trunc1 => DispatchCategory::Cast,
                Opcode::ConstStr => DispatchCategory::Memory,
                Opcode::SwitchI32 | Opcode::TrapFromErr => DispatchCategory::Control,
                Opcode::Call => DispatchCategory::Call,
                Opcode::TrapErr => DispatchCategory::ErrorOps,
                Opcode::ResumeLabel => DispatchCategory::Internal,
                _ => continue,
            };
            assert_eq!(category, expected, "{}", op);
        }
        assert_eq!(HANDLERS.len(), DispatchCategory::COUNT);
    }
}

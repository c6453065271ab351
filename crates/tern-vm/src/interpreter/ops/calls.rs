//! Calls to IL functions and externs
//!
//! A call to an IL function yields [`Flow::Call`] and the main loop pushes
//! the frame; an extern runs to completion inside the handler. A string
//! result with no destination register is released on return.

use crate::frame::Frame;
use crate::interpreter::{Flow, Interpreter};
use crate::trap::{ExecResult, Trap};
use tern_il::Instr;

pub(crate) fn exec_call<'m>(vm: &mut Interpreter<'m>, frame: &Frame<'m>, instr: &Instr) -> ExecResult<Flow> {
    let callee = instr
        .callee
        .as_deref()
        .ok_or_else(|| Trap::invalid("call has no callee"))?;
    let args = instr
        .operands
        .iter()
        .map(|v| vm.eval(frame, v))
        .collect::<ExecResult<Vec<_>>>()?;

    if let Some(func) = vm.function_id(callee) {
        return Ok(Flow::Call {
            func,
            args,
            dest: instr.result,
        });
    }
    let value = vm.call_extern(callee, &args)?;
    if instr.result.is_none() {
        vm.release_unbound(value)?;
        return Ok(Flow::Next);
    }
    vm.set_result(frame, instr, value)
}

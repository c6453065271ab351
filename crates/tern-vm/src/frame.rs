//! Call frames
//!
//! Frames live on an explicit stack owned by the interpreter; calls never
//! recurse on the host stack.

use crate::trap::FrameInfo;
use tern_il::{BasicBlock, BlockId, FuncId, Function, Instr, SourceLoc, ValueId};

/// One active function invocation
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame<'m> {
    /// Executing function
    pub(crate) func: &'m Function,
    /// Its id in the module
    pub(crate) func_id: FuncId,
    /// First register of this frame's window
    pub(crate) reg_base: usize,
    /// Linear memory top at entry; `alloca` storage starts here
    pub(crate) stack_base: u64,
    /// Current block
    pub(crate) block: BlockId,
    /// Index of the current instruction within the block
    pub(crate) ip: usize,
    /// Caller register receiving the return value
    pub(crate) dest: Option<ValueId>,
}

impl<'m> Frame<'m> {
    /// Frame positioned at the entry of `func`
    pub(crate) fn enter(
        func: &'m Function,
        func_id: FuncId,
        reg_base: usize,
        stack_base: u64,
        dest: Option<ValueId>,
    ) -> Self {
        Self {
            func,
            func_id,
            reg_base,
            stack_base,
            block: BlockId::ENTRY,
            ip: 0,
            dest,
        }
    }

    /// Current block
    #[inline]
    pub(crate) fn current_block(&self) -> Option<&'m BasicBlock> {
        self.func.block(self.block)
    }

    /// Instruction at the cursor
    #[inline]
    pub(crate) fn current_instr(&self) -> Option<&'m Instr> {
        self.current_block()
            .and_then(|block| block.instructions.get(self.ip))
    }

    /// Snapshot for a trap's call stack
    pub(crate) fn info(&self) -> FrameInfo {
        FrameInfo {
            function: self.func.name.clone(),
            block: self
                .current_block()
                .map(|b| b.label.clone())
                .unwrap_or_default(),
            ip: self.ip,
            loc: self
                .current_instr()
                .map_or(SourceLoc::UNKNOWN, |instr| instr.loc),
        }
    }
}

//! Interpreter configuration

use crate::defaults::{
    DEFAULT_FRAME_STACK_BYTES, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_REGISTERS, DEFAULT_MEMORY_LIMIT,
};
use tern_rt::HeapConfig;

/// How the interpreter maps an opcode to its handler
///
/// Every strategy produces identical observable behavior; the choice only
/// affects how the handler is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DispatchStrategy {
    /// One `match` over every opcode
    #[default]
    Switch,
    /// Handler table indexed by the opcode's dispatch category
    Table,
}

impl DispatchStrategy {
    /// Every strategy
    pub const ALL: [DispatchStrategy; 2] = [DispatchStrategy::Switch, DispatchStrategy::Table];

    /// Short name used in logs and benchmark ids
    pub fn name(self) -> &'static str {
        match self {
            DispatchStrategy::Switch => "switch",
            DispatchStrategy::Table => "table",
        }
    }
}

/// Resource limits for a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum number of active frames
    pub max_call_depth: usize,

    /// Maximum executed instructions (None = unlimited)
    pub max_steps: Option<u64>,

    /// Register file size in slots
    pub max_registers: usize,

    /// Maximum `alloca` bytes per frame
    pub frame_stack_bytes: usize,

    /// Maximum total linear memory in bytes
    pub memory_limit: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_steps: None,
            max_registers: DEFAULT_MAX_REGISTERS,
            frame_stack_bytes: DEFAULT_FRAME_STACK_BYTES,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl ResourceLimits {
    /// Set the step budget
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Set the call depth limit
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

/// Options for creating an [`Interpreter`](crate::Interpreter)
#[derive(Debug, Clone, Default)]
pub struct VmOptions {
    /// Dispatch strategy, fixed for the interpreter's lifetime
    pub dispatch: DispatchStrategy,

    /// Resource limits
    pub limits: ResourceLimits,

    /// Log every executed instruction at trace level
    pub trace: bool,

    /// Count executions per opcode in [`ExecStats`](crate::ExecStats)
    pub count_opcodes: bool,

    /// Runtime heap settings
    pub heap: HeapConfig,
}

impl VmOptions {
    /// Default options with the given dispatch strategy
    pub fn with_dispatch(dispatch: DispatchStrategy) -> Self {
        Self {
            dispatch,
            ..Self::default()
        }
    }
}

//! Instructions

use crate::opcode::Opcode;
use crate::types::Type;
use crate::value::{SourceLoc, Value, ValueId};

/// Maximum number of operands on a single instruction
pub const MAX_OPERANDS: usize = 64;

/// A single IL instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    /// Opcode
    pub op: Opcode,
    /// Declared result type (or the type immediate for `load`/`store`/casts)
    pub ty: Type,
    /// Destination register
    pub result: Option<ValueId>,
    /// Operands, in slot order
    pub operands: Vec<Value>,
    /// Successor labels
    pub labels: Vec<String>,
    /// Argument bundle per successor label
    pub br_args: Vec<Vec<Value>>,
    /// Callee name for `call`
    pub callee: Option<String>,
    /// Source location
    pub loc: SourceLoc,
}

impl Instr {
    /// Create an instruction with no operands
    pub fn new(op: Opcode, ty: Type) -> Self {
        Self {
            op,
            ty,
            result: None,
            operands: Vec::new(),
            labels: Vec::new(),
            br_args: Vec::new(),
            callee: None,
            loc: SourceLoc::UNKNOWN,
        }
    }

    /// Set the destination register
    pub fn with_result(mut self, result: ValueId) -> Self {
        self.result = Some(result);
        self
    }

    /// Set the operands
    pub fn with_operands(mut self, operands: impl IntoIterator<Item = Value>) -> Self {
        self.operands = operands.into_iter().collect();
        self
    }

    /// Append a successor with its argument bundle
    pub fn with_target(mut self, label: impl Into<String>, args: Vec<Value>) -> Self {
        self.labels.push(label.into());
        self.br_args.push(args);
        self
    }

    /// Set the callee name
    pub fn with_callee(mut self, callee: impl Into<String>) -> Self {
        self.callee = Some(callee.into());
        self
    }

    /// Set the source location
    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = loc;
        self
    }

    /// Whether this instruction ends a block
    #[inline]
    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }

    /// Argument bundle for successor `index` (empty when absent)
    pub fn bundle(&self, index: usize) -> &[Value] {
        self.br_args.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every value read by this instruction: operands then bundle arguments
    pub fn uses(&self) -> impl Iterator<Item = &Value> {
        self.operands.iter().chain(self.br_args.iter().flatten())
    }
}

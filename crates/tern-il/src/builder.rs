//! Module and function builders
//!
//! The builders guarantee by construction that every block ends in exactly
//! one terminator and that every branch supplies an argument bundle whose
//! arity matches the target block's parameters. Type correctness is still
//! left to the verifier.

use crate::instr::{Instr, MAX_OPERANDS};
use crate::module::{
    BasicBlock, BlockId, Extern, Function, Global, GlobalInit, Module, Param, Visibility,
};
use crate::opcode::Opcode;
use crate::types::Type;
use crate::value::{SourceLoc, StrId, Value, ValueId};
use thiserror::Error;

/// Builder misuse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Nothing selected with `switch_to_block`
    #[error("no insertion block selected")]
    NoInsertionBlock,

    /// Block id not created by this builder
    #[error("unknown block #{0}")]
    UnknownBlock(u32),

    /// Emitting into a block that already has its terminator
    #[error("block '{label}' already has a terminator")]
    BlockTerminated {
        /// Block label
        label: String,
    },

    /// `finish` with an open block
    #[error("block '{label}' has no terminator")]
    MissingTerminator {
        /// Block label
        label: String,
    },

    /// Branch bundle does not match target parameters
    #[error("argument bundle for '{label}' has {found} values, block takes {expected}")]
    BundleArity {
        /// Target label
        label: String,
        /// Target parameter count
        expected: usize,
        /// Supplied bundle length
        found: usize,
    },

    /// Terminator passed to `emit`, or non-terminator passed to `terminate`
    #[error("'{0}' cannot be emitted here")]
    Misplaced(&'static str),

    /// Operand list over [`MAX_OPERANDS`]
    #[error("{0} operands exceed the limit of {MAX_OPERANDS}")]
    TooManyOperands(usize),

    /// Duplicate label
    #[error("duplicate block label '{0}'")]
    DuplicateLabel(String),
}

/// Builder result
pub type BuildResult<T> = Result<T, BuildError>;

/// Builds one function
#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    next_value: u32,
    current: Option<BlockId>,
    terminated: Vec<bool>,
    loc: SourceLoc,
}

impl FunctionBuilder {
    /// Start a function with the given name and return type
    pub fn new(name: impl Into<String>, ret: Type) -> Self {
        Self {
            func: Function::new(name, Vec::new(), ret),
            next_value: 0,
            current: None,
            terminated: Vec::new(),
            loc: SourceLoc::UNKNOWN,
        }
    }

    /// Mark the function internal
    pub fn internal(mut self) -> Self {
        self.func.visibility = Visibility::Internal;
        self
    }

    fn fresh(&mut self, name: Option<&str>) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("t{}", id.0),
        };
        self.func.set_value_name(id, &name);
        id
    }

    /// Add a function parameter
    pub fn param(&mut self, name: &str, ty: Type) -> ValueId {
        let id = self.fresh(Some(name));
        self.func.params.push(Param {
            name: name.to_string(),
            ty,
            id,
        });
        id
    }

    /// Create a block with the given parameters
    ///
    /// The first block created is the entry block.
    pub fn create_block(&mut self, label: &str, params: &[(&str, Type)]) -> BuildResult<BlockId> {
        if self.func.find_block(label).is_some() {
            return Err(BuildError::DuplicateLabel(label.to_string()));
        }
        let mut block = BasicBlock::new(label);
        for (name, ty) in params {
            let id = self.fresh(Some(name));
            block.params.push(Param {
                name: name.to_string(),
                ty: *ty,
                id,
            });
        }
        let id = BlockId(self.func.blocks.len() as u32);
        self.func.blocks.push(block);
        self.terminated.push(false);
        Ok(id)
    }

    /// Register of block parameter `index`
    pub fn block_param(&self, block: BlockId, index: usize) -> Option<ValueId> {
        self.func
            .block(block)
            .and_then(|b| b.params.get(index))
            .map(|p| p.id)
    }

    /// Select the block receiving new instructions
    pub fn switch_to_block(&mut self, block: BlockId) -> BuildResult<()> {
        if block.index() >= self.func.blocks.len() {
            return Err(BuildError::UnknownBlock(block.0));
        }
        self.current = Some(block);
        Ok(())
    }

    /// Currently selected block
    pub fn current_block(&self) -> Option<BlockId> {
        self.current
    }

    /// Source location stamped on subsequently emitted instructions
    pub fn set_loc(&mut self, loc: SourceLoc) {
        self.loc = loc;
    }

    fn open_block(&self) -> BuildResult<BlockId> {
        let block = self.current.ok_or(BuildError::NoInsertionBlock)?;
        if self.terminated[block.index()] {
            return Err(BuildError::BlockTerminated {
                label: self.func.blocks[block.index()].label.clone(),
            });
        }
        Ok(block)
    }

    fn push(&mut self, block: BlockId, mut instr: Instr) -> BuildResult<()> {
        if instr.operands.len() > MAX_OPERANDS {
            return Err(BuildError::TooManyOperands(instr.operands.len()));
        }
        if !instr.loc.is_known() {
            instr.loc = self.loc;
        }
        self.func.blocks[block.index()].instructions.push(instr);
        Ok(())
    }

    /// Append a non-terminator instruction
    pub fn emit(&mut self, instr: Instr) -> BuildResult<()> {
        if instr.is_terminator() {
            return Err(BuildError::Misplaced(instr.op.name()));
        }
        let block = self.open_block()?;
        self.push(block, instr)
    }

    /// Append an instruction producing a fresh result register
    pub fn emit_value(&mut self, mut instr: Instr) -> BuildResult<ValueId> {
        self.open_block()?;
        let id = self.fresh(None);
        instr.result = Some(id);
        self.emit(instr)?;
        Ok(id)
    }

    /// Emit a two-operand instruction
    pub fn binary(
        &mut self,
        op: Opcode,
        ty: Type,
        lhs: impl Into<Value>,
        rhs: impl Into<Value>,
    ) -> BuildResult<ValueId> {
        self.emit_value(Instr::new(op, ty).with_operands([lhs.into(), rhs.into()]))
    }

    /// Emit a one-operand instruction
    pub fn unary(&mut self, op: Opcode, ty: Type, operand: impl Into<Value>) -> BuildResult<ValueId> {
        self.emit_value(Instr::new(op, ty).with_operands([operand.into()]))
    }

    /// Emit a call; returns the result register for non-void callees
    pub fn call(
        &mut self,
        callee: &str,
        ret: Type,
        args: Vec<Value>,
    ) -> BuildResult<Option<ValueId>> {
        let instr = Instr::new(Opcode::Call, ret)
            .with_callee(callee)
            .with_operands(args);
        if ret == Type::Void {
            self.emit(instr)?;
            Ok(None)
        } else {
            self.emit_value(instr).map(Some)
        }
    }

    /// Reserve `size` bytes in the frame stack
    pub fn alloca(&mut self, size: impl Into<Value>) -> BuildResult<ValueId> {
        self.unary(Opcode::Alloca, Type::Ptr, size)
    }

    /// Load a `ty` from `ptr`
    pub fn load(&mut self, ty: Type, ptr: impl Into<Value>) -> BuildResult<ValueId> {
        self.unary(Opcode::Load, ty, ptr)
    }

    /// Store a `ty` to `ptr`
    pub fn store(&mut self, ty: Type, ptr: impl Into<Value>, value: impl Into<Value>) -> BuildResult<()> {
        self.emit(Instr::new(Opcode::Store, ty).with_operands([ptr.into(), value.into()]))
    }

    fn check_bundle(&self, target: BlockId, args: &[Value]) -> BuildResult<String> {
        let block = self
            .func
            .block(target)
            .ok_or(BuildError::UnknownBlock(target.0))?;
        if block.params.len() != args.len() {
            return Err(BuildError::BundleArity {
                label: block.label.clone(),
                expected: block.params.len(),
                found: args.len(),
            });
        }
        Ok(block.label.clone())
    }

    /// Append the block's terminator
    pub fn terminate(&mut self, instr: Instr) -> BuildResult<()> {
        if !instr.is_terminator() {
            return Err(BuildError::Misplaced(instr.op.name()));
        }
        let block = self.open_block()?;
        self.push(block, instr)?;
        self.terminated[block.index()] = true;
        Ok(())
    }

    /// `br target(args)`
    pub fn br(&mut self, target: BlockId, args: Vec<Value>) -> BuildResult<()> {
        let label = self.check_bundle(target, &args)?;
        self.terminate(Instr::new(Opcode::Br, Type::Void).with_target(label, args))
    }

    /// `cbr cond, then(args), else(args)`
    pub fn cbr(
        &mut self,
        cond: impl Into<Value>,
        then_block: BlockId,
        then_args: Vec<Value>,
        else_block: BlockId,
        else_args: Vec<Value>,
    ) -> BuildResult<()> {
        let then_label = self.check_bundle(then_block, &then_args)?;
        let else_label = self.check_bundle(else_block, &else_args)?;
        self.terminate(
            Instr::new(Opcode::CBr, Type::Void)
                .with_operands([cond.into()])
                .with_target(then_label, then_args)
                .with_target(else_label, else_args),
        )
    }

    /// `switch.i32 scrutinee, default, case -> target...`
    ///
    /// Targets take no bundle arguments.
    pub fn switch_i32(
        &mut self,
        scrutinee: impl Into<Value>,
        default: BlockId,
        cases: &[(i32, BlockId)],
    ) -> BuildResult<()> {
        let mut instr = Instr::new(Opcode::SwitchI32, Type::Void).with_operands([scrutinee.into()]);
        let label = self.check_bundle(default, &[])?;
        instr = instr.with_target(label, Vec::new());
        for (value, target) in cases {
            let label = self.check_bundle(*target, &[])?;
            instr.operands.push(Value::ConstInt(i64::from(*value)));
            instr = instr.with_target(label, Vec::new());
        }
        self.terminate(instr)
    }

    /// `ret` or `ret value`
    pub fn ret(&mut self, value: Option<Value>) -> BuildResult<()> {
        self.terminate(Instr::new(Opcode::Ret, Type::Void).with_operands(value))
    }

    /// `trap`
    pub fn trap(&mut self) -> BuildResult<()> {
        self.terminate(Instr::new(Opcode::Trap, Type::Void))
    }

    /// Finish the function
    ///
    /// Registers are renumbered into layout order, so ids handed out while
    /// building do not carry over to the finished function.
    pub fn finish(self) -> BuildResult<Function> {
        for (block, done) in self.func.blocks.iter().zip(&self.terminated) {
            if !done {
                return Err(BuildError::MissingTerminator {
                    label: block.label.clone(),
                });
            }
        }
        let mut func = self.func;
        func.renumber();
        Ok(func)
    }
}

/// Builds a module
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    /// Empty module
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target identifier
    pub fn target(&mut self, target: impl Into<String>) -> &mut Self {
        self.module.target = Some(target.into());
        self
    }

    /// Declare an extern
    pub fn extern_fn(&mut self, name: &str, params: &[Type], ret: Type) -> &mut Self {
        self.module
            .externs
            .push(Extern::new(name, params.to_vec(), ret));
        self
    }

    /// Intern a string literal
    pub fn intern(&mut self, text: &str) -> StrId {
        self.module.strings.intern(text)
    }

    /// Declare a global
    pub fn global(&mut self, name: &str, ty: Type, init: GlobalInit, mutable: bool) -> &mut Self {
        self.module.globals.push(Global {
            name: name.to_string(),
            ty,
            init,
            mutable,
        });
        self
    }

    /// Declare a constant `str` global holding `text`
    pub fn string_global(&mut self, name: &str, text: &str) -> &mut Self {
        let id = self.intern(text);
        self.global(name, Type::Str, GlobalInit::Str(id), false)
    }

    /// Add a finished function
    pub fn function(&mut self, func: Function) -> &mut Self {
        self.module.functions.push(func);
        self
    }

    /// Finish the module
    pub fn finish(self) -> Module {
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_simple_function() {
        let mut fb = FunctionBuilder::new("main", Type::I64);
        let entry = fb.create_block("entry", &[]).unwrap();
        fb.switch_to_block(entry).unwrap();
        let sum = fb.binary(Opcode::Add, Type::I64, 2i64, 2i64).unwrap();
        fb.ret(Some(sum.into())).unwrap();
        let func = fb.finish().unwrap();
        assert_eq!(func.blocks.len(), 1);
        assert_eq!(func.blocks[0].instructions.len(), 2);
        assert!(func.blocks[0].terminator().is_some());
        assert_eq!(func.value_name(sum), "t0");
    }

    #[test]
    fn test_emit_after_terminator_rejected() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let entry = fb.create_block("entry", &[]).unwrap();
        fb.switch_to_block(entry).unwrap();
        fb.ret(None).unwrap();
        let err = fb.binary(Opcode::Add, Type::I64, 1i64, 1i64).unwrap_err();
        assert_eq!(
            err,
            BuildError::BlockTerminated {
                label: "entry".into()
            }
        );
        assert!(fb.ret(None).is_err());
    }

    #[test]
    fn test_bundle_arity_checked() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let entry = fb.create_block("entry", &[]).unwrap();
        let next = fb.create_block("next", &[("x", Type::I64)]).unwrap();
        fb.switch_to_block(entry).unwrap();
        let err = fb.br(next, vec![]).unwrap_err();
        assert!(matches!(err, BuildError::BundleArity { expected: 1, found: 0, .. }));
        fb.br(next, vec![Value::ConstInt(3)]).unwrap();
        fb.switch_to_block(next).unwrap();
        fb.ret(None).unwrap();
        assert!(fb.finish().is_ok());
    }

    #[test]
    fn test_missing_terminator() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        fb.create_block("entry", &[]).unwrap();
        assert_eq!(
            fb.finish().unwrap_err(),
            BuildError::MissingTerminator {
                label: "entry".into()
            }
        );
    }

    #[test]
    fn test_terminator_through_emit_rejected() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let entry = fb.create_block("entry", &[]).unwrap();
        fb.switch_to_block(entry).unwrap();
        assert_eq!(
            fb.emit(Instr::new(Opcode::Ret, Type::Void)),
            Err(BuildError::Misplaced("ret"))
        );
    }

    #[test]
    fn test_module_builder() {
        let mut mb = ModuleBuilder::new();
        mb.target("x86_64-unknown-linux-gnu")
            .extern_fn("rt_print_i64", &[Type::I64], Type::Void)
            .string_global(".L0", "hi");
        let module = mb.finish();
        assert_eq!(module.externs.len(), 1);
        assert_eq!(module.globals[0].init, GlobalInit::Str(StrId(0)));
        assert_eq!(module.strings.get(StrId(0)), Some("hi"));
    }
}

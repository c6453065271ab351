//! Interpreter for verified modules
//!
//! Executes one call stack at a time, strictly sequentially. The main loop
//! fetches the instruction at the top frame's cursor, hands it to the
//! configured dispatch strategy, and applies the resulting [`Flow`]:
//! advance, jump to a block, push a frame, or pop one.
//!
//! Any trap unwinds every frame and becomes the run's result.

mod dispatch;
mod ops;
mod stats;

pub(crate) use dispatch::Flow;
pub use stats::ExecStats;

use crate::frame::Frame;
use crate::memory::LinearMemory;
use crate::options::VmOptions;
use crate::register_file::RegisterFile;
use crate::registry::{ExternRegistry, ExternSignature, HostContext};
use crate::slot::Slot;
use crate::trap::{ExecResult, Trap, TrapKind};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tern_il::text::write_instr;
use tern_il::{
    BlockId, FuncId, Function, GlobalInit, Instr, Module, SourceLoc, Value, ValueId, VerifiedModule,
};
use tern_rt::{Heap, HeapHandle};

/// Register-based interpreter bound to one verified module
pub struct Interpreter<'m> {
    module: &'m Module,
    registry: Arc<ExternRegistry>,
    options: VmOptions,
    heap: Heap,
    memory: LinearMemory,
    registers: RegisterFile,
    frames: Vec<Frame<'m>>,
    /// Global name to linear memory address
    globals: FxHashMap<&'m str, u64>,
    /// Immortal heap string per string table entry
    literals: Vec<HeapHandle>,
    functions: FxHashMap<&'m str, FuncId>,
    /// Label resolution per function
    labels: Vec<FxHashMap<&'m str, BlockId>>,
    output: Vec<u8>,
    stats: ExecStats,
}

impl<'m> Interpreter<'m> {
    /// Prepare `module` for execution
    ///
    /// Interns every string literal as an immortal heap string and lays out
    /// and initializes the globals.
    pub fn new(module: &VerifiedModule<'m>, registry: Arc<ExternRegistry>, options: VmOptions) -> Self {
        let module = module.module();
        let mut heap = Heap::with_config(options.heap);

        let mut literals = Vec::with_capacity(module.strings.len());
        for (_, text) in module.strings.iter() {
            let handle = heap.string_new(text);
            if let Err(e) = heap.make_immortal(handle) {
                log::warn!("vm: literal {} stays mortal: {}", handle, e);
            }
            literals.push(handle);
        }

        let mut memory = LinearMemory::new(options.limits.memory_limit);
        let mut globals = FxHashMap::default();
        for global in &module.globals {
            let addr = memory.alloc_global(global.ty.size_in_bytes().unwrap_or(8));
            let init = match &global.init {
                GlobalInit::Zero => None,
                GlobalInit::Int(v) => Some(Slot::Int(*v)),
                GlobalInit::Float(v) => Some(Slot::Float(*v)),
                GlobalInit::Str(id) => literals.get(id.index()).map(|h| Slot::Str(Some(*h))),
            };
            if let Some(value) = init {
                if let Err(trap) = memory.store(addr, global.ty, value) {
                    log::warn!("vm: global @{} left zeroed: {}", global.name, trap);
                }
            }
            globals.insert(global.name.as_str(), addr);
        }

        let functions = module
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.as_str(), FuncId(i as u32)))
            .collect();
        let labels = module
            .functions
            .iter()
            .map(Function::block_index)
            .collect();

        log::debug!(
            "vm: loaded {} functions, {} globals, {} literals ({} dispatch)",
            module.functions.len(),
            module.globals.len(),
            literals.len(),
            options.dispatch.name()
        );

        Self {
            module,
            registry,
            registers: RegisterFile::with_max_size(options.limits.max_registers),
            stats: ExecStats::new(options.count_opcodes),
            options,
            heap,
            memory,
            frames: Vec::new(),
            globals,
            literals,
            functions,
            labels,
            output: Vec::new(),
        }
    }

    /// Run `entry` with `args` to completion
    ///
    /// Returns the entry function's return value ([`Slot::Void`] for void
    /// functions) or the trap that aborted the run.
    pub fn run(&mut self, entry: &str, args: &[Slot]) -> ExecResult<Slot> {
        self.reset();
        let func_id = self.functions.get(entry).copied().ok_or_else(|| {
            Trap::new(TrapKind::InvalidEntry, format!("no function named @{}", entry))
        })?;
        let func = self.function(func_id)?;
        if args.len() != func.params.len() {
            return Err(Trap::new(
                TrapKind::InvalidEntry,
                format!(
                    "@{} expects {} arguments, got {}",
                    entry,
                    func.params.len(),
                    args.len()
                ),
            ));
        }
        for (i, (param, arg)) in func.params.iter().zip(args).enumerate() {
            if !arg.fits(param.ty) {
                return Err(Trap::new(
                    TrapKind::InvalidEntry,
                    format!("argument {} of @{} must be {}, found {}", i, entry, param.ty, arg),
                ));
            }
        }

        if let Err(trap) = self.push_frame(func_id, args, None) {
            return Err(self.unwind(trap, SourceLoc::UNKNOWN));
        }
        self.execute()
    }

    fn execute(&mut self) -> ExecResult<Slot> {
        let mut steps: u64 = 0;
        loop {
            let Some(frame) = self.frames.last().copied() else {
                return Err(Trap::invalid("no active frame"));
            };
            let Some(instr) = frame.current_instr() else {
                let trap = Trap::invalid(format!(
                    "fell off the end of block {} in @{}",
                    frame.block.0, frame.func.name
                ));
                return Err(self.unwind(trap, SourceLoc::UNKNOWN));
            };

            steps += 1;
            if let Some(max) = self.options.limits.max_steps {
                if steps > max {
                    let trap = Trap::new(
                        TrapKind::StepLimit,
                        format!("step limit of {} instructions exhausted", max),
                    );
                    return Err(self.unwind(trap, instr.loc));
                }
            }
            self.stats.record(instr.op);
            if self.options.trace {
                log::trace!(
                    "vm: @{}:{} #{} {}",
                    frame.func.name,
                    frame.current_block().map_or("?", |b| b.label.as_str()),
                    frame.ip,
                    write_instr(self.module, frame.func, instr)
                );
            }

            let flow = dispatch::dispatch(self.options.dispatch, self, &frame, instr);
            let outcome = match flow {
                Ok(Flow::Next) => {
                    if let Some(top) = self.frames.last_mut() {
                        top.ip += 1;
                    }
                    Ok(None)
                }
                Ok(Flow::Jump(block)) => {
                    if let Some(top) = self.frames.last_mut() {
                        top.block = block;
                        top.ip = 0;
                    }
                    Ok(None)
                }
                Ok(Flow::Call { func, args, dest }) => {
                    self.push_frame(func, &args, dest).map(|()| None)
                }
                Ok(Flow::Return(value)) => self.pop_frame(value),
                Err(trap) => Err(trap),
            };
            match outcome {
                Ok(None) => {}
                Ok(Some(result)) => return Ok(result),
                Err(trap) => return Err(self.unwind(trap, instr.loc)),
            }
        }
    }

    // ---------------------------------------------------------------
    // Frames
    // ---------------------------------------------------------------

    fn function(&self, id: FuncId) -> ExecResult<&'m Function> {
        self.module
            .function_by_id(id)
            .ok_or_else(|| Trap::invalid(format!("no function with id {}", id.0)))
    }

    fn push_frame(&mut self, func_id: FuncId, args: &[Slot], dest: Option<ValueId>) -> ExecResult<()> {
        let limit = self.options.limits.max_call_depth;
        if self.frames.len() >= limit {
            return Err(Trap::new(
                TrapKind::StackOverflow,
                format!("call depth limit of {} exceeded", limit),
            ));
        }
        let func = self.function(func_id)?;
        if args.len() != func.params.len() {
            return Err(Trap::invalid(format!(
                "@{} called with {} arguments, expects {}",
                func.name,
                args.len(),
                func.params.len()
            )));
        }
        let base = self.registers.alloc_frame(func.register_count())?;
        for (param, value) in func.params.iter().zip(args) {
            self.registers.set(base, param.id, *value)?;
        }
        self.frames
            .push(Frame::enter(func, func_id, base, self.memory.top(), dest));

        self.stats.calls += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.frames.len());
        self.stats.peak_registers = self.stats.peak_registers.max(self.registers.top());
        log::debug!("vm: enter @{} (depth {})", func.name, self.frames.len());
        Ok(())
    }

    /// Pop the top frame; returns the run's result when it was the last
    fn pop_frame(&mut self, value: Slot) -> ExecResult<Option<Slot>> {
        let Some(done) = self.frames.pop() else {
            return Err(Trap::invalid("return without an active frame"));
        };
        self.registers.free_frame(done.reg_base);
        self.memory.stack_reset(done.stack_base);
        log::debug!("vm: leave @{} (depth {})", done.func.name, self.frames.len());

        match self.frames.last_mut() {
            None => Ok(Some(value)),
            Some(caller) => {
                caller.ip += 1;
                let caller_base = caller.reg_base;
                match done.dest {
                    Some(dest) => self.registers.set(caller_base, dest, value)?,
                    None => self.release_unbound(value)?,
                }
                Ok(None)
            }
        }
    }

    /// Attach location and call stack to `trap`, then drop every frame
    fn unwind(&mut self, mut trap: Trap, loc: SourceLoc) -> Trap {
        if !trap.loc.is_known() {
            trap.loc = loc;
        }
        trap.call_stack = self.frames.iter().rev().map(Frame::info).collect();
        log::debug!("vm: {}", trap);
        self.reset();
        trap
    }

    fn reset(&mut self) {
        self.frames.clear();
        self.registers.clear();
        self.memory.stack_reset(self.memory.stack_base());
    }

    // ---------------------------------------------------------------
    // Operands and results
    // ---------------------------------------------------------------

    /// Current value of an operand
    pub(crate) fn eval(&self, frame: &Frame<'m>, value: &Value) -> ExecResult<Slot> {
        match value {
            Value::Temp(id) => match self.registers.get(frame.reg_base, *id)? {
                Slot::Void => Err(Trap::invalid(format!(
                    "%{} is read before it is defined on this path in @{}",
                    frame.func.value_name(*id),
                    frame.func.name
                ))),
                slot => Ok(slot),
            },
            Value::ConstInt(v) => Ok(Slot::Int(*v)),
            Value::ConstFloat(v) => Ok(Slot::Float(*v)),
            Value::ConstStr(id) => self
                .literals
                .get(id.index())
                .map(|h| Slot::Str(Some(*h)))
                .ok_or_else(|| Trap::invalid(format!("unknown string literal #{}", id.0))),
            Value::GlobalAddr(name) => self
                .globals
                .get(name.as_str())
                .map(|addr| Slot::Ptr(*addr))
                .ok_or_else(|| Trap::invalid(format!("unknown global @{}", name))),
            Value::NullPtr => Ok(Slot::Ptr(0)),
        }
    }

    /// Operand `index` of `instr`
    pub(crate) fn operand(&self, frame: &Frame<'m>, instr: &Instr, index: usize) -> ExecResult<Slot> {
        let value = instr.operands.get(index).ok_or_else(|| {
            Trap::invalid(format!("`{}` is missing operand {}", instr.op, index))
        })?;
        self.eval(frame, value)
    }

    /// Write the instruction's result register, if it has one
    pub(crate) fn set_result(&mut self, frame: &Frame<'m>, instr: &Instr, value: Slot) -> ExecResult<Flow> {
        if let Some(id) = instr.result {
            self.registers.set(frame.reg_base, id, value)?;
        }
        Ok(Flow::Next)
    }

    /// Bind successor `index`'s argument bundle and jump to it
    pub(crate) fn enter_block(&mut self, frame: &Frame<'m>, instr: &Instr, index: usize) -> ExecResult<Flow> {
        let label = instr.labels.get(index).ok_or_else(|| {
            Trap::invalid(format!("`{}` has no successor {}", instr.op, index))
        })?;
        let target = self
            .labels
            .get(frame.func_id.index())
            .and_then(|map| map.get(label.as_str()))
            .copied()
            .ok_or_else(|| {
                Trap::invalid(format!("unknown label ^{} in @{}", label, frame.func.name))
            })?;
        let block = frame
            .func
            .block(target)
            .ok_or_else(|| Trap::invalid(format!("missing block ^{}", label)))?;

        // Evaluate the whole bundle before writing any parameter.
        let values = instr
            .bundle(index)
            .iter()
            .map(|v| self.eval(frame, v))
            .collect::<ExecResult<Vec<_>>>()?;
        if values.len() != block.params.len() {
            return Err(Trap::invalid(format!(
                "^{} expects {} arguments, got {}",
                label,
                block.params.len(),
                values.len()
            )));
        }
        for (param, value) in block.params.iter().zip(values) {
            self.registers.set(frame.reg_base, param.id, value)?;
        }
        Ok(Flow::Jump(target))
    }

    /// Id of an IL function by name
    pub(crate) fn function_id(&self, name: &str) -> Option<FuncId> {
        self.functions.get(name).copied()
    }

    /// Invoke a host extern
    pub(crate) fn call_extern(&mut self, name: &str, args: &[Slot]) -> ExecResult<Slot> {
        let entry = self.registry.resolve(name).ok_or_else(|| {
            Trap::new(
                TrapKind::UnresolvedExtern,
                format!("unresolved extern @{}", name),
            )
        })?;
        let signature = &entry.signature;
        if let Some(decl) = self.module.extern_decl(name) {
            if !signature.matches(decl) {
                return Err(Trap::new(
                    TrapKind::ExternSignatureMismatch,
                    format!(
                        "extern @{} is declared {} but registered {}",
                        name,
                        ExternSignature::new(decl.params.clone(), decl.ret),
                        signature
                    ),
                ));
            }
        }
        let arity_ok = args.len() == signature.params.len();
        if !arity_ok || args.iter().zip(&signature.params).any(|(a, ty)| !a.fits(*ty)) {
            let found = args.iter().map(Slot::kind_name).collect::<Vec<_>>().join(", ");
            return Err(Trap::new(
                TrapKind::ExternSignatureMismatch,
                format!("extern @{} expects {}, called with ({})", name, signature, found),
            ));
        }

        self.stats.extern_calls += 1;
        log::debug!("vm: extern @{}", entry.name);
        let result = {
            let mut ctx = HostContext::new(&mut self.heap, &mut self.output);
            (entry.handler)(&mut ctx, args)
        };
        match result {
            Ok(value) if value.fits(signature.ret) => Ok(value),
            Ok(value) => Err(Trap::new(
                TrapKind::ExternSignatureMismatch,
                format!("extern @{} returned {}, expected {}", name, value, signature.ret),
            )),
            Err(e) => Err(Trap::new(e.trap_kind(), format!("extern @{}: {}", name, e))),
        }
    }

    /// Release a call's string result when the call site binds no result
    pub(crate) fn release_unbound(&mut self, value: Slot) -> ExecResult<()> {
        if let Slot::Str(Some(handle)) = value {
            self.heap
                .release(handle)
                .map_err(|e| Trap::invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Text of a heap string, for trap messages
    pub(crate) fn string_text(&self, handle: HeapHandle) -> ExecResult<String> {
        self.heap
            .string_as_str(handle)
            .map(str::to_string)
            .map_err(|e| Trap::invalid(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Host access
    // ---------------------------------------------------------------

    /// The module being executed
    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Interpreter options
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Extern registry consulted for calls
    pub fn registry(&self) -> &Arc<ExternRegistry> {
        &self.registry
    }

    /// Runtime heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable runtime heap, for hosts preparing arguments
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Output written by the program so far
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Take the program output, leaving the buffer empty
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Execution statistics
    pub fn stats(&self) -> &ExecStats {
        &self.stats
    }

    /// Reset execution statistics
    pub fn reset_stats(&mut self) {
        self.stats = ExecStats::new(self.options.count_opcodes);
    }

    /// Address of a global in linear memory
    pub fn global_address(&self, name: &str) -> Option<u64> {
        self.globals.get(name).copied()
    }

    /// Linear memory
    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DispatchStrategy;
    use tern_il::{parse_module, Type};

    fn run_source(source: &str, entry: &str, args: &[Slot]) -> ExecResult<Slot> {
        let module = parse_module(source).unwrap();
        let verified = VerifiedModule::new(&module).unwrap();
        let mut vm = Interpreter::new(&verified, Arc::new(ExternRegistry::new()), VmOptions::default());
        vm.run(entry, args)
    }

    #[test]
    fn test_add_returns_four() {
        let source = "il 0.2\nfunc @main() -> i64 {\nentry:\n  %v0 = add 2, 2\n  ret %v0\n}\n";
        assert_eq!(run_source(source, "main", &[]).unwrap(), Slot::Int(4));
    }

    #[test]
    fn test_invalid_entry() {
        let source = "il 0.2\nfunc @f(%a: i32) -> void {\nentry:\n  ret\n}\n";
        assert_eq!(
            run_source(source, "missing", &[]).unwrap_err().kind,
            TrapKind::InvalidEntry
        );
        assert_eq!(
            run_source(source, "f", &[]).unwrap_err().kind,
            TrapKind::InvalidEntry
        );
        let trap = run_source(source, "f", &[Slot::Int(1 << 40)]).unwrap_err();
        assert_eq!(trap.kind, TrapKind::InvalidEntry);
        assert!(trap.message.contains("must be i32"));
        assert_eq!(run_source(source, "f", &[Slot::Int(1)]).unwrap(), Slot::Void);
    }

    #[test]
    fn test_globals_are_initialized() {
        let source = "il 0.2\n\
                      global const str @.L0 = \"hi\"\n\
                      global i32 @n = -5\n\
                      func @main() -> i64 {\n\
                      entry:\n\
                        %v = load i32, @n\n\
                        %w = cast.si_widen %v\n\
                        ret %w\n\
                      }\n";
        let module = parse_module(source).unwrap();
        let verified = VerifiedModule::new(&module).unwrap();
        let mut vm = Interpreter::new(&verified, Arc::new(ExternRegistry::new()), VmOptions::default());
        assert_eq!(vm.run("main", &[]).unwrap(), Slot::Int(-5));

        let addr = vm.global_address(".L0").unwrap();
        let Slot::Str(Some(h)) = vm.memory().load(addr, Type::Str).unwrap() else {
            panic!("expected a string handle");
        };
        assert_eq!(vm.heap().string_as_str(h).unwrap(), "hi");
        assert_eq!(vm.heap().mortal_objects(), 0);
    }

    #[test]
    fn test_run_is_repeatable() {
        let source = "il 0.2\nfunc @main(%a: i64) -> i64 {\nentry:\n  %p = alloca 8\n  store i64, %p, %a\n  %v = load i64, %p\n  ret %v\n}\n";
        let module = parse_module(source).unwrap();
        let verified = VerifiedModule::new(&module).unwrap();
        for strategy in DispatchStrategy::ALL {
            let mut vm = Interpreter::new(
                &verified,
                Arc::new(ExternRegistry::new()),
                VmOptions::with_dispatch(strategy),
            );
            let top = vm.memory().top();
            assert_eq!(vm.run("main", &[Slot::Int(3)]).unwrap(), Slot::Int(3));
            assert_eq!(vm.run("main", &[Slot::Int(4)]).unwrap(), Slot::Int(4));
            assert_eq!(vm.memory().top(), top);
            assert_eq!(vm.stats().calls, 2);
        }
    }
}

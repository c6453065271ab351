//! Per-function structural checks

use super::module_checks::Symbols;
use super::typing::OperandTy;
use super::{Diagnostic, DiagnosticCode, Report};
use crate::instr::Instr;
use crate::module::{BlockId, Function, Module};
use crate::text::write_instr;
use crate::types::Type;
use crate::value::{Value, ValueId};
use rustc_hash::FxHashMap;

/// Where a register is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefSite {
    Param,
    BlockParam(BlockId),
    Instr(BlockId),
}

pub(crate) struct FunctionVerifier<'a, 'c> {
    pub(super) module: &'a Module,
    pub(super) symbols: &'a Symbols<'a>,
    pub(super) func: &'a Function,
    report: &'a mut Report<'c>,
    pub(super) labels: FxHashMap<&'a str, BlockId>,
    types: Vec<Option<Type>>,
    defs: Vec<Option<DefSite>>,
    /// Registers visible at the current instruction
    visible: Vec<bool>,
    block: BlockId,
    instr: usize,
}

impl<'a, 'c> FunctionVerifier<'a, 'c> {
    pub(crate) fn new(
        module: &'a Module,
        symbols: &'a Symbols<'a>,
        func: &'a Function,
        report: &'a mut Report<'c>,
    ) -> Self {
        let registers = func.register_count();
        Self {
            module,
            symbols,
            func,
            report,
            labels: FxHashMap::default(),
            types: vec![None; registers],
            defs: vec![None; registers],
            visible: vec![false; registers],
            block: BlockId::ENTRY,
            instr: 0,
        }
    }

    pub(crate) fn run(mut self) {
        if self.func.blocks.is_empty() {
            self.emit_fn(Diagnostic::error(
                DiagnosticCode::MissingEntry,
                "function has no blocks",
            ));
            return;
        }
        if self.func.params.iter().any(|p| p.ty == Type::Void) {
            self.emit_fn(Diagnostic::error(
                DiagnosticCode::InvalidBlockParam,
                "function parameters cannot be void",
            ));
        }
        self.collect_labels();
        self.collect_definitions();
        let func = self.func;
        if let Some(entry) = func.entry() {
            if !entry.params.is_empty() {
                self.emit_block(
                    BlockId::ENTRY,
                    Diagnostic::error(
                        DiagnosticCode::EntryBlockParams,
                        format!("entry block '{}' must not declare parameters", entry.label),
                    ),
                );
            }
        }
        for index in 0..self.func.blocks.len() {
            self.check_block(BlockId(index as u32));
        }
    }

    // ---------------------------------------------------------------
    // Reporting
    // ---------------------------------------------------------------

    fn emit_fn(&mut self, diagnostic: Diagnostic) {
        self.report.push(diagnostic.in_function(&self.func.name));
    }

    fn emit_block(&mut self, block: BlockId, diagnostic: Diagnostic) {
        let func = self.func;
        let label = func.blocks[block.index()].label.as_str();
        self.report
            .push(diagnostic.in_function(&self.func.name).in_block(label));
    }

    /// Report against the instruction currently being checked
    pub(super) fn emit(&mut self, diagnostic: Diagnostic) {
        self.emit_at(self.block, self.instr, diagnostic);
    }

    fn emit_at(&mut self, block: BlockId, index: usize, diagnostic: Diagnostic) {
        let func = self.func;
        let bb = &func.blocks[block.index()];
        let diagnostic = match bb.instructions.get(index) {
            Some(instr) => {
                let snippet = write_instr(self.module, self.func, instr);
                diagnostic.at_instr(index, snippet, instr.loc)
            }
            None => diagnostic,
        };
        self.report.push(
            diagnostic
                .in_function(&self.func.name)
                .in_block(&bb.label),
        );
    }

    pub(super) fn value_label(&self, id: ValueId) -> String {
        format!("%{}", self.func.value_name(id))
    }

    // ---------------------------------------------------------------
    // Labels and definitions
    // ---------------------------------------------------------------

    fn collect_labels(&mut self) {
        let func = self.func;
        for (index, block) in func.blocks.iter().enumerate() {
            let id = BlockId(index as u32);
            if self.labels.contains_key(block.label.as_str()) {
                self.emit_block(
                    id,
                    Diagnostic::error(
                        DiagnosticCode::DuplicateLabel,
                        format!("duplicate block label '{}'", block.label),
                    ),
                );
            } else {
                self.labels.insert(block.label.as_str(), id);
            }
        }
    }

    fn define(&mut self, id: ValueId, ty: Type, site: DefSite) -> bool {
        let slot = id.index();
        if self.defs[slot].is_some() {
            return false;
        }
        self.defs[slot] = Some(site);
        self.types[slot] = Some(ty);
        true
    }

    fn collect_definitions(&mut self) {
        let func = self.func;
        for param in &func.params {
            if !self.define(param.id, param.ty, DefSite::Param) {
                self.emit_fn(Diagnostic::error(
                    DiagnosticCode::DuplicateDefinition,
                    format!("parameter {} is defined twice", self.value_label(param.id)),
                ));
            }
        }
        for (b, block) in func.blocks.iter().enumerate() {
            let bid = BlockId(b as u32);
            for param in &block.params {
                if param.ty == Type::Void {
                    self.emit_block(
                        bid,
                        Diagnostic::error(
                            DiagnosticCode::InvalidBlockParam,
                            format!("block parameter {} cannot be void", self.value_label(param.id)),
                        ),
                    );
                }
                if !self.define(param.id, param.ty, DefSite::BlockParam(bid)) {
                    self.emit_block(
                        bid,
                        Diagnostic::error(
                            DiagnosticCode::DuplicateDefinition,
                            format!("{} is already defined", self.value_label(param.id)),
                        ),
                    );
                }
            }
            for (i, instr) in block.instructions.iter().enumerate() {
                if let Some(result) = instr.result {
                    if !self.define(result, instr.ty, DefSite::Instr(bid)) {
                        self.emit_at(
                            bid,
                            i,
                            Diagnostic::error(
                                DiagnosticCode::DuplicateDefinition,
                                format!("{} is already defined", self.value_label(result)),
                            ),
                        );
                    }
                }
            }
        }
        for param in &func.params {
            self.visible[param.id.index()] = true;
        }
    }

    // ---------------------------------------------------------------
    // Operand typing
    // ---------------------------------------------------------------

    /// Type of an operand, reporting undefined references once per use
    pub(super) fn operand_ty(&mut self, value: &Value) -> OperandTy {
        match value {
            Value::Temp(id) => {
                let slot = id.index();
                if slot >= self.visible.len() || self.defs[slot].is_none() {
                    let name = self.value_label(*id);
                    self.emit(Diagnostic::error(
                        DiagnosticCode::UndefinedValue,
                        format!("use of undefined value {}", name),
                    ));
                    return OperandTy::Unknown;
                }
                if !self.visible[slot] {
                    let message = match self.defs[slot] {
                        Some(DefSite::BlockParam(b)) => format!(
                            "{} is a parameter of block '{}' and is not visible here",
                            self.value_label(*id),
                            self.func.blocks[b.index()].label
                        ),
                        _ => format!("{} is used before its definition", self.value_label(*id)),
                    };
                    self.emit(Diagnostic::error(DiagnosticCode::UndefinedValue, message));
                    return OperandTy::Unknown;
                }
                self.types[slot].map_or(OperandTy::Unknown, OperandTy::Known)
            }
            Value::ConstInt(v) => OperandTy::IntLiteral(*v),
            Value::ConstFloat(_) => OperandTy::Known(Type::F64),
            Value::ConstStr(id) => {
                if self.module.strings.get(*id).is_none() {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::UnknownString,
                        format!("string literal #{} is not in the string table", id.0),
                    ));
                    return OperandTy::Unknown;
                }
                OperandTy::Known(Type::Str)
            }
            Value::GlobalAddr(name) => {
                if !self.symbols.globals.contains_key(name.as_str()) {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::UnknownGlobal,
                        format!("unknown global @{}", name),
                    ));
                    return OperandTy::Unknown;
                }
                OperandTy::Known(Type::Ptr)
            }
            Value::NullPtr => OperandTy::Known(Type::Ptr),
        }
    }

    // ---------------------------------------------------------------
    // Blocks
    // ---------------------------------------------------------------

    fn check_block(&mut self, id: BlockId) {
        let func = self.func;
        let block = &func.blocks[id.index()];
        self.block = id;
        self.instr = 0;

        for param in &block.params {
            self.visible[param.id.index()] = true;
        }

        if block.instructions.is_empty() {
            self.emit_block(
                id,
                Diagnostic::error(
                    DiagnosticCode::EmptyBlock,
                    format!("block '{}' is empty and has no terminator", block.label),
                ),
            );
        } else {
            self.check_terminators(id, &block.instructions);
        }

        for (index, instr) in block.instructions.iter().enumerate() {
            self.instr = index;
            self.check_instr(instr);
            if let Some(result) = instr.result {
                if self.defs[result.index()] == Some(DefSite::Instr(id)) {
                    self.visible[result.index()] = true;
                }
            }
        }

        // Block parameters are scoped to their block.
        for param in &block.params {
            if self.defs[param.id.index()] == Some(DefSite::BlockParam(id)) {
                self.visible[param.id.index()] = false;
            }
        }
    }

    fn check_terminators(&mut self, id: BlockId, instrs: &[Instr]) {
        let last = instrs.len() - 1;
        if let Some(first) = instrs.iter().position(Instr::is_terminator) {
            if first < last {
                let message = format!(
                    "multiple terminators: `{}` ends the block but {} more instruction(s) follow",
                    instrs[first].op,
                    last - first
                );
                self.emit_at(
                    id,
                    first + 1,
                    Diagnostic::error(DiagnosticCode::MultipleTerminators, message),
                );
            }
            return;
        }
        let func = self.func;
        let label = &func.blocks[id.index()].label;
        let message = format!("block '{}' does not end with a terminator", label);
        self.emit_at(
            id,
            last,
            Diagnostic::error(DiagnosticCode::MissingTerminator, message),
        );
    }

    /// Resolve a successor label and check its argument bundle
    pub(super) fn check_target(&mut self, label: &str, bundle: &[Value]) {
        let Some(target) = self.labels.get(label).copied() else {
            self.emit(Diagnostic::error(
                DiagnosticCode::UnknownLabel,
                format!("unknown label '{}'", label),
            ));
            for value in bundle {
                self.operand_ty(value);
            }
            return;
        };
        let func = self.func;
        let params = &func.blocks[target.index()].params;
        if target == BlockId::ENTRY {
            self.emit(Diagnostic::error(
                DiagnosticCode::UnknownLabel,
                format!("cannot branch to the entry block '{}'", label),
            ));
        }
        if params.len() != bundle.len() {
            self.emit(Diagnostic::error(
                DiagnosticCode::BundleArity,
                format!(
                    "argument bundle arity mismatch for label '{}': expected {}, found {}",
                    label,
                    params.len(),
                    bundle.len()
                ),
            ));
        }
        for (i, value) in bundle.iter().enumerate() {
            let ty = self.operand_ty(value);
            if let Some(param) = params.get(i) {
                if !ty.fits_type(param.ty) {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::BundleType,
                        format!(
                            "argument {} to '{}' must be {}, found {}",
                            i, label, param.ty, ty
                        ),
                    ));
                }
            }
        }
    }
}

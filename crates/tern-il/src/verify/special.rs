//! Opcode-specific checks selected by `VerifyStrategy::Specialized`

use super::function::FunctionVerifier;
use super::typing::OperandTy;
use super::{Diagnostic, DiagnosticCode};
use crate::instr::Instr;
use crate::module::GlobalInit;
use crate::opcode::{Opcode, SpecialCheck};
use crate::types::Type;
use crate::value::Value;
use rustc_hash::FxHashSet;

/// Constant `alloca` sizes above this draw a warning
pub(crate) const HUGE_ALLOCA: i64 = 1 << 20;

impl<'a, 'c> FunctionVerifier<'a, 'c> {
    pub(super) fn check_special(&mut self, check: SpecialCheck, instr: &Instr, tys: &[OperandTy]) {
        match check {
            SpecialCheck::Branch => self.check_branch(instr),
            SpecialCheck::Switch => self.check_switch(instr),
            SpecialCheck::Return => self.check_return(tys),
            SpecialCheck::Call => self.check_call(instr, tys),
            SpecialCheck::Alloca => self.check_alloca(instr),
            SpecialCheck::Load => self.check_load(instr),
            SpecialCheck::Store => self.check_store(instr, tys),
            SpecialCheck::ConstStr => self.check_const_str(instr),
            SpecialCheck::NarrowCast => self.check_narrow_cast(instr),
        }
    }

    fn check_branch(&mut self, instr: &Instr) {
        for (i, label) in instr.labels.iter().enumerate() {
            self.check_target(label, instr.bundle(i));
        }
    }

    fn check_switch(&mut self, instr: &Instr) {
        if instr.labels.len() != instr.operands.len() {
            self.emit(Diagnostic::error(
                DiagnosticCode::SwitchCase,
                format!(
                    "switch has {} case value(s) but {} case label(s)",
                    instr.operands.len().saturating_sub(1),
                    instr.labels.len().saturating_sub(1)
                ),
            ));
        }
        let mut seen = FxHashSet::default();
        for case in instr.operands.iter().skip(1) {
            match case {
                Value::ConstInt(v) if Type::I32.accepts_int_literal(*v) => {
                    if !seen.insert(*v) {
                        self.emit(Diagnostic::error(
                            DiagnosticCode::SwitchCase,
                            format!("duplicate switch case {}", v),
                        ));
                    }
                }
                Value::ConstInt(v) => {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::SwitchCase,
                        format!("switch case {} does not fit in i32", v),
                    ));
                }
                other => {
                    let text = crate::text::write_value(self.module, self.func, other);
                    self.emit(Diagnostic::error(
                        DiagnosticCode::SwitchCase,
                        format!("switch case {} is not an integer constant", text),
                    ));
                }
            }
        }
        self.check_branch(instr);
    }

    fn check_return(&mut self, tys: &[OperandTy]) {
        let ret = self.func.ret;
        match (ret, tys.first()) {
            (Type::Void, None) => {}
            (Type::Void, Some(_)) => self.emit(Diagnostic::error(
                DiagnosticCode::ReturnMismatch,
                format!("@{} returns void but `ret` carries a value", self.func.name),
            )),
            (ty, None) => self.emit(Diagnostic::error(
                DiagnosticCode::ReturnMismatch,
                format!("@{} must return a value of type {}", self.func.name, ty),
            )),
            (ty, Some(found)) => {
                if !found.fits_type(ty) {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::ReturnMismatch,
                        format!("@{} returns {}, found {}", self.func.name, ty, found),
                    ));
                }
            }
        }
    }

    fn check_call(&mut self, instr: &Instr, tys: &[OperandTy]) {
        let Some(callee) = instr.callee.as_deref() else {
            self.emit(Diagnostic::error(
                DiagnosticCode::UnknownCallee,
                "call has no callee",
            ));
            return;
        };
        let (params, ret) = if let Some(func) = self.symbols.functions.get(callee) {
            (func.param_types(), func.ret)
        } else if let Some(ext) = self.symbols.externs.get(callee) {
            (ext.params.clone(), ext.ret)
        } else {
            self.emit(Diagnostic::error(
                DiagnosticCode::UnknownCallee,
                format!("call to unknown function @{}", callee),
            ));
            return;
        };

        if params.len() != tys.len() {
            self.emit(Diagnostic::error(
                DiagnosticCode::CallArity,
                format!(
                    "@{} expects {} argument(s), found {}",
                    callee,
                    params.len(),
                    tys.len()
                ),
            ));
        }
        for (i, (param, found)) in params.iter().zip(tys).enumerate() {
            if !found.fits_type(*param) {
                self.emit(Diagnostic::error(
                    DiagnosticCode::CallType,
                    format!("argument {} of @{} must be {}, found {}", i, callee, param, found),
                ));
            }
        }

        if let Some(result) = instr.result {
            if ret == Type::Void {
                let name = self.value_label(result);
                self.emit(Diagnostic::error(
                    DiagnosticCode::ResultUnexpected,
                    format!("@{} returns void but the call assigns {}", callee, name),
                ));
            } else if instr.ty != ret {
                self.emit(Diagnostic::error(
                    DiagnosticCode::CallType,
                    format!(
                        "@{} returns {}, but the result is declared {}",
                        callee, ret, instr.ty
                    ),
                ));
            }
        }
    }

    fn check_alloca(&mut self, instr: &Instr) {
        if let Some(Value::ConstInt(size)) = instr.operands.first() {
            if *size < 0 {
                self.emit(Diagnostic::error(
                    DiagnosticCode::NegativeAlloca,
                    format!("alloca of negative size {}", size),
                ));
            } else if *size > HUGE_ALLOCA {
                self.emit(Diagnostic::warning(
                    DiagnosticCode::HugeAlloca,
                    format!("alloca of {} bytes exceeds {} bytes", size, HUGE_ALLOCA),
                ));
            }
        }
    }

    fn check_memory_type(&mut self, instr: &Instr) {
        if !instr.ty.is_memory() {
            self.emit(Diagnostic::error(
                DiagnosticCode::InvalidMemoryType,
                format!("`{}` cannot move a value of type {} through memory", instr.op, instr.ty),
            ));
        }
    }

    fn check_null_pointer(&mut self, instr: &Instr) {
        if instr.operands.first() == Some(&Value::NullPtr) {
            self.emit(Diagnostic::warning(
                DiagnosticCode::NullAccess,
                format!("`{}` through a null pointer always traps", instr.op),
            ));
        }
    }

    fn check_load(&mut self, instr: &Instr) {
        self.check_memory_type(instr);
        self.check_null_pointer(instr);
    }

    fn check_store(&mut self, instr: &Instr, tys: &[OperandTy]) {
        self.check_memory_type(instr);
        if let Some(found) = tys.get(1) {
            if instr.ty != Type::Void && !found.fits_type(instr.ty) {
                self.emit(Diagnostic::error(
                    DiagnosticCode::OperandType,
                    format!("stored value must be {}, found {}", instr.ty, found),
                ));
            }
        }
        self.check_null_pointer(instr);
        if let Some(Value::GlobalAddr(name)) = instr.operands.first() {
            if let Some(global) = self.symbols.globals.get(name.as_str()) {
                if !global.mutable {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::StoreToConst,
                        format!("store to constant global @{}", name),
                    ));
                }
            }
        }
    }

    fn check_const_str(&mut self, instr: &Instr) {
        let Some(operand) = instr.operands.first() else {
            return;
        };
        let Value::GlobalAddr(name) = operand else {
            self.emit(Diagnostic::error(
                DiagnosticCode::ConstStrTarget,
                "`const_str` operand must name a global",
            ));
            return;
        };
        // Unknown globals were already reported while typing the operand.
        if let Some(global) = self.symbols.globals.get(name.as_str()) {
            let ok = global.ty == Type::Str && matches!(global.init, GlobalInit::Str(_));
            if !ok {
                self.emit(Diagnostic::error(
                    DiagnosticCode::ConstStrTarget,
                    format!("@{} is not a string-initialized str global", name),
                ));
            }
        }
    }

    fn check_narrow_cast(&mut self, instr: &Instr) {
        let allowed: &[Type] = match instr.op {
            Opcode::CastSiNarrowChk => &[Type::I16, Type::I32],
            _ => &[Type::I16, Type::I32, Type::I64],
        };
        if !allowed.contains(&instr.ty) {
            self.emit(Diagnostic::error(
                DiagnosticCode::InvalidCastTarget,
                format!("`{}` cannot produce {}", instr.op, instr.ty),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{verify, Diagnostic, DiagnosticCode, Severity};
    use crate::text::parse_module;

    fn diags(source: &str) -> Vec<Diagnostic> {
        verify(&parse_module(source).unwrap())
    }

    fn codes(source: &str) -> Vec<DiagnosticCode> {
        diags(source).into_iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_switch_cases() {
        let ok = "il 0.2\nfunc @f(%x: i32) -> i64 {\nentry:\n  switch.i32 %x, ^d, 1 -> ^a, 2 -> ^a\nd:\n  ret 0\na:\n  ret 1\n}\n";
        assert!(codes(ok).is_empty());
        let dup = "il 0.2\nfunc @f(%x: i32) -> i64 {\nentry:\n  switch.i32 %x, ^d, 1 -> ^a, 1 -> ^d\nd:\n  ret 0\na:\n  ret 1\n}\n";
        assert_eq!(codes(dup), vec![DiagnosticCode::SwitchCase]);
        let wide = "il 0.2\nfunc @f(%x: i32) -> i64 {\nentry:\n  switch.i32 %x, ^d, 5000000000 -> ^a\nd:\n  ret 0\na:\n  ret 1\n}\n";
        assert_eq!(codes(wide), vec![DiagnosticCode::SwitchCase]);
    }

    #[test]
    fn test_return_mismatch() {
        assert_eq!(
            codes("il 0.2\nfunc @f() -> i64 {\nentry:\n  ret\n}\n"),
            vec![DiagnosticCode::ReturnMismatch]
        );
        assert_eq!(
            codes("il 0.2\nfunc @f() -> void {\nentry:\n  ret 1\n}\n"),
            vec![DiagnosticCode::ReturnMismatch]
        );
        assert_eq!(
            codes("il 0.2\nfunc @f() -> i64 {\nentry:\n  ret 1.5\n}\n"),
            vec![DiagnosticCode::ReturnMismatch]
        );
    }

    #[test]
    fn test_call_checks() {
        let source = "il 0.2\n\
                      extern @times2(i64) -> i64\n\
                      extern @log(str) -> void\n\
                      func @f() -> void {\nentry:\n\
                        %a = call @times2(1)\n\
                        %b = call @times2(1, 2)\n\
                        %c = call @times2(1.0)\n\
                        call @missing()\n\
                        call @times2(3)\n\
                        ret\n}\n";
        assert_eq!(
            codes(source),
            vec![
                DiagnosticCode::CallArity,
                DiagnosticCode::CallType,
                DiagnosticCode::UnknownCallee,
            ]
        );
    }

    #[test]
    fn test_memory_checks() {
        let source = "il 0.2\n\
                      global const i64 @k = 1\n\
                      global str @name = \"x\"\n\
                      global i64 @n = 0\n\
                      func @f() -> void {\nentry:\n\
                        %p = alloca -8\n\
                        store i64, @k, 1\n\
                        store i64, @n, 1.5\n\
                        %v = load i64, null\n\
                        %s = const_str @name\n\
                        %t = const_str @n\n\
                        ret\n}\n";
        let d = diags(source);
        let codes: Vec<_> = d.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                DiagnosticCode::NegativeAlloca,
                DiagnosticCode::StoreToConst,
                DiagnosticCode::OperandType,
                DiagnosticCode::NullAccess,
                DiagnosticCode::ConstStrTarget,
            ]
        );
        assert_eq!(d[3].severity, Severity::Warning);
    }

    #[test]
    fn test_cast_targets() {
        let source = "il 0.2\nfunc @f(%x: f64, %n: i64) -> void {\nentry:\n\
                        %a = cast.si_narrow.chk i32, %n\n\
                        %b = cast.si_narrow.chk i64, %n\n\
                        %c = cast.fp_to_si.rte.chk i64, %x\n\
                        %d = cast.fp_to_si.rte.chk f64, %x\n\
                        ret\n}\n";
        assert_eq!(
            codes(source),
            vec![
                DiagnosticCode::InvalidCastTarget,
                DiagnosticCode::InvalidCastTarget
            ]
        );
    }
}

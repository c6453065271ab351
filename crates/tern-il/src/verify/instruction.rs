//! Table-driven instruction checks

use super::function::FunctionVerifier;
use super::typing::OperandTy;
use super::{Diagnostic, DiagnosticCode};
use crate::instr::{Instr, MAX_OPERANDS};
use crate::opcode::{ResultArity, Successors, TypeCategory, VerifyStrategy, VARIADIC};

impl<'a, 'c> FunctionVerifier<'a, 'c> {
    pub(super) fn check_instr(&mut self, instr: &Instr) {
        let info = instr.op.info();
        if let VerifyStrategy::Reject(reason) = info.verify {
            self.emit(Diagnostic::error(
                DiagnosticCode::RejectedOpcode,
                format!("`{}` is not allowed in verified IL: {}", instr.op, reason),
            ));
            return;
        }

        let operand_tys = self.check_operands(instr);
        self.check_result(instr);
        self.check_successors(instr);

        if let VerifyStrategy::Specialized(check) = info.verify {
            self.check_special(check, instr, &operand_tys);
        }
    }

    /// Operand count and per-slot categories; returns the operand types
    fn check_operands(&mut self, instr: &Instr) -> Vec<OperandTy> {
        let info = instr.op.info();
        let count = instr.operands.len();

        if count > MAX_OPERANDS {
            self.emit(Diagnostic::error(
                DiagnosticCode::TooManyOperands,
                format!("{} operands exceed the limit of {}", count, MAX_OPERANDS),
            ));
        } else if !info.accepts_operand_count(count) {
            let expected = if info.max_operands == VARIADIC {
                format!("at least {}", info.min_operands)
            } else if info.min_operands == info.max_operands {
                info.min_operands.to_string()
            } else {
                format!("{} to {}", info.min_operands, info.max_operands)
            };
            self.emit(Diagnostic::error(
                DiagnosticCode::OperandCount,
                format!("`{}` expects {} operand(s), found {}", instr.op, expected, count),
            ));
        }

        let mut tys = Vec::with_capacity(count);
        for (slot, value) in instr.operands.iter().enumerate() {
            let ty = self.operand_ty(value);
            let category = info.operand_category(slot);
            if !ty.fits(category) {
                self.emit(Diagnostic::error(
                    DiagnosticCode::OperandType,
                    format!(
                        "operand {} of `{}` must be {}, found {}",
                        slot, instr.op, category, ty
                    ),
                ));
            }
            tys.push(ty);
        }
        tys
    }

    fn check_result(&mut self, instr: &Instr) {
        let info = instr.op.info();
        match (info.result, instr.result) {
            (ResultArity::None, Some(id)) => {
                let name = self.value_label(id);
                self.emit(Diagnostic::error(
                    DiagnosticCode::ResultUnexpected,
                    format!("`{}` produces no result but assigns {}", instr.op, name),
                ));
            }
            (ResultArity::One, None) => {
                self.emit(Diagnostic::error(
                    DiagnosticCode::ResultMissing,
                    format!("`{}` must assign its result", instr.op),
                ));
            }
            _ => {}
        }
        if instr.result.is_some() && info.result != ResultArity::None {
            if let TypeCategory::Exact(expected) = info.result_type {
                if instr.ty != expected {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::ResultType,
                        format!(
                            "`{}` produces {}, but the result is declared {}",
                            instr.op, expected, instr.ty
                        ),
                    ));
                }
            }
        }
    }

    fn check_successors(&mut self, instr: &Instr) {
        let info = instr.op.info();
        let labels = instr.labels.len();
        let ok = match info.successors {
            Successors::Fixed(n) => labels == n as usize,
            Successors::Variadic => labels >= 1,
        };
        if !ok {
            let expected = match info.successors {
                Successors::Fixed(n) => n.to_string(),
                Successors::Variadic => "at least 1".to_string(),
            };
            self.emit(Diagnostic::error(
                DiagnosticCode::SuccessorCount,
                format!("`{}` takes {} successor label(s), found {}", instr.op, expected, labels),
            ));
        }
        if instr.br_args.len() > labels {
            self.emit(Diagnostic::error(
                DiagnosticCode::SuccessorCount,
                format!(
                    "`{}` has {} argument bundles for {} label(s)",
                    instr.op,
                    instr.br_args.len(),
                    labels
                ),
            ));
        }
    }
}

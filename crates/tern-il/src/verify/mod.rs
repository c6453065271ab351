//! Module verification
//!
//! [`verify`] checks a module exhaustively and returns every finding as a
//! [`Diagnostic`]; it never stops at the first problem and never fails.
//!
//! Checks run in three layers:
//! - module: symbol uniqueness and global initializers
//! - function: entry block, labels, terminators, value definitions
//! - instruction: the generic operand/result matching driven by
//!   [`OpcodeInfo`](crate::opcode::OpcodeInfo), plus the specialized rule
//!   named by the opcode's [`VerifyStrategy`](crate::opcode::VerifyStrategy)

mod diagnostic;
mod function;
mod instruction;
mod module_checks;
mod special;
mod typing;

pub use diagnostic::{has_errors, Diagnostic, DiagnosticCode, Severity};

use crate::module::Module;

/// Verifier settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Stop collecting after this many diagnostics (0 = unlimited)
    pub max_diagnostics: usize,
    /// Report warnings as errors
    pub warnings_as_errors: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_diagnostics: 0,
            warnings_as_errors: false,
        }
    }
}

/// Diagnostic sink honoring [`VerifierConfig`]
pub(crate) struct Report<'c> {
    config: &'c VerifierConfig,
    diagnostics: Vec<Diagnostic>,
}

impl<'c> Report<'c> {
    fn new(config: &'c VerifierConfig) -> Self {
        Self {
            config,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, mut diagnostic: Diagnostic) {
        if self.is_full() {
            return;
        }
        if self.config.warnings_as_errors {
            diagnostic.severity = Severity::Error;
        }
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.config.max_diagnostics != 0 && self.diagnostics.len() >= self.config.max_diagnostics
    }
}

/// Verify a module with default settings
pub fn verify(module: &Module) -> Vec<Diagnostic> {
    verify_with(module, &VerifierConfig::default())
}

/// Verify a module
pub fn verify_with(module: &Module, config: &VerifierConfig) -> Vec<Diagnostic> {
    let mut report = Report::new(config);
    let symbols = module_checks::Symbols::collect(module);
    module_checks::check_module(module, &symbols, &mut report);
    for func in &module.functions {
        if report.is_full() {
            break;
        }
        function::FunctionVerifier::new(module, &symbols, func, &mut report).run();
    }
    report.diagnostics
}

/// A module that passed verification without errors
///
/// Holds a shared borrow, so the module cannot change until this is dropped.
/// Execution engines accept only this type.
#[derive(Debug, Clone)]
pub struct VerifiedModule<'m> {
    module: &'m Module,
    warnings: Vec<Diagnostic>,
}

impl<'m> VerifiedModule<'m> {
    /// Verify `module`; on failure, return every diagnostic
    pub fn new(module: &'m Module) -> Result<Self, Vec<Diagnostic>> {
        Self::with_config(module, &VerifierConfig::default())
    }

    /// Verify `module` with explicit settings
    pub fn with_config(module: &'m Module, config: &VerifierConfig) -> Result<Self, Vec<Diagnostic>> {
        let diagnostics = verify_with(module, config);
        if has_errors(&diagnostics) {
            return Err(diagnostics);
        }
        for warning in &diagnostics {
            log::warn!("{}", warning);
        }
        Ok(Self {
            module,
            warnings: diagnostics,
        })
    }

    /// The verified module
    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Warnings produced during verification
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;

    fn codes(source: &str) -> Vec<DiagnosticCode> {
        let module = parse_module(source).unwrap();
        verify(&module).into_iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_verify_add_constants() {
        let module =
            parse_module("il 0.2\nfunc @main() -> i64 {\nentry:\n  %v0 = add 2, 2\n  ret %v0\n}\n")
                .unwrap();
        assert!(verify(&module).is_empty());
        assert!(VerifiedModule::new(&module).is_ok());
    }

    #[test]
    fn test_verify_multiple_terminators() {
        let module = parse_module(
            "il 0.2\nfunc @main() -> i64 {\nentry:\n  ret 1\n  %v0 = add 1, 2\n}\n",
        )
        .unwrap();
        let diags = verify(&module);
        assert_eq!(diags.len(), 1);
        let diag = &diags[0];
        assert_eq!(diag.code, DiagnosticCode::MultipleTerminators);
        assert!(diag.message.contains("multiple terminators"));
        assert_eq!(diag.block.as_deref(), Some("entry"));
        assert_eq!(diag.instr, Some(1));
        assert!(VerifiedModule::new(&module).is_err());
    }

    #[test]
    fn test_verify_max_diagnostics() {
        let module = parse_module(
            "il 0.2\nfunc @f() -> i64 {\nentry:\n  %a = add 1.5, 2\n  %b = add 1.5, 2\n  ret 1\n}\n",
        )
        .unwrap();
        assert_eq!(verify(&module).len(), 2);
        let config = VerifierConfig {
            max_diagnostics: 1,
            ..VerifierConfig::default()
        };
        assert_eq!(verify_with(&module, &config).len(), 1);
    }

    #[test]
    fn test_warnings_as_errors() {
        let source = "il 0.2\nfunc @f() -> void {\nentry:\n  %p = alloca 2000000\n  ret\n}\n";
        assert_eq!(codes(source), vec![DiagnosticCode::HugeAlloca]);
        let module = parse_module(source).unwrap();
        let verified = VerifiedModule::new(&module).unwrap();
        assert_eq!(verified.warnings().len(), 1);
        let strict = VerifierConfig {
            warnings_as_errors: true,
            ..VerifierConfig::default()
        };
        assert!(VerifiedModule::with_config(&module, &strict).is_err());
    }
}

//! Module pass contract
//!
//! Passes implement [`ModulePass`] and rewrite a [`Module`] in place. The
//! [`PassManager`] runs them in order and re-verifies after each one, so a
//! pass that breaks the module is caught before anything executes it.

use crate::module::Module;
use crate::verify::{has_errors, verify_with, Diagnostic, VerifierConfig};
use thiserror::Error;

/// Analyses a pass left valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreservedAnalyses {
    /// The pass changed nothing an analysis could observe
    All,
    /// Every cached analysis must be recomputed
    Nothing,
    /// Only the named analyses survive
    Only(Vec<String>),
}

impl PreservedAnalyses {
    /// Whether the analysis `name` is still valid
    pub fn preserves(&self, name: &str) -> bool {
        match self {
            PreservedAnalyses::All => true,
            PreservedAnalyses::Nothing => false,
            PreservedAnalyses::Only(names) => names.iter().any(|n| n == name),
        }
    }

    /// Analyses preserved by both `self` and `other`
    pub fn intersect(self, other: PreservedAnalyses) -> PreservedAnalyses {
        match (self, other) {
            (PreservedAnalyses::All, other) | (other, PreservedAnalyses::All) => other,
            (PreservedAnalyses::Nothing, _) | (_, PreservedAnalyses::Nothing) => {
                PreservedAnalyses::Nothing
            }
            (PreservedAnalyses::Only(a), PreservedAnalyses::Only(b)) => {
                PreservedAnalyses::Only(a.into_iter().filter(|n| b.contains(n)).collect())
            }
        }
    }
}

/// A transformation over a whole module
pub trait ModulePass {
    /// Name of this pass (for diagnostics)
    fn name(&self) -> &str;
    /// Rewrite the module in place
    fn run(&mut self, module: &mut Module) -> PreservedAnalyses;
}

/// Pass pipeline failure
#[derive(Debug, Error)]
pub enum PassError {
    /// The module was invalid before any pass ran
    #[error("input module failed verification with {} diagnostic(s)", diagnostics.len())]
    InvalidInput {
        /// Verifier output
        diagnostics: Vec<Diagnostic>,
    },
    /// A pass produced a module that no longer verifies
    #[error("pass '{pass}' left the module invalid ({} diagnostic(s))", diagnostics.len())]
    Broken {
        /// Offending pass
        pass: String,
        /// Verifier output
        diagnostics: Vec<Diagnostic>,
    },
}

/// Runs a sequence of passes, re-verifying after each
pub struct PassManager {
    passes: Vec<Box<dyn ModulePass>>,
    config: VerifierConfig,
}

impl PassManager {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::with_config(VerifierConfig::default())
    }

    /// Create an empty pipeline verifying with `config`
    pub fn with_config(config: VerifierConfig) -> Self {
        PassManager {
            passes: Vec::new(),
            config,
        }
    }

    /// Add a pass to the pipeline
    pub fn add_pass(&mut self, pass: Box<dyn ModulePass>) {
        self.passes.push(pass);
    }

    /// Number of passes
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether the pipeline is empty
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run all passes in order
    ///
    /// Returns the analyses preserved by the whole pipeline.
    pub fn run(&mut self, module: &mut Module) -> Result<PreservedAnalyses, PassError> {
        let diagnostics = verify_with(module, &self.config);
        if has_errors(&diagnostics) {
            return Err(PassError::InvalidInput { diagnostics });
        }

        let mut preserved = PreservedAnalyses::All;
        for pass in &mut self.passes {
            log::debug!("running pass '{}'", pass.name());
            let result = pass.run(module);
            let diagnostics = verify_with(module, &self.config);
            if has_errors(&diagnostics) {
                return Err(PassError::Broken {
                    pass: pass.name().to_string(),
                    diagnostics,
                });
            }
            for warning in &diagnostics {
                log::warn!("after pass '{}': {}", pass.name(), warning);
            }
            preserved = preserved.intersect(result);
        }
        Ok(preserved)
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

//! Verifier diagnostics

use crate::value::SourceLoc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious but executable
    Warning,
    /// The module must not be executed
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Which rule a diagnostic reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum DiagnosticCode {
    // module
    DuplicateExtern,
    DuplicateGlobal,
    DuplicateFunction,
    SymbolClash,
    GlobalInit,
    UnknownString,
    // structure
    MissingEntry,
    EntryBlockParams,
    EmptyBlock,
    DuplicateLabel,
    InvalidBlockParam,
    MissingTerminator,
    MultipleTerminators,
    UnknownLabel,
    BundleArity,
    BundleType,
    SuccessorCount,
    // values
    UndefinedValue,
    DuplicateDefinition,
    UnknownGlobal,
    // instructions
    OperandCount,
    TooManyOperands,
    OperandType,
    ResultMissing,
    ResultUnexpected,
    ResultType,
    UnknownCallee,
    CallArity,
    CallType,
    ReturnMismatch,
    InvalidMemoryType,
    NegativeAlloca,
    HugeAlloca,
    NullAccess,
    StoreToConst,
    ConstStrTarget,
    InvalidCastTarget,
    SwitchCase,
    RejectedOpcode,
}

impl DiagnosticCode {
    /// Stable kebab-case name
    pub fn as_str(self) -> &'static str {
        use DiagnosticCode::*;
        match self {
            DuplicateExtern => "duplicate-extern",
            DuplicateGlobal => "duplicate-global",
            DuplicateFunction => "duplicate-function",
            SymbolClash => "symbol-clash",
            GlobalInit => "global-init",
            UnknownString => "unknown-string",
            MissingEntry => "missing-entry",
            EntryBlockParams => "entry-block-params",
            EmptyBlock => "empty-block",
            DuplicateLabel => "duplicate-label",
            InvalidBlockParam => "invalid-block-param",
            MissingTerminator => "missing-terminator",
            MultipleTerminators => "multiple-terminators",
            UnknownLabel => "unknown-label",
            BundleArity => "bundle-arity",
            BundleType => "bundle-type",
            SuccessorCount => "successor-count",
            UndefinedValue => "undefined-value",
            DuplicateDefinition => "duplicate-definition",
            UnknownGlobal => "unknown-global",
            OperandCount => "operand-count",
            TooManyOperands => "too-many-operands",
            OperandType => "operand-type",
            ResultMissing => "result-missing",
            ResultUnexpected => "result-unexpected",
            ResultType => "result-type",
            UnknownCallee => "unknown-callee",
            CallArity => "call-arity",
            CallType => "call-type",
            ReturnMismatch => "return-mismatch",
            InvalidMemoryType => "invalid-memory-type",
            NegativeAlloca => "negative-alloca",
            HugeAlloca => "huge-alloca",
            NullAccess => "null-access",
            StoreToConst => "store-to-const",
            ConstStrTarget => "const-str-target",
            InvalidCastTarget => "invalid-cast-target",
            SwitchCase => "switch-case",
            RejectedOpcode => "rejected-opcode",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One verifier finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Violated rule
    pub code: DiagnosticCode,
    /// Human-readable description
    pub message: String,
    /// Source location of the offending instruction, when known
    pub loc: Option<SourceLoc>,
    /// Enclosing function
    pub function: Option<String>,
    /// Enclosing block label
    pub block: Option<String>,
    /// Instruction index within the block
    pub instr: Option<usize>,
    /// Rendered instruction text
    pub snippet: Option<String>,
}

impl Diagnostic {
    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            loc: None,
            function: None,
            block: None,
            instr: None,
            snippet: None,
        }
    }

    /// Error-severity diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Warning-severity diagnostic
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Attach the enclosing function
    pub fn in_function(mut self, name: &str) -> Self {
        self.function = Some(name.to_string());
        self
    }

    /// Attach the enclosing block
    pub fn in_block(mut self, label: &str) -> Self {
        self.block = Some(label.to_string());
        self
    }

    /// Attach the instruction index, text and location
    pub fn at_instr(mut self, index: usize, snippet: String, loc: SourceLoc) -> Self {
        self.instr = Some(index);
        self.snippet = Some(snippet);
        if loc.is_known() {
            self.loc = Some(loc);
        }
        self
    }

    /// Whether this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: ", self.severity, self.code)?;
        if let Some(func) = &self.function {
            write!(f, "@{}", func)?;
            if let Some(block) = &self.block {
                write!(f, ":{}", block)?;
            }
            f.write_str(": ")?;
        }
        if let Some(index) = self.instr {
            write!(f, "#{} ", index)?;
        }
        if let Some(snippet) = &self.snippet {
            write!(f, "`{}`: ", snippet)?;
        }
        f.write_str(&self.message)?;
        if let Some(loc) = self.loc {
            write!(f, " (at {})", loc)?;
        }
        Ok(())
    }
}

/// Whether any diagnostic is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

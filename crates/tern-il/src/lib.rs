//! Tern intermediate language
//!
//! This crate provides the typed, block-structured IL shared by every Tern
//! front end and backend:
//! - **Model**: types, values, instructions, blocks, functions, modules
//! - **Opcodes**: the closed opcode set and its static metadata table
//! - **Builder**: construction API that keeps blocks well-formed
//! - **Text**: the versioned textual format (parser and serializer)
//! - **Verifier**: exhaustive structural and type checking
//! - **Transform**: the pass contract used by optimizers
//!
//! # Example
//!
//! ```rust,ignore
//! use tern_il::{parse_module, verify, VerifiedModule};
//!
//! let module = parse_module(
//!     "il 0.2\nfunc @main() -> i64 {\nentry:\n  %v0 = add 2, 2\n  ret %v0\n}\n",
//! )?;
//! assert!(verify(&module).is_empty());
//! let verified = VerifiedModule::new(&module).map_err(|d| d.len())?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builder;
pub mod instr;
pub mod module;
pub mod opcode;
pub mod text;
pub mod transform;
pub mod types;
pub mod value;
pub mod verify;

pub use builder::{BuildError, BuildResult, FunctionBuilder, ModuleBuilder};
pub use instr::{Instr, MAX_OPERANDS};
pub use module::{
    BasicBlock, BlockId, Extern, FuncId, Function, Global, GlobalInit, Module, Param, StringTable,
    Visibility, IL_VERSION,
};
pub use opcode::{DispatchCategory, Opcode, OpcodeInfo};
pub use text::{parse_module, write_module, ParseError};
pub use transform::{ModulePass, PassError, PassManager, PreservedAnalyses};
pub use types::Type;
pub use value::{SourceLoc, StrId, Value, ValueId};
pub use verify::{
    has_errors, verify, verify_with, Diagnostic, DiagnosticCode, Severity, VerifiedModule,
    VerifierConfig,
};

//! Tern virtual machine
//!
//! Register-based interpreter for verified Tern IL modules:
//! - **Interpreter**: explicit frame stack, two equivalent dispatch
//!   strategies, structured traps
//! - **Memory**: a shared register file plus byte-addressable linear memory
//!   for globals and frame stacks
//! - **Registry**: case-insensitive extern table, process-wide or per
//!   instance
//! - **Runtime library**: printing, string and array externs over the
//!   `tern-rt` heap
//!
//! # Example
//!
//! ```rust,ignore
//! use tern_il::{parse_module, VerifiedModule};
//! use tern_vm::{run, ExternRegistry, Slot};
//!
//! let module = parse_module(
//!     "il 0.2\nfunc @main() -> i64 {\nentry:\n  %v0 = add 2, 2\n  ret %v0\n}\n",
//! )?;
//! let verified = VerifiedModule::new(&module).map_err(|d| d.len())?;
//! let value = run(&verified, "main", &[], ExternRegistry::global())?;
//! assert_eq!(value, Slot::Int(4));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod defaults;
mod frame;
pub mod interpreter;
pub mod memory;
pub mod options;
pub mod register_file;
pub mod registry;
pub mod runtime_lib;
pub mod slot;
pub mod trap;

pub use interpreter::{ExecStats, Interpreter};
pub use memory::LinearMemory;
pub use options::{DispatchStrategy, ResourceLimits, VmOptions};
pub use register_file::RegisterFile;
pub use registry::{
    ExternEntry, ExternRegistry, ExternSignature, HostContext, HostError, HostFn, RegistryError,
};
pub use runtime_lib::{register_runtime, runtime_signatures};
pub use slot::{ErrorValue, Slot};
pub use trap::{ExecResult, FrameInfo, Trap, TrapKind};

use std::sync::Arc;
use tern_il::VerifiedModule;

/// Run `entry` on a fresh interpreter with default options
pub fn run(
    module: &VerifiedModule<'_>,
    entry: &str,
    args: &[Slot],
    registry: Arc<ExternRegistry>,
) -> ExecResult<Slot> {
    Interpreter::new(module, registry, VmOptions::default()).run(entry, args)
}

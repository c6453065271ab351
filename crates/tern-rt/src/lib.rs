//! Tern runtime heap
//!
//! Reference-counted strings and arrays shared by the interpreter and
//! generated native code:
//! - **Header**: one layout for every heap object (kind, element kind,
//!   refcount, length, capacity)
//! - **Heap**: a generation-checked slab with retain/release ownership
//! - **Strings** and **arrays**, with copy-on-resize for shared arrays
//! - **Weak references** through a side table zeroed on destruction
//! - **Ownership log**: every transition traced, optionally recorded

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod array;
pub mod config;
pub mod error;
pub mod handle;
pub mod header;
pub mod heap;
pub mod ownership;
mod string;
pub mod weak;

pub use config::{HeapConfig, DEFAULT_MAX_ARRAY_LEN};
pub use error::{HeapError, HeapResult};
pub use handle::{HeapHandle, HANDLE_TAG};
pub use header::{ElemKind, HeapHeader, HeapKind, HEAP_MAGIC, IMMORTAL_REFCOUNT};
pub use heap::{Element, Heap};
pub use ownership::{Ownership, OwnershipEvent, OwnershipOp};
pub use weak::{FieldRef, WeakRef};

//! Extern function registry
//!
//! Maps extern names to host handlers. A registry is either the lazily
//! built process-wide instance ([`ExternRegistry::global`]) or an explicit
//! instance handed to the interpreter; an instance may layer over a parent
//! and override its entries.
//!
//! Names are matched case-insensitively. The table sits behind a
//! `parking_lot::RwLock`: lookups from concurrent runs only take the read
//! lock, and registration is serialized by the write lock.

use crate::runtime_lib::register_runtime;
use crate::slot::Slot;
use crate::trap::TrapKind;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tern_il::{Extern, Type};
use tern_rt::{Heap, HeapError};
use thiserror::Error;

/// Failure reported by a host handler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Raise a trap of a specific kind
    #[error("{message}")]
    Trap {
        /// Kind of the trap to raise
        kind: TrapKind,
        /// Detail
        message: String,
    },

    /// Generic handler failure
    #[error("{0}")]
    Failed(String),

    /// Heap access failed
    #[error(transparent)]
    Heap(#[from] HeapError),
}

impl HostError {
    /// Kind of the trap this error becomes
    pub fn trap_kind(&self) -> TrapKind {
        match self {
            HostError::Trap { kind, .. } => *kind,
            HostError::Heap(HeapError::OutOfBounds { .. } | HeapError::TooLarge { .. }) => {
                TrapKind::Bounds
            }
            HostError::Failed(_) | HostError::Heap(_) => TrapKind::HostError,
        }
    }
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Empty extern name
    #[error("extern name must not be empty")]
    EmptyName,

    /// A parameter was declared `void`
    #[error("extern `{name}` declares a void parameter")]
    VoidParameter {
        /// Extern name
        name: String,
    },
}

/// State a host handler may touch during a call
pub struct HostContext<'a> {
    heap: &'a mut Heap,
    output: &'a mut Vec<u8>,
}

impl<'a> HostContext<'a> {
    /// Context over a heap and an output buffer
    pub fn new(heap: &'a mut Heap, output: &'a mut Vec<u8>) -> Self {
        Self { heap, output }
    }

    /// Runtime heap
    pub fn heap(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    /// Program output written so far
    pub fn output(&self) -> &[u8] {
        self.output.as_slice()
    }

    /// Append bytes to the program output
    pub fn write(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    /// Append a line to the program output
    pub fn write_line(&mut self, text: &str) {
        self.output.extend_from_slice(text.as_bytes());
        self.output.push(b'\n');
    }
}

/// Host handler for an extern
pub type HostFn = Arc<dyn Fn(&mut HostContext<'_>, &[Slot]) -> Result<Slot, HostError> + Send + Sync>;

/// Parameter and return types of an extern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternSignature {
    /// Parameter types, in order
    pub params: Vec<Type>,
    /// Return type
    pub ret: Type,
}

impl ExternSignature {
    /// Create a signature
    pub fn new(params: impl Into<Vec<Type>>, ret: Type) -> Self {
        Self {
            params: params.into(),
            ret,
        }
    }

    /// Whether a module's extern declaration has exactly this signature
    pub fn matches(&self, decl: &Extern) -> bool {
        self.params == decl.params && self.ret == decl.ret
    }
}

impl fmt::Display for ExternSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({}) -> {}", params, self.ret)
    }
}

/// A registered extern
#[derive(Clone)]
pub struct ExternEntry {
    /// Name as registered
    pub name: String,
    /// Declared signature
    pub signature: ExternSignature,
    /// Host handler
    pub handler: HostFn,
}

impl fmt::Debug for ExternEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternEntry")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

static GLOBAL: Lazy<Arc<ExternRegistry>> = Lazy::new(|| {
    let registry = ExternRegistry::new();
    if let Err(e) = register_runtime(&registry) {
        log::error!("registry: failed to install runtime externs: {}", e);
    }
    Arc::new(registry)
});

/// Extern name to handler table
#[derive(Default)]
pub struct ExternRegistry {
    parent: Option<Arc<ExternRegistry>>,
    table: RwLock<FxHashMap<String, ExternEntry>>,
}

impl fmt::Debug for ExternRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternRegistry")
            .field("count", &self.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl ExternRegistry {
    /// Empty, isolated registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry that falls back to `parent` for names it lacks
    pub fn child_of(parent: Arc<ExternRegistry>) -> Self {
        Self {
            parent: Some(parent),
            table: RwLock::new(FxHashMap::default()),
        }
    }

    /// The process-wide registry, with the standard runtime externs installed
    pub fn global() -> Arc<ExternRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Register `handler` under `name`, replacing any previous entry
    ///
    /// Returns the replaced entry.
    pub fn register<F>(
        &self,
        name: &str,
        signature: ExternSignature,
        handler: F,
    ) -> Result<Option<ExternEntry>, RegistryError>
    where
        F: Fn(&mut HostContext<'_>, &[Slot]) -> Result<Slot, HostError> + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if signature.params.contains(&Type::Void) {
            return Err(RegistryError::VoidParameter {
                name: name.to_string(),
            });
        }
        log::debug!("registry: register @{}{}", name, signature);
        let entry = ExternEntry {
            name: name.to_string(),
            signature,
            handler: Arc::new(handler),
        };
        Ok(self.table.write().insert(key(name), entry))
    }

    /// Remove `name` from this registry (not from its parent)
    pub fn unregister(&self, name: &str) -> Option<ExternEntry> {
        self.table.write().remove(&key(name))
    }

    /// Look up `name` here, then in the parent chain
    pub fn resolve(&self, name: &str) -> Option<ExternEntry> {
        let found = self.table.read().get(&key(name)).cloned();
        match found {
            Some(entry) => Some(entry),
            None => self.parent.as_ref().and_then(|p| p.resolve(name)),
        }
    }

    /// Whether `name` resolves
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Number of entries registered directly in this registry
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Whether this registry has no entries of its own
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

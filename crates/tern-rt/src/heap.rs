//! Reference-counted object heap
//!
//! Objects live in a slab of generation-checked slots. A [`HeapHandle`]
//! names a slot plus the generation it was allocated in; freeing an object
//! bumps the slot generation so stale handles are caught instead of
//! aliasing a newer object.
//!
//! Ownership protocol:
//! - a fresh object has refcount 1, owned by the caller
//! - [`Heap::retain`] adds an owner, [`Heap::release`] drops one
//! - the release that reaches zero destroys the object, releases any
//!   strings it owns, and zeroes weak references to it
//! - immortal objects ignore retain and release

use crate::config::HeapConfig;
use crate::error::{HeapError, HeapResult};
use crate::handle::HeapHandle;
use crate::header::{ElemKind, HeapHeader, HeapKind, IMMORTAL_REFCOUNT};
use crate::ownership::{OwnershipEvent, OwnershipOp};
use crate::weak::WeakTable;

/// Array element value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Element {
    /// `i64` element
    I64(i64),
    /// `f64` element
    F64(f64),
    /// Raw pointer-sized word
    Ptr(u64),
    /// String handle (owned by the array) or null
    Str(Option<HeapHandle>),
}

impl Element {
    /// Element kind
    pub fn kind(&self) -> ElemKind {
        match self {
            Element::I64(_) => ElemKind::I64,
            Element::F64(_) => ElemKind::F64,
            Element::Ptr(_) => ElemKind::Ptr,
            Element::Str(_) => ElemKind::Str,
        }
    }

    /// Zero value of `kind`; `None` for [`ElemKind::None`]
    pub fn zero(kind: ElemKind) -> Option<Element> {
        match kind {
            ElemKind::None => None,
            ElemKind::I64 => Some(Element::I64(0)),
            ElemKind::F64 => Some(Element::F64(0.0)),
            ElemKind::Ptr => Some(Element::Ptr(0)),
            ElemKind::Str => Some(Element::Str(None)),
        }
    }

    /// Owned string handle, if any
    pub(crate) fn owned_handle(&self) -> Option<HeapHandle> {
        match self {
            Element::Str(handle) => *handle,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Payload {
    String(String),
    Array(Vec<Element>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HeapObject {
    pub(crate) header: HeapHeader,
    pub(crate) payload: Payload,
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    object: Option<HeapObject>,
}

/// Object heap for strings and arrays
#[derive(Debug)]
pub struct Heap {
    config: HeapConfig,
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
    immortal: usize,
    events: Vec<OwnershipEvent>,
    pub(crate) weak: WeakTable,
}

impl Heap {
    /// Create a heap with default settings
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    /// Create a heap with explicit settings
    pub fn with_config(config: HeapConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
            immortal: 0,
            events: Vec::new(),
            weak: WeakTable::default(),
        }
    }

    /// Heap settings
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Number of live objects, immortal ones included
    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Number of live objects that a release can still free
    pub fn mortal_objects(&self) -> usize {
        self.live - self.immortal
    }

    /// Whether `handle` refers to a live object
    pub fn is_live(&self, handle: HeapHandle) -> bool {
        self.entry(handle).is_ok()
    }

    /// Recorded ownership transitions (see [`HeapConfig::record_events`])
    pub fn events(&self) -> &[OwnershipEvent] {
        &self.events
    }

    /// Drain the recorded transitions
    pub fn take_events(&mut self) -> Vec<OwnershipEvent> {
        std::mem::take(&mut self.events)
    }

    fn record(&mut self, handle: HeapHandle, op: OwnershipOp, refcount: u32) {
        log::trace!("heap: {} {} -> {}", op, handle, refcount);
        if self.config.record_events {
            self.events.push(OwnershipEvent {
                handle,
                op,
                refcount,
            });
        }
    }

    // ---------------------------------------------------------------
    // Slot access
    // ---------------------------------------------------------------

    fn entry(&self, handle: HeapHandle) -> HeapResult<&HeapObject> {
        self.entries
            .get(handle.index as usize)
            .filter(|e| e.generation == handle.generation)
            .and_then(|e| e.object.as_ref())
            .ok_or(HeapError::StaleHandle(handle))
    }

    fn entry_mut(&mut self, handle: HeapHandle) -> HeapResult<&mut HeapObject> {
        self.entries
            .get_mut(handle.index as usize)
            .filter(|e| e.generation == handle.generation)
            .and_then(|e| e.object.as_mut())
            .ok_or(HeapError::StaleHandle(handle))
    }

    fn check_kind(&self, header: &HeapHeader, kind: HeapKind) -> HeapResult<()> {
        if self.config.validate_headers {
            header.validate(kind)
        } else if header.kind != kind {
            Err(HeapError::KindMismatch {
                expected: kind,
                found: header.kind,
            })
        } else {
            Ok(())
        }
    }

    /// Object of the given kind
    pub(crate) fn object(&self, handle: HeapHandle, kind: HeapKind) -> HeapResult<&HeapObject> {
        let object = self.entry(handle)?;
        self.check_kind(&object.header, kind)?;
        Ok(object)
    }

    /// Mutable object of the given kind
    pub(crate) fn object_mut(
        &mut self,
        handle: HeapHandle,
        kind: HeapKind,
    ) -> HeapResult<&mut HeapObject> {
        let validate = self.config.validate_headers;
        let object = self.entry_mut(handle)?;
        if validate {
            object.header.validate(kind)?;
        } else if object.header.kind != kind {
            return Err(HeapError::KindMismatch {
                expected: kind,
                found: object.header.kind,
            });
        }
        Ok(object)
    }

    pub(crate) fn insert(&mut self, header: HeapHeader, payload: Payload) -> HeapHandle {
        let object = HeapObject { header, payload };
        let handle = match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.object = Some(object);
                HeapHandle::new(index, entry.generation)
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 1,
                    object: Some(object),
                });
                HeapHandle::new(index, 1)
            }
        };
        self.live += 1;
        self.record(handle, OwnershipOp::Alloc, header.refcount);
        handle
    }

    // ---------------------------------------------------------------
    // Ownership
    // ---------------------------------------------------------------

    /// Header of a live object
    pub fn header(&self, handle: HeapHandle) -> HeapResult<HeapHeader> {
        let header = self.entry(handle)?.header;
        if self.config.validate_headers {
            header.validate(header.kind)?;
        }
        Ok(header)
    }

    /// Current refcount
    pub fn refcount(&self, handle: HeapHandle) -> HeapResult<u32> {
        Ok(self.entry(handle)?.header.refcount)
    }

    /// Mark an object as never freed
    pub fn make_immortal(&mut self, handle: HeapHandle) -> HeapResult<()> {
        let header = &mut self.entry_mut(handle)?.header;
        if !header.is_immortal() {
            header.refcount = IMMORTAL_REFCOUNT;
            self.immortal += 1;
        }
        Ok(())
    }

    /// Add an owner; returns the new refcount
    pub fn retain(&mut self, handle: HeapHandle) -> HeapResult<u32> {
        let header = &mut self.entry_mut(handle)?.header;
        if header.is_immortal() {
            return Ok(IMMORTAL_REFCOUNT);
        }
        // Saturate just below the immortal marker.
        if header.refcount < IMMORTAL_REFCOUNT - 1 {
            header.refcount += 1;
        }
        let refcount = header.refcount;
        self.record(handle, OwnershipOp::Retain, refcount);
        Ok(refcount)
    }

    /// Drop an owner; returns the new refcount (0 when destroyed)
    pub fn release(&mut self, handle: HeapHandle) -> HeapResult<u32> {
        let refcount = self.decrement(handle)?;
        if refcount == 0 {
            self.destroy(handle);
        }
        Ok(refcount)
    }

    fn decrement(&mut self, handle: HeapHandle) -> HeapResult<u32> {
        let header = &mut self.entry_mut(handle)?.header;
        if header.is_immortal() {
            return Ok(IMMORTAL_REFCOUNT);
        }
        header.refcount = header.refcount.saturating_sub(1);
        let refcount = header.refcount;
        self.record(handle, OwnershipOp::Release, refcount);
        Ok(refcount)
    }

    /// Free `root` and everything whose last owner it was
    ///
    /// Uses a worklist so deeply nested ownership never recurses.
    fn destroy(&mut self, root: HeapHandle) {
        let mut pending = vec![root];
        while let Some(handle) = pending.pop() {
            let Some(entry) = self.entries.get_mut(handle.index as usize) else {
                continue;
            };
            let Some(object) = entry.object.take() else {
                continue;
            };
            entry.generation = HeapHandle::next_generation(entry.generation);
            self.free.push(handle.index);
            self.live -= 1;
            self.record(handle, OwnershipOp::Free, 0);
            self.weak.clear_target(handle);

            if let Payload::Array(items) = object.payload {
                for child in items.iter().filter_map(Element::owned_handle) {
                    match self.decrement(child) {
                        Ok(0) => pending.push(child),
                        Ok(_) => {}
                        Err(err) => log::warn!("heap: destroying {}: {}", handle, err),
                    }
                }
            }
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

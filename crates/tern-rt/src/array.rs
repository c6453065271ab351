//! Heap arrays
//!
//! Arrays are homogeneous and forward their handle on assignment. Resizing
//! a shared array copies it (copy-on-resize); resizing a uniquely owned
//! array keeps the same handle.

use crate::error::{HeapError, HeapResult};
use crate::handle::HeapHandle;
use crate::header::{ElemKind, HeapHeader, HeapKind};
use crate::heap::{Element, Heap, Payload};

impl Heap {
    fn items(&self, handle: HeapHandle) -> HeapResult<(&HeapHeader, &[Element])> {
        let object = self.object(handle, HeapKind::Array)?;
        match &object.payload {
            Payload::Array(items) => Ok((&object.header, items)),
            Payload::String(_) => Err(HeapError::KindMismatch {
                expected: HeapKind::Array,
                found: HeapKind::String,
            }),
        }
    }

    fn items_mut(&mut self, handle: HeapHandle) -> HeapResult<(&mut HeapHeader, &mut Vec<Element>)> {
        let object = self.object_mut(handle, HeapKind::Array)?;
        match &mut object.payload {
            Payload::Array(items) => Ok((&mut object.header, items)),
            Payload::String(_) => Err(HeapError::KindMismatch {
                expected: HeapKind::Array,
                found: HeapKind::String,
            }),
        }
    }

    fn check_len(&self, len: usize) -> HeapResult<()> {
        let limit = self.config().max_array_len;
        if len > limit {
            return Err(HeapError::TooLarge {
                requested: len,
                limit,
            });
        }
        Ok(())
    }

    fn reserve_items(&self, len: usize) -> HeapResult<Vec<Element>> {
        self.check_len(len)?;
        let mut items = Vec::new();
        items
            .try_reserve_exact(len)
            .map_err(|_| HeapError::TooLarge {
                requested: len,
                limit: self.config().max_array_len,
            })?;
        Ok(items)
    }

    /// Allocate an array holding `items`
    ///
    /// String elements are taken over by the array without a retain.
    pub fn alloc_array(&mut self, elem: ElemKind, items: Vec<Element>) -> HeapResult<HeapHandle> {
        if elem == ElemKind::None {
            return Err(HeapError::ElemMismatch {
                expected: ElemKind::I64,
                found: ElemKind::None,
            });
        }
        if let Some(bad) = items.iter().find(|e| e.kind() != elem) {
            return Err(HeapError::ElemMismatch {
                expected: elem,
                found: bad.kind(),
            });
        }
        let len = items.len();
        let header = HeapHeader::new(HeapKind::Array, elem, len, len);
        Ok(self.insert(header, Payload::Array(items)))
    }

    /// Allocate a zero-filled array
    ///
    /// Fails with [`HeapError::TooLarge`] above `max_array_len`.
    pub fn array_new(&mut self, elem: ElemKind, len: usize) -> HeapResult<HeapHandle> {
        let zero = Element::zero(elem).ok_or(HeapError::ElemMismatch {
            expected: ElemKind::I64,
            found: ElemKind::None,
        })?;
        let mut items = self.reserve_items(len)?;
        items.resize(len, zero);
        self.alloc_array(elem, items)
    }

    /// Number of elements
    pub fn array_len(&self, handle: HeapHandle) -> HeapResult<usize> {
        Ok(self.items(handle)?.0.len)
    }

    /// Element kind
    pub fn array_elem(&self, handle: HeapHandle) -> HeapResult<ElemKind> {
        Ok(self.items(handle)?.0.elem)
    }

    /// Read an element
    ///
    /// String elements are returned borrowed; retain them to keep them.
    pub fn array_get(&self, handle: HeapHandle, index: i64) -> HeapResult<Element> {
        let (header, items) = self.items(handle)?;
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i).copied())
            .ok_or(HeapError::OutOfBounds {
                index,
                len: header.len,
            })
    }

    /// Write an element
    ///
    /// A string element is retained by the array; the element it replaces
    /// is released.
    pub fn array_set(&mut self, handle: HeapHandle, index: i64, value: Element) -> HeapResult<()> {
        let (header, _) = self.items(handle)?;
        if value.kind() != header.elem {
            return Err(HeapError::ElemMismatch {
                expected: header.elem,
                found: value.kind(),
            });
        }
        let len = header.len;
        let slot = usize::try_from(index)
            .ok()
            .filter(|&i| i < len)
            .ok_or(HeapError::OutOfBounds { index, len })?;

        if let Some(incoming) = value.owned_handle() {
            self.retain(incoming)?;
        }
        let (_, items) = self.items_mut(handle)?;
        let previous = std::mem::replace(&mut items[slot], value);
        if let Some(old) = previous.owned_handle() {
            self.release(old)?;
        }
        Ok(())
    }

    /// Resize to `new_len` elements
    ///
    /// A shared array is copied: the live prefix moves to a fresh array,
    /// the caller's reference to the old one is released, and the new
    /// handle is returned. A uniquely owned array is resized in place and
    /// its handle returned unchanged. New elements are zero.
    ///
    /// A length above `max_array_len` fails before any reference changes.
    pub fn array_resize(&mut self, handle: HeapHandle, new_len: usize) -> HeapResult<HeapHandle> {
        self.check_len(new_len)?;
        let (header, items) = self.items(handle)?;
        let elem = header.elem;
        let zero = Element::zero(elem).ok_or(HeapError::ElemMismatch {
            expected: ElemKind::I64,
            found: ElemKind::None,
        })?;

        if header.refcount > 1 {
            let keep = new_len.min(items.len());
            let mut copied = self.reserve_items(new_len)?;
            copied.extend_from_slice(&items[..keep]);
            copied.resize(new_len, zero);
            for child in copied.iter().filter_map(Element::owned_handle) {
                self.retain(child)?;
            }
            let fresh = self.alloc_array(elem, copied)?;
            self.release(handle)?;
            log::trace!("heap: copy-on-resize {} -> {} ({} elements)", handle, fresh, new_len);
            return Ok(fresh);
        }

        let limit = self.config().max_array_len;
        let (header, items) = self.items_mut(handle)?;
        if new_len > items.len() {
            items
                .try_reserve_exact(new_len - items.len())
                .map_err(|_| HeapError::TooLarge {
                    requested: new_len,
                    limit,
                })?;
        }
        let dropped: Vec<HeapHandle> = if new_len < items.len() {
            items
                .drain(new_len..)
                .filter_map(|e| e.owned_handle())
                .collect()
        } else {
            items.resize(new_len, zero);
            Vec::new()
        };
        header.len = new_len;
        if new_len > header.cap {
            header.cap = new_len.max(header.cap * 2);
        }
        for child in dropped {
            self.release(child)?;
        }
        Ok(handle)
    }
}

//! Heap strings

use crate::error::{HeapError, HeapResult};
use crate::handle::HeapHandle;
use crate::header::{ElemKind, HeapHeader, HeapKind};
use crate::heap::{Heap, Payload};

impl Heap {
    /// Allocate a string from owned text
    pub fn alloc_string(&mut self, text: String) -> HeapHandle {
        let len = text.len();
        let header = HeapHeader::new(HeapKind::String, ElemKind::None, len, len);
        self.insert(header, Payload::String(text))
    }

    /// Allocate a copy of `text`
    pub fn string_new(&mut self, text: &str) -> HeapHandle {
        self.alloc_string(text.to_string())
    }

    /// Borrow the string contents
    pub fn string_as_str(&self, handle: HeapHandle) -> HeapResult<&str> {
        match &self.object(handle, HeapKind::String)?.payload {
            Payload::String(text) => Ok(text),
            Payload::Array(_) => Err(HeapError::KindMismatch {
                expected: HeapKind::String,
                found: HeapKind::Array,
            }),
        }
    }

    /// Length in bytes
    pub fn string_len(&self, handle: HeapHandle) -> HeapResult<usize> {
        Ok(self.object(handle, HeapKind::String)?.header.len)
    }

    /// New string holding `a` followed by `b`
    ///
    /// The inputs keep their owners; the result has refcount 1.
    pub fn string_concat(&mut self, a: HeapHandle, b: HeapHandle) -> HeapResult<HeapHandle> {
        let mut text = String::with_capacity(self.string_len(a)? + self.string_len(b)?);
        text.push_str(self.string_as_str(a)?);
        text.push_str(self.string_as_str(b)?);
        Ok(self.alloc_string(text))
    }

    /// Byte-wise equality
    pub fn string_eq(&self, a: HeapHandle, b: HeapHandle) -> HeapResult<bool> {
        Ok(a == b || self.string_as_str(a)? == self.string_as_str(b)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::heap::Heap;

    #[test]
    fn test_string_basics() {
        let mut heap = Heap::new();
        let s = heap.string_new("héllo");
        assert_eq!(heap.string_as_str(s).unwrap(), "héllo");
        assert_eq!(heap.string_len(s).unwrap(), 6);
        let header = heap.header(s).unwrap();
        assert_eq!(header.len, header.cap);
    }

    #[test]
    fn test_concat_leaves_inputs_owned() {
        let mut heap = Heap::new();
        let a = heap.string_new("foo");
        let b = heap.string_new("bar");
        let c = heap.string_concat(a, b).unwrap();
        assert_eq!(heap.string_as_str(c).unwrap(), "foobar");
        assert_eq!(heap.refcount(a).unwrap(), 1);
        assert_eq!(heap.refcount(c).unwrap(), 1);
        assert!(heap.string_eq(c, c).unwrap());
        let d = heap.string_new("foobar");
        assert!(heap.string_eq(c, d).unwrap());
        assert!(!heap.string_eq(a, d).unwrap());
        for h in [a, b, c, d] {
            heap.release(h).unwrap();
        }
        assert_eq!(heap.live_objects(), 0);
    }
}

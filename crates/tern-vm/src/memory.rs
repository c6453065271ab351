//! Linear memory
//!
//! Byte-addressable memory shared by globals and frame stacks.
//!
//! # Memory Layout
//!
//! ```text
//! ┌────────────────────────────────────────┐  ← limit
//! │ (unused)                               │
//! ├────────────────────────────────────────┤  ← top
//! │ Frame stacks (alloca), one region per  │
//! │ active frame, innermost on top         │
//! ├────────────────────────────────────────┤  ← stack_base
//! │ Globals, 8-byte aligned                │
//! ├────────────────────────────────────────┤  ← NULL_GUARD_BYTES
//! │ Null guard (never accessible)          │
//! └────────────────────────────────────────┘  ← 0
//! ```
//!
//! Addresses with [`HANDLE_TAG`](tern_rt::HANDLE_TAG) set are heap handles,
//! never memory addresses.

use crate::defaults::{NULL_GUARD_BYTES, SLOT_ALIGN};
use crate::slot::Slot;
use crate::trap::{ExecResult, Trap, TrapKind};
use tern_il::Type;
use tern_rt::HeapHandle;

#[inline]
fn align_up(n: u64) -> u64 {
    (n + SLOT_ALIGN - 1) & !(SLOT_ALIGN - 1)
}

/// Globals plus frame stacks in one byte array
#[derive(Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    stack_base: u64,
    limit: u64,
}

impl LinearMemory {
    /// Empty memory (null guard only) capped at `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: vec![0; NULL_GUARD_BYTES as usize],
            stack_base: NULL_GUARD_BYTES,
            limit: limit as u64,
        }
    }

    /// Reserve zeroed, aligned storage for a global
    ///
    /// Must happen before any stack allocation.
    pub fn alloc_global(&mut self, size: usize) -> u64 {
        let addr = align_up(self.bytes.len() as u64);
        let end = align_up(addr + size as u64);
        self.bytes.resize(end as usize, 0);
        self.stack_base = end;
        addr
    }

    /// First byte of the frame stack area
    pub fn stack_base(&self) -> u64 {
        self.stack_base
    }

    /// One past the last live byte
    pub fn top(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Allocate `size` zeroed bytes on the frame stack
    ///
    /// `frame_base` is the top at frame entry; a frame may not hold more
    /// than `frame_limit` bytes.
    pub fn stack_alloc(&mut self, size: u64, frame_base: u64, frame_limit: usize) -> ExecResult<u64> {
        let addr = self.top();
        let end = addr
            .checked_add(align_up(size.max(1)))
            .ok_or_else(|| Trap::new(TrapKind::StackOverflow, "alloca size overflows"))?;
        if end - frame_base > frame_limit as u64 {
            return Err(Trap::new(
                TrapKind::StackOverflow,
                format!(
                    "frame stack exhausted: {} bytes requested, {} in use, limit {}",
                    size,
                    addr - frame_base,
                    frame_limit
                ),
            ));
        }
        if end > self.limit {
            return Err(Trap::new(
                TrapKind::StackOverflow,
                format!("linear memory limit of {} bytes exceeded", self.limit),
            ));
        }
        self.bytes.resize(end as usize, 0);
        Ok(addr)
    }

    /// Release every stack allocation made above `top`
    pub fn stack_reset(&mut self, top: u64) {
        let top = top.max(self.stack_base) as usize;
        if top < self.bytes.len() {
            self.bytes.truncate(top);
        }
    }

    fn range(&self, addr: u64, len: usize) -> ExecResult<std::ops::Range<usize>> {
        if HeapHandle::is_handle_bits(addr) {
            return Err(Trap::new(
                TrapKind::Bounds,
                format!("heap handle {:#x} used as a memory address", addr),
            ));
        }
        if addr < NULL_GUARD_BYTES {
            return Err(Trap::new(
                TrapKind::NullPointer,
                format!("access to {:#x} in the null guard", addr),
            ));
        }
        let end = addr.saturating_add(len as u64);
        if end > self.top() {
            return Err(Trap::new(
                TrapKind::Bounds,
                format!(
                    "access to {:#x}..{:#x} outside live memory (top {:#x})",
                    addr,
                    end,
                    self.top()
                ),
            ));
        }
        Ok(addr as usize..end as usize)
    }

    fn read_bytes<const N: usize>(&self, addr: u64) -> ExecResult<[u8; N]> {
        let range = self.range(addr, N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[range]);
        Ok(buf)
    }

    fn write_bytes(&mut self, addr: u64, data: &[u8]) -> ExecResult<()> {
        let range = self.range(addr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Load a value of type `ty`
    pub fn load(&self, addr: u64, ty: Type) -> ExecResult<Slot> {
        Ok(match ty {
            Type::I1 => Slot::Int((self.read_bytes::<1>(addr)?[0] & 1) as i64),
            Type::I16 => Slot::Int(i16::from_le_bytes(self.read_bytes(addr)?) as i64),
            Type::I32 => Slot::Int(i32::from_le_bytes(self.read_bytes(addr)?) as i64),
            Type::I64 => Slot::Int(i64::from_le_bytes(self.read_bytes(addr)?)),
            Type::F64 => Slot::Float(f64::from_le_bytes(self.read_bytes(addr)?)),
            Type::Ptr => Slot::Ptr(u64::from_le_bytes(self.read_bytes(addr)?)),
            Type::Str => Slot::Str(HeapHandle::from_bits(u64::from_le_bytes(
                self.read_bytes(addr)?,
            ))),
            Type::Void | Type::Error | Type::ResumeTok => {
                return Err(Trap::invalid(format!("cannot load a value of type {}", ty)))
            }
        })
    }

    /// Store `value` as type `ty`
    pub fn store(&mut self, addr: u64, ty: Type, value: Slot) -> ExecResult<()> {
        match (ty, value) {
            (Type::I1, Slot::Int(v)) => self.write_bytes(addr, &[(v & 1) as u8]),
            (Type::I16, Slot::Int(v)) => self.write_bytes(addr, &(v as i16).to_le_bytes()),
            (Type::I32, Slot::Int(v)) => self.write_bytes(addr, &(v as i32).to_le_bytes()),
            (Type::I64, Slot::Int(v)) => self.write_bytes(addr, &v.to_le_bytes()),
            (Type::F64, Slot::Float(v)) => self.write_bytes(addr, &v.to_le_bytes()),
            (Type::Ptr, Slot::Ptr(v)) => self.write_bytes(addr, &v.to_le_bytes()),
            (Type::Str, Slot::Str(h)) => {
                let bits = h.map_or(0, HeapHandle::to_bits);
                self.write_bytes(addr, &bits.to_le_bytes())
            }
            (ty, value) => Err(Trap::invalid(format!(
                "cannot store {} as a value of type {}",
                value, ty
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut mem = LinearMemory::new(1 << 20);
        let g0 = mem.alloc_global(1);
        let g1 = mem.alloc_global(8);
        assert_eq!(g0, NULL_GUARD_BYTES);
        assert_eq!(g1, NULL_GUARD_BYTES + 8);
        assert_eq!(mem.stack_base(), NULL_GUARD_BYTES + 16);
        let a = mem.stack_alloc(3, mem.top(), 64).unwrap();
        assert_eq!(a, mem.stack_base());
        assert_eq!(mem.top(), a + 8);
    }

    #[test]
    fn test_load_store_widths() {
        let mut mem = LinearMemory::new(1 << 20);
        let base = mem.top();
        let p = mem.stack_alloc(32, base, 1024).unwrap();
        mem.store(p, Type::I16, Slot::Int(-2)).unwrap();
        assert_eq!(mem.load(p, Type::I16).unwrap(), Slot::Int(-2));
        assert_eq!(mem.load(p, Type::I1).unwrap(), Slot::Int(0));
        mem.store(p + 8, Type::I32, Slot::Int(0x1_0000_0001)).unwrap();
        assert_eq!(mem.load(p + 8, Type::I32).unwrap(), Slot::Int(1));
        mem.store(p + 16, Type::F64, Slot::Float(2.5)).unwrap();
        assert_eq!(mem.load(p + 16, Type::F64).unwrap(), Slot::Float(2.5));
        let h = HeapHandle::new(3, 1);
        mem.store(p + 24, Type::Str, Slot::Str(Some(h))).unwrap();
        assert_eq!(mem.load(p + 24, Type::Str).unwrap(), Slot::Str(Some(h)));
        mem.store(p + 24, Type::Str, Slot::Str(None)).unwrap();
        assert_eq!(mem.load(p + 24, Type::Str).unwrap(), Slot::Str(None));
    }

    #[test]
    fn test_access_faults() {
        let mut mem = LinearMemory::new(1 << 20);
        let base = mem.top();
        let p = mem.stack_alloc(8, base, 1024).unwrap();
        assert_eq!(mem.load(0, Type::I64).unwrap_err().kind, TrapKind::NullPointer);
        assert_eq!(mem.load(p + 4, Type::I64).unwrap_err().kind, TrapKind::Bounds);
        let handle = HeapHandle::new(0, 1).to_bits();
        assert_eq!(mem.load(handle, Type::I64).unwrap_err().kind, TrapKind::Bounds);
        assert_eq!(
            mem.store(p, Type::I64, Slot::Float(1.0)).unwrap_err().kind,
            TrapKind::InvalidOperation
        );

        mem.stack_reset(base);
        assert_eq!(mem.load(p, Type::I64).unwrap_err().kind, TrapKind::Bounds);
    }

    #[test]
    fn test_stack_limits() {
        let mut mem = LinearMemory::new(NULL_GUARD_BYTES as usize + 64);
        let base = mem.top();
        assert_eq!(
            mem.stack_alloc(40, base, 32).unwrap_err().kind,
            TrapKind::StackOverflow
        );
        mem.stack_alloc(32, base, 128).unwrap();
        let trap = mem.stack_alloc(64, base, 128).unwrap_err();
        assert_eq!(trap.kind, TrapKind::StackOverflow);
        assert!(trap.message.contains("linear memory limit"));
    }

    #[test]
    fn test_realloc_is_zeroed() {
        let mut mem = LinearMemory::new(1 << 20);
        let base = mem.top();
        let p = mem.stack_alloc(8, base, 64).unwrap();
        mem.store(p, Type::I64, Slot::Int(99)).unwrap();
        mem.stack_reset(base);
        let q = mem.stack_alloc(8, base, 64).unwrap();
        assert_eq!(p, q);
        assert_eq!(mem.load(q, Type::I64).unwrap(), Slot::Int(0));
    }
}

//! Register file for the interpreter
//!
//! Each active frame occupies a window of registers in one contiguous
//! array, indexed by the virtual register ids of its function.
//!
//! # Memory Layout
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Frame 2 registers (current)            │  ← top
//! │   %0..%N indexed by ValueId            │
//! ├────────────────────────────────────────┤
//! │ Frame 1 registers                      │  ← reg_base for frame 2
//! ├────────────────────────────────────────┤
//! │ Frame 0 registers (entry function)     │  ← reg_base for frame 1
//! └────────────────────────────────────────┘  ← reg_base=0 for frame 0
//! ```

use crate::slot::Slot;
use crate::trap::{ExecResult, Trap, TrapKind};
use tern_il::ValueId;

/// Contiguous register storage shared by all frames of a run
#[derive(Debug)]
pub struct RegisterFile {
    /// Register storage
    registers: Vec<Slot>,
    /// Next free register (top of allocated space)
    top: usize,
    /// Maximum number of registers
    max_size: usize,
}

impl RegisterFile {
    /// Create a register file holding at most `max_size` slots
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            registers: Vec::with_capacity(max_size.min(256)),
            top: 0,
            max_size,
        }
    }

    /// Allocate a window of `count` registers, returning its base.
    ///
    /// All registers start as [`Slot::Void`].
    pub fn alloc_frame(&mut self, count: usize) -> ExecResult<usize> {
        let base = self.top;
        let new_top = base + count;
        if new_top > self.max_size {
            return Err(Trap::new(
                TrapKind::StackOverflow,
                format!(
                    "register file exhausted: {} registers requested, {} in use, limit {}",
                    count, base, self.max_size
                ),
            ));
        }
        if new_top > self.registers.len() {
            self.registers.resize(new_top, Slot::Void);
        }
        // Reused slots may hold values from an earlier frame.
        for slot in &mut self.registers[base..new_top] {
            *slot = Slot::Void;
        }
        self.top = new_top;
        Ok(base)
    }

    /// Free the topmost window, shrinking back to `base`.
    #[inline]
    pub fn free_frame(&mut self, base: usize) {
        self.top = base.min(self.top);
    }

    /// Drop every window
    pub fn clear(&mut self) {
        self.top = 0;
    }

    /// Register `id` of the window at `base`
    #[inline]
    pub fn get(&self, base: usize, id: ValueId) -> ExecResult<Slot> {
        let index = base + id.index();
        if index < self.top {
            Ok(self.registers[index])
        } else {
            Err(Trap::invalid(format!(
                "register %{} out of bounds (base={}, top={})",
                id.0, base, self.top
            )))
        }
    }

    /// Write register `id` of the window at `base`
    #[inline]
    pub fn set(&mut self, base: usize, id: ValueId, value: Slot) -> ExecResult<()> {
        let index = base + id.index();
        if index < self.top {
            self.registers[index] = value;
            Ok(())
        } else {
            Err(Trap::invalid(format!(
                "register %{} out of bounds (base={}, top={})",
                id.0, base, self.top
            )))
        }
    }

    /// Current top (next free slot)
    #[inline]
    pub fn top(&self) -> usize {
        self.top
    }

    /// Whether no window is allocated
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top == 0
    }
}

//! Execution statistics

use tern_il::Opcode;

/// Counters accumulated across runs of one interpreter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecStats {
    /// Executed instructions
    pub steps: u64,
    /// Frames pushed, entry frames included
    pub calls: u64,
    /// Extern invocations
    pub extern_calls: u64,
    /// Deepest call stack observed
    pub max_depth: usize,
    /// Most registers live at once across all frames
    pub peak_registers: usize,
    /// Per-opcode counts, empty unless opcode counting is enabled
    opcode_counts: Vec<u64>,
}

impl ExecStats {
    pub(crate) fn new(count_opcodes: bool) -> Self {
        Self {
            opcode_counts: if count_opcodes {
                vec![0; Opcode::COUNT]
            } else {
                Vec::new()
            },
            ..Self::default()
        }
    }

    #[inline]
    pub(crate) fn record(&mut self, op: Opcode) {
        self.steps += 1;
        if let Some(count) = self.opcode_counts.get_mut(op as usize) {
            *count += 1;
        }
    }

    /// Executions of `op` (0 when counting is disabled)
    pub fn opcode_count(&self, op: Opcode) -> u64 {
        self.opcode_counts.get(op as usize).copied().unwrap_or(0)
    }

    /// Opcodes that executed at least once, with their counts
    pub fn opcode_counts(&self) -> impl Iterator<Item = (Opcode, u64)> + '_ {
        Opcode::ALL
            .iter()
            .map(move |&op| (op, self.opcode_count(op)))
            .filter(|&(_, n)| n > 0)
    }
}

//! Execution profiling
//!
//! Optional instruction counting for tests and performance analysis.
//! The engine only holds a profiler when profiling was requested.

use crate::bytecode::Opcode;
use std::collections::HashMap;
use std::fmt::Write;

/// Per-run execution statistics
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    /// Whether profiling is enabled
    enabled: bool,
    /// Total instructions executed
    total_instructions: u64,
    /// Instructions executed per opcode
    instruction_counts: HashMap<Opcode, u64>,
    /// Executions per (blueprint, instruction index)
    location_counts: HashMap<(String, usize), u64>,
    /// Deepest operand stack seen in any activation
    max_stack_depth: usize,
    /// Most activations live at once
    max_call_depth: usize,
}

impl Profiler {
    /// Create a new profiler (disabled by default)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new profiler with profiling enabled
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Reset profiling statistics
    pub fn reset(&mut self) {
        self.total_instructions = 0;
        self.instruction_counts.clear();
        self.location_counts.clear();
        self.max_stack_depth = 0;
        self.max_call_depth = 0;
    }

    /// Record one executed instruction
    pub fn record_instruction_at(&mut self, opcode: Opcode, function: &str, pc: usize) {
        if !self.enabled {
            return;
        }

        self.total_instructions += 1;
        *self.instruction_counts.entry(opcode).or_insert(0) += 1;
        *self
            .location_counts
            .entry((function.to_string(), pc))
            .or_insert(0) += 1;
    }

    pub fn update_stack_depth(&mut self, depth: usize) {
        if self.enabled && depth > self.max_stack_depth {
            self.max_stack_depth = depth;
        }
    }

    pub fn update_call_depth(&mut self, depth: usize) {
        if self.enabled && depth > self.max_call_depth {
            self.max_call_depth = depth;
        }
    }

    pub fn total_instructions(&self) -> u64 {
        self.total_instructions
    }

    /// Executions of a specific opcode
    pub fn instruction_count(&self, opcode: Opcode) -> u64 {
        self.instruction_counts.get(&opcode).copied().unwrap_or(0)
    }

    /// Executions of the instruction at `pc` in `function`
    pub fn count_at(&self, function: &str, pc: usize) -> u64 {
        self.location_counts
            .get(&(function.to_string(), pc))
            .copied()
            .unwrap_or(0)
    }

    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Human-readable summary, most frequent opcodes first
    pub fn report(&self) -> String {
        if !self.enabled {
            return "Profiling not enabled".to_string();
        }

        let mut report = String::new();
        let _ = writeln!(
            report,
            "Total instructions executed: {}",
            self.total_instructions
        );
        let _ = writeln!(report, "Max operand stack depth: {}", self.max_stack_depth);
        let _ = writeln!(report, "Max call depth: {}\n", self.max_call_depth);

        if self.instruction_counts.is_empty() {
            report.push_str("No instructions recorded\n");
            return report;
        }

        report.push_str("Instruction counts by opcode:\n");
        let mut counts: Vec<_> = self.instruction_counts.iter().collect();
        // Ties broken by mnemonic so the report is stable
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.mnemonic().cmp(b.0.mnemonic())));

        for (opcode, count) in counts {
            let percentage = (*count as f64 / self.total_instructions as f64) * 100.0;
            let _ = writeln!(
                report,
                "  {:<10} {:>10} ({:>6.2}%)",
                opcode.mnemonic(),
                count,
                percentage
            );
        }

        report
    }
}

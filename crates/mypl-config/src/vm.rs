//! Resolved execution engine settings

use crate::file::VmSection;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Default entry point function name
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// Default first heap object id
pub const DEFAULT_HEAP_BASE_ID: u64 = 1111;

/// Execution engine configuration with every layer applied
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct VmConfig {
    /// Zero-argument function `run()` starts in
    pub entry_point: String,
    /// First object id handed out; ids grow monotonically from here
    pub heap_base_id: u64,
    /// Maximum number of live activations (`None` = unbounded)
    pub max_call_depth: Option<usize>,
    /// Dump frame, pc, instruction, stack, and heap before each instruction
    pub trace_execution: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            heap_base_id: DEFAULT_HEAP_BASE_ID,
            max_call_depth: None,
            trace_execution: false,
        }
    }
}

impl VmConfig {
    /// Overlay the keys present in a `[vm]` table
    pub fn apply(&mut self, section: &VmSection) {
        if let Some(entry) = &section.entry_point {
            self.entry_point = entry.clone();
        }
        if let Some(base) = section.heap_base_id {
            self.heap_base_id = base;
        }
        if let Some(depth) = section.max_call_depth {
            self.max_call_depth = Some(depth);
        }
        if let Some(trace) = section.trace_execution {
            self.trace_execution = trace;
        }
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace_execution = trace;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = Some(depth);
        self
    }

    pub fn with_heap_base_id(mut self, base: u64) -> Self {
        self.heap_base_id = base;
        self
    }

    pub fn with_entry_point(mut self, entry: impl Into<String>) -> Self {
        self.entry_point = entry.into();
        self
    }

    /// Validate the resolved configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.entry_point.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "vm.entry_point".to_string(),
                reason: "entry point cannot be empty".to_string(),
            });
        }
        if self.max_call_depth == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "vm.max_call_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

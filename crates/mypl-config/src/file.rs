//! Configuration files (mypl.toml and ~/.mypl/config.toml)
//!
//! Both files share one layout. Every key is optional so that a project
//! file only needs to mention what it overrides.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Execution engine settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm: Option<VmSection>,
}

/// `[vm]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct VmSection {
    /// Name of the zero-argument function execution starts in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,

    /// First object id handed out by the heap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap_base_id: Option<u64>,

    /// Maximum number of simultaneously live activations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_call_depth: Option<usize>,

    /// Print every executed instruction with stack and heap state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_execution: Option<bool>,
}

impl ConfigFile {
    /// Load a configuration file from disk
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            file: "<string>".into(),
            error: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that can never be valid, regardless of layering
    pub fn validate(&self) -> ConfigResult<()> {
        let Some(vm) = &self.vm else {
            return Ok(());
        };

        if let Some(entry) = &vm.entry_point {
            if entry.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "vm.entry_point".to_string(),
                    reason: "entry point cannot be empty".to_string(),
                });
            }
        }

        if vm.max_call_depth == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "vm.max_call_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_vm_section() {
        let config = ConfigFile::parse(
            r#"
[vm]
entry_point = "start"
heap_base_id = 1
max_call_depth = 64
trace_execution = true
"#,
        )
        .unwrap();

        assert_eq!(
            config.vm,
            Some(VmSection {
                entry_point: Some("start".to_string()),
                heap_base_id: Some(1),
                max_call_depth: Some(64),
                trace_execution: Some(true),
            })
        );
    }

    #[test]
    fn test_parse_empty_file() {
        let config = ConfigFile::parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ConfigFile::parse("[vm]\nturbo = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_empty_entry_point_rejected() {
        let err = ConfigFile::parse("[vm]\nentry_point = \"  \"\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "vm.entry_point")
        );
    }

    #[test]
    fn test_zero_call_depth_rejected() {
        let err = ConfigFile::parse("[vm]\nmax_call_depth = 0\n").unwrap_err();
        assert!(err.to_string().contains("vm.max_call_depth"));
    }

    #[test]
    fn test_serialization_skips_unset_keys() {
        let config = ConfigFile {
            vm: Some(VmSection {
                trace_execution: Some(true),
                ..Default::default()
            }),
        };
        let toml = config.to_toml_string().unwrap();
        assert_eq!(toml, "[vm]\ntrace_execution = true\n");
    }
}

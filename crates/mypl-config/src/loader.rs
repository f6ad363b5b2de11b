//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::file::ConfigFile;
use crate::vm::VmConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "mypl.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.mypl/config.toml) - lowest priority
/// 2. Project config (./mypl.toml) - overrides global
/// 3. Environment variables (MYPL_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Execution engine settings
    pub vm: VmConfig,

    /// Project root directory (where mypl.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config path instead of ~/.mypl/config.toml
    pub fn with_global_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find mypl.toml. A missing project
    /// file is not an error: defaults (plus global config) apply.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project) = Self::find_project_config(start_dir)?;
        self.resolve(project, project_root)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project = ConfigFile::load_from_file(config_path)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());
        self.resolve(project, project_root)
    }

    /// Load configuration from TOML text (no project root)
    pub fn load_from_str(&mut self, content: &str) -> ConfigResult<Config> {
        let project = ConfigFile::parse(content)?;
        self.resolve(project, None)
    }

    fn resolve(
        &mut self,
        project: ConfigFile,
        project_root: Option<PathBuf>,
    ) -> ConfigResult<Config> {
        let mut vm = VmConfig::default();

        if let Some(section) = self.load_global_config()?.vm {
            vm.apply(&section);
        }
        if let Some(section) = project.vm {
            vm.apply(&section);
        }

        let vm = Self::apply_env_overrides(vm)?;
        vm.validate()?;

        Ok(Config { vm, project_root })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(start_dir: &Path) -> ConfigResult<(Option<PathBuf>, ConfigFile)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let config = ConfigFile::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ConfigFile::default())),
            }
        }
    }

    /// Load global configuration, defaulting when the file does not exist
    fn load_global_config(&mut self) -> ConfigResult<ConfigFile> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match Self::global_config_dir() {
                Ok(dir) => {
                    let path = dir.join("config.toml");
                    self.global_config_path = Some(path.clone());
                    path
                }
                // No home directory means no global layer
                Err(ConfigError::HomeNotFound) => return Ok(ConfigFile::default()),
                Err(e) => return Err(e),
            },
        };

        if !path.exists() {
            return Ok(ConfigFile::default());
        }

        ConfigFile::load_from_file(&path)
    }

    /// Apply environment variable overrides
    ///
    /// Recognized: MYPL_TRACE, MYPL_MAX_CALL_DEPTH, MYPL_HEAP_BASE, MYPL_ENTRY
    fn apply_env_overrides(mut vm: VmConfig) -> ConfigResult<VmConfig> {
        if let Ok(trace) = env::var("MYPL_TRACE") {
            vm.trace_execution = matches!(trace.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        if let Ok(depth) = env::var("MYPL_MAX_CALL_DEPTH") {
            let depth = depth
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "MYPL_MAX_CALL_DEPTH".to_string(),
                    reason: e.to_string(),
                })?;
            vm.max_call_depth = Some(depth);
        }

        if let Ok(base) = env::var("MYPL_HEAP_BASE") {
            vm.heap_base_id = base
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "MYPL_HEAP_BASE".to_string(),
                    reason: e.to_string(),
                })?;
        }

        if let Ok(entry) = env::var("MYPL_ENTRY") {
            vm.entry_point = entry;
        }

        Ok(vm)
    }

    /// Get the global configuration directory (~/.mypl)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".mypl"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has mypl.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn isolated_loader(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_global_path(dir.path().join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(PROJECT_CONFIG_FILE),
            "[vm]\nheap_base_id = 7\n",
        )
        .unwrap();
        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let config = isolated_loader(&temp_dir)
            .load_from_directory(&sub_dir)
            .unwrap();

        assert_eq!(config.vm.heap_base_id, 7);
        assert_eq!(config.project_root(), Some(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn test_env_trace_override() {
        let temp_dir = TempDir::new().unwrap();
        env::set_var("MYPL_TRACE", "1");
        let config = isolated_loader(&temp_dir).load_from_str("").unwrap();
        env::remove_var("MYPL_TRACE");

        assert!(config.vm.trace_execution);
    }

    #[test]
    #[serial]
    fn test_env_bad_depth_is_invalid_value() {
        let temp_dir = TempDir::new().unwrap();
        env::set_var("MYPL_MAX_CALL_DEPTH", "deep");
        let result = isolated_loader(&temp_dir).load_from_str("");
        env::remove_var("MYPL_MAX_CALL_DEPTH");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}

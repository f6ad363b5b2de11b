//! Engine settings for MyPL
//!
//! Settings come from four layers, each overriding the one before:
//! built-in defaults, `~/.mypl/config.toml`, the nearest `mypl.toml`
//! found walking up from the working directory, and `MYPL_*`
//! environment variables.
//!
//! ```no_run
//! use mypl_config::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::new().load_from_directory(Path::new(".")).unwrap();
//! println!("entry point: {}", config.vm.entry_point);
//! ```

pub mod file;
pub mod loader;
pub mod vm;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in {file}: {error}")]
    Parse {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Failed to render configuration: {0}")]
    Render(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub use file::{ConfigFile, VmSection};
pub use loader::{Config, ConfigLoader};
pub use vm::VmConfig;

//! TOML configuration loading.
//!
//! Any `DeserializeOwned` type gets [`ConfigLoader::load`]; the HAL loads its
//! `io.toml` through it:
//!
//! ```rust,no_run
//! use shiftio_common::config::{ConfigError, ConfigLoader};
//! use shiftio_common::hal::config::HalConfig;
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = HalConfig::load(Path::new("/etc/shiftio/io.toml"))?;
//!     println!("{} expanders", config.expanders.len());
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error returned while reading or parsing a configuration file.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("Failed to read {path}: {reason}")]
    ReadError {
        /// File that failed.
        path: PathBuf,
        /// OS error text.
        reason: String,
    },

    /// TOML syntax error or a value of the wrong shape.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for the `[shared]` section, lowercase in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-cycle transport detail.
    Trace,
    /// Periodic flow statistics.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Retried cycle failures.
    Warn,
    /// Halted flows.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// `[shared]` section of `io.toml`.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "control-panel"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Node instance name, logged at startup.
    pub service_name: String,
}

impl SharedConfig {
    /// Reject an empty `service_name`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a configuration type from a TOML file.
///
/// Loading only parses; callers run their own `validate()` afterwards.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Read and parse `path`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
            _ => ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        Self::parse(&content)
    }

    /// Parse a TOML string.
    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

//! Fastbuild configuration system
//!
//! Loads and validates the `fastbuild.json` project configuration:
//! toolchain invocation, cache directory, recognized source/header
//! extensions, untracked-file policy, and the macrotarget → pattern map.
//!
//! The configuration is strongly typed and validated in a single pass so
//! that a bad config fails fast with a precise diagnostic instead of
//! surfacing deep inside a later build phase.

pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON in {file}: {error}")]
    JsonParseError {
        file: PathBuf,
        error: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use project::{FastbuildConfig, UntrackedAction, CONFIG_FILE_NAME};

//! Build engine error types

use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] fastbuild_config::ConfigError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot resolve '{path}': {reason}")]
    ResolutionError { path: String, reason: String },

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Git error: {0}")]
    GitError(String),

    #[error("{count} file(s) failed to compile")]
    CompileFailed { count: usize },

    #[error("Linking failed for '{output}'")]
    LinkFailed { output: String },

    #[error("Build failed: {0}")]
    BuildFailed(String),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a path resolution error
    pub fn resolution(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::ResolutionError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a cache error
    pub fn cache(message: impl ToString) -> Self {
        Self::CacheError(message.to_string())
    }

    /// Whether this error denotes a failed compile or link step, as opposed
    /// to a fatal configuration/IO/cache condition.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, Self::CompileFailed { .. } | Self::LinkFailed { .. })
    }
}

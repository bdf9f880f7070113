//! Project configuration (`fastbuild.json`)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default configuration file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "fastbuild.json";

/// Policy for files git reports as untracked (`??`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UntrackedAction {
    /// Include the file, after confirming with the user where possible.
    #[default]
    Ask,
    /// Include the file unconditionally.
    Accept,
    /// Never include untracked files via the version-control scan.
    Ignore,
}

impl UntrackedAction {
    /// Whether untracked files are dropped from the version-control scan.
    pub fn ignores_untracked(&self) -> bool {
        matches!(self, Self::Ignore)
    }
}

impl std::fmt::Display for UntrackedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Accept => write!(f, "accept"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

/// Project configuration loaded from `fastbuild.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FastbuildConfig {
    /// Compiler executable (e.g. "gcc", "g++", "clang").
    pub compiler: String,

    /// Extra parameters passed to every compiler invocation.
    #[serde(default)]
    pub compiler_params: String,

    /// Extra parameters passed to the linker (and forwarded to compile steps).
    #[serde(default)]
    pub linker_params: String,

    /// Directory holding compiled objects, checksums and the dependency
    /// tree cache.
    #[serde(default = "default_build_path")]
    pub targets_build_path: String,

    /// Linker output file name and/or path.
    pub linker_output_file: String,

    /// Shell commands executed after a build.
    #[serde(default)]
    pub postprocessing_shell: Vec<String>,

    /// Run post-build commands even when the build failed.
    #[serde(default)]
    pub postprocessing_if_fails: bool,

    /// What to do with untracked files reported by git.
    #[serde(default)]
    pub untracked_action: UntrackedAction,

    /// Recognized source file extensions (e.g. ".c", ".cpp").
    pub sources_endings: Vec<String>,

    /// Recognized header file extensions (e.g. ".h", ".hpp").
    pub headers_endings: Vec<String>,

    /// Macrotarget name → list of file-name patterns.
    pub macrotargets: BTreeMap<String, Vec<String>>,
}

fn default_build_path() -> String {
    "fastbuild".to_string()
}

impl FastbuildConfig {
    /// Load and validate configuration from the given file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|error| ConfigError::JsonParseError {
                file: path.to_path_buf(),
                error,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, failing fast with a precise diagnostic.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.compiler.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "compiler".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.linker_output_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "linker_output_file".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.targets_build_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "targets_build_path".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.macrotargets.is_empty() {
            return Err(ConfigError::ValidationError(
                "no macrotargets defined".to_string(),
            ));
        }

        for (name, patterns) in &self.macrotargets {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "macrotarget with empty name".to_string(),
                ));
            }
            if patterns.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "macrotarget '{name}' has no file patterns"
                )));
            }
        }

        Self::validate_endings("sources_endings", &self.sources_endings)?;
        Self::validate_endings("headers_endings", &self.headers_endings)?;

        Ok(())
    }

    fn validate_endings(field: &str, endings: &[String]) -> ConfigResult<()> {
        if endings.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: "must list at least one extension".to_string(),
            });
        }

        for ending in endings {
            if !ending.starts_with('.') || ending.len() < 2 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("'{ending}' is not a '.ext' style extension"),
                });
            }
        }

        Ok(())
    }
}

//! Fastbuild incremental build engine
//!
//! Determines the minimal set of source files to recompile since the last
//! successful build and drives the compile/link pipeline:
//! - Depth-bounded extraction of local include relationships
//! - Two-tier change detection (version-control status + content checksums)
//! - Checksum-keyed dependency tree cache reused across runs
//! - Build list composition (direct, dependent, missing-artifact sources)
//! - Parallel sharded compilation with a shared failure flag

pub mod changes;
pub mod checksum;
pub mod deps;
pub mod error;
pub mod output;
pub mod paths;
pub mod plan;
pub mod runner;
pub mod scheduler;
pub mod toolchain;
pub mod tree_cache;

// Re-export main types
pub use changes::{ChangeDetector, GitStatus, StatusEntry, StatusKind};
pub use checksum::{hash_bytes, hash_file, ChecksumBaseline, BASELINE_FILE};
pub use deps::{
    scan_includes, DependencyData, DependencyScanner, SourceDependencies, TargetDependencies,
    DEFAULT_MAX_DEPTH,
};
pub use error::{BuildError, BuildResult};
pub use output::{Console, OutputMode};
pub use paths::{wildcard_match, MacroTarget, PathResolver};
pub use plan::{artifact_id, artifact_path, compose_build_list, detect_missing_artifacts, select_dependents};
pub use runner::{BuildRunner, RunContext, RunSummary, MAX_DEPTH_LIMIT, MAX_WORKERS};
pub use scheduler::{partition, run_build};
pub use toolchain::{CompileOutcome, Toolchain};
pub use tree_cache::DepTreeCache;

// Re-export the config types for convenience
pub use fastbuild_config::{ConfigError, FastbuildConfig, UntrackedAction};

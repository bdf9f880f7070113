//! Run orchestration
//!
//! Drives one fastbuild run end to end: expand macrotargets, build the
//! dependency data (cache-assisted), detect changes, compose the build
//! list, compile in parallel, link, run hooks, and persist the new
//! checksum baseline. Baseline and cache garbage collection are committed
//! only on full success.

use crate::changes::{ChangeDetector, GitStatus};
use crate::checksum::ChecksumBaseline;
use crate::deps::{DependencyData, DependencyScanner};
use crate::error::{BuildError, BuildResult};
use crate::output::{Console, OutputMode};
use crate::paths::{MacroTarget, PathResolver};
use crate::scheduler;
use crate::toolchain::Toolchain;
use crate::tree_cache::DepTreeCache;
use crate::{deps, plan};
use fastbuild_config::FastbuildConfig;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Upper bound for the dependency traversal depth flag.
pub const MAX_DEPTH_LIMIT: usize = 99;
/// Upper bound for the worker count flag.
pub const MAX_WORKERS: usize = 32;

/// Per-run settings; explicit state instead of process-wide globals.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    pub output: OutputMode,
    /// Treat every file as changed, bypassing both detection paths.
    pub force_rebuild: bool,
    /// Maximum dependency traversal depth (0–99).
    pub max_depth: usize,
    /// Number of concurrent compile workers (1–32).
    pub workers: usize,
    /// Print the dependency tree and stop before change detection.
    pub deps_only: bool,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            output: OutputMode::Normal,
            force_rebuild: false,
            max_depth: deps::DEFAULT_MAX_DEPTH,
            workers: 1,
            deps_only: false,
        }
    }
}

impl RunContext {
    pub fn validate(&self) -> BuildResult<()> {
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(BuildError::BuildFailed(format!(
                "max depth {} out of range 0-{MAX_DEPTH_LIMIT}",
                self.max_depth
            )));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(BuildError::BuildFailed(format!(
                "worker count {} out of range 1-{MAX_WORKERS}",
                self.workers
            )));
        }
        Ok(())
    }
}

/// Statistics for one completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Files enumerated across all macrotargets.
    pub enumerated_files: usize,
    /// Files selected for recompilation, in build-list order.
    pub build_list: Vec<String>,
    /// Compile invocations that failed.
    pub failed_files: usize,
    /// Stale dependency tree cache entries removed.
    pub cache_entries_removed: usize,
    pub total_time: Duration,
    pub compile_time: Duration,
    pub link_time: Duration,
}

/// Orchestrates a single build run.
pub struct BuildRunner {
    config: FastbuildConfig,
    resolver: PathResolver,
    cache_dir: PathBuf,
    ctx: RunContext,
    console: Console,
}

impl BuildRunner {
    pub fn new(
        project_root: impl AsRef<Path>,
        config: FastbuildConfig,
        ctx: RunContext,
    ) -> BuildResult<Self> {
        ctx.validate()?;
        let resolver = PathResolver::new(project_root)?;
        let cache_dir = resolver.root().join(&config.targets_build_path);
        let console = Console::new(ctx.output);

        Ok(Self {
            config,
            resolver,
            cache_dir,
            ctx,
            console,
        })
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Execute the run.
    pub fn run(&mut self) -> BuildResult<RunSummary> {
        let run_start = Instant::now();
        let mut summary = RunSummary::default();

        self.console.step("Step 1: Expanding macrotargets");
        let targets = self.resolver.enumerate_targets(&self.config.macrotargets)?;
        summary.enumerated_files = targets.iter().map(|t| t.files.len()).sum();
        self.console.info(&format!(
            "{} file(s) across {} macrotarget(s)",
            summary.enumerated_files,
            targets.len()
        ));

        self.console.step("Step 2: Building dependency tree");
        let mut tree_cache = DepTreeCache::new(&self.cache_dir);
        let dep_data = {
            let mut scanner =
                DependencyScanner::new(&self.resolver, &mut tree_cache, self.ctx.max_depth);
            scanner.build_all(&targets)?
        };

        if self.ctx.deps_only {
            self.print_dependency_tree(&dep_data);
            summary.total_time = run_start.elapsed();
            return Ok(summary);
        }

        self.console.step("Step 3: Calculating changes");
        let build_list = self.compose_build_list(&targets, &dep_data)?;
        summary.build_list = build_list.clone();

        if build_list.is_empty() {
            self.console.info("Already up-to-date or no changes detected.");
        }

        self.console.step("Step 4: Compiling");
        let compile_start = Instant::now();
        let failed = self.compile(&build_list);
        summary.compile_time = compile_start.elapsed();
        summary.failed_files = failed;

        if failed > 0 {
            self.run_failure_hooks();
            self.console.error(
                "Some targets failed to compile. Please fix errors, and run fastbuild again.",
            );
            return Err(BuildError::CompileFailed { count: failed });
        }

        self.console.step("Step 5: Linking");
        let toolchain = Toolchain::new(&self.config, &self.resolver, &self.cache_dir);
        let link_start = Instant::now();
        if let Err(e) = toolchain.link(&self.console) {
            self.run_failure_hooks();
            self.console
                .error("Failed to link obj files. Please fix errors, and run fastbuild again.");
            return Err(e);
        }
        summary.link_time = link_start.elapsed();

        if !self.config.postprocessing_shell.is_empty() {
            self.console.step("Step 6: Post-build processing");
            toolchain.run_hooks(&self.config.postprocessing_shell, &self.console)?;
        }

        // Full success: advance the baseline and drop stale cache entries.
        let baseline = ChecksumBaseline::generate(&dep_data, &self.resolver)?;
        baseline.save(&self.cache_dir)?;
        summary.cache_entries_removed = tree_cache.collect_garbage()?;
        self.console.verbose(&format!(
            "Baseline: {} file(s); cache: {} stale entr(ies) removed",
            baseline.len(),
            summary.cache_entries_removed
        ));

        summary.total_time = run_start.elapsed();
        Ok(summary)
    }

    /// Merge both change-evidence paths with the missing-artifact scan.
    fn compose_build_list(
        &self,
        targets: &[MacroTarget],
        dep_data: &DependencyData,
    ) -> BuildResult<Vec<String>> {
        // A broken or absent git setup degrades to checksum-only detection.
        let status = match GitStatus::query(&self.resolver) {
            Ok(status) => status,
            Err(e) => {
                self.console
                    .warn(&format!("{e}; falling back to checksum detection only"));
                GitStatus::default()
            }
        };

        let baseline = ChecksumBaseline::load(&self.cache_dir)?;
        let detector = ChangeDetector::new(
            &self.resolver,
            &baseline,
            &status,
            self.config.untracked_action,
            self.ctx.force_rebuild,
            self.console,
        );

        let sources = detector.detect_changed(&self.config.sources_endings, dep_data, false)?;
        let headers = detector.detect_changed(&self.config.headers_endings, dep_data, true)?;

        let dependents = plan::select_dependents(dep_data, &headers);
        for dep in &dependents {
            if !sources.contains(dep) {
                self.console.added_file(dep, "dependency");
            }
        }

        let missing = plan::detect_missing_artifacts(targets, &self.cache_dir)?;
        for file in &missing {
            if !sources.contains(file) && !dependents.contains(file) {
                self.console.added_file(file, "new object");
            }
        }

        Ok(plan::compose_build_list(sources, &dependents, &missing))
    }

    /// Compile the build list with the configured worker count; returns the
    /// number of failed invocations.
    fn compile(&self, build_list: &[String]) -> usize {
        if build_list.is_empty() {
            self.console.info("Nothing to compile.");
            return 0;
        }

        let toolchain = Toolchain::new(&self.config, &self.resolver, &self.cache_dir);
        let failed = AtomicUsize::new(0);
        let console = self.console;

        scheduler::run_build(build_list, self.ctx.workers, |file| {
            match toolchain.compile(file, &console) {
                Ok(outcome) if outcome.success => true,
                Ok(_) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    false
                }
                Err(e) => {
                    console.error(&format!("{e}"));
                    failed.fetch_add(1, Ordering::Relaxed);
                    false
                }
            }
        });

        failed.load(Ordering::Relaxed)
    }

    fn run_failure_hooks(&self) {
        if self.config.postprocessing_if_fails && !self.config.postprocessing_shell.is_empty() {
            let toolchain = Toolchain::new(&self.config, &self.resolver, &self.cache_dir);
            if let Err(e) = toolchain.run_hooks(&self.config.postprocessing_shell, &self.console) {
                self.console.warn(&format!("{e}"));
            }
        }
    }

    fn print_dependency_tree(&self, dep_data: &DependencyData) {
        for target in &dep_data.targets {
            self.console.info(&format!("{}:", target.name));
            for source in &target.sources {
                self.console.info(&format!("  {}", source.source));
                for dep in &source.includes {
                    self.console.info(&format!("    -> {dep}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_context_default() {
        let ctx = RunContext::default();
        assert_eq!(ctx.max_depth, deps::DEFAULT_MAX_DEPTH);
        assert_eq!(ctx.workers, 1);
        assert!(!ctx.force_rebuild);
        assert!(!ctx.deps_only);
        ctx.validate().unwrap();
    }

    #[test]
    fn test_run_context_rejects_out_of_range_depth() {
        let ctx = RunContext {
            max_depth: 100,
            ..Default::default()
        };
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_run_context_rejects_out_of_range_workers() {
        let zero = RunContext {
            workers: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let too_many = RunContext {
            workers: 33,
            ..Default::default()
        };
        assert!(too_many.validate().is_err());
    }
}

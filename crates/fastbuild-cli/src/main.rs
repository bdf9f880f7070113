//! Fastbuild command-line interface

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use fastbuild_build::{BuildError, BuildRunner, OutputMode, RunContext, UntrackedAction};
use fastbuild_config::{FastbuildConfig, CONFIG_FILE_NAME};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

/// Fast, selective, incremental builds for C/C++ projects.
///
/// Reads a macrotarget → source-pattern mapping from fastbuild.json,
/// recompiles only the files that changed since the last successful build
/// (directly, or through a header they include), links the result, and
/// persists checksums for the next run.
#[derive(Parser)]
#[command(name = "fastbuild")]
#[command(version)]
struct Cli {
    /// Suppress progress output (errors only)
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Verbose output (dependency trees, cache activity)
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    verbose: bool,

    /// Rebuild every enumerated file, ignoring change detection
    #[arg(long = "rebuild-all", short = 'a')]
    rebuild_all: bool,

    /// Alternate configuration file path
    #[arg(long = "input", short = 'i', value_name = "FILE")]
    input: Option<PathBuf>,

    /// Include untracked files without asking
    #[arg(long = "always-yes", short = 'y')]
    always_yes: bool,

    /// Maximum depth of the dependency tree traversal
    #[arg(long = "recmax", short = 'r', value_name = "0-99",
          default_value_t = fastbuild_build::DEFAULT_MAX_DEPTH as u32,
          value_parser = clap::value_parser!(u32).range(0..=99))]
    recmax: u32,

    /// Number of concurrent compile workers
    #[arg(long = "jobs", short = 'j', value_name = "1-32",
          default_value_t = 4,
          value_parser = clap::value_parser!(u32).range(1..=32))]
    jobs: u32,

    /// Print the dependency tree and exit without building
    #[arg(long = "deps-only")]
    deps_only: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            match err.downcast_ref::<BuildError>() {
                Some(e) if e.is_build_failure() => ExitCode::from(1),
                _ => ExitCode::from(2),
            }
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let start = Instant::now();

    let config_path = cli
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let mut config = FastbuildConfig::load_from_file(&config_path)
        .with_context(|| format!("cannot load {}", config_path.display()))?;

    if cli.always_yes && config.untracked_action == UntrackedAction::Ask {
        config.untracked_action = UntrackedAction::Accept;
    }

    let output = if cli.quiet {
        OutputMode::Quiet
    } else if cli.verbose {
        OutputMode::Verbose
    } else {
        OutputMode::Normal
    };

    let ctx = RunContext {
        output,
        force_rebuild: cli.rebuild_all,
        max_depth: cli.recmax as usize,
        workers: cli.jobs as usize,
        deps_only: cli.deps_only,
    };

    // The project root is the directory containing the config file.
    let project_root = config_path
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", config_path.display()))?
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut runner = BuildRunner::new(&project_root, config, ctx)?;
    let summary = runner.run()?;

    if !cli.quiet {
        if cli.deps_only {
            println!(
                "\nDependency tree for {} file(s) computed in {:.2}s.",
                summary.enumerated_files,
                start.elapsed().as_secs_f64()
            );
        } else {
            println!(
                "\nFastbuild done in {:.2}s ({} of {} file(s) rebuilt). Thank you.",
                start.elapsed().as_secs_f64(),
                summary.build_list.len(),
                summary.enumerated_files
            );
        }
    }

    Ok(())
}

//! Compiler, linker and post-build hook invocation

use crate::error::{BuildError, BuildResult};
use crate::output::Console;
use crate::paths::PathResolver;
use crate::plan::{artifact_id, artifact_path};
use fastbuild_config::FastbuildConfig;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// Outcome of one compile step.
#[derive(Debug, Clone, Copy)]
pub struct CompileOutcome {
    pub success: bool,
    pub duration: Duration,
}

/// External compiler/linker driver.
///
/// Compiler and linker invocations are argv-split directly (parameters are
/// whitespace-separated, as in the config file); only post-build hooks go
/// through the shell.
#[derive(Debug, Clone)]
pub struct Toolchain {
    compiler: String,
    compiler_params: Vec<String>,
    linker_params: Vec<String>,
    output_file: String,
    cache_dir: PathBuf,
    project_root: PathBuf,
}

impl Toolchain {
    pub fn new(config: &FastbuildConfig, resolver: &PathResolver, cache_dir: &Path) -> Self {
        Self {
            compiler: config.compiler.clone(),
            compiler_params: split_params(&config.compiler_params),
            linker_params: split_params(&config.linker_params),
            output_file: config.linker_output_file.clone(),
            cache_dir: cache_dir.to_path_buf(),
            project_root: resolver.root().to_path_buf(),
        }
    }

    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    /// Compile one canonical source into its content-addressed object file.
    pub fn compile(&self, canonical: &str, console: &Console) -> BuildResult<CompileOutcome> {
        let object = artifact_path(&self.cache_dir, canonical);
        let start = Instant::now();

        let status = Command::new(&self.compiler)
            .args(&self.compiler_params)
            .args(&self.linker_params)
            .arg("-c")
            .arg(canonical)
            .arg("-o")
            .arg(&object)
            .current_dir(&self.project_root)
            .status()
            .map_err(|e| BuildError::io(&self.compiler, e))?;

        let duration = start.elapsed();
        let success = status.success();

        if success {
            console.info(&format!(
                "[{}] Compile {} (object id: {}) [ok in {:.2}s]",
                self.compiler,
                canonical,
                &artifact_id(canonical)[..12],
                duration.as_secs_f64()
            ));
        } else {
            console.error(&format!("[{}] Compile {} [failed]", self.compiler, canonical));
        }

        Ok(CompileOutcome { success, duration })
    }

    /// Link every object in the cache directory into the output file.
    pub fn link(&self, console: &Console) -> BuildResult<()> {
        let objects = self.collect_objects()?;
        if objects.is_empty() {
            return Err(BuildError::BuildFailed(
                "no object files to link".to_string(),
            ));
        }

        console.info(&format!(
            "[{}] Linking {} ({} objects)",
            self.compiler,
            self.output_file,
            objects.len()
        ));

        let start = Instant::now();
        let status = Command::new(&self.compiler)
            .args(&objects)
            .arg("-o")
            .arg(&self.output_file)
            .args(&self.linker_params)
            .current_dir(&self.project_root)
            .status()
            .map_err(|e| BuildError::io(&self.compiler, e))?;

        if !status.success() {
            console.error(&format!("[{}] Linking {} [failed]", self.compiler, self.output_file));
            return Err(BuildError::LinkFailed {
                output: self.output_file.clone(),
            });
        }

        console.info(&format!(
            "[{}] Linking {} [ok in {:.2}s]",
            self.compiler,
            self.output_file,
            start.elapsed().as_secs_f64()
        ));
        Ok(())
    }

    /// Run post-build shell commands, stopping at the first failure.
    pub fn run_hooks(&self, commands: &[String], console: &Console) -> BuildResult<()> {
        for command in commands {
            console.verbose(&format!("Running post-build hook: {command}"));
            let status = Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&self.project_root)
                .status()
                .map_err(|e| BuildError::io("sh", e))?;

            if !status.success() {
                return Err(BuildError::BuildFailed(format!(
                    "post-build hook failed: {command}"
                )));
            }
        }
        Ok(())
    }

    fn collect_objects(&self) -> BuildResult<Vec<PathBuf>> {
        let mut objects = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir).map_err(|e| BuildError::io(&self.cache_dir, e))? {
            let entry = entry.map_err(|e| BuildError::io(&self.cache_dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("o") {
                objects.push(path);
            }
        }
        objects.sort();
        Ok(objects)
    }
}

fn split_params(params: &str) -> Vec<String> {
    params.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputMode;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn config(compiler: &str) -> FastbuildConfig {
        let mut macrotargets = BTreeMap::new();
        macrotargets.insert("app".to_string(), vec!["src/*.c".to_string()]);
        FastbuildConfig {
            compiler: compiler.to_string(),
            compiler_params: "-O2 -Wall".to_string(),
            linker_params: String::new(),
            targets_build_path: "fastbuild".to_string(),
            linker_output_file: "app".to_string(),
            postprocessing_shell: Vec::new(),
            postprocessing_if_fails: false,
            untracked_action: Default::default(),
            sources_endings: vec![".c".to_string()],
            headers_endings: vec![".h".to_string()],
            macrotargets,
        }
    }

    fn quiet() -> Console {
        Console::new(OutputMode::Quiet)
    }

    #[test]
    fn test_split_params() {
        assert_eq!(split_params("-O2  -Wall "), vec!["-O2", "-Wall"]);
        assert!(split_params("").is_empty());
    }

    #[test]
    fn test_compile_with_true_stub_succeeds() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("fastbuild");
        fs::create_dir_all(&cache_dir).unwrap();
        let resolver = PathResolver::new(dir.path()).unwrap();

        // "true" ignores its arguments and exits 0.
        let toolchain = Toolchain::new(&config("true"), &resolver, &cache_dir);
        let outcome = toolchain.compile("src/a.c", &quiet()).unwrap();
        assert!(outcome.success);
    }

    #[test]
    fn test_compile_with_false_stub_fails_without_error() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("fastbuild");
        fs::create_dir_all(&cache_dir).unwrap();
        let resolver = PathResolver::new(dir.path()).unwrap();

        let toolchain = Toolchain::new(&config("false"), &resolver, &cache_dir);
        let outcome = toolchain.compile("src/a.c", &quiet()).unwrap();
        assert!(!outcome.success);
    }

    #[test]
    fn test_missing_compiler_is_io_error() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("fastbuild");
        fs::create_dir_all(&cache_dir).unwrap();
        let resolver = PathResolver::new(dir.path()).unwrap();

        let toolchain = Toolchain::new(
            &config("definitely-not-a-compiler-9000"),
            &resolver,
            &cache_dir,
        );
        let err = toolchain.compile("src/a.c", &quiet()).unwrap_err();
        assert!(matches!(err, BuildError::IoError { .. }));
    }

    #[test]
    fn test_link_with_no_objects_fails() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("fastbuild");
        fs::create_dir_all(&cache_dir).unwrap();
        let resolver = PathResolver::new(dir.path()).unwrap();

        let toolchain = Toolchain::new(&config("true"), &resolver, &cache_dir);
        let err = toolchain.link(&quiet()).unwrap_err();
        assert!(matches!(err, BuildError::BuildFailed(_)));
    }

    #[test]
    fn test_failing_hook_reported() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("fastbuild");
        fs::create_dir_all(&cache_dir).unwrap();
        let resolver = PathResolver::new(dir.path()).unwrap();

        let toolchain = Toolchain::new(&config("true"), &resolver, &cache_dir);
        let err = toolchain
            .run_hooks(&["exit 3".to_string()], &quiet())
            .unwrap_err();
        assert!(matches!(err, BuildError::BuildFailed(_)));

        toolchain.run_hooks(&["exit 0".to_string()], &quiet()).unwrap();
    }
}

//! Dependency graph builder
//!
//! Scans source files for local (quoted) include directives and computes,
//! per top-level source, the deduplicated set of files transitively
//! reachable within a bounded depth. Consults and populates the dependency
//! tree cache so unchanged files are never rescanned.

use crate::checksum::hash_file;
use crate::error::{BuildError, BuildResult};
use crate::paths::{MacroTarget, PathResolver};
use crate::tree_cache::DepTreeCache;
use std::fs;
use std::path::Path;

/// Default maximum dependency traversal depth.
pub const DEFAULT_MAX_DEPTH: usize = 24;

/// Dependency sets for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDependencies {
    /// Canonical path of the scanned source.
    pub source: String,
    /// Deduplicated, insertion-ordered transitive local includes.
    pub includes: Vec<String>,
}

/// Dependency sets for every source of one macrotarget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDependencies {
    pub name: String,
    pub sources: Vec<SourceDependencies>,
}

/// Dependency sets for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyData {
    pub targets: Vec<TargetDependencies>,
}

impl DependencyData {
    /// Iterate over every (source, includes) pair across all targets.
    pub fn sources(&self) -> impl Iterator<Item = &SourceDependencies> {
        self.targets.iter().flat_map(|t| t.sources.iter())
    }

    /// Total number of scanned sources (targets may overlap).
    pub fn source_count(&self) -> usize {
        self.targets.iter().map(|t| t.sources.len()).sum()
    }
}

/// Extract local include targets from source text.
///
/// Recognizes `#include "path"`; a directive preceded on its line by a `//`
/// marker is skipped. Angle-bracket includes, block comments and
/// preprocessor conditionals are out of scope. Unterminated quotes are
/// ignored.
pub fn scan_includes(text: &str) -> Vec<&str> {
    const DIRECTIVE: &str = "#include \"";

    let mut found = Vec::new();

    for line in text.lines() {
        let mut offset = 0;
        while let Some(pos) = line[offset..].find(DIRECTIVE) {
            let start = offset + pos;

            // Commented out anywhere before the directive on this line.
            if line[..start].contains("//") {
                break;
            }

            let path_start = start + DIRECTIVE.len();
            match line[path_start..].find('"') {
                Some(end) if end > 0 => {
                    found.push(&line[path_start..path_start + end]);
                    offset = path_start + end + 1;
                }
                // Empty or unterminated include target.
                _ => break,
            }
        }
    }

    found
}

/// Depth-bounded, cache-assisted dependency scanner.
pub struct DependencyScanner<'a> {
    resolver: &'a PathResolver,
    cache: &'a mut DepTreeCache,
    max_depth: usize,
}

impl<'a> DependencyScanner<'a> {
    pub fn new(resolver: &'a PathResolver, cache: &'a mut DepTreeCache, max_depth: usize) -> Self {
        Self {
            resolver,
            cache,
            max_depth,
        }
    }

    /// Compute the transitive local-include set of a top-level source file.
    ///
    /// Returns the cached set when an entry keyed by the file's current
    /// content hash exists; a malformed cache entry falls back to a fresh
    /// scan. The fresh result is persisted under the current hash either way.
    pub fn build_dependencies(&mut self, source: &str) -> BuildResult<Vec<String>> {
        let hash = hash_file(&self.resolver.to_absolute(source))?;

        match self.cache.lookup(&hash) {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            // Unreadable entry: rescan this one file, overwriting the entry.
            Err(BuildError::CacheError(_)) => {}
            Err(e) => return Err(e),
        }

        let deps = self.scan_transitive(source)?;
        self.cache.store(&hash, &deps)?;
        Ok(deps)
    }

    /// Worklist traversal of the include graph.
    ///
    /// Each file is expanded at most once; cycles terminate through the
    /// "already discovered" check, and the depth bound caps pathological
    /// chains. Files scheduled at `depth >= max_depth` are not expanded.
    fn scan_transitive(&self, source: &str) -> BuildResult<Vec<String>> {
        let mut deps: Vec<String> = Vec::new();
        let mut work: std::collections::VecDeque<(String, usize)> =
            std::collections::VecDeque::new();
        work.push_back((source.to_string(), 1));

        while let Some((file, depth)) = work.pop_front() {
            if depth >= self.max_depth {
                continue;
            }

            let absolute = self.resolver.to_absolute(&file);
            let text = fs::read_to_string(&absolute).map_err(|e| BuildError::io(&absolute, e))?;

            let dir = Path::new(&file).parent().unwrap_or_else(|| Path::new(""));
            for include in scan_includes(&text) {
                let resolved = self.resolver.canonicalize(dir.join(include))?;
                if !deps.contains(&resolved) {
                    deps.push(resolved.clone());
                    work.push_back((resolved, depth + 1));
                }
            }
        }

        Ok(deps)
    }

    /// Build dependency data for every source of every macrotarget.
    pub fn build_all(&mut self, targets: &[MacroTarget]) -> BuildResult<DependencyData> {
        let mut data = DependencyData::default();

        for target in targets {
            let mut sources = Vec::with_capacity(target.files.len());
            for file in &target.files {
                let includes = self.build_dependencies(file)?;
                sources.push(SourceDependencies {
                    source: file.clone(),
                    includes,
                });
            }
            data.targets.push(TargetDependencies {
                name: target.name.clone(),
                sources,
            });
        }

        Ok(data)
    }
}

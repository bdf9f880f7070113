//! Checksum baseline persistence
//!
//! The baseline maps every canonical path touched by the last successful
//! build to its SHA-256 content hash. It is wholly replaced after a run in
//! which both compile and link succeeded, and never written otherwise, so a
//! failed run leaves the next run's change detection at least as
//! conservative.

use crate::deps::DependencyData;
use crate::error::{BuildError, BuildResult};
use crate::paths::PathResolver;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Baseline file name inside the build cache directory.
pub const BASELINE_FILE: &str = "checksums.json";

/// Persisted canonical path → lowercase hex SHA-256 content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumBaseline {
    entries: HashMap<String, String>,
}

impl ChecksumBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the baseline from the cache directory.
    ///
    /// An absent file is an empty baseline (first run); a present but
    /// malformed file is a cache error.
    pub fn load(cache_dir: &Path) -> BuildResult<Self> {
        let path = cache_dir.join(BASELINE_FILE);
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
        let entries: HashMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| BuildError::cache(format!("malformed baseline {}: {e}", path.display())))?;

        Ok(Self { entries })
    }

    /// Replace the persisted baseline with this one.
    pub fn save(&self, cache_dir: &Path) -> BuildResult<()> {
        fs::create_dir_all(cache_dir).map_err(|e| BuildError::io(cache_dir, e))?;
        let path = cache_dir.join(BASELINE_FILE);
        let content = serde_json::to_string(&self.entries)
            .map_err(|e| BuildError::cache(format!("cannot serialize baseline: {e}")))?;
        fs::write(&path, content).map_err(|e| BuildError::io(&path, e))?;
        Ok(())
    }

    pub fn get(&self, canonical: &str) -> Option<&str> {
        self.entries.get(canonical).map(String::as_str)
    }

    pub fn insert(&mut self, canonical: String, hash: String) {
        self.entries.insert(canonical, hash);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the file's current content differs from the baseline.
    ///
    /// A file absent from the baseline counts as modified.
    pub fn is_modified(&self, canonical: &str, resolver: &PathResolver) -> BuildResult<bool> {
        let Some(old) = self.get(canonical) else {
            return Ok(true);
        };

        let absolute = resolver.to_absolute(canonical);
        let current = hash_file(&absolute)?;
        Ok(current != old)
    }

    /// Compute a fresh baseline covering every source and every transitive
    /// dependency in the dependency data. Each file is hashed once.
    pub fn generate(dep_data: &DependencyData, resolver: &PathResolver) -> BuildResult<Self> {
        let mut baseline = Self::new();

        for target in &dep_data.targets {
            for source in &target.sources {
                if baseline.get(&source.source).is_none() {
                    let hash = hash_file(&resolver.to_absolute(&source.source))?;
                    baseline.insert(source.source.clone(), hash);
                }
                for dep in &source.includes {
                    if baseline.get(dep).is_none() {
                        let hash = hash_file(&resolver.to_absolute(dep))?;
                        baseline.insert(dep.clone(), hash);
                    }
                }
            }
        }

        Ok(baseline)
    }
}

/// SHA-256 of a file's content as a lowercase hex digest.
pub fn hash_file(path: &Path) -> BuildResult<String> {
    let content = fs::read(path).map_err(|e| BuildError::io(path, e))?;
    Ok(hash_bytes(&content))
}

/// SHA-256 of a byte slice as a lowercase hex digest.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

//! Persisted dependency tree cache
//!
//! One JSON entry per scanned top-level file, physically keyed by that
//! file's content hash. A content change produces a new key and thus an
//! implicit cache miss; the stale entry becomes garbage and is deleted at
//! the end of a successful run.

use crate::error::{BuildError, BuildResult};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// File extension of cache entries inside the build cache directory.
pub const ENTRY_SUFFIX: &str = ".deps.json";

/// Checksum-keyed store of previously computed dependency sets.
#[derive(Debug)]
pub struct DepTreeCache {
    cache_dir: PathBuf,
    /// Hashes looked up or stored this run; everything else is garbage.
    used: HashSet<String>,
}

impl DepTreeCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            used: HashSet::new(),
        }
    }

    fn entry_path(&self, hash: &str) -> PathBuf {
        self.cache_dir.join(format!("{hash}{ENTRY_SUFFIX}"))
    }

    /// Look up the dependency set cached under the given content hash.
    ///
    /// A hit marks the entry used. A present but unreadable or malformed
    /// entry is a `CacheError`; the caller falls back to a fresh scan of
    /// that one file rather than aborting the run.
    pub fn lookup(&mut self, hash: &str) -> BuildResult<Option<Vec<String>>> {
        let path = self.entry_path(hash);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| BuildError::cache(format!("unreadable cache entry {}: {e}", path.display())))?;
        let deps: Vec<String> = serde_json::from_str(&content)
            .map_err(|e| BuildError::cache(format!("malformed cache entry {}: {e}", path.display())))?;

        self.used.insert(hash.to_string());
        Ok(Some(deps))
    }

    /// Persist a freshly computed dependency set under the file's current
    /// content hash, and mark it used.
    pub fn store(&mut self, hash: &str, deps: &[String]) -> BuildResult<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| BuildError::io(&self.cache_dir, e))?;

        let path = self.entry_path(hash);
        let content = serde_json::to_string(deps)
            .map_err(|e| BuildError::cache(format!("cannot serialize cache entry: {e}")))?;
        fs::write(&path, content).map_err(|e| BuildError::io(&path, e))?;

        self.used.insert(hash.to_string());
        Ok(())
    }

    /// Number of entries consulted or produced this run.
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Delete every persisted entry whose key was not used this run.
    ///
    /// Returns the number of entries removed. Invoked only after a fully
    /// successful run.
    pub fn collect_garbage(&self) -> BuildResult<usize> {
        if !self.cache_dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir).map_err(|e| BuildError::io(&self.cache_dir, e))? {
            let entry = entry.map_err(|e| BuildError::io(&self.cache_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(hash) = name.strip_suffix(ENTRY_SUFFIX) else {
                continue;
            };
            if !self.used.contains(hash) {
                fs::remove_file(entry.path()).map_err(|e| BuildError::io(entry.path(), e))?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

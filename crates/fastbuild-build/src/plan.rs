//! Build plan compilation
//!
//! Merges directly changed sources, sources depending on a changed header,
//! and sources whose compiled object is missing from the cache directory
//! into one deduplicated build list.

use crate::checksum::hash_bytes;
use crate::deps::DependencyData;
use crate::error::{BuildError, BuildResult};
use crate::paths::MacroTarget;
use std::fs;
use std::path::{Path, PathBuf};

/// Object file identifier: hash of the canonical path, not the content, so
/// a renamed-but-identical file is treated as a new artifact.
pub fn artifact_id(canonical: &str) -> String {
    hash_bytes(canonical.as_bytes())
}

/// Object file path inside the cache directory for a canonical source path.
pub fn artifact_path(cache_dir: &Path, canonical: &str) -> PathBuf {
    cache_dir.join(format!("{}.o", artifact_id(canonical)))
}

/// Sources transitively dependent on any changed header.
///
/// A source depending on several changed headers still appears once.
pub fn select_dependents(dep_data: &DependencyData, changed_headers: &[String]) -> Vec<String> {
    let mut dependents = Vec::new();

    for source in dep_data.sources() {
        let affected = source
            .includes
            .iter()
            .any(|dep| changed_headers.iter().any(|h| h == dep));
        if affected && !dependents.contains(&source.source) {
            dependents.push(source.source.clone());
        }
    }

    dependents
}

/// Enumerated sources whose compiled object is absent from the cache dir.
///
/// A missing cache directory is created and treated as "rebuild everything".
pub fn detect_missing_artifacts(
    targets: &[MacroTarget],
    cache_dir: &Path,
) -> BuildResult<Vec<String>> {
    if !cache_dir.is_dir() {
        fs::create_dir_all(cache_dir).map_err(|e| BuildError::io(cache_dir, e))?;
    }

    let mut missing = Vec::new();
    for target in targets {
        for file in &target.files {
            if !artifact_path(cache_dir, file).exists() && !missing.contains(file) {
                missing.push(file.clone());
            }
        }
    }

    Ok(missing)
}

/// Stable-order deduplicated union: direct sources first, then dependents
/// not already present, then missing-artifact sources not already present.
pub fn compose_build_list(
    direct: Vec<String>,
    dependents: &[String],
    missing: &[String],
) -> Vec<String> {
    let mut build_list = direct;

    for file in dependents.iter().chain(missing) {
        if !build_list.contains(file) {
            build_list.push(file.clone());
        }
    }

    build_list
}

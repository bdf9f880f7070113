//! Path canonicalization and macrotarget pattern expansion
//!
//! Every file crossing a component boundary is identified by its canonical
//! form: the project-root-relative path with forward slashes and no `.` or
//! `..` segments. Two differently written paths to the same file canonicalize
//! to the same string before any comparison or cache lookup.

use crate::error::{BuildError, BuildResult};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A named set of source files assembled from one or more file-name patterns.
///
/// The file list is frozen once enumerated for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroTarget {
    pub name: String,
    pub files: Vec<String>,
}

/// Resolves paths to their canonical project-root-relative form and expands
/// file-name patterns.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver rooted at the given project directory.
    pub fn new(project_root: impl AsRef<Path>) -> BuildResult<Self> {
        let root = project_root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| BuildError::resolution(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    /// The absolute project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonicalize a path (absolute, or relative to the project root) to
    /// its project-root-relative form.
    ///
    /// Fails if the target is missing or unreadable: an unresolvable
    /// dependency is a project integrity failure, not something to skip.
    pub fn canonicalize(&self, path: impl AsRef<Path>) -> BuildResult<String> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let resolved = absolute
            .canonicalize()
            .map_err(|e| BuildError::resolution(path.display().to_string(), e))?;

        let relative = resolved.strip_prefix(&self.root).map_err(|_| {
            BuildError::resolution(
                path.display().to_string(),
                "path escapes the project root",
            )
        })?;

        Ok(to_slash_string(relative))
    }

    /// Absolute filesystem path for a canonical path.
    pub fn to_absolute(&self, canonical: &str) -> PathBuf {
        self.root.join(canonical)
    }

    /// Expand a file-name pattern into a sorted list of canonical paths.
    ///
    /// `*` and `?` match within a path segment, `**` matches across
    /// segments. A pattern without wildcards must name an existing file.
    /// A pattern matching nothing is an error, matching the requirement
    /// that a misconfigured macrotarget stops the build.
    pub fn expand_pattern(&self, pattern: &str) -> BuildResult<Vec<String>> {
        if !pattern.contains(['*', '?']) {
            return Ok(vec![self.canonicalize(pattern)?]);
        }

        // Walk only below the literal prefix of the pattern.
        let prefix: PathBuf = Path::new(pattern)
            .components()
            .take_while(|c| !c.as_os_str().to_string_lossy().contains(['*', '?']))
            .collect();
        let walk_root = self.root.join(&prefix);

        if !walk_root.is_dir() {
            return Err(BuildError::resolution(
                pattern,
                format!("directory '{}' does not exist", prefix.display()),
            ));
        }

        let mut matches = Vec::new();
        for entry in WalkDir::new(&walk_root).follow_links(false) {
            let entry = entry.map_err(|e| BuildError::resolution(pattern, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map(to_slash_string)
                .unwrap_or_default();
            if wildcard_match(pattern, &relative) {
                matches.push(relative);
            }
        }

        if matches.is_empty() {
            return Err(BuildError::resolution(pattern, "no files match"));
        }

        matches.sort();
        Ok(matches)
    }

    /// Expand every macrotarget's pattern list into frozen file lists.
    pub fn enumerate_targets(
        &self,
        macrotargets: &BTreeMap<String, Vec<String>>,
    ) -> BuildResult<Vec<MacroTarget>> {
        let mut targets = Vec::with_capacity(macrotargets.len());

        for (name, patterns) in macrotargets {
            let mut files = Vec::new();
            for pattern in patterns {
                for file in self.expand_pattern(pattern)? {
                    if !files.contains(&file) {
                        files.push(file);
                    }
                }
            }
            targets.push(MacroTarget {
                name: name.clone(),
                files,
            });
        }

        Ok(targets)
    }
}

/// Match a canonical path against a glob-style pattern.
///
/// `*` and `?` stay within one path segment; `**` spans segments.
pub fn wildcard_match(pattern: &str, path: &str) -> bool {
    let pat: Vec<&str> = pattern.split('/').collect();
    let segs: Vec<&str> = path.split('/').collect();
    segments_match(&pat, &segs)
}

fn segments_match(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| segments_match(rest, &path[skip..])),
        Some((first, rest)) => match path.split_first() {
            Some((seg, path_rest)) => segment_match(first, seg) && segments_match(rest, path_rest),
            None => false,
        },
    }
}

fn segment_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    chars_match(&pat, &txt)
}

fn chars_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|skip| chars_match(rest, &text[skip..])),
        Some(('?', rest)) => match text.split_first() {
            Some((_, text_rest)) => chars_match(rest, text_rest),
            None => false,
        },
        Some((c, rest)) => match text.split_first() {
            Some((t, text_rest)) => c == t && chars_match(rest, text_rest),
            None => false,
        },
    }
}

pub(crate) fn to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

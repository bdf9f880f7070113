//! Change detection engine
//!
//! Two independent sources of "changed" evidence are merged: a porcelain
//! git status scan and a checksum sweep against the persisted baseline.
//! The untracked-file policy gates only the git path; checksum evidence is
//! unconditional.

use crate::checksum::ChecksumBaseline;
use crate::deps::DependencyData;
use crate::error::{BuildError, BuildResult};
use crate::output::Console;
use crate::paths::PathResolver;
use fastbuild_config::UntrackedAction;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Classification of a porcelain status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Modified, added, renamed or copied: a rebuild candidate.
    Changed,
    /// Deleted in the worktree: nothing left to rebuild.
    Deleted,
    /// Not tracked by version control; governed by the configured policy.
    Untracked,
    /// Anything else (ignored, unmerged, clean): not a candidate.
    Other,
}

/// One parsed `git status --porcelain` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub kind: StatusKind,
    /// Repository-relative path; for renames, the new path.
    pub path: String,
}

/// Parse a porcelain-style status report.
///
/// Each line carries a two-character XY status field, a space, and a path.
/// Rename/copy lines use `old -> new`; the new path is kept. Lines too
/// short to carry all three fields are skipped.
pub fn parse_porcelain(report: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();

    for line in report.lines() {
        let (Some(code), Some(rest)) = (line.get(..2), line.get(3..)) else {
            continue;
        };

        let path = rest
            .rsplit(" -> ")
            .next()
            .unwrap_or("")
            .trim_matches('"')
            .to_string();
        if path.is_empty() {
            continue;
        }

        let kind = classify_code(code);
        entries.push(StatusEntry { kind, path });
    }

    entries
}

fn classify_code(code: &str) -> StatusKind {
    if code == "??" {
        return StatusKind::Untracked;
    }

    let mut chars = code.chars();
    let index = chars.next().unwrap_or(' ');
    let worktree = chars.next().unwrap_or(' ');

    // A worktree deletion wins: the file is gone regardless of the index.
    if worktree == 'D' {
        return StatusKind::Deleted;
    }
    if "MARC".contains(index) || "MARC".contains(worktree) {
        return StatusKind::Changed;
    }
    if index == 'D' {
        return StatusKind::Deleted;
    }

    StatusKind::Other
}

/// Version-control status provider.
#[derive(Debug, Clone, Default)]
pub struct GitStatus {
    pub entries: Vec<StatusEntry>,
}

impl GitStatus {
    pub fn from_entries(entries: Vec<StatusEntry>) -> Self {
        Self { entries }
    }

    /// Run `git status --porcelain` in the project root.
    ///
    /// Porcelain paths are relative to the repository toplevel, which may
    /// sit above the project root; they are remapped into the project
    /// namespace, dropping entries outside it.
    pub fn query(resolver: &PathResolver) -> BuildResult<Self> {
        let toplevel = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(resolver.root())
            .output()
            .map_err(|e| BuildError::GitError(format!("cannot run git: {e}")))?;

        if !toplevel.status.success() {
            return Err(BuildError::GitError(format!(
                "git rev-parse failed: {}",
                String::from_utf8_lossy(&toplevel.stderr).trim()
            )));
        }

        let repo_root = PathBuf::from(String::from_utf8_lossy(&toplevel.stdout).trim())
            .canonicalize()
            .map_err(|e| BuildError::GitError(format!("cannot resolve repository root: {e}")))?;

        let output = Command::new("git")
            .args(["status", "--porcelain"])
            .current_dir(resolver.root())
            .output()
            .map_err(|e| BuildError::GitError(format!("cannot run git: {e}")))?;

        if !output.status.success() {
            return Err(BuildError::GitError(format!(
                "git status failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let report = String::from_utf8_lossy(&output.stdout);
        let entries = remap_to_project(parse_porcelain(&report), &repo_root, resolver.root());
        Ok(Self::from_entries(entries))
    }
}

/// Translate repository-toplevel-relative paths into project-root-relative
/// ones.
///
/// With the project root at the repository toplevel the entries pass
/// through untouched; otherwise the project prefix is stripped and entries
/// outside the project root are dropped.
pub fn remap_to_project(
    entries: Vec<StatusEntry>,
    repo_root: &Path,
    project_root: &Path,
) -> Vec<StatusEntry> {
    let Ok(prefix) = project_root.strip_prefix(repo_root) else {
        return entries;
    };
    if prefix.as_os_str().is_empty() {
        return entries;
    }

    let prefix = format!("{}/", crate::paths::to_slash_string(prefix));
    entries
        .into_iter()
        .filter_map(|entry| {
            entry.path.strip_prefix(&prefix).map(|rest| StatusEntry {
                kind: entry.kind,
                path: rest.to_string(),
            })
        })
        .collect()
}

/// Merges version-control and checksum evidence into a changed-file list.
pub struct ChangeDetector<'a> {
    resolver: &'a PathResolver,
    baseline: &'a ChecksumBaseline,
    status: &'a GitStatus,
    untracked: UntrackedAction,
    force_rebuild: bool,
    console: Console,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(
        resolver: &'a PathResolver,
        baseline: &'a ChecksumBaseline,
        status: &'a GitStatus,
        untracked: UntrackedAction,
        force_rebuild: bool,
        console: Console,
    ) -> Self {
        Self {
            resolver,
            baseline,
            status,
            untracked,
            force_rebuild,
            console,
        }
    }

    /// Determine which files with a recognized extension have changed.
    ///
    /// With `poll_headers` false the checksum sweep covers the top-level
    /// sources of the dependency data; with it true, their transitive
    /// dependencies. The caller invokes this twice, once per extension
    /// family, producing disjoint-by-construction lists.
    pub fn detect_changed(
        &self,
        extensions: &[String],
        dep_data: &DependencyData,
        poll_headers: bool,
    ) -> BuildResult<Vec<String>> {
        let mut changed: Vec<String> = Vec::new();

        // Version-control evidence.
        for entry in &self.status.entries {
            if !has_extension(&entry.path, extensions) {
                continue;
            }
            match entry.kind {
                StatusKind::Deleted | StatusKind::Other => continue,
                StatusKind::Untracked if self.untracked.ignores_untracked() => continue,
                StatusKind::Untracked | StatusKind::Changed => {}
            }

            let canonical = self.resolver.canonicalize(&entry.path)?;

            // Status may call a byte-identical file modified (e.g. touch,
            // revert); the baseline comparison has the final word unless a
            // forced rebuild is requested.
            if !self.force_rebuild && !self.baseline.is_modified(&canonical, self.resolver)? {
                continue;
            }

            if !changed.contains(&canonical) {
                self.console.added_file(&canonical, "git");
                changed.push(canonical);
            }
        }

        // Checksum evidence over the dependency data.
        for source in dep_data.sources() {
            if poll_headers {
                for dep in &source.includes {
                    self.poll_file(dep, extensions, &mut changed)?;
                }
            } else {
                self.poll_file(&source.source, extensions, &mut changed)?;
            }
        }

        Ok(changed)
    }

    fn poll_file(
        &self,
        canonical: &str,
        extensions: &[String],
        changed: &mut Vec<String>,
    ) -> BuildResult<()> {
        if !has_extension(canonical, extensions) || changed.iter().any(|c| c == canonical) {
            return Ok(());
        }

        if self.force_rebuild || self.baseline.is_modified(canonical, self.resolver)? {
            self.console.added_file(canonical, "checksum");
            changed.push(canonical.to_string());
        }

        Ok(())
    }
}

fn has_extension(path: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::hash_file;
    use crate::deps::{SourceDependencies, TargetDependencies};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    #[rstest]
    #[case(" M", StatusKind::Changed)]
    #[case("M ", StatusKind::Changed)]
    #[case("MM", StatusKind::Changed)]
    #[case("A ", StatusKind::Changed)]
    #[case("R ", StatusKind::Changed)]
    #[case("C ", StatusKind::Changed)]
    #[case(" D", StatusKind::Deleted)]
    #[case("D ", StatusKind::Deleted)]
    #[case("AD", StatusKind::Deleted)]
    #[case("??", StatusKind::Untracked)]
    #[case("!!", StatusKind::Other)]
    #[case("UU", StatusKind::Other)]
    fn test_classify_code(#[case] code: &str, #[case] expected: StatusKind) {
        assert_eq!(classify_code(code), expected);
    }

    #[test]
    fn test_parse_porcelain_basic() {
        let report = " M src/a.cpp\n?? src/new.cpp\n D src/gone.cpp\n";
        let entries = parse_porcelain(report);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, StatusKind::Changed);
        assert_eq!(entries[0].path, "src/a.cpp");
        assert_eq!(entries[1].kind, StatusKind::Untracked);
        assert_eq!(entries[2].kind, StatusKind::Deleted);
    }

    #[test]
    fn test_parse_porcelain_rename_keeps_new_path() {
        let entries = parse_porcelain("R  src/old.cpp -> src/new.cpp\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, StatusKind::Changed);
        assert_eq!(entries[0].path, "src/new.cpp");
    }

    #[test]
    fn test_parse_porcelain_skips_short_lines() {
        assert!(parse_porcelain("\nM\n??\n").is_empty());
    }

    #[test]
    fn test_parse_porcelain_tolerates_multibyte_boundaries() {
        // A multibyte character straddling the status-field boundary must
        // not panic; a multibyte path after an ASCII field parses fine.
        assert!(parse_porcelain("??é\n").is_empty());

        let entries = parse_porcelain(" M src/héllo.cpp\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "src/héllo.cpp");
    }

    #[test]
    fn test_remap_passes_through_at_repo_toplevel() {
        let entries = vec![StatusEntry {
            kind: StatusKind::Changed,
            path: "src/a.cpp".to_string(),
        }];

        let remapped = remap_to_project(entries.clone(), Path::new("/repo"), Path::new("/repo"));
        assert_eq!(remapped, entries);
    }

    #[test]
    fn test_remap_strips_project_prefix_and_drops_outsiders() {
        let entries = vec![
            StatusEntry {
                kind: StatusKind::Changed,
                path: "proj/src/a.cpp".to_string(),
            },
            StatusEntry {
                kind: StatusKind::Untracked,
                path: "other/b.cpp".to_string(),
            },
        ];

        let remapped =
            remap_to_project(entries, Path::new("/repo"), Path::new("/repo/proj"));
        assert_eq!(
            remapped,
            vec![StatusEntry {
                kind: StatusKind::Changed,
                path: "src/a.cpp".to_string(),
            }]
        );
    }

    #[test]
    fn test_detection_works_when_project_is_repo_subdirectory() {
        // Porcelain reports toplevel-relative paths; after remapping, a
        // modified tracked file resolves instead of aborting the run.
        let fx = fixture();
        fs::write(fx.resolver.to_absolute("src/a.cpp"), "int changed;\n").unwrap();

        let repo_root = fx.resolver.root().parent().unwrap().to_path_buf();
        let project_dir = fx
            .resolver
            .root()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let raw = vec![StatusEntry {
            kind: StatusKind::Changed,
            path: format!("{project_dir}/src/a.cpp"),
        }];
        let status =
            GitStatus::from_entries(remap_to_project(raw, &repo_root, fx.resolver.root()));

        let det = detector(&fx, &status, UntrackedAction::Accept, false);
        let changed = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert_eq!(changed, vec!["src/a.cpp"]);
    }

    struct Fixture {
        _dir: TempDir,
        resolver: PathResolver,
        baseline: ChecksumBaseline,
        dep_data: DependencyData,
    }

    /// One target "app": a.cpp includes a.h, b.cpp includes nothing.
    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.cpp"), "#include \"a.h\"\nint a;\n").unwrap();
        fs::write(src.join("a.h"), "int ah;\n").unwrap();
        fs::write(src.join("b.cpp"), "int b;\n").unwrap();

        let resolver = PathResolver::new(dir.path()).unwrap();

        let mut baseline = ChecksumBaseline::new();
        for file in ["src/a.cpp", "src/a.h", "src/b.cpp"] {
            baseline.insert(
                file.to_string(),
                hash_file(&resolver.to_absolute(file)).unwrap(),
            );
        }

        let dep_data = DependencyData {
            targets: vec![TargetDependencies {
                name: "app".to_string(),
                sources: vec![
                    SourceDependencies {
                        source: "src/a.cpp".to_string(),
                        includes: vec!["src/a.h".to_string()],
                    },
                    SourceDependencies {
                        source: "src/b.cpp".to_string(),
                        includes: vec![],
                    },
                ],
            }],
        };

        Fixture {
            _dir: dir,
            resolver,
            baseline,
            dep_data,
        }
    }

    fn detector<'a>(
        fx: &'a Fixture,
        status: &'a GitStatus,
        untracked: UntrackedAction,
        force: bool,
    ) -> ChangeDetector<'a> {
        ChangeDetector::new(
            &fx.resolver,
            &fx.baseline,
            status,
            untracked,
            force,
            Console::new(crate::output::OutputMode::Quiet),
        )
    }

    fn sources_exts() -> Vec<String> {
        vec![".cpp".to_string()]
    }

    fn headers_exts() -> Vec<String> {
        vec![".h".to_string()]
    }

    #[test]
    fn test_unchanged_project_yields_no_changes() {
        let fx = fixture();
        let status = GitStatus::default();
        let det = detector(&fx, &status, UntrackedAction::Accept, false);

        let sources = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        let headers = det
            .detect_changed(&headers_exts(), &fx.dep_data, true)
            .unwrap();

        assert!(sources.is_empty());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_git_modified_with_matching_checksum_is_excluded() {
        let fx = fixture();
        // Status says modified, but content is byte-identical to baseline.
        let status = GitStatus::from_entries(vec![StatusEntry {
            kind: StatusKind::Changed,
            path: "src/a.cpp".to_string(),
        }]);
        let det = detector(&fx, &status, UntrackedAction::Accept, false);

        let changed = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn test_force_rebuild_overrides_checksum_match() {
        let fx = fixture();
        let status = GitStatus::default();
        let det = detector(&fx, &status, UntrackedAction::Accept, true);

        let changed = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert_eq!(changed, vec!["src/a.cpp", "src/b.cpp"]);
    }

    #[test]
    fn test_modified_content_detected_via_git() {
        let fx = fixture();
        fs::write(fx.resolver.to_absolute("src/a.cpp"), "int changed;\n").unwrap();
        let status = GitStatus::from_entries(vec![StatusEntry {
            kind: StatusKind::Changed,
            path: "src/a.cpp".to_string(),
        }]);
        let det = detector(&fx, &status, UntrackedAction::Accept, false);

        let changed = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert_eq!(changed, vec!["src/a.cpp"]);
    }

    #[test]
    fn test_modified_header_detected_via_checksum_sweep() {
        let fx = fixture();
        fs::write(fx.resolver.to_absolute("src/a.h"), "int edited;\n").unwrap();
        let status = GitStatus::default();
        let det = detector(&fx, &status, UntrackedAction::Accept, false);

        let headers = det
            .detect_changed(&headers_exts(), &fx.dep_data, true)
            .unwrap();
        assert_eq!(headers, vec!["src/a.h"]);

        // The source extension pass does not pick up headers.
        let sources = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_untracked_ignored_by_policy_via_git_path() {
        let fx = fixture();
        let new_file = fx.resolver.root().join("src/fresh.cpp");
        fs::write(&new_file, "int fresh;\n").unwrap();
        let status = GitStatus::from_entries(vec![StatusEntry {
            kind: StatusKind::Untracked,
            path: "src/fresh.cpp".to_string(),
        }]);
        let det = detector(&fx, &status, UntrackedAction::Ignore, false);

        // Not in dep_data, so only the (gated) git path could see it.
        let changed = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn test_untracked_still_found_via_checksum_path_when_in_dep_data() {
        let mut fx = fixture();
        let new_file = fx.resolver.root().join("src/fresh.cpp");
        fs::write(&new_file, "int fresh;\n").unwrap();

        // Reachable as dependency data despite the ignore policy.
        fx.dep_data.targets[0].sources.push(SourceDependencies {
            source: "src/fresh.cpp".to_string(),
            includes: vec![],
        });
        let status = GitStatus::from_entries(vec![StatusEntry {
            kind: StatusKind::Untracked,
            path: "src/fresh.cpp".to_string(),
        }]);
        let det = detector(&fx, &status, UntrackedAction::Ignore, false);

        let changed = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert_eq!(changed, vec!["src/fresh.cpp"]);
    }

    #[test]
    fn test_untracked_accepted_by_policy() {
        let fx = fixture();
        let new_file = fx.resolver.root().join("src/fresh.cpp");
        fs::write(&new_file, "int fresh;\n").unwrap();
        let status = GitStatus::from_entries(vec![StatusEntry {
            kind: StatusKind::Untracked,
            path: "src/fresh.cpp".to_string(),
        }]);
        let det = detector(&fx, &status, UntrackedAction::Accept, false);

        let changed = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert_eq!(changed, vec!["src/fresh.cpp"]);
    }

    #[test]
    fn test_deleted_files_never_rebuilt() {
        let fx = fixture();
        let status = GitStatus::from_entries(vec![StatusEntry {
            kind: StatusKind::Deleted,
            path: "src/gone.cpp".to_string(),
        }]);
        let det = detector(&fx, &status, UntrackedAction::Accept, false);

        let changed = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn test_idempotence_against_regenerated_baseline() {
        // Simulates two runs: run 1 persists a fresh baseline, run 2
        // detects nothing.
        let fx = fixture();
        let regenerated = ChecksumBaseline::generate(&fx.dep_data, &fx.resolver).unwrap();
        let status = GitStatus::default();
        let det = ChangeDetector::new(
            &fx.resolver,
            &regenerated,
            &status,
            UntrackedAction::Accept,
            false,
            Console::new(crate::output::OutputMode::Quiet),
        );

        let sources = det
            .detect_changed(&sources_exts(), &fx.dep_data, false)
            .unwrap();
        let headers = det
            .detect_changed(&headers_exts(), &fx.dep_data, true)
            .unwrap();
        assert!(sources.is_empty());
        assert!(headers.is_empty());
    }
}

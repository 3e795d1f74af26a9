use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use repograph_core::{RepographError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Path components that never hold analyzable sources.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    "node_modules",
    ".venv",
    "venv",
    ".tox",
    "build",
    "dist",
    "target",
    ".eggs",
];

/// A selected source file: absolute path plus the repository-relative path
/// stored in the graph.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub absolute: PathBuf,
    pub relative: String,
    pub size: u64,
}

/// Walk the repository selecting files that match any pattern, rejecting
/// known ignore directories, and enforcing path containment: every
/// candidate's canonical path must start with the canonical repository
/// root. A violation is fatal, raised before any graph write.
pub fn collect_files(
    repo_root: &Path,
    patterns: &[String],
    follow_symlinks: bool,
) -> Result<Vec<CandidateFile>> {
    let canonical_root = repo_root.canonicalize().map_err(|e| {
        RepographError::Path(format!("cannot resolve {}: {e}", repo_root.display()))
    })?;

    let glob_set = build_glob_set(patterns)?;

    let mut walker = WalkBuilder::new(&canonical_root);
    walker
        .hidden(false)
        .git_ignore(false)
        .git_exclude(false)
        .ignore(false)
        .follow_links(follow_symlinks)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !IGNORED_DIRS.contains(&name.as_ref())
        });

    let mut candidates = Vec::new();
    for entry in walker.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "walker error");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let canonical = path.canonicalize().map_err(|e| {
            RepographError::Path(format!("cannot resolve {}: {e}", path.display()))
        })?;
        if !canonical.starts_with(&canonical_root) {
            return Err(RepographError::Path(format!(
                "{} escapes the repository root {}",
                canonical.display(),
                canonical_root.display()
            )));
        }

        let relative = canonical
            .strip_prefix(&canonical_root)
            .map_err(|_| {
                RepographError::Path(format!(
                    "{} is not under {}",
                    canonical.display(),
                    canonical_root.display()
                ))
            })?
            .to_string_lossy()
            .replace('\\', "/");

        if !glob_set.is_match(&relative) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        candidates.push(CandidateFile {
            absolute: canonical,
            relative,
            size,
        });
    }

    candidates.sort_by(|a, b| a.relative.cmp(&b.relative));
    debug!(count = candidates.len(), "collected candidate files");
    Ok(candidates)
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            RepographError::Validation(format!("invalid glob pattern {pattern:?}: {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RepographError::Validation(format!("invalid glob set: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn patterns() -> Vec<String> {
        vec!["**/*.py".to_string()]
    }

    #[test]
    fn collects_matching_files_with_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/mod.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("README.md"), "hi\n").unwrap();

        let files = collect_files(dir.path(), &patterns(), false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "pkg/mod.py");
        assert!(files[0].absolute.is_absolute());
    }

    #[test]
    fn skips_known_ignore_directories() {
        let dir = tempfile::tempdir().unwrap();
        for ignored in ["__pycache__", ".venv", ".git"] {
            fs::create_dir_all(dir.path().join(ignored)).unwrap();
            fs::write(dir.path().join(ignored).join("junk.py"), "x = 1\n").unwrap();
        }
        fs::write(dir.path().join("kept.py"), "x = 1\n").unwrap();

        let files = collect_files(dir.path(), &patterns(), false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "kept.py");
    }

    #[test]
    fn missing_root_is_a_path_error() {
        let result = collect_files(Path::new("/definitely/not/here"), &patterns(), false);
        assert!(matches!(result, Err(RepographError::Path(_))));
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = collect_files(dir.path(), &["[".to_string()], false);
        assert!(matches!(result, Err(RepographError::Validation(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_the_root_is_rejected_when_followed() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.py"), "x = 1\n").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.py"),
            dir.path().join("link.py"),
        )
        .unwrap();

        let result = collect_files(dir.path(), &patterns(), true);
        assert!(matches!(result, Err(RepographError::Path(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed_by_default() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.py"), "x = 1\n").unwrap();

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real.py"), "x = 1\n").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.py"),
            dir.path().join("link.py"),
        )
        .unwrap();

        let files = collect_files(dir.path(), &patterns(), false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "real.py");
    }
}

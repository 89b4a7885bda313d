//! On-disk cache layout and filesystem primitives
//!
//! ```text
//! <cache>/hashes/<component>/<key>/<fingerprint>.json   pointer records
//! <cache>/outputs/<fingerprint>/<cacheDir...>           captured outputs
//! <cache>/worktrees/<origin>/                           git worktrees
//! ```
//!
//! The layout is shared between runs: a pointer written by one run must be
//! found by the next.

use crate::error::{HoardError, HoardResult};
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Paths inside the cache base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every pointer of one entry
    pub fn hash_dir(&self, component: &str, key: &str) -> PathBuf {
        self.root.join("hashes").join(component).join(key)
    }

    pub fn pointer_path(&self, component: &str, key: &str, fingerprint: &str) -> PathBuf {
        self.hash_dir(component, key)
            .join(format!("{}.json", fingerprint))
    }

    /// Root of the content-addressed directory for a fingerprint
    pub fn output_root(&self, fingerprint: &str) -> PathBuf {
        self.root.join("outputs").join(fingerprint)
    }

    /// Where an entry's `cacheDir` is stored for a fingerprint
    pub fn stored_output(&self, fingerprint: &str, cache_dir: &str) -> PathBuf {
        self.output_root(fingerprint).join(cache_dir)
    }

    pub fn worktree_dir(&self, origin: &str) -> PathBuf {
        self.root.join("worktrees").join(origin)
    }
}

/// Whether `path` is a directory with at least one regular file somewhere
/// beneath it.
///
/// Symbolic links never count as files. Any I/O error yields `false`.
pub fn has_real_files(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        Ok(meta) if meta.file_type().is_symlink() => {
            debug!("{} is a symbolic link", path.display());
            return false;
        }
        Ok(_) => {
            debug!("{} exists but is not a directory", path.display());
            return false;
        }
        Err(e) => {
            debug!("{} is not accessible: {}", path.display(), e);
            return false;
        }
    }

    for entry in WalkDir::new(path).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => return true,
            Ok(_) => {}
            Err(e) => {
                debug!("Error while scanning {}: {}", path.display(), e);
                return false;
            }
        }
    }

    false
}

/// Recursively copy `from` into `to`, overwriting existing files.
///
/// Symbolic links are recreated as links on Unix and copied by content
/// elsewhere. Returns the number of files written.
pub fn copy_dir(from: &Path, to: &Path) -> HoardResult<usize> {
    let capture_err = |reason: String| HoardError::OutputCapture {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        reason,
    };

    fs::create_dir_all(to).map_err(|e| capture_err(e.to_string()))?;

    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| capture_err(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| capture_err(e.to_string()))?;
        let target = to.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| capture_err(e.to_string()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target).map_err(|e| capture_err(e.to_string()))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| capture_err(e.to_string()))?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    let destination = fs::read_link(link)?;
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target)?;
    }
    std::os::unix::fs::symlink(destination, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(link, target).map(|_| ())
}

/// Compile a pattern with literal separators, so `*` stays within one path
/// segment and only `**` crosses directories
fn matcher(pattern: &str) -> HoardResult<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| HoardError::GlobPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Relative paths of the regular files under `root`, `/`-separated and in
/// a stable order
fn relative_files(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path().strip_prefix(root).ok().map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
        })
        .collect()
}

/// Match files under `root` against each pattern in turn.
///
/// Matches are concatenated per pattern, so a file matched by two patterns
/// appears twice.
pub fn match_files<S: AsRef<str>>(root: &Path, patterns: &[S]) -> HoardResult<Vec<String>> {
    let files = relative_files(root);
    let mut matched = Vec::new();

    for pattern in patterns {
        let glob = matcher(pattern.as_ref())?;
        matched.extend(files.iter().filter(|f| glob.is_match(f.as_str())).cloned());
    }

    Ok(matched)
}

/// Copy cached files matching `patterns` from `cache_output_dir` back into
/// `build_output_dir`, preserving relative structure. Returns the number of
/// files copied.
pub fn restore_to_worktree<S: AsRef<str>>(
    cache_output_dir: &Path,
    build_output_dir: &Path,
    patterns: &[S],
) -> HoardResult<usize> {
    if patterns.is_empty() {
        return Ok(0);
    }

    let matches = match_files(cache_output_dir, patterns)?;
    let mut copied = 0;

    for relative in &matches {
        let from = cache_output_dir.join(relative);
        let to = build_output_dir.join(relative);

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HoardError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::copy(&from, &to).map_err(|e| {
            HoardError::io(
                format!("restoring {} to {}", from.display(), to.display()),
                e,
            )
        })?;
        debug!("Restored {}", relative);
        copied += 1;
    }

    Ok(copied)
}

/// Validate a glob pattern without matching anything
pub fn check_pattern(pattern: &str) -> HoardResult<()> {
    matcher(pattern).map(|_| ())
}

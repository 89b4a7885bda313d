//! Source set resolution
//!
//! Expands an entry's declared sources with the output of its discovery
//! commands. Each command runs in the build root and prints one relative
//! path per line. A failing command only loses its own paths.

use crate::cache::store;
use crate::diagnostic::{Diagnostic, Resolved};
use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Ordered, de-duplicated set of relative source paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    paths: Vec<String>,
    seen: HashSet<String>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a path, returning false if it was already present
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.seen.contains(path)
    }

    /// Paths in insertion order
    pub fn as_slice(&self) -> &[String] {
        &self.paths
    }
}

impl<S: Into<String>> FromIterator<S> for SourceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

/// Whether a declared source is a glob pattern rather than a plain path
pub fn is_pattern(source: &str) -> bool {
    source.contains(['*', '?', '[', '{'])
}

/// Resolve the full source set for an entry.
///
/// Static sources come first (glob patterns expanded against `root`), then
/// the stdout of each discovery command in declared order. Without
/// discovery commands no process is spawned.
pub async fn resolve_sources<S: AsRef<str>>(
    root: &Path,
    static_sources: &[S],
    source_commands: &[S],
) -> Resolved<SourceSet> {
    let mut diagnostics = Vec::new();
    let mut set = SourceSet::new();

    for source in static_sources {
        let source = source.as_ref();
        if !is_pattern(source) {
            set.insert(source);
            continue;
        }

        match store::match_files(root, &[source]) {
            Ok(matches) if !matches.is_empty() => {
                for path in matches {
                    set.insert(path);
                }
            }
            Ok(_) => {
                // Kept literally so hashing reports it missing
                diagnostics.push(Diagnostic::warning(format!(
                    "source pattern '{}' matched no files in {}",
                    source,
                    root.display()
                )));
                set.insert(source);
            }
            Err(e) => {
                diagnostics.push(Diagnostic::warning(e.to_string()));
                set.insert(source);
            }
        }
    }

    if source_commands.is_empty() {
        return Resolved::with_diagnostics(set, diagnostics);
    }

    for command in source_commands {
        let command = command.as_ref();
        match run_discovery(root, command).await {
            Ok(paths) => {
                debug!("Discovery command `{}` produced {} path(s)", command, paths.len());
                for path in paths {
                    set.insert(path);
                }
            }
            Err(diagnostic) => diagnostics.push(diagnostic),
        }
    }

    Resolved::with_diagnostics(set, diagnostics)
}

/// Run one discovery command and parse its stdout as newline-separated paths
async fn run_discovery(root: &Path, command: &str) -> Result<Vec<String>, Diagnostic> {
    debug!("Running source command in {}: {}", root.display(), command);

    let output = shell(command)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            Diagnostic::warning(format!("source command `{}` failed to start: {}", command, e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Diagnostic::warning(format!(
            "source command `{}` exited with {}: {}",
            command,
            output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            stderr.trim()
        )));
    }

    Ok(parse_paths(&String::from_utf8_lossy(&output.stdout)))
}

/// Build a shell invocation for `command`
pub(crate) fn shell(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

fn parse_paths(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

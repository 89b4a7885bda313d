//! Build root acquisition
//!
//! Each origin needs a directory with its sources checked out. Local
//! origins are used in place; remote origins get a git worktree under the
//! cache directory which is cloned once and fetched on later runs.
//!
//! Failures never abort a run: the origin simply has no build root, and
//! every entry in it misses with "root not ready".

use crate::cache::CacheLayout;
use crate::config::OriginConfig;
use crate::diagnostic::{Diagnostic, Resolved};
use crate::error::{HoardError, HoardResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Supplies the build root for an origin
#[async_trait]
pub trait WorktreeProvider: Send + Sync {
    /// Check out or update the origin, returning its build root
    async fn acquire(&self, origin: &OriginConfig) -> Resolved<Option<PathBuf>>;

    /// Where the build root lives if it exists, without touching git
    fn locate(&self, origin: &OriginConfig) -> Option<PathBuf>;
}

/// Git-backed worktree provider
pub struct GitWorktree {
    layout: CacheLayout,
}

impl GitWorktree {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    /// Directory the origin is checked out into
    pub fn target_dir(&self, origin: &OriginConfig) -> PathBuf {
        match (&origin.url, &origin.path, &origin.worktree) {
            (_, _, Some(worktree)) => worktree.clone(),
            (None, Some(path), None) => path.clone(),
            _ => self.layout.worktree_dir(&origin.name),
        }
    }

    /// Run git and fail on a nonzero exit
    async fn git(&self, origin: &str, cwd: Option<&Path>, args: &[&str]) -> HoardResult<()> {
        debug!("Executing: git {:?}", args);

        let mut cmd = Command::new("git");
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        let output = cmd
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| HoardError::command_failed(format!("git {:?}", args), e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(HoardError::git(
                origin,
                args.first().copied().unwrap_or("git"),
                String::from_utf8_lossy(&output.stderr).trim(),
            ))
        }
    }

    /// Clone if needed, then fetch and force-checkout the requested ref
    async fn checkout(&self, origin: &OriginConfig, url: &str, target: &Path) -> HoardResult<()> {
        if !target.join(".git").exists() {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| HoardError::io(format!("creating {}", parent.display()), e))?;
            }
            let target_str = target.to_string_lossy();
            info!("Cloning {} into {}", url, target.display());
            self.git(&origin.name, None, &["clone", "--no-checkout", url, &target_str])
                .await?;
        }

        self.git(
            &origin.name,
            Some(target),
            &["fetch", "origin", &origin.reference],
        )
        .await?;
        self.git(
            &origin.name,
            Some(target),
            &["checkout", "--force", "FETCH_HEAD"],
        )
        .await
    }
}

#[async_trait]
impl WorktreeProvider for GitWorktree {
    async fn acquire(&self, origin: &OriginConfig) -> Resolved<Option<PathBuf>> {
        let target = self.target_dir(origin);
        let mut diagnostics = Vec::new();

        match &origin.url {
            Some(url) => {
                if let Err(e) = self.checkout(origin, url, &target).await {
                    diagnostics.push(Diagnostic::error(e.to_string()));
                    return Resolved::with_diagnostics(None, diagnostics);
                }
            }
            None if !target.is_dir() => {
                diagnostics.push(Diagnostic::error(format!(
                    "origin '{}' has no url and {} is not a directory",
                    origin.name,
                    target.display()
                )));
                return Resolved::with_diagnostics(None, diagnostics);
            }
            None => {}
        }

        if origin.submodules {
            let init = self
                .git(
                    &origin.name,
                    Some(&target),
                    &["submodule", "update", "--init", "--recursive"],
                )
                .await;
            if let Err(e) = init {
                diagnostics.push(Diagnostic::warning(e.to_string()));
            }
        }

        Resolved::with_diagnostics(Some(target), diagnostics)
    }

    fn locate(&self, origin: &OriginConfig) -> Option<PathBuf> {
        let target = self.target_dir(origin);
        target.is_dir().then_some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn origin(name: &str) -> OriginConfig {
        OriginConfig {
            name: name.to_string(),
            url: None,
            path: None,
            reference: "main".to_string(),
            worktree: None,
            submodules: false,
            components: vec![],
        }
    }

    #[test]
    fn target_dir_precedence() {
        let provider = GitWorktree::new(CacheLayout::new("/cache"));

        let mut remote = origin("docs");
        remote.url = Some("https://example.com/docs.git".to_string());
        assert_eq!(provider.target_dir(&remote), PathBuf::from("/cache/worktrees/docs"));

        remote.worktree = Some(PathBuf::from("/work/docs"));
        assert_eq!(provider.target_dir(&remote), PathBuf::from("/work/docs"));

        let mut local = origin("site");
        local.path = Some(PathBuf::from("/src/site"));
        assert_eq!(provider.target_dir(&local), PathBuf::from("/src/site"));
    }

    #[tokio::test]
    async fn local_origin_used_in_place() {
        let dir = TempDir::new().unwrap();
        let provider = GitWorktree::new(CacheLayout::new(dir.path().join("cache")));
        let mut local = origin("site");
        local.path = Some(dir.path().to_path_buf());

        let resolved = provider.acquire(&local).await;

        assert_eq!(resolved.value, Some(dir.path().to_path_buf()));
        assert!(resolved.diagnostics.is_empty());
        assert_eq!(provider.locate(&local), Some(dir.path().to_path_buf()));
    }

    #[tokio::test]
    async fn missing_local_origin_has_no_root() {
        let dir = TempDir::new().unwrap();
        let provider = GitWorktree::new(CacheLayout::new(dir.path().join("cache")));
        let mut local = origin("site");
        local.path = Some(dir.path().join("absent"));

        let resolved = provider.acquire(&local).await;

        assert_eq!(resolved.value, None);
        assert!(!resolved.diagnostics.is_empty());
        assert_eq!(provider.locate(&local), None);
    }

    #[tokio::test]
    async fn unreachable_remote_has_no_root() {
        let dir = TempDir::new().unwrap();
        let provider = GitWorktree::new(CacheLayout::new(dir.path().join("cache")));
        let mut remote = origin("docs");
        remote.url = Some(dir.path().join("no-such-repo").to_string_lossy().into_owned());

        let resolved = provider.acquire(&remote).await;

        assert_eq!(resolved.value, None);
        assert!(!resolved.diagnostics.is_empty());
    }
}

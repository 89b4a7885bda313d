//! Build execution
//!
//! Runs the build command of entries the engine decided to miss. The
//! engine itself never executes builds.

use crate::cache::entry::BuildEntry;
use crate::cache::sources;
use crate::error::{HoardError, HoardResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tracing::{debug, info};

/// Executes an entry's build command inside its build root
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Run the build; on success outputs are under `build_root/cacheDir`
    async fn execute(&self, entry: &BuildEntry, build_root: &Path) -> HoardResult<()>;
}

/// Runs build commands through the platform shell, streaming their output
#[derive(Debug, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildExecutor for ShellExecutor {
    async fn execute(&self, entry: &BuildEntry, build_root: &Path) -> HoardResult<()> {
        let Some(command) = entry.command.as_deref() else {
            debug!("Entry {} has no command", entry.key);
            return Ok(());
        };

        info!("Building {}: {}", entry.key, command);

        let status = sources::shell(command)
            .current_dir(build_root)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| HoardError::command_failed(command, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(HoardError::BuildFailed {
                command: command.to_string(),
                code: status.code().unwrap_or(-1),
            })
        }
    }
}

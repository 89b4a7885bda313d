//! Error types for Hoard
//!
//! All fallible operations return `HoardResult<T>`. Conditions the cache
//! policy treats as recoverable (missing sources, failed discovery commands,
//! dependency cycles) are reported as diagnostics instead, see
//! [`crate::diagnostic`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Hoard operations
pub type HoardResult<T> = Result<T, HoardError>;

/// All errors that can occur in Hoard
#[derive(Error, Debug)]
pub enum HoardError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Origin not found in configuration: {0}")]
    OriginNotFound(String),

    // Cache errors
    #[error("Failed to write pointer record {path}: {reason}")]
    PointerWrite { path: PathBuf, reason: String },

    #[error("Failed to capture outputs from {from} into {to}: {reason}")]
    OutputCapture {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    GlobPattern { pattern: String, reason: String },

    // Git errors
    #[error("git {operation} failed for origin {origin}: {stderr}")]
    Git {
        origin: String,
        operation: String,
        stderr: String,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build command exited with code {code}: {command}")]
    BuildFailed { command: String, code: i32 },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl HoardError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a git error
    pub fn git(
        origin: impl Into<String>,
        operation: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Git {
            origin: origin.into(),
            operation: operation.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound(_) => Some("Create a hoard.toml or pass --config"),
            Self::OriginNotFound(_) => Some("Check the [[origins]] names in hoard.toml"),
            Self::Git { .. } => Some("Check the origin url/branch and your git credentials"),
            Self::CommandFailed { .. } => Some("Is `sh` (or `git`) available on PATH?"),
            _ => None,
        }
    }
}

//! Hoard - content-addressed build output cache
//!
//! Fingerprints the sources of configured build entries, reuses captured
//! outputs when nothing changed, and captures fresh outputs after builds.

pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod worktree;

pub use error::{HoardError, HoardResult};

//! Content-addressed build output cache
//!
//! Build entries are keyed by a SHA256 fingerprint over their source files.
//! A pointer record maps each fingerprint to a captured copy of the entry's
//! output directory, so an unchanged entry can skip its build entirely.
//!
//! # Flow
//!
//! | Step | Module |
//! |------|--------|
//! | normalize configuration | [`entry`] |
//! | fold in dependency sources | [`deps`] |
//! | expand discovery commands | [`sources`] |
//! | hash and fingerprint | [`hash`] |
//! | look up and verify | [`pointer`], [`store`] |
//! | decide, restore, capture | [`engine`] |

pub mod deps;
pub mod engine;
pub mod entry;
pub mod hash;
pub mod pointer;
pub mod sources;
pub mod store;

pub use deps::{DependencyGraph, DependencyNode, DependencySources};
pub use engine::{
    CacheEngine, CacheEntry, Decision, Evaluation, MissReason, Population, RunOptions,
};
pub use entry::{parse_cache_config, BuildEntry, CacheSpec, ScanSpec};
pub use hash::{combine, digest, digest_file, digest_source_set, MissingSources, SourceDigests};
pub use pointer::PointerRecord;
pub use sources::{resolve_sources, SourceSet};
pub use store::{has_real_files, restore_to_worktree, CacheLayout};

//! Source hashing for content-addressed caching
//!
//! Every declared source file is hashed with SHA256. The per-file digests
//! are folded into a single content fingerprint that keys the cache:
//! same paths with the same bytes = same fingerprint.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Relative source path -> hex SHA256 of its contents.
///
/// A `BTreeMap` so the serialized pointer record lists sources in a stable
/// order.
pub type SourceDigests = BTreeMap<String, String>;

/// Hex-encoded SHA256 of `bytes` (64 lowercase characters)
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Whether `value` has the shape of a fingerprint: 64 lowercase hex chars
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == 64
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// First 12 characters, for logs and tables
pub fn short(fingerprint: &str) -> &str {
    match fingerprint.char_indices().nth(12) {
        Some((end, _)) => &fingerprint[..end],
        None => fingerprint,
    }
}

/// Hash the file at `root/relative`.
///
/// Returns `Ok(None)` when the file does not exist, so an absent source can
/// be told apart from an empty one.
pub fn digest_file(root: &Path, relative: &str) -> io::Result<Option<String>> {
    let path = root.join(relative);
    match fs::read(&path) {
        Ok(contents) => Ok(Some(digest(&contents))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Sources that could not be hashed, plus what the root actually contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSources {
    /// Paths that were absent or unreadable
    pub missing: Vec<String>,
    /// Top-level entries of the root, for troubleshooting `sources`
    pub root_listing: Vec<String>,
}

impl MissingSources {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "missing [{}]; root contains [{}]",
            self.missing.join(", "),
            self.root_listing.join(", ")
        )
    }
}

/// Hash every path in `paths` against `root`.
///
/// All or nothing: if any path is missing the whole set is unavailable.
pub fn digest_source_set<S: AsRef<str>>(
    root: &Path,
    paths: &[S],
) -> Result<SourceDigests, MissingSources> {
    let mut digests = SourceDigests::new();
    let mut missing = Vec::new();

    for path in paths {
        let path = path.as_ref();
        match digest_file(root, path) {
            Ok(Some(hash)) => {
                debug!("Hashed {}: {}", path, &hash[..12]);
                digests.insert(path.to_string(), hash);
            }
            Ok(None) => missing.push(path.to_string()),
            Err(e) => {
                debug!("Failed to read source {}: {}", path, e);
                missing.push(path.to_string());
            }
        }
    }

    if missing.is_empty() {
        return Ok(digests);
    }

    Err(MissingSources {
        missing,
        root_listing: list_dir(root),
    })
}

/// Fold per-file digests into one content fingerprint.
///
/// Keys are sorted lexicographically and the digests concatenated in that
/// order before hashing again, so the result never depends on iteration
/// order.
pub fn combine<'a, I>(digests: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut pairs: Vec<_> = digests.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (_, hash) in pairs {
        hasher.update(hash.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn list_dir(root: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

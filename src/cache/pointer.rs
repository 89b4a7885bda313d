//! Pointer records
//!
//! A pointer links a content fingerprint to the stored output directory
//! it was captured into. One JSON file per (component, key, fingerprint),
//! written after a successful build and only read during decisions.

use crate::cache::hash::{self, SourceDigests};
use crate::error::{HoardError, HoardResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// Persisted pointer from a fingerprint to its stored outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerRecord {
    /// Storage directory name under `outputs/` (the content fingerprint)
    pub output_dir: String,

    /// The entry's output directory at capture time
    pub scan_dir: String,

    /// Per-file digests the fingerprint was derived from
    pub sources: SourceDigests,

    /// When the outputs were captured
    pub timestamp: DateTime<Utc>,
}

impl PointerRecord {
    pub fn new(fingerprint: &str, scan_dir: &str, sources: SourceDigests) -> Self {
        Self {
            output_dir: fingerprint.to_string(),
            scan_dir: scan_dir.to_string(),
            sources,
            timestamp: Utc::now(),
        }
    }
}

/// Load a pointer record.
///
/// Missing files, unparseable contents and an `outputDir` that is not a
/// fingerprint all yield `None`; the latter two are logged.
pub async fn load(path: &Path) -> Option<PointerRecord> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read pointer {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<PointerRecord>(&content) {
        Ok(record) if hash::is_fingerprint(&record.output_dir) => Some(record),
        Ok(_) => {
            warn!(
                "Ignoring corrupt pointer {}: outputDir is not a fingerprint",
                path.display()
            );
            None
        }
        Err(e) => {
            warn!("Ignoring corrupt pointer {}: {}", path.display(), e);
            None
        }
    }
}

/// Write a pointer record, creating parent directories and replacing any
/// existing file
pub async fn save(path: &Path, record: &PointerRecord) -> HoardResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| HoardError::io(format!("creating {}", parent.display()), e))?;
    }

    let content = serde_json::to_string_pretty(record)?;
    fs::write(path, content)
        .await
        .map_err(|e| HoardError::PointerWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> PointerRecord {
        let mut sources = SourceDigests::new();
        sources.insert("src/main.c".to_string(), "ab".repeat(32));
        PointerRecord::new(&"f".repeat(64), "build", sources)
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("nope.json")).await.is_none());
    }

    #[tokio::test]
    async fn save_creates_parents_and_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hashes/site/build/abc.json");

        let original = record();
        save(&path, &original).await.unwrap();

        assert_eq!(load(&path).await, Some(original));
    }

    #[tokio::test]
    async fn save_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");

        save(&path, &record()).await.unwrap();
        let mut second = record();
        second.scan_dir = "dist".to_string();
        save(&path, &second).await.unwrap();

        assert_eq!(load(&path).await.unwrap().scan_dir, "dist");
    }

    #[tokio::test]
    async fn corrupt_pointer_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(load(&path).await.is_none());
    }

    #[tokio::test]
    async fn non_fingerprint_output_dir_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");

        let mut bad = record();
        bad.output_dir = "aéééééé".to_string();
        save(&path, &bad).await.unwrap();

        assert!(load(&path).await.is_none());
    }

    #[tokio::test]
    async fn json_shape_uses_camel_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        save(&path, &record()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(raw["outputDir"], "f".repeat(64));
        assert_eq!(raw["scanDir"], "build");
        assert!(raw["sources"]["src/main.c"].is_string());
        assert!(raw["timestamp"].is_string());
    }

    #[test]
    fn parses_foreign_timestamp() {
        let json = r#"{
            "outputDir": "abc",
            "scanDir": "out",
            "sources": {"a.txt": "00"},
            "timestamp": "2024-01-15T10:00:00.000Z"
        }"#;

        let record: PointerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.output_dir, "abc");
        assert_eq!(record.timestamp.to_rfc3339(), "2024-01-15T10:00:00+00:00");
    }
}

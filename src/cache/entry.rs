//! Build entry configuration
//!
//! Hosts hand over cache configuration as loosely-typed data whose keys may
//! be spelled `cacheDir`, `cache_dir` or `cachedir`. Everything is folded
//! into one canonical [`BuildEntry`] here; nothing downstream looks at key
//! spelling again.

use crate::cache::store;
use crate::diagnostic::{Diagnostic, Resolved};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Component, Path};

/// A named unit of cacheable work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEntry {
    /// Unique within its component
    pub key: String,

    /// Relative paths or glob patterns to hash
    #[serde(deserialize_with = "one_or_many")]
    pub sources: Vec<String>,

    /// Shell commands printing additional source paths, one per line
    #[serde(default, deserialize_with = "one_or_many")]
    pub source_commands: Vec<String>,

    /// Where the build command leaves its outputs, relative to the build root
    pub cache_dir: String,

    /// The build command itself
    #[serde(default)]
    pub command: Option<String>,

    /// Keys of entries whose sources are folded into this one
    #[serde(default, deserialize_with = "one_or_many")]
    pub depends_on: Vec<String>,

    /// Cached output files copied back into the build root on a hit
    #[serde(default, deserialize_with = "one_or_many")]
    pub restore_to_worktree: Vec<String>,
}

/// Pass-through scan instruction for the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSpec {
    pub dir: String,

    #[serde(default, deserialize_with = "one_or_many")]
    pub files: Vec<String>,

    #[serde(default)]
    pub into: Option<String>,
}

/// One configured cache item: what to build and what to scan afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSpec {
    pub run: BuildEntry,
    pub scan: Vec<ScanSpec>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Canonical spelling for a configuration key, if it is one we know
fn canonical_key(raw: &str) -> Option<&'static str> {
    let folded: String = raw
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();

    Some(match folded.as_str() {
        "key" => "key",
        "sources" => "sources",
        "sourcecommands" => "sourceCommands",
        "cachedir" | "outputdir" => "cacheDir",
        "command" => "command",
        "dependson" => "dependsOn",
        "restoretoworktree" => "restoreToWorktree",
        _ => return None,
    })
}

fn normalize_keys(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = Map::new();
    for (key, value) in raw {
        if let Some(canonical) = canonical_key(key) {
            normalized
                .entry(canonical.to_string())
                .or_insert_with(|| value.clone());
        }
    }
    normalized
}

/// A relative path that stays inside whatever it is joined onto
fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl BuildEntry {
    /// Normalize and validate one raw `run` object
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let Some(raw) = value.as_object() else {
            return Err("run must be an object".to_string());
        };

        let entry: BuildEntry =
            serde_json::from_value(Value::Object(normalize_keys(raw))).map_err(|e| e.to_string())?;
        entry.validate()?;
        Ok(entry)
    }

    fn validate(&self) -> Result<(), String> {
        if self.key.trim().is_empty() {
            return Err("key must not be empty".to_string());
        }
        if !is_contained(&self.key) || self.key.contains(['/', '\\']) {
            return Err(format!("key '{}' is not a valid directory name", self.key));
        }
        if self.sources.is_empty() {
            return Err(format!("entry '{}' declares no sources", self.key));
        }
        if !is_contained(&self.cache_dir) {
            return Err(format!(
                "entry '{}' cacheDir '{}' must be a relative path inside the build root",
                self.key, self.cache_dir
            ));
        }
        for pattern in &self.restore_to_worktree {
            store::check_pattern(pattern).map_err(|e| format!("entry '{}': {}", self.key, e))?;
        }
        Ok(())
    }
}

impl CacheSpec {
    /// Parse one element of a component's cache list.
    ///
    /// The element is either `{ run = {...}, scan = ... }` or a bare run
    /// object.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let Some(object) = value.as_object() else {
            return Err("cache item must be an object".to_string());
        };

        let run = match object.get("run") {
            Some(run) => BuildEntry::from_value(run)?,
            None => BuildEntry::from_value(value)?,
        };

        let scan = match object.get("scan") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| serde_json::from_value(item.clone()))
                .collect::<Result<Vec<ScanSpec>, _>>()
                .map_err(|e| format!("invalid scan for '{}': {}", run.key, e))?,
            Some(item) => vec![serde_json::from_value(item.clone())
                .map_err(|e| format!("invalid scan for '{}': {}", run.key, e))?],
        };

        Ok(Self { run, scan })
    }
}

/// Parse a component's cache configuration.
///
/// Invalid items are skipped with a warning; their siblings are kept. A
/// duplicated key keeps its first declaration.
pub fn parse_cache_config(component: &str, config: &Value) -> Resolved<Vec<CacheSpec>> {
    let items = match config {
        Value::Null => return Resolved::clean(Vec::new()),
        Value::Array(items) => items,
        _ => {
            return Resolved::with_diagnostics(
                Vec::new(),
                vec![Diagnostic::warning(format!(
                    "cache config for component '{}' is not a list, skipping",
                    component
                ))],
            )
        }
    };

    let mut specs = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    let mut diagnostics = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match CacheSpec::from_value(item) {
            Ok(spec) if !seen.insert(spec.run.key.clone()) => {
                diagnostics.push(Diagnostic::warning(format!(
                    "duplicate cache key '{}' in component '{}' (item {}), skipping",
                    spec.run.key, component, index
                )));
            }
            Ok(spec) => specs.push(spec),
            Err(reason) => diagnostics.push(Diagnostic::warning(format!(
                "invalid cache entry {} in component '{}': {}",
                index, component, reason
            ))),
        }
    }

    Resolved::with_diagnostics(specs, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_case_entry() {
        let spec = CacheSpec::from_value(&json!({
            "run": {
                "key": "build",
                "sources": ["src/main.c"],
                "sourceCommands": ["git ls-files src"],
                "cacheDir": "out",
                "command": "make",
                "dependsOn": ["lib"],
                "restoreToWorktree": ["**/*.h"]
            },
            "scan": {"dir": "out", "files": "**/*.html", "into": "api"}
        }))
        .unwrap();

        assert_eq!(spec.run.key, "build");
        assert_eq!(spec.run.source_commands, vec!["git ls-files src"]);
        assert_eq!(spec.run.cache_dir, "out");
        assert_eq!(spec.run.command.as_deref(), Some("make"));
        assert_eq!(spec.run.depends_on, vec!["lib"]);
        assert_eq!(spec.scan.len(), 1);
        assert_eq!(spec.scan[0].files, vec!["**/*.html"]);
        assert_eq!(spec.scan[0].into.as_deref(), Some("api"));
    }

    #[test]
    fn snake_and_lower_case_are_equivalent() {
        let camel = BuildEntry::from_value(&json!({
            "key": "k", "sources": ["a"], "cacheDir": "out", "restoreToWorktree": ["*.h"]
        }))
        .unwrap();
        let snake = BuildEntry::from_value(&json!({
            "key": "k", "sources": ["a"], "cache_dir": "out", "restore_to_worktree": ["*.h"]
        }))
        .unwrap();
        let lower = BuildEntry::from_value(&json!({
            "key": "k", "sources": ["a"], "cachedir": "out", "restoretoworktree": ["*.h"]
        }))
        .unwrap();

        assert_eq!(camel, snake);
        assert_eq!(camel, lower);
    }

    #[test]
    fn single_string_sources() {
        let entry = BuildEntry::from_value(&json!({
            "key": "k", "sources": "Makefile", "cacheDir": "out", "sourceCommands": null
        }))
        .unwrap();

        assert_eq!(entry.sources, vec!["Makefile"]);
        assert!(entry.source_commands.is_empty());
    }

    #[test]
    fn missing_required_fields() {
        let no_key = BuildEntry::from_value(&json!({"sources": ["a"], "cacheDir": "out"}));
        assert!(no_key.unwrap_err().contains("key"));

        let no_sources = BuildEntry::from_value(&json!({"key": "k", "sources": [], "cacheDir": "o"}));
        assert!(no_sources.unwrap_err().contains("no sources"));

        let no_dir = BuildEntry::from_value(&json!({"key": "k", "sources": ["a"]}));
        assert!(no_dir.unwrap_err().contains("cacheDir"));
    }

    #[test]
    fn cache_dir_must_stay_inside_root() {
        for dir in ["../escape", "/abs/out", ""] {
            let result = BuildEntry::from_value(&json!({"key": "k", "sources": ["a"], "cacheDir": dir}));
            assert!(result.is_err(), "{} should be rejected", dir);
        }
    }

    #[test]
    fn invalid_restore_pattern_rejected() {
        let result = BuildEntry::from_value(&json!({
            "key": "k", "sources": ["a"], "cacheDir": "out", "restoreToWorktree": ["a[.h"]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn scan_list() {
        let spec = CacheSpec::from_value(&json!({
            "run": {"key": "k", "sources": ["a"], "cacheDir": "out"},
            "scan": [{"dir": "out/html"}, {"dir": "out/api", "into": "api"}]
        }))
        .unwrap();

        assert_eq!(spec.scan.len(), 2);
        assert!(spec.scan[0].files.is_empty());
    }

    #[test]
    fn parse_config_not_a_list() {
        let resolved = parse_cache_config("docs", &json!({"key": "k"}));
        assert!(resolved.value.is_empty());
        assert!(resolved.diagnostics[0].message.contains("not a list"));
    }

    #[test]
    fn parse_config_skips_invalid_keeps_siblings() {
        let resolved = parse_cache_config(
            "docs",
            &json!([
                {"run": {"key": "a", "sources": ["a.c"], "cacheDir": "out"}},
                {"run": {"key": "b", "cacheDir": "out"}},
                {"run": {"key": "a", "sources": ["x.c"], "cacheDir": "out"}},
                {"run": {"key": "c", "sources": ["c.c"], "cacheDir": "out"}}
            ]),
        );

        let keys: Vec<_> = resolved.value.iter().map(|s| s.run.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(resolved.diagnostics.len(), 2);
    }

    #[test]
    fn parse_config_null_is_empty() {
        let resolved = parse_cache_config("docs", &Value::Null);
        assert!(resolved.value.is_empty());
        assert!(resolved.diagnostics.is_empty());
    }
}

//! Configuration schema for Hoard
//!
//! Configuration lives in a project-level `hoard.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache store settings
    pub cache: CacheConfig,

    /// Source trees to build from
    pub origins: Vec<OriginConfig>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache base directory (defaults to the user cache dir)
    pub dir: Option<PathBuf>,

    /// Decide only; never build or populate
    pub dry_run: bool,

    /// Treat every entry as a miss
    pub force_rebuild: bool,
}

impl CacheConfig {
    /// The cache base directory to use
    pub fn base_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("hoard")
        })
    }
}

/// A source tree: a remote repository or a local directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Origin name, also the worktree directory name
    pub name: String,

    /// Remote repository URL
    #[serde(default)]
    pub url: Option<String>,

    /// Local source tree, used in place
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Branch, tag or commit to check out
    #[serde(default = "default_ref", rename = "ref", alias = "branch")]
    pub reference: String,

    /// Existing worktree to reuse instead of the cache-managed one
    #[serde(default)]
    pub worktree: Option<PathBuf>,

    /// Initialize submodules after checkout
    #[serde(default)]
    pub submodules: bool,

    /// Components built from this origin
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

fn default_ref() -> String {
    "main".to_string()
}

/// A component and its cache entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,

    /// List of cache items; validated at ingestion
    #[serde(default)]
    pub cache: serde_json::Value,
}

impl Config {
    /// Make relative paths relative to the directory holding the config file
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(dir) = &self.cache.dir {
            if dir.is_relative() {
                self.cache.dir = Some(base.join(dir));
            }
        }
        for origin in &mut self.origins {
            for path in [&mut origin.path, &mut origin.worktree].into_iter().flatten() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    pub fn origin(&self, name: &str) -> Option<&OriginConfig> {
        self.origins.iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[general]
log_format = "json"

[cache]
dir = ".hoard"
force_rebuild = true

[[origins]]
name = "docs"
url = "https://example.com/docs.git"
branch = "release"
submodules = true

[[origins.components]]
name = "api"
cache = [
  { run = { key = "build", sources = ["src/main.c"], cacheDir = "out", command = "make" }, scan = { dir = "out" } },
]

[[origins]]
name = "local"
path = "site"
"#;

    #[test]
    fn parses_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.general.log_format, "json");
        assert!(config.cache.force_rebuild);
        assert!(!config.cache.dry_run);
        assert_eq!(config.origins.len(), 2);

        let docs = &config.origins[0];
        assert_eq!(docs.reference, "release");
        assert!(docs.submodules);
        assert_eq!(docs.components[0].name, "api");
        assert!(docs.components[0].cache.is_array());
        assert_eq!(docs.components[0].cache[0]["run"]["cacheDir"], "out");

        assert_eq!(config.origins[1].reference, "main");
    }

    #[test]
    fn resolves_relative_paths() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.cache.dir, Some(PathBuf::from("/project/.hoard")));
        assert_eq!(
            config.origin("local").unwrap().path,
            Some(PathBuf::from("/project/site"))
        );
        assert_eq!(config.origin("docs").unwrap().path, None);
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.general.log_format, "text");
        assert!(config.origins.is_empty());
        assert!(config.cache.base_dir().ends_with("hoard"));
    }

    #[test]
    fn missing_cache_is_null() {
        let config: Config = toml::from_str("[[origins]]\nname = \"a\"\n[[origins.components]]\nname = \"c\"\n").unwrap();
        assert!(config.origins[0].components[0].cache.is_null());
    }
}

//! Cache decision engine
//!
//! For every build entry: resolve sources (including dependencies), hash
//! them, look up the pointer for the resulting fingerprint and check the
//! stored outputs are still there. That yields a HIT (skip the build) or a
//! MISS with a reason. After the host has run the missed builds,
//! [`CacheEngine::populate`] captures their outputs.
//!
//! # Decision states
//!
//! | Step | Failure | Decision |
//! |------|---------|----------|
//! | resolve sources | build root absent | MISS: root not ready |
//! | hash | any source missing | MISS: sources not found |
//! | look up | force rebuild | MISS: forced rebuild |
//! | look up | no usable pointer | MISS: no cache entry |
//! | verify | stored output missing/empty | MISS: cached outputs missing |
//! | verify | - | HIT |

use crate::cache::deps::DependencyGraph;
use crate::cache::entry::{BuildEntry, CacheSpec, ScanSpec};
use crate::cache::hash::{self, short, SourceDigests};
use crate::cache::pointer::{self, PointerRecord};
use crate::cache::sources::resolve_sources;
use crate::cache::store::{self, CacheLayout};
use crate::error::{HoardError, HoardResult};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Run-wide switches, usually fed from `HOARD_DRY_RUN` / `HOARD_FORCE_REBUILD`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after decisions; build and populate nothing
    pub dry_run: bool,
    /// Treat every entry as a miss, but still populate afterwards
    pub force_rebuild: bool,
}

/// Why an entry has to be built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MissReason {
    RootNotReady,
    SourcesNotFound,
    Forced,
    NoPointer,
    OutputsMissing,
    Failed(String),
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotReady => write!(f, "root not ready"),
            Self::SourcesNotFound => write!(f, "sources not found"),
            Self::Forced => write!(f, "forced rebuild"),
            Self::NoPointer => write!(f, "no cache entry"),
            Self::OutputsMissing => write!(f, "cached outputs missing"),
            Self::Failed(message) => write!(f, "evaluation failed: {}", message),
        }
    }
}

/// Outcome for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    Hit { fingerprint: String },
    Miss { reason: MissReason },
}

impl Decision {
    fn miss(reason: MissReason) -> Self {
        Self::Miss { reason }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    pub fn miss_reason(&self) -> Option<&MissReason> {
        match self {
            Self::Miss { reason } => Some(reason),
            Self::Hit { .. } => None,
        }
    }

    /// Human-readable reason
    pub fn reason(&self) -> String {
        match self {
            Self::Hit { fingerprint } => format!("cache hit {}", short(fingerprint)),
            Self::Miss { reason } => reason.to_string(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit { .. } => write!(f, "HIT ({})", self.reason()),
            Self::Miss { .. } => write!(f, "MISS ({})", self.reason()),
        }
    }
}

/// Working record for one entry through a run.
///
/// Carries the resolved sources and digests from decision time so capture
/// does not need to recompute them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub component: String,
    pub hash_dir: PathBuf,
    pub key: String,
    /// Declared sources plus those of every dependency
    pub sources: Vec<String>,
    pub source_commands: Vec<String>,
    pub build_root: Option<PathBuf>,
    pub cache_dir: String,
    pub digests: Option<SourceDigests>,
    pub fingerprint: Option<String>,
}

/// Result of evaluating one configured cache item
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    #[serde(flatten)]
    pub decision: Decision,
    pub entry: CacheEntry,
    #[serde(skip)]
    pub run: BuildEntry,
    /// Scan instructions; on a hit they point into the cache
    pub scan: Vec<ScanSpec>,
    /// Files restored into the build root on a hit
    pub restored: usize,
}

impl Evaluation {
    /// Whether the host must run this entry's build command
    pub fn should_run(&self) -> bool {
        !self.decision.is_hit()
    }
}

/// What [`CacheEngine::populate`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Population {
    /// Pointer written and outputs copied
    Captured { fingerprint: String, files: usize },
    /// Pointer written but the build left no output directory
    PointerOnly { fingerprint: String },
    /// Nothing written
    Skipped { reason: String },
}

/// Decides HIT/MISS and captures outputs
#[derive(Debug, Clone)]
pub struct CacheEngine {
    layout: CacheLayout,
    options: RunOptions,
}

impl CacheEngine {
    pub fn new(layout: CacheLayout, options: RunOptions) -> Self {
        Self { layout, options }
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    /// Evaluate every item of one component, in order.
    ///
    /// The dependency graph spans exactly this batch.
    pub async fn evaluate_batch(
        &self,
        component: &str,
        build_root: Option<&Path>,
        specs: Vec<CacheSpec>,
    ) -> Vec<Evaluation> {
        let graph = DependencyGraph::from_entries(specs.iter().map(|s| &s.run));
        let mut evaluations = Vec::with_capacity(specs.len());

        for spec in specs {
            evaluations.push(self.evaluate(component, build_root, spec, &graph).await);
        }

        evaluations
    }

    /// Build the working record for an entry, folding in dependency sources
    pub fn prepare(
        &self,
        component: &str,
        build_root: Option<&Path>,
        run: &BuildEntry,
        graph: &DependencyGraph,
    ) -> CacheEntry {
        let deps = graph.resolve(&run.key);
        for diagnostic in &deps.diagnostics {
            warn!(component, key = %run.key, "{}", diagnostic.message);
        }

        let mut sources = run.sources.clone();
        sources.extend(deps.value.sources);
        let mut source_commands = run.source_commands.clone();
        source_commands.extend(deps.value.source_commands);

        CacheEntry {
            component: component.to_string(),
            hash_dir: self.layout.hash_dir(component, &run.key),
            key: run.key.clone(),
            sources,
            source_commands,
            build_root: build_root.map(Path::to_path_buf),
            cache_dir: run.cache_dir.clone(),
            digests: None,
            fingerprint: None,
        }
    }

    /// Evaluate one item. Never fails: unexpected errors become a MISS so
    /// the build still runs.
    pub async fn evaluate(
        &self,
        component: &str,
        build_root: Option<&Path>,
        spec: CacheSpec,
        graph: &DependencyGraph,
    ) -> Evaluation {
        let CacheSpec { run, mut scan } = spec;
        let mut entry = self.prepare(component, build_root, &run, graph);
        let mut restored = 0;

        let decision = match self.decide(&mut entry).await {
            Ok(decision @ Decision::Hit { .. }) => match self.apply_hit(&entry, &run, &mut scan).await {
                Ok(count) => {
                    restored = count;
                    decision
                }
                Err(e) => {
                    error!(component, key = %entry.key, "Failed to restore cached outputs: {}", e);
                    Decision::miss(MissReason::Failed(e.to_string()))
                }
            },
            Ok(decision) => decision,
            Err(e) => {
                error!(component, key = %entry.key, "Cache evaluation failed: {}", e);
                Decision::miss(MissReason::Failed(e.to_string()))
            }
        };

        info!(
            component,
            key = %entry.key,
            fingerprint = entry.fingerprint.as_deref().map(short).unwrap_or("-"),
            "{}",
            decision
        );

        Evaluation {
            decision,
            entry,
            run,
            scan,
            restored,
        }
    }

    /// Walk the decision states for one entry
    async fn decide(&self, entry: &mut CacheEntry) -> HoardResult<Decision> {
        let root = match &entry.build_root {
            Some(root) if root.is_dir() => root.clone(),
            _ => return Ok(Decision::miss(MissReason::RootNotReady)),
        };

        let Some(digests) = self.hash_sources(entry, &root).await? else {
            return Ok(Decision::miss(MissReason::SourcesNotFound));
        };

        let fingerprint = hash::combine(&digests);
        entry.digests = Some(digests);
        entry.fingerprint = Some(fingerprint.clone());

        let pointer_path = self
            .layout
            .pointer_path(&entry.component, &entry.key, &fingerprint);
        let pointer = pointer::load(&pointer_path).await;

        if self.options.force_rebuild {
            return Ok(Decision::miss(MissReason::Forced));
        }

        let Some(pointer) = pointer else {
            return Ok(Decision::miss(MissReason::NoPointer));
        };

        if pointer.output_dir != fingerprint {
            warn!(
                "Pointer {} records output dir {} for fingerprint {}, ignoring it",
                pointer_path.display(),
                short(&pointer.output_dir),
                short(&fingerprint)
            );
            return Ok(Decision::miss(MissReason::NoPointer));
        }

        let stored = self
            .layout
            .stored_output(&pointer.output_dir, &entry.cache_dir);
        let present = blocking({
            let stored = stored.clone();
            move || store::has_real_files(&stored)
        })
        .await?;
        if !present {
            debug!("Stored output {} is missing or empty", stored.display());
            return Ok(Decision::miss(MissReason::OutputsMissing));
        }

        Ok(Decision::Hit { fingerprint })
    }

    /// Resolve and hash the entry's sources; `None` if any is missing
    async fn hash_sources(
        &self,
        entry: &CacheEntry,
        root: &Path,
    ) -> HoardResult<Option<SourceDigests>> {
        let resolved = resolve_sources(root, &entry.sources, &entry.source_commands).await;
        for diagnostic in &resolved.diagnostics {
            warn!(component = %entry.component, key = %entry.key, "{}", diagnostic.message);
        }

        let hashed = blocking({
            let root = root.to_path_buf();
            let paths = resolved.value.as_slice().to_vec();
            move || hash::digest_source_set(&root, paths.as_slice())
        })
        .await?;

        Ok(match hashed {
            Ok(digests) => Some(digests),
            Err(missing) => {
                warn!(
                    component = %entry.component,
                    key = %entry.key,
                    "Sources not found: {}",
                    missing.missing.join(", ")
                );
                debug!("{}", missing.summary());
                None
            }
        })
    }

    /// Restore requested files and point scans at the cache
    async fn apply_hit(
        &self,
        entry: &CacheEntry,
        run: &BuildEntry,
        scan: &mut [ScanSpec],
    ) -> HoardResult<usize> {
        let fingerprint = entry
            .fingerprint
            .as_deref()
            .ok_or_else(|| HoardError::Internal("hit without fingerprint".to_string()))?;

        let mut restored = 0;
        if let Some(root) = &entry.build_root {
            let cached = self.layout.stored_output(fingerprint, &entry.cache_dir);
            let live = root.join(&entry.cache_dir);
            let patterns = run.restore_to_worktree.clone();
            restored = blocking({
                let live = live.clone();
                move || store::restore_to_worktree(&cached, &live, patterns.as_slice())
            })
            .await??;
            if restored > 0 {
                info!(key = %entry.key, "Restored {} file(s) into {}", restored, live.display());
            }
        }

        let output_root = self.layout.output_root(fingerprint);
        for item in scan.iter_mut() {
            item.dir = output_root.join(&item.dir).to_string_lossy().into_owned();
        }

        Ok(restored)
    }

    /// Capture a built entry into the store.
    ///
    /// `build_root` overrides the root recorded at decision time, for roots
    /// that only appeared during this run. Digests from decision time are
    /// reused; otherwise sources are resolved again, since the build may
    /// have generated the ones that were missing.
    pub async fn populate(
        &self,
        entry: &mut CacheEntry,
        build_root: Option<&Path>,
    ) -> HoardResult<Population> {
        let root = match build_root.map(Path::to_path_buf).or_else(|| entry.build_root.clone()) {
            Some(root) if root.is_dir() => root,
            _ => {
                warn!(key = %entry.key, "No build root to capture from, skipping");
                return Ok(Population::Skipped {
                    reason: "root not ready".to_string(),
                });
            }
        };
        entry.build_root = Some(root.clone());

        let digests = match entry.digests.clone() {
            Some(digests) => digests,
            None => match self.hash_sources(entry, &root).await? {
                Some(digests) => digests,
                None => {
                    warn!(key = %entry.key, "Sources still missing after build, not caching");
                    return Ok(Population::Skipped {
                        reason: "sources not found".to_string(),
                    });
                }
            },
        };

        let fingerprint = match &entry.fingerprint {
            Some(fingerprint) if entry.digests.is_some() => fingerprint.clone(),
            _ => hash::combine(&digests),
        };
        entry.digests = Some(digests.clone());
        entry.fingerprint = Some(fingerprint.clone());

        let record = PointerRecord::new(&fingerprint, &entry.cache_dir, digests);
        let pointer_path = self
            .layout
            .pointer_path(&entry.component, &entry.key, &fingerprint);
        pointer::save(&pointer_path, &record).await?;
        debug!("Wrote pointer {}", pointer_path.display());

        let built = root.join(&entry.cache_dir);
        if !built.is_dir() {
            warn!(
                key = %entry.key,
                "Output directory {} does not exist, nothing to capture",
                built.display()
            );
            return Ok(Population::PointerOnly { fingerprint });
        }

        let stored = self.layout.stored_output(&fingerprint, &entry.cache_dir);
        let files = capture(built, stored).await?;
        info!(
            component = %entry.component,
            key = %entry.key,
            fingerprint = short(&fingerprint),
            "Cached {} file(s)",
            files
        );

        Ok(Population::Captured { fingerprint, files })
    }
}

/// Run filesystem-heavy work off the async runtime
async fn blocking<T, F>(task: F) -> HoardResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| HoardError::Internal(format!("blocking task failed: {}", e)))
}

/// Replace `stored` with a copy of `built`
async fn capture(built: PathBuf, stored: PathBuf) -> HoardResult<usize> {
    blocking(move || {
        if stored.exists() {
            std::fs::remove_dir_all(&stored)
                .map_err(|e| HoardError::io(format!("clearing {}", stored.display()), e))?;
        }
        store::copy_dir(&built, &stored)
    })
    .await?
}

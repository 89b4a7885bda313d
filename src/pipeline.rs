//! Run orchestration
//!
//! Ties the engine to its collaborators: acquire each origin's build root,
//! decide every entry, then (unless this is a dry run) build the misses and
//! capture their outputs. Origins are processed one after another and the
//! entries of a component strictly in declaration order.

use crate::cache::{parse_cache_config, CacheEngine, CacheLayout, Evaluation, Population, RunOptions};
use crate::config::{Config, OriginConfig};
use crate::error::{HoardError, HoardResult};
use crate::executor::{BuildExecutor, ShellExecutor};
use crate::worktree::{GitWorktree, WorktreeProvider};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Decisions for one component
#[derive(Debug)]
pub struct ComponentReport {
    pub origin: String,
    pub component: String,
    pub build_root: Option<PathBuf>,
    pub evaluations: Vec<Evaluation>,
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    pub components: Vec<ComponentReport>,
    /// Stopped after decisions
    pub dry_run: bool,
    /// Builds that ran and succeeded
    pub built: usize,
    /// Builds that failed or could not start
    pub failed: usize,
    /// Entries whose outputs were captured
    pub cached: usize,
}

impl RunReport {
    pub fn evaluations(&self) -> impl Iterator<Item = &Evaluation> {
        self.components.iter().flat_map(|c| c.evaluations.iter())
    }

    pub fn hits(&self) -> usize {
        self.evaluations().filter(|e| e.decision.is_hit()).count()
    }

    pub fn misses(&self) -> usize {
        self.evaluations().filter(|e| e.should_run()).count()
    }
}

/// Pick the origins to process; `None` means all of them
pub fn select_origins<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> HoardResult<Vec<&'a OriginConfig>> {
    match name {
        None => Ok(config.origins.iter().collect()),
        Some(name) => config
            .origin(name)
            .map(|o| vec![o])
            .ok_or_else(|| HoardError::OriginNotFound(name.to_string())),
    }
}

pub struct Pipeline {
    engine: CacheEngine,
    worktrees: Box<dyn WorktreeProvider>,
    executor: Box<dyn BuildExecutor>,
}

impl Pipeline {
    /// Pipeline with git worktrees and shell builds
    pub fn new(config: &Config, options: RunOptions) -> Self {
        let layout = CacheLayout::new(config.cache.base_dir());
        Self::with_collaborators(
            CacheEngine::new(layout.clone(), options),
            Box::new(GitWorktree::new(layout)),
            Box::new(ShellExecutor::new()),
        )
    }

    pub fn with_collaborators(
        engine: CacheEngine,
        worktrees: Box<dyn WorktreeProvider>,
        executor: Box<dyn BuildExecutor>,
    ) -> Self {
        Self {
            engine,
            worktrees,
            executor,
        }
    }

    /// Decide every entry of every component of `origins`
    pub async fn decide(&self, origins: &[&OriginConfig]) -> Vec<ComponentReport> {
        let mut reports = Vec::new();

        for origin in origins {
            let build_root = self.worktrees.acquire(origin).await.emit();

            for component in &origin.components {
                let specs = parse_cache_config(&component.name, &component.cache).emit();
                let evaluations = self
                    .engine
                    .evaluate_batch(&component.name, build_root.as_deref(), specs)
                    .await;

                reports.push(ComponentReport {
                    origin: origin.name.clone(),
                    component: component.name.clone(),
                    build_root: build_root.clone(),
                    evaluations,
                });
            }
        }

        reports
    }

    /// Decide, then build and capture every miss unless this is a dry run
    pub async fn run(&self, origins: &[&OriginConfig]) -> RunReport {
        let components = self.decide(origins).await;
        let mut report = RunReport {
            components,
            ..Default::default()
        };

        if self.engine.options().dry_run {
            info!(
                "Dry run: {} hit(s), {} miss(es); not building",
                report.hits(),
                report.misses()
            );
            report.dry_run = true;
            return report;
        }

        for component in &mut report.components {
            let Some(origin) = origins.iter().find(|o| o.name == component.origin) else {
                continue;
            };
            // The root may only have appeared during this run
            let root = component
                .build_root
                .clone()
                .or_else(|| self.worktrees.locate(origin));

            for evaluation in component.evaluations.iter_mut().filter(|e| e.should_run()) {
                let key = evaluation.entry.key.clone();
                let Some(root) = root.as_deref() else {
                    warn!(component = %component.component, key = %key, "No build root, cannot build");
                    report.failed += 1;
                    continue;
                };

                if let Err(e) = self.executor.execute(&evaluation.run, root).await {
                    error!(component = %component.component, key = %key, "Build failed: {}", e);
                    report.failed += 1;
                    continue;
                }
                report.built += 1;

                match self.engine.populate(&mut evaluation.entry, Some(root)).await {
                    Ok(Population::Captured { .. }) => report.cached += 1,
                    Ok(_) => {}
                    Err(e) => {
                        error!(component = %component.component, key = %key, "Failed to cache outputs: {}", e)
                    }
                }
            }
        }

        report
    }
}

//! Dependency graph between build entries
//!
//! An entry may list other entries of the same batch in `dependsOn`. Their
//! sources and discovery commands are folded into its own before hashing,
//! so a change in a dependency invalidates the dependent entry as well.
//!
//! The graph is built once per batch: an arena of nodes plus a name index.

use crate::cache::entry::BuildEntry;
use crate::diagnostic::{Diagnostic, Resolved};
use std::collections::{HashMap, HashSet};

/// The parts of a build entry the resolver needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub key: String,
    pub sources: Vec<String>,
    pub source_commands: Vec<String>,
    pub depends_on: Vec<String>,
}

impl From<&BuildEntry> for DependencyNode {
    fn from(entry: &BuildEntry) -> Self {
        Self {
            key: entry.key.clone(),
            sources: entry.sources.clone(),
            source_commands: entry.source_commands.clone(),
            depends_on: entry.depends_on.clone(),
        }
    }
}

/// Sources and commands accumulated from an entry's dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySources {
    pub sources: Vec<String>,
    pub source_commands: Vec<String>,
}

/// Immutable registry of the entries declared in one batch
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    index: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Build the graph. A duplicated key keeps its first declaration.
    pub fn new(nodes: impl IntoIterator<Item = DependencyNode>) -> Self {
        let mut graph = Self::default();
        for node in nodes {
            if graph.index.contains_key(&node.key) {
                continue;
            }
            graph.index.insert(node.key.clone(), graph.nodes.len());
            graph.nodes.push(node);
        }
        graph
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a BuildEntry>) -> Self {
        Self::new(entries.into_iter().map(DependencyNode::from))
    }

    pub fn get(&self, key: &str) -> Option<&DependencyNode> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    /// Collect the transitive sources of `key`'s dependencies.
    ///
    /// Depth-first in declaration order, without de-duplication. A key is
    /// never revisited along one path, so cycles terminate; each repeated
    /// edge is reported once per traversal and not followed.
    pub fn resolve(&self, key: &str) -> Resolved<DependencySources> {
        let Some(node) = self.get(key) else {
            return Resolved::clean(DependencySources::default());
        };

        let mut visited = HashSet::new();
        visited.insert(key.to_string());
        self.resolve_dependency_sources(&node.depends_on, &visited, key)
    }

    /// Resolve an explicit `depends_on` list on behalf of `self_key`
    pub fn resolve_dependency_sources(
        &self,
        depends_on: &[String],
        visited: &HashSet<String>,
        self_key: &str,
    ) -> Resolved<DependencySources> {
        let mut acc = DependencySources::default();
        let mut diagnostics = Vec::new();
        self.collect(depends_on, visited, self_key, &mut acc, &mut diagnostics);
        Resolved::with_diagnostics(acc, diagnostics)
    }

    fn collect(
        &self,
        depends_on: &[String],
        visited: &HashSet<String>,
        self_key: &str,
        acc: &mut DependencySources,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for dep in depends_on {
            if visited.contains(dep) {
                diagnostics.push(Diagnostic::warning(format!(
                    "circular dependency: {} -> {}",
                    self_key, dep
                )));
                continue;
            }

            let Some(node) = self.get(dep) else {
                diagnostics.push(Diagnostic::warning(format!(
                    "dependency not found: {} (required by {})",
                    dep, self_key
                )));
                continue;
            };

            acc.sources.extend(node.sources.iter().cloned());
            acc.source_commands
                .extend(node.source_commands.iter().cloned());

            // Each branch gets its own copy so siblings don't see each other
            let mut branch = visited.clone();
            branch.insert(dep.clone());
            self.collect(&node.depends_on, &branch, dep, acc, diagnostics);
        }
    }
}

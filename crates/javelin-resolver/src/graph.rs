//! The resolved dependency graph: per-node outcomes, classpath extraction,
//! tree rendering, and the aggregated failure report.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

use javelin_core::dependency::{DepScope, Dependency, DependencyId};
use javelin_maven::artifact::ArtifactPath;

use crate::conflict::ConflictReport;

/// One node of the resolution output.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    pub id: DependencyId,
    pub scope: DepScope,
    /// Effective transitive dependencies (after dependency management),
    /// including the pruned ones' survivors only.
    pub transitive: Vec<Dependency>,
    /// Name of the repository the artifact came from.
    pub resolved_from: Option<String>,
    /// `None` for type-less nodes (`pom` packaging) and failed nodes.
    pub artifact: Option<ArtifactPath>,
    /// Failure log: the attempts made for this node. A node has an error
    /// iff this is set.
    pub log: Option<String>,
}

impl ResolvedDependency {
    pub fn has_error(&self) -> bool {
        self.log.is_some()
    }
}

/// The complete output of a resolution pass.
#[derive(Debug)]
pub struct Resolution {
    pub nodes: BTreeMap<DependencyId, ResolvedDependency>,
    /// Ids of the roots, post-mediation.
    pub roots: Vec<DependencyId>,
    /// True when every root and every reachable transitive dependency
    /// produced an artifact or was legitimately type-less.
    pub complete: bool,
    pub conflicts: ConflictReport,
}

impl Resolution {
    /// Artifact paths of all successfully resolved nodes, ordered by id.
    pub fn classpath(&self) -> Vec<PathBuf> {
        self.nodes
            .values()
            .filter(|n| !n.has_error())
            .filter_map(|n| n.artifact.as_ref())
            .map(|a| a.path.clone())
            .collect()
    }

    /// All failed nodes, ordered by id.
    pub fn failed(&self) -> Vec<&ResolvedDependency> {
        self.nodes.values().filter(|n| n.has_error()).collect()
    }

    /// Render the dependency tree from the roots.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let count = self.roots.len();
        for (i, root) in self.roots.iter().enumerate() {
            let mut visited = BTreeSet::new();
            self.render_subtree(&mut out, root, "", i == count - 1, &mut visited);
        }
        out
    }

    fn render_subtree(
        &self,
        out: &mut String,
        id: &DependencyId,
        prefix: &str,
        is_last: bool,
        visited: &mut BTreeSet<DependencyId>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        match self.nodes.get(id) {
            Some(node) => {
                let marker = if node.has_error() { " (failed)" } else { "" };
                let _ = writeln!(out, "{prefix}{connector}{}{marker}", node.id);
                if !visited.insert(id.clone()) {
                    return;
                }
                let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
                let children: Vec<&DependencyId> = node
                    .transitive
                    .iter()
                    .map(|d| &d.id)
                    .filter(|child| self.find_resolved(child).is_some())
                    .collect();
                let count = children.len();
                for (i, child) in children.into_iter().enumerate() {
                    let resolved = self.find_resolved(child).cloned();
                    if let Some(resolved) = resolved {
                        self.render_subtree(out, &resolved, &child_prefix, i == count - 1, visited);
                    }
                }
                visited.remove(id);
            }
            None => {
                let _ = writeln!(out, "{prefix}{connector}{id} (overridden)");
            }
        }
    }

    /// The node id a requested id was mediated to, if any.
    fn find_resolved(&self, requested: &DependencyId) -> Option<&DependencyId> {
        if let Some((key, _)) = self.nodes.get_key_value(requested) {
            return Some(key);
        }
        self.nodes
            .keys()
            .find(|k| k.group == requested.group && k.name == requested.name)
    }

    /// Pretty-print the failure set: each failing coordinate with the
    /// repositories that were attempted.
    pub fn error_report(&self) -> String {
        let mut out = String::new();
        for node in self.failed() {
            let _ = writeln!(out, "{}", node.id);
            if let Some(ref log) = node.log {
                for line in log.lines() {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }
        out
    }
}

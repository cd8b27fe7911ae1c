//! Core dependency resolution: nearest-wins BFS with scope propagation,
//! exclusions, dependency management, and per-node failure collection.
//!
//! The public API is synchronous; POM prefetching for each BFS depth level
//! runs on an internal tokio runtime, bounded by a semaphore.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use javelin_core::dependency::{
    DepScope, Dependency, DependencyExclusion, DependencyId, TYPE_CHOOSE_BY_PACKAGING,
};
use javelin_core::repository::Repository;
use javelin_maven::artifact::ArtifactPath;
use javelin_maven::fetcher::Fetcher;
use javelin_maven::pom::{Pom, PomDependency};
use javelin_util::errors::JavelinError;

use crate::conflict::{ConflictReport, VersionConflict};
use crate::graph::{Resolution, ResolvedDependency};

const MAX_CONCURRENT_FETCHES: usize = 8;
const MAX_PARENT_DEPTH: usize = 16;

/// Rewrites every id before it is fetched, e.g. to append a `sources`
/// classifier to the whole graph.
pub type IdRewrite = dyn Fn(DependencyId) -> DependencyId + Send + Sync;

/// Resolve root dependencies against a repository chain.
pub fn resolve(
    roots: &[Dependency],
    repositories: &[Repository],
    fetcher: &Fetcher,
) -> miette::Result<Resolution> {
    resolve_with(roots, repositories, fetcher, None)
}

/// [`resolve`] with an optional id-rewriting function.
pub fn resolve_with(
    roots: &[Dependency],
    repositories: &[Repository],
    fetcher: &Fetcher,
    rewrite: Option<&IdRewrite>,
) -> miette::Result<Resolution> {
    let chain = build_chain(repositories);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| JavelinError::Generic {
            message: format!("Failed to start fetch runtime: {e}"),
        })?;
    runtime.block_on(resolve_async(roots, &chain, fetcher, rewrite))
}

/// Order repositories for resolution: local repositories first (they answer
/// from disk; each cached remote already consults its own cache before its
/// upstream), then remotes in declaration order. Duplicate URLs coalesce.
pub fn build_chain(repositories: &[Repository]) -> Vec<Repository> {
    let mut chain: Vec<Repository> = Vec::new();
    let mut push = |repo: &Repository, chain: &mut Vec<Repository>| {
        if !chain.iter().any(|r| r.url == repo.url) {
            chain.push(repo.clone());
        }
    };
    for repo in repositories.iter().filter(|r| r.is_local()) {
        push(repo, &mut chain);
    }
    for repo in repositories.iter().filter(|r| !r.is_local()) {
        push(repo, &mut chain);
    }
    chain
}

/// Entry in the BFS queue.
struct QueueEntry {
    dep: Dependency,
    depth: usize,
    /// Exclusions applying to this entry's children (ancestors' plus this
    /// dependency's own).
    exclusions: Vec<DependencyExclusion>,
    /// Inherited dependency management from the root declarations.
    mgmt: Vec<Dependency>,
}

struct PomOutcome {
    pom: Option<Pom>,
    attempts: Vec<String>,
}

async fn resolve_async(
    roots: &[Dependency],
    chain: &[Repository],
    fetcher: &Fetcher,
    rewrite: Option<&IdRewrite>,
) -> miette::Result<Resolution> {
    let mut nodes: BTreeMap<DependencyId, ResolvedDependency> = BTreeMap::new();
    let mut conflicts = ConflictReport::new();
    // Chosen `(version, depth)` per `group:name`, the mediation state.
    let mut mediated: HashMap<String, (String, usize)> = HashMap::new();
    let mut pom_memo: HashMap<String, Arc<PomOutcome>> = HashMap::new();
    let mut root_ids: Vec<DependencyId> = Vec::new();

    let mut queue: VecDeque<QueueEntry> = VecDeque::new();
    for root in roots {
        let mut dep = root.clone();
        if let Some(rewrite) = rewrite {
            dep.id = rewrite(dep.id);
        }
        queue.push_back(QueueEntry {
            exclusions: dep.exclusions.clone(),
            mgmt: dep.dependency_management.clone(),
            dep,
            depth: 1,
        });
    }

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));

    while !queue.is_empty() {
        let current_depth = queue.front().map(|e| e.depth).unwrap_or(0);
        let mut level: Vec<QueueEntry> = Vec::new();
        while queue.front().is_some_and(|e| e.depth == current_depth) {
            level.push(queue.pop_front().unwrap());
        }

        // Mediation: nearest wins, then first declared. BFS processes depth
        // levels in order, so an existing entry always beats a newcomer.
        let mut accepted: Vec<QueueEntry> = Vec::new();
        for entry in level {
            let key = entry.dep.id.conflict_key();
            match mediated.get(&key) {
                Some((version, existing_depth)) => {
                    if *version != entry.dep.id.version {
                        conflicts.add(VersionConflict {
                            requested: entry.dep.id.clone(),
                            resolved_version: version.clone(),
                            reason: if *existing_depth < entry.depth {
                                format!("nearest wins (depth {existing_depth} vs {})", entry.depth)
                            } else {
                                "first declared wins".to_string()
                            },
                        });
                    }
                }
                None => {
                    mediated.insert(key, (entry.dep.id.version.clone(), entry.depth));
                    if entry.depth == 1 {
                        root_ids.push(entry.dep.id.clone());
                    }
                    accepted.push(entry);
                }
            }
        }

        // Prefetch effective POMs for this level in parallel.
        let missing: Vec<DependencyId> = accepted
            .iter()
            .map(|e| e.dep.id.clone())
            .filter(|id| !pom_memo.contains_key(&memo_key(id)))
            .collect();
        if !missing.is_empty() {
            let mut join_set = JoinSet::new();
            for id in missing {
                let fetcher = fetcher.clone();
                let chain = chain.to_vec();
                let sem = semaphore.clone();
                join_set.spawn(async move {
                    let _permit = sem.acquire().await;
                    let outcome = load_effective_pom(&fetcher, &chain, &id).await;
                    (memo_key(&id), outcome)
                });
            }
            while let Some(result) = join_set.join_next().await {
                if let Ok((key, outcome)) = result {
                    pom_memo.insert(key, Arc::new(outcome));
                }
            }
        }

        for entry in accepted {
            let id = entry.dep.id.clone();
            let outcome = pom_memo
                .get(&memo_key(&id))
                .cloned()
                .unwrap_or_else(|| Arc::new(PomOutcome {
                    pom: None,
                    attempts: Vec::new(),
                }));

            let extension = artifact_extension(&id, outcome.pom.as_ref());
            let (artifact, artifact_attempts) = match extension {
                Some(ref ext) => fetch_artifact_chain(fetcher, chain, &id, ext).await,
                None => (None, Vec::new()),
            };

            let log = if extension.is_some() && artifact.is_none() {
                let mut lines = outcome.attempts.clone();
                lines.extend(artifact_attempts);
                Some(lines.join("\n"))
            } else {
                None
            };

            let transitive = match outcome.pom {
                Some(ref pom) => {
                    expand_children(pom, &entry, rewrite, &mut queue)
                }
                None => Vec::new(),
            };

            let resolved_from = artifact.as_ref().and_then(|a: &ArtifactPath| a.repository.clone());
            nodes.insert(
                id.clone(),
                ResolvedDependency {
                    id,
                    scope: entry.dep.scope,
                    transitive,
                    resolved_from,
                    artifact,
                    log,
                },
            );
        }
    }

    let complete = nodes.values().all(|n| !n.has_error());
    Ok(Resolution {
        nodes,
        roots: root_ids,
        complete,
        conflicts,
    })
}

/// Expand one resolved POM's dependencies into queue entries, applying
/// dependency management, optional pruning, scope propagation, and
/// exclusions. Returns the effective transitive list for the node.
fn expand_children(
    pom: &Pom,
    entry: &QueueEntry,
    rewrite: Option<&IdRewrite>,
    queue: &mut VecDeque<QueueEntry>,
) -> Vec<Dependency> {
    let mut transitive = Vec::new();

    for pdep in &pom.dependencies {
        if pdep.optional {
            continue;
        }

        let inherited = managed_by(&entry.mgmt, pdep);
        let mut dep = match pdep.to_dependency(pom.managed_entry(pdep)) {
            Some(dep) => dep,
            None => {
                // Versionless and unmanaged in the POM; the inherited
                // management may still supply the version.
                let Some(m) = inherited else { continue };
                let mut with_version = pdep.clone();
                with_version.version = Some(m.id.version.clone());
                match with_version.to_dependency(None) {
                    Some(dep) => dep,
                    None => continue,
                }
            }
        };

        if let Some(m) = inherited {
            dep.id.version = m.id.version.clone();
            if pdep.scope.is_none() {
                dep.scope = m.scope;
            }
            dep.exclusions.extend(m.exclusions.iter().cloned());
            dep.optional |= m.optional;
        }
        if dep.optional {
            continue;
        }

        let Some(effective_scope) = propagate_scope(entry.dep.scope, dep.scope) else {
            continue;
        };
        dep.scope = effective_scope;

        if entry.exclusions.iter().any(|e| e.matches(&dep.id)) {
            continue;
        }

        if let Some(rewrite) = rewrite {
            dep.id = rewrite(dep.id);
        }

        let mut child_exclusions = entry.exclusions.clone();
        child_exclusions.extend(dep.exclusions.iter().cloned());

        transitive.push(dep.clone());
        queue.push_back(QueueEntry {
            exclusions: child_exclusions,
            mgmt: entry.mgmt.clone(),
            depth: entry.depth + 1,
            dep,
        });
    }

    transitive
}

/// Inherited dependency-management lookup by `(group, name, classifier)`.
fn managed_by<'a>(mgmt: &'a [Dependency], pdep: &PomDependency) -> Option<&'a Dependency> {
    mgmt.iter().find(|m| {
        m.id.group == pdep.group_id
            && m.id.name == pdep.artifact_id
            && m.id.classifier == pdep.classifier.clone().unwrap_or_default()
    })
}

/// Maven scope propagation for a transitive edge: the parent's scope `P`
/// crossed with the child's declared scope `D`. Combinations outside the
/// table are pruned.
fn propagate_scope(parent: DepScope, child: DepScope) -> Option<DepScope> {
    use DepScope::*;
    match (parent, child) {
        (Compile | Aggregate, Compile) => Some(Compile),
        (Compile | Aggregate, Runtime) => Some(Runtime),
        (Runtime, Compile | Runtime) => Some(Runtime),
        (Test, Compile | Runtime) => Some(Test),
        (Provided, Compile | Runtime) => Some(Provided),
        _ => None,
    }
}

/// Concrete file extension for a node, or `None` for type-less nodes.
fn artifact_extension(id: &DependencyId, pom: Option<&Pom>) -> Option<String> {
    if id.type_ != TYPE_CHOOSE_BY_PACKAGING {
        return Some(id.type_.clone());
    }
    let packaging = pom.map(|p| p.effective_packaging()).unwrap_or("jar");
    match packaging {
        "pom" => None,
        "bundle" | "maven-plugin" => Some("jar".to_string()),
        other => Some(other.to_string()),
    }
}

fn memo_key(id: &DependencyId) -> String {
    format!("{}:{}:{}", id.group, id.name, id.version)
}

/// Fetch a POM through the chain, merging parent POMs and BOM imports and
/// interpolating properties after inheritance.
async fn load_effective_pom(
    fetcher: &Fetcher,
    chain: &[Repository],
    id: &DependencyId,
) -> PomOutcome {
    let mut outcome = fetch_pom_chain(fetcher, chain, id).await;
    let Some(mut pom) = outcome.pom.take() else {
        return outcome;
    };
    let mut attempts = outcome.attempts;

    let mut cursor = pom.parent.clone();
    let mut depth = 0;
    while let Some(parent_ref) = cursor {
        depth += 1;
        if depth > MAX_PARENT_DEPTH {
            attempts.push("parent chain too deep; stopping inheritance".to_string());
            break;
        }
        let parent_id = DependencyId::new(
            &parent_ref.group_id,
            &parent_ref.artifact_id,
            &parent_ref.version,
        );
        let parent_outcome = fetch_pom_chain(fetcher, chain, &parent_id).await;
        match parent_outcome.pom {
            Some(parent_pom) => {
                pom.apply_parent(&parent_pom);
                cursor = parent_pom.parent.clone();
            }
            None => {
                attempts.push(format!("parent POM {parent_id} not found"));
                break;
            }
        }
    }

    // BOM imports contribute their dependency management.
    let imports: Vec<DependencyId> = pom.bom_imports().iter().filter_map(|d| d.to_id()).collect();
    for import_id in imports {
        let bom_outcome = fetch_pom_chain(fetcher, chain, &import_id).await;
        match bom_outcome.pom {
            Some(mut bom) => {
                bom.resolve_properties();
                for dm in bom.dependency_management {
                    if dm.scope.as_deref() != Some("import") {
                        pom.dependency_management.push(dm);
                    }
                }
            }
            None => attempts.push(format!("imported BOM {import_id} not found")),
        }
    }

    pom.resolve_properties();
    PomOutcome {
        pom: Some(pom),
        attempts,
    }
}

async fn fetch_pom_chain(
    fetcher: &Fetcher,
    chain: &[Repository],
    id: &DependencyId,
) -> PomOutcome {
    let mut attempts = Vec::new();
    for repo in chain {
        match fetcher.fetch_pom(repo, id).await {
            Ok(Some((pom, _path))) => {
                return PomOutcome {
                    pom: Some(pom),
                    attempts,
                };
            }
            Ok(None) => {
                attempts.push(format!("{}: POM not found", repo.name));
                if repo.authoritative {
                    attempts.push(format!(
                        "{}: authoritative; later repositories not consulted",
                        repo.name
                    ));
                    break;
                }
            }
            Err(e) => attempts.push(format!("{}: {e}", repo.name)),
        }
    }
    PomOutcome {
        pom: None,
        attempts,
    }
}

async fn fetch_artifact_chain(
    fetcher: &Fetcher,
    chain: &[Repository],
    id: &DependencyId,
    extension: &str,
) -> (Option<ArtifactPath>, Vec<String>) {
    let mut attempts = Vec::new();
    for repo in chain {
        match fetcher.fetch_artifact(repo, id, extension).await {
            Ok(Some(artifact)) => return (Some(artifact), attempts),
            Ok(None) => {
                attempts.push(format!("{}: artifact not found", repo.name));
                if repo.authoritative {
                    attempts.push(format!(
                        "{}: authoritative; later repositories not consulted",
                        repo.name
                    ));
                    break;
                }
            }
            Err(e) => attempts.push(format!("{}: {e}", repo.name)),
        }
    }
    (None, attempts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_propagation_table() {
        use DepScope::*;
        assert_eq!(propagate_scope(Compile, Compile), Some(Compile));
        assert_eq!(propagate_scope(Compile, Runtime), Some(Runtime));
        assert_eq!(propagate_scope(Runtime, Compile), Some(Runtime));
        assert_eq!(propagate_scope(Runtime, Runtime), Some(Runtime));
        assert_eq!(propagate_scope(Test, Compile), Some(Test));
        assert_eq!(propagate_scope(Test, Runtime), Some(Test));
        assert_eq!(propagate_scope(Provided, Compile), Some(Provided));
        assert_eq!(propagate_scope(Provided, Runtime), Some(Provided));
        // Pruned combinations
        assert_eq!(propagate_scope(Compile, Test), None);
        assert_eq!(propagate_scope(Compile, Provided), None);
        assert_eq!(propagate_scope(Test, Test), None);
        // Aggregates behave like compile edges
        assert_eq!(propagate_scope(Aggregate, Compile), Some(Compile));
    }

    #[test]
    fn chain_puts_local_repositories_first() {
        let remote = Repository::remote("central", "https://repo.example.com");
        let local = Repository::local("fixtures", "/tmp/repo");
        let chain = build_chain(&[remote.clone(), local.clone()]);
        assert_eq!(chain[0].name, "fixtures");
        assert_eq!(chain[1].name, "central");
    }

    #[test]
    fn chain_coalesces_duplicate_urls() {
        let a = Repository::remote("a", "https://repo.example.com");
        let b = Repository::remote("b", "https://repo.example.com/");
        let chain = build_chain(&[a, b]);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn extension_from_explicit_type() {
        let id = DependencyId::new("g", "n", "1.0").with_type("zip");
        assert_eq!(artifact_extension(&id, None), Some("zip".to_string()));
    }

    #[test]
    fn extension_chosen_by_packaging() {
        let id = DependencyId::new("g", "n", "1.0");
        assert_eq!(artifact_extension(&id, None), Some("jar".to_string()));

        let mut pom = Pom::default();
        pom.packaging = Some("pom".to_string());
        assert_eq!(artifact_extension(&id, Some(&pom)), None);

        pom.packaging = Some("bundle".to_string());
        assert_eq!(artifact_extension(&id, Some(&pom)), Some("jar".to_string()));
    }
}

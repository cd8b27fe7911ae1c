//! Building the key-graph universe from a `Javelin.toml` manifest.

use std::collections::BTreeMap;
use std::path::Path;

use javelin_core::dependency::{DepScope, Dependency};
use javelin_core::manifest::{ConfigurationEntry, Manifest, ProjectEntry};
use javelin_eval::{Configuration, ConfigurationBuilder, Evaluator, Project, ProjectBuilder};
use javelin_resolver::aggregate;
use javelin_util::errors::JavelinError;

use crate::keys::{jvm_archetype, standard_keys, StandardKeys};

/// Everything a session needs: the evaluator plus named projects and their
/// configurations.
#[derive(Debug)]
pub struct Universe {
    pub evaluator: Evaluator,
    pub keys: StandardKeys,
    pub projects: BTreeMap<String, Project>,
    pub configurations: BTreeMap<String, BTreeMap<String, Configuration>>,
}

impl Universe {
    /// The project a query addresses: the named one, or the sole project
    /// when the query has no `project/` prefix.
    pub fn select_project(&self, name: Option<&str>) -> miette::Result<&Project> {
        match name {
            Some(name) => self.projects.get(name).ok_or_else(|| {
                JavelinError::Query {
                    message: format!(
                        "unknown project '{name}' (have: {})",
                        self.projects.keys().cloned().collect::<Vec<_>>().join(", ")
                    ),
                }
                .into()
            }),
            None if self.projects.len() == 1 => {
                Ok(self.projects.values().next().ok_or_else(|| JavelinError::Generic {
                    message: "no projects defined".to_string(),
                })?)
            }
            None => Err(JavelinError::Query {
                message: format!(
                    "multiple projects defined, prefix the key with one of: {}",
                    self.projects.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            }
            .into()),
        }
    }

    pub fn configuration(&self, project: &str, name: &str) -> miette::Result<&Configuration> {
        self.configurations
            .get(project)
            .and_then(|configs| configs.get(name))
            .ok_or_else(|| {
                JavelinError::Query {
                    message: format!("unknown configuration '{name}' in project '{project}'"),
                }
                .into()
            })
    }
}

/// Build the universe: cycle-check aggregates, construct the JVM archetype,
/// then one project holder per manifest entry with its configurations.
pub fn build_universe(
    manifest: &Manifest,
    manifest_dir: &Path,
    offline: bool,
) -> miette::Result<Universe> {
    let edges: BTreeMap<String, Vec<String>> = manifest
        .project
        .iter()
        .map(|(name, entry)| (name.clone(), entry.aggregates.clone()))
        .collect();
    aggregate::check_cycles(&edges)?;
    for (name, entry) in &manifest.project {
        for aggregated in &entry.aggregates {
            if !manifest.project.contains_key(aggregated) {
                return Err(JavelinError::Manifest {
                    message: format!("project '{name}' aggregates unknown project '{aggregated}'"),
                }
                .into());
            }
        }
    }

    let keys = standard_keys();
    let archetype = jvm_archetype(&keys, manifest.repositories(), offline);

    let mut projects = BTreeMap::new();
    let mut configurations = BTreeMap::new();
    for (name, entry) in &manifest.project {
        let project = build_project(&keys, &archetype, manifest, manifest_dir, name, entry)?;
        projects.insert(name.clone(), project);
        configurations.insert(name.clone(), build_configurations(&keys, name, entry)?);
    }

    Ok(Universe {
        evaluator: Evaluator::new(),
        keys,
        projects,
        configurations,
    })
}

fn build_project(
    keys: &StandardKeys,
    archetype: &javelin_eval::Archetype,
    manifest: &Manifest,
    manifest_dir: &Path,
    name: &str,
    entry: &ProjectEntry,
) -> miette::Result<Project> {
    let root = match entry.root {
        Some(ref rel) => manifest_dir.join(rel),
        None => manifest_dir.to_path_buf(),
    };

    let dependencies: Vec<Dependency> = entry
        .dependencies
        .iter()
        .map(|d| d.to_dependency())
        .collect::<miette::Result<_>>()?;

    // The project's own outputs plus those of aggregated projects; only
    // directories that exist end up on the classpath.
    let mut own_outputs = vec![root.join("build").join("classes")];
    for aggregated in &entry.aggregates {
        if let Some(agg_entry) = manifest.project.get(aggregated) {
            let agg_root = match agg_entry.root {
                Some(ref rel) => manifest_dir.join(rel),
                None => manifest_dir.to_path_buf(),
            };
            own_outputs.push(agg_root.join("build").join("classes"));
        }
    }

    let mut builder = ProjectBuilder::new(name)
        .root(root.clone())
        .archetype(archetype)
        .bind_value(&keys.project_name, name.to_string())
        .bind_value(&keys.build_dir, root.join("build"))
        .bind_value(&keys.library_dependencies, dependencies)
        .bind(&keys.internal_classpath, move |_| {
            Ok(own_outputs.iter().filter(|p| p.is_dir()).cloned().collect())
        });

    if let Some(ref group) = entry.group {
        builder = builder.bind_value(&keys.project_group, group.clone());
    }
    if let Some(ref version) = entry.version {
        builder = builder.bind_value(&keys.project_version, version.clone());
    }

    Ok(builder.build())
}

/// Build a project's configurations, resolving `extends` references among
/// them. Each configuration appends its dependencies to
/// `libraryDependencies`; dev-style configurations get `test` scope via the
/// manifest's dependency scopes.
fn build_configurations(
    keys: &StandardKeys,
    project: &str,
    entry: &ProjectEntry,
) -> miette::Result<BTreeMap<String, Configuration>> {
    let mut built: BTreeMap<String, Configuration> = BTreeMap::new();
    let mut pending: Vec<(&String, &ConfigurationEntry)> = entry.configurations.iter().collect();

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|(name, config)| {
            let parent = match config.extends {
                Some(ref parent_name) => match built.get(parent_name) {
                    Some(parent) => Some(parent.clone()),
                    None if entry.configurations.contains_key(parent_name) => return true,
                    None => None, // reported below as unknown
                },
                None => None,
            };
            let configuration = build_configuration(keys, name, config, parent);
            built.insert((*name).clone(), configuration);
            false
        });
        if pending.len() == before {
            let names: Vec<String> = pending.iter().map(|(n, _)| (*n).clone()).collect();
            return Err(JavelinError::Manifest {
                message: format!(
                    "circular `extends` among configurations of project '{project}': {}",
                    names.join(", ")
                ),
            }
            .into());
        }
    }

    // Unknown parents: extends pointing outside the project's configurations.
    for (name, config) in &entry.configurations {
        if let Some(ref parent) = config.extends {
            if !entry.configurations.contains_key(parent) {
                return Err(JavelinError::Manifest {
                    message: format!(
                        "configuration '{name}' of project '{project}' extends unknown '{parent}'"
                    ),
                }
                .into());
            }
        }
    }

    Ok(built)
}

fn build_configuration(
    keys: &StandardKeys,
    name: &str,
    entry: &ConfigurationEntry,
    parent: Option<Configuration>,
) -> Configuration {
    let mut builder = ConfigurationBuilder::new(name);
    if let Some(ref parent) = parent {
        builder = builder.parent(parent);
    }

    let extra: Vec<Dependency> = entry
        .dependencies
        .iter()
        .filter_map(|d| match d.to_dependency() {
            Ok(dep) => Some(dep),
            Err(e) => {
                tracing::warn!("skipping invalid dependency in configuration '{name}': {e}");
                None
            }
        })
        .collect();

    if !extra.is_empty() {
        let testing = name == "testing";
        builder = builder.modify(&keys.library_dependencies, move |_, mut deps| {
            for dep in &extra {
                let mut dep = dep.clone();
                if testing && dep.scope == DepScope::Compile {
                    dep.scope = DepScope::Test;
                }
                deps.push(dep);
            }
            Ok(deps)
        });
    }

    builder.build()
}

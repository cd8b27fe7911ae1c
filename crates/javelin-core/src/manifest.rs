//! `Javelin.toml` parsing: the declarative input shape the engine consumes.
//!
//! The manifest declares projects (with dependencies, aggregates, and
//! configurations) and repositories. The CLI turns these declarations into
//! binding holders; nothing in here knows about keys or scopes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use javelin_util::errors::JavelinError;

use crate::dependency::{DepScope, Dependency, DependencyExclusion, DependencyId};
use crate::repository::{ChecksumPolicy, Repository};

/// The parsed representation of a `Javelin.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub project: BTreeMap<String, ProjectEntry>,

    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

/// A project declaration from `[project.<name>]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Project root, relative to the manifest's directory. Defaults to it.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default, rename = "main-class")]
    pub main_class: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
    /// Names of other projects whose outputs are folded into this one.
    #[serde(default)]
    pub aggregates: Vec<String>,
    #[serde(default)]
    pub configurations: BTreeMap<String, ConfigurationEntry>,
}

/// A configuration declaration from `[project.<name>.configurations.<cfg>]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    /// Parent configuration searched when this one lacks a binding.
    #[serde(default)]
    pub extends: Option<String>,
    /// Dependencies appended to `libraryDependencies` inside this
    /// configuration.
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

/// A dependency specification, shorthand or detailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyEntry {
    Short(String),
    Detailed(DetailedDependencyEntry),
}

/// A dependency with explicit coordinates and resolution directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedDependencyEntry {
    pub group: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub scope: Option<DepScope>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub exclusions: Vec<DependencyExclusion>,
    #[serde(default, rename = "snapshot-version")]
    pub snapshot_version: Option<String>,
}

/// A repository, either a bare URL or a detailed table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepositoryEntry {
    Url(String),
    Detailed {
        url: String,
        #[serde(default)]
        authoritative: bool,
        #[serde(default, rename = "checksum-policy")]
        checksum_policy: Option<ChecksumPolicy>,
        #[serde(default, rename = "snapshot-recheck")]
        snapshot_recheck: Option<u64>,
        /// Directory of a local mirror written through on fetch.
        #[serde(default)]
        cache: Option<String>,
    },
}

impl Manifest {
    /// Parse manifest content from a TOML string.
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        let manifest: Manifest = toml::from_str(content).map_err(|e| JavelinError::Manifest {
            message: e.to_string(),
        })?;
        if manifest.project.is_empty() {
            return Err(JavelinError::Manifest {
                message: "no [project.<name>] section".to_string(),
            }
            .into());
        }
        Ok(manifest)
    }

    /// Load and parse a manifest file.
    pub fn load(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(JavelinError::Io)?;
        Self::parse_toml(&content)
    }

    /// Build the repository list, always including Maven Central.
    pub fn repositories(&self) -> Vec<Repository> {
        let mut repos: Vec<Repository> = self
            .repositories
            .iter()
            .map(|(name, entry)| entry.to_repository(name))
            .collect();
        if !repos.iter().any(|r| r.url.contains("repo.maven.apache.org")) {
            repos.push(Repository::maven_central());
        }
        repos
    }
}

impl DependencyEntry {
    /// Resolve this entry to a full [`Dependency`].
    pub fn to_dependency(&self) -> miette::Result<Dependency> {
        match self {
            Self::Short(s) => {
                let id = DependencyId::parse(s).ok_or_else(|| JavelinError::Manifest {
                    message: format!(
                        "invalid dependency '{s}' (expected group:name:version[:classifier][@type])"
                    ),
                })?;
                Ok(Dependency::new(id))
            }
            Self::Detailed(d) => {
                let mut id = DependencyId::new(&d.group, &d.name, &d.version);
                if let Some(ref classifier) = d.classifier {
                    id = id.with_classifier(classifier);
                }
                if let Some(ref type_) = d.type_ {
                    id = id.with_type(type_);
                }
                if let Some(ref snapshot) = d.snapshot_version {
                    id = id.with_snapshot_version(snapshot);
                }
                Ok(Dependency {
                    id,
                    scope: d.scope.unwrap_or_default(),
                    optional: d.optional,
                    exclusions: d.exclusions.clone(),
                    dependency_management: Vec::new(),
                })
            }
        }
    }
}

impl RepositoryEntry {
    /// Build a [`Repository`] from a manifest entry.
    pub fn to_repository(&self, name: &str) -> Repository {
        match self {
            Self::Url(url) => {
                if url.starts_with("file:") {
                    let mut repo = Repository::remote(name, url.clone());
                    repo.checksum_policy = ChecksumPolicy::Ignore;
                    repo
                } else {
                    Repository::remote(name, url.clone())
                }
            }
            Self::Detailed {
                url,
                authoritative,
                checksum_policy,
                snapshot_recheck,
                cache,
            } => {
                let mut repo = Repository::remote(name, url.clone());
                repo.authoritative = *authoritative;
                if let Some(policy) = checksum_policy {
                    repo.checksum_policy = *policy;
                } else if url.starts_with("file:") {
                    repo.checksum_policy = ChecksumPolicy::Ignore;
                }
                if let Some(secs) = snapshot_recheck {
                    repo.snapshot_recheck_secs = Some(*secs);
                }
                if let Some(dir) = cache {
                    repo.cache = Some(Box::new(Repository::local(
                        format!("{name}-cache"),
                        dir.clone(),
                    )));
                }
                repo
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
[project.app]
group = "com.example"
version = "1.0.0"
main-class = "com.example.MainKt"
dependencies = [
    "org.jetbrains.kotlin:kotlin-stdlib:2.0.0",
    { group = "org.jline", name = "jline-terminal", version = "3.3.0", scope = "runtime" },
]

[project.app.configurations.testing]
dependencies = ["junit:junit:4.13.2"]

[repositories]
central = "https://repo.maven.apache.org/maven2"

[repositories.nexus]
url = "https://nexus.example.com/maven"
authoritative = true
checksum-policy = "warn"
snapshot-recheck = 0
"#;

    #[test]
    fn parse_projects_and_dependencies() {
        let manifest = Manifest::parse_toml(BASIC).unwrap();
        let app = manifest.project.get("app").unwrap();
        assert_eq!(app.group.as_deref(), Some("com.example"));
        assert_eq!(app.dependencies.len(), 2);

        let first = app.dependencies[0].to_dependency().unwrap();
        assert_eq!(first.id.group, "org.jetbrains.kotlin");
        assert_eq!(first.scope, DepScope::Compile);

        let second = app.dependencies[1].to_dependency().unwrap();
        assert_eq!(second.id.name, "jline-terminal");
        assert_eq!(second.scope, DepScope::Runtime);
    }

    #[test]
    fn parse_configurations() {
        let manifest = Manifest::parse_toml(BASIC).unwrap();
        let app = manifest.project.get("app").unwrap();
        let testing = app.configurations.get("testing").unwrap();
        assert_eq!(testing.dependencies.len(), 1);
        assert!(testing.extends.is_none());
    }

    #[test]
    fn repositories_with_flags() {
        let manifest = Manifest::parse_toml(BASIC).unwrap();
        let repos = manifest.repositories();
        let nexus = repos.iter().find(|r| r.name == "nexus").unwrap();
        assert!(nexus.authoritative);
        assert_eq!(nexus.checksum_policy, ChecksumPolicy::Warn);
        assert_eq!(nexus.snapshot_recheck_secs, Some(0));
    }

    #[test]
    fn central_added_when_missing() {
        let manifest = Manifest::parse_toml("[project.app]\n").unwrap();
        let repos = manifest.repositories();
        assert!(repos.iter().any(|r| r.url.contains("repo.maven.apache.org")));
    }

    #[test]
    fn missing_project_section_fails() {
        assert!(Manifest::parse_toml("[repositories]\n").is_err());
    }

    #[test]
    fn invalid_short_dependency_fails() {
        let entry = DependencyEntry::Short("not-a-coordinate".to_string());
        assert!(entry.to_dependency().is_err());
    }
}

//! Maven repository descriptions: URL layout, cache chaining, checksum
//! policy, snapshot freshness.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dependency::DependencyId;

/// Maven Central base URL.
pub const MAVEN_CENTRAL_URL: &str = "https://repo.maven.apache.org/maven2";

/// What to do when a downloaded file disagrees with its checksum sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    /// Reject the file and record an error on the node.
    Fail,
    /// Accept the file but log a warning.
    Warn,
    /// Skip verification entirely.
    Ignore,
}

impl Default for ChecksumPolicy {
    fn default() -> Self {
        Self::Fail
    }
}

/// A repository artifacts can be resolved from.
///
/// A repository with a `cache` acts through it: artifacts fetched from this
/// repository are written into the cache (a local mirror in the same Maven
/// layout) and later reads are served from there, subject to
/// `snapshot_recheck_secs` for snapshot metadata. A *local* repository is
/// one with a `file:` URL and no cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    /// Base URL without trailing slash; `file:` scheme for local ones.
    pub url: String,
    #[serde(default)]
    pub cache: Option<Box<Repository>>,
    #[serde(default, rename = "checksum-policy")]
    pub checksum_policy: ChecksumPolicy,
    /// Seconds before cached snapshot metadata goes stale. `Some(0)` always
    /// refetches; `None` never rechecks after the first success.
    #[serde(default, rename = "snapshot-recheck")]
    pub snapshot_recheck_secs: Option<u64>,
    /// When set, a definitive "not found" from this repository stops the
    /// chain; later repositories are not consulted for that coordinate.
    #[serde(default)]
    pub authoritative: bool,
}

impl Repository {
    /// A remote repository with no cache attached.
    pub fn remote(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into().trim_end_matches('/').to_string(),
            cache: None,
            checksum_policy: ChecksumPolicy::default(),
            snapshot_recheck_secs: Some(24 * 60 * 60),
            authoritative: false,
        }
    }

    /// A local repository rooted at `path` (`file:` scheme, no cache).
    pub fn local(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        Self {
            name: name.into(),
            url: format!("file://{}", path.display()),
            cache: None,
            checksum_policy: ChecksumPolicy::Ignore,
            snapshot_recheck_secs: Some(0),
            authoritative: false,
        }
    }

    /// Maven Central, cached through the user-level `~/.m2/repository`.
    pub fn maven_central() -> Self {
        let mut repo = Self::remote("central", MAVEN_CENTRAL_URL);
        if let Some(home) = std::env::var_os("HOME") {
            let m2 = PathBuf::from(home).join(".m2").join("repository");
            repo.cache = Some(Box::new(Self::local("m2-cache", m2)));
        }
        repo
    }

    pub fn with_cache(mut self, cache: Repository) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum_policy = policy;
        self
    }

    pub fn with_snapshot_recheck(mut self, secs: Option<u64>) -> Self {
        self.snapshot_recheck_secs = secs;
        self
    }

    pub fn authoritative(mut self) -> Self {
        self.authoritative = true;
        self
    }

    /// Whether this is a local repository (`file:` scheme, no cache).
    pub fn is_local(&self) -> bool {
        self.url.starts_with("file:") && self.cache.is_none()
    }

    /// Filesystem root for `file:` URLs.
    pub fn file_root(&self) -> Option<PathBuf> {
        let rest = self.url.strip_prefix("file://").or_else(|| self.url.strip_prefix("file:"))?;
        Some(PathBuf::from(rest))
    }

    /// Standard Maven layout path for a given coordinate.
    ///
    /// `org.jetbrains.kotlinx:kotlinx-coroutines-core:1.8.0` becomes
    /// `org/jetbrains/kotlinx/kotlinx-coroutines-core/1.8.0`
    pub fn coordinate_path(group: &str, name: &str, version: &str) -> String {
        format!("{}/{}/{}", group.replace('.', "/"), name, version)
    }

    /// Full URL to a specific file within the artifact's version directory.
    pub fn file_url(&self, id: &DependencyId, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            self.url,
            Self::coordinate_path(&id.group, &id.name, &id.version),
            filename
        )
    }

    /// URL to the POM file for a given coordinate.
    pub fn pom_url(&self, id: &DependencyId) -> String {
        self.file_url(id, &format!("{}-{}.pom", id.name, id.version))
    }

    /// URL to the version-level `maven-metadata.xml` (snapshot resolution).
    pub fn snapshot_metadata_url(&self, id: &DependencyId) -> String {
        self.file_url(id, "maven-metadata.xml")
    }

    /// Artifact filename for a concrete version string and extension.
    ///
    /// The `version` here may be a timestamped snapshot version that differs
    /// from the directory-level version in the coordinate path.
    pub fn artifact_filename(id: &DependencyId, version: &str, extension: &str) -> String {
        if id.classifier.is_empty() {
            format!("{}-{}.{}", id.name, version, extension)
        } else {
            format!("{}-{}-{}.{}", id.name, version, id.classifier, extension)
        }
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

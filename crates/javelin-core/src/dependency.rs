//! Dependency coordinates, scopes, and exclusions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Artifact type placeholder meaning "inspect the POM's packaging".
///
/// A dependency with this type resolves its concrete file extension from the
/// `<packaging>` element of its POM; `pom` packaging yields no artifact file.
pub const TYPE_CHOOSE_BY_PACKAGING: &str = "choose-by-packaging";

/// The plain jar artifact type.
pub const TYPE_JAR: &str = "jar";

/// Version suffix marking an in-development, mutable artifact.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// A Maven coordinate with classifier and type.
///
/// Identity covers every field, so `lib:1.0` and `lib:1.0:sources` are
/// distinct ids. The canonical text form is
/// `group:name:version[:classifier][@type]`, where the type is omitted when
/// it is the default ([`TYPE_CHOOSE_BY_PACKAGING`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyId {
    pub group: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub classifier: String,
    #[serde(default = "default_type", rename = "type")]
    pub type_: String,
    /// Verbatim timestamped version (`20190101.123456-1`) pinning a unique
    /// snapshot; empty when the repository metadata decides.
    #[serde(default, rename = "snapshot-version")]
    pub snapshot_version_override: String,
}

fn default_type() -> String {
    TYPE_CHOOSE_BY_PACKAGING.to_string()
}

impl DependencyId {
    /// Create an id with default classifier and type.
    ///
    /// The version goes through [`reduce_version_range`], so a
    /// single-endpoint range like `[1.2.3]` collapses to `1.2.3`.
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: reduce_version_range(&version.into()),
            classifier: String::new(),
            type_: default_type(),
            snapshot_version_override: String::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = classifier.into();
        self
    }

    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = type_.into();
        self
    }

    pub fn with_snapshot_version(mut self, version: impl Into<String>) -> Self {
        self.snapshot_version_override = version.into();
        self
    }

    /// Whether the version string marks this id as a snapshot.
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with(SNAPSHOT_SUFFIX)
    }

    /// `group:name` identifier, the unit of version conflict mediation.
    pub fn conflict_key(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    /// Parse the canonical `group:name:version[:classifier][@type]` form.
    pub fn parse(s: &str) -> Option<Self> {
        let (coords, type_) = match s.split_once('@') {
            Some((c, t)) if !t.is_empty() => (c, t.to_string()),
            Some(_) => return None,
            None => (s, default_type()),
        };
        let parts: Vec<&str> = coords.split(':').collect();
        let (group, name, version, classifier) = match parts.as_slice() {
            [g, n, v] => (g, n, v, ""),
            [g, n, v, c] => (g, n, v, *c),
            _ => return None,
        };
        if group.is_empty() || name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self {
            group: group.to_string(),
            name: name.to_string(),
            version: reduce_version_range(version),
            classifier: classifier.to_string(),
            type_,
            snapshot_version_override: String::new(),
        })
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if !self.classifier.is_empty() {
            write!(f, ":{}", self.classifier)?;
        }
        if self.type_ != TYPE_CHOOSE_BY_PACKAGING {
            write!(f, "@{}", self.type_)?;
        }
        Ok(())
    }
}

/// Collapse a version range with a single enumerated endpoint to that
/// endpoint: `[1.2.3]` and `[1.2.3,1.2.3]` become `1.2.3`. Anything else
/// (open ranges, multi-endpoint intersections) is kept verbatim; full range
/// arithmetic is not implemented.
pub fn reduce_version_range(version: &str) -> String {
    let trimmed = version.trim();
    let starts = trimmed.starts_with('[') || trimmed.starts_with('(');
    let ends = trimmed.ends_with(']') || trimmed.ends_with(')');
    if !(starts && ends && trimmed.len() >= 3) {
        return trimmed.to_string();
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    let endpoints: Vec<&str> = inner
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect();
    match endpoints.as_slice() {
        [single] => single.to_string(),
        [a, b] if a == b => a.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Maven-compatible dependency scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepScope {
    Compile,
    Provided,
    Runtime,
    Test,
    /// Project aggregation: the target's classes are folded into this
    /// project's own outputs (and its archives count as `own` during
    /// assembly).
    Aggregate,
}

impl Default for DepScope {
    fn default() -> Self {
        Self::Compile
    }
}

impl DepScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Provided => "provided",
            Self::Runtime => "runtime",
            Self::Test => "test",
            Self::Aggregate => "aggregate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "compile" => Some(Self::Compile),
            "provided" => Some(Self::Provided),
            "runtime" => Some(Self::Runtime),
            "test" => Some(Self::Test),
            "aggregate" => Some(Self::Aggregate),
            _ => None,
        }
    }
}

impl fmt::Display for DepScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pattern excluding transitive dependencies.
///
/// `None` fields are wildcards; a [`DependencyId`] matches when every
/// present field is equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyExclusion {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
}

impl DependencyExclusion {
    pub fn of(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, id: &DependencyId) -> bool {
        fn field(pattern: &Option<String>, value: &str) -> bool {
            pattern.as_deref().map(|p| p == value).unwrap_or(true)
        }
        field(&self.group, &id.group)
            && field(&self.name, &id.name)
            && field(&self.version, &id.version)
            && field(&self.classifier, &id.classifier)
            && field(&self.type_, &id.type_)
    }
}

/// A dependency declaration: an id plus resolution directives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    #[serde(default)]
    pub scope: DepScope,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub exclusions: Vec<DependencyExclusion>,
    /// Locally declared dependency management: entries here override the
    /// versions, scopes, and exclusions of matching transitive dependencies
    /// anywhere below this declaration.
    #[serde(default, rename = "dependency-management")]
    pub dependency_management: Vec<Dependency>,
}

impl Dependency {
    pub fn new(id: DependencyId) -> Self {
        Self {
            id,
            scope: DepScope::Compile,
            optional: false,
            exclusions: Vec::new(),
            dependency_management: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: DepScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_exclusions(mut self, exclusions: Vec<DependencyExclusion>) -> Self {
        self.exclusions = exclusions;
        self
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if self.scope != DepScope::Compile {
            write!(f, " ({})", self.scope)?;
        }
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

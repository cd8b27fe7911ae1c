//! POM file parsing: dependency declarations, parent inheritance, property
//! interpolation, dependency management, BOM imports.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use javelin_core::dependency::{
    DepScope, Dependency, DependencyExclusion, DependencyId, TYPE_CHOOSE_BY_PACKAGING,
};
use javelin_util::errors::JavelinError;

/// A parsed POM (Project Object Model) file.
#[derive(Debug, Clone, Default)]
pub struct Pom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,

    pub parent: Option<ParentRef>,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
}

/// Reference to a parent POM.
#[derive(Debug, Clone)]
pub struct ParentRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

/// A dependency declared in a POM file.
#[derive(Debug, Clone, Default)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
    pub classifier: Option<String>,
    pub type_: Option<String>,
    pub exclusions: Vec<PomExclusion>,
}

/// An exclusion within a dependency declaration.
#[derive(Debug, Clone)]
pub struct PomExclusion {
    pub group_id: String,
    pub artifact_id: Option<String>,
}

impl Pom {
    /// Effective group ID (falls back to parent).
    pub fn effective_group_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or(self.parent.as_ref().map(|p| p.group_id.as_str()))
    }

    /// Effective version (falls back to parent).
    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or(self.parent.as_ref().map(|p| p.version.as_str()))
    }

    /// The effective packaging; `jar` when unspecified.
    pub fn effective_packaging(&self) -> &str {
        self.packaging.as_deref().unwrap_or("jar")
    }

    /// Resolve `${property}` references in a string using POM properties
    /// and built-in project variables.
    pub fn interpolate(&self, input: &str) -> String {
        let mut result = input.to_string();
        let mut iterations = 0;
        while result.contains("${") && iterations < 20 {
            iterations += 1;
            let mut new = result.clone();
            while let Some(start) = new.find("${") {
                let Some(end) = new[start..].find('}') else {
                    break;
                };
                let key = &new[start + 2..start + end];
                let value = self.resolve_property(key);
                if let Some(val) = value {
                    new = format!("{}{}{}", &new[..start], val, &new[start + end + 1..]);
                } else {
                    break;
                }
            }
            if new == result {
                break;
            }
            result = new;
        }
        result
    }

    fn resolve_property(&self, key: &str) -> Option<String> {
        match key {
            "project.groupId" | "pom.groupId" => self.effective_group_id().map(|s| s.to_string()),
            "project.artifactId" | "pom.artifactId" => self.artifact_id.clone(),
            "project.version" | "pom.version" => self.effective_version().map(|s| s.to_string()),
            "project.packaging" | "pom.packaging" => self.packaging.clone(),
            "project.parent.groupId" => self.parent.as_ref().map(|p| p.group_id.clone()),
            "project.parent.version" => self.parent.as_ref().map(|p| p.version.clone()),
            _ => self.properties.get(key).cloned(),
        }
    }

    /// Interpolate all property references in dependencies and dependency
    /// management. Must run after parent inheritance so inherited properties
    /// participate.
    pub fn resolve_properties(&mut self) {
        let snapshot = self.clone();
        for dep in self
            .dependencies
            .iter_mut()
            .chain(self.dependency_management.iter_mut())
        {
            dep.group_id = snapshot.interpolate(&dep.group_id);
            dep.artifact_id = snapshot.interpolate(&dep.artifact_id);
            if let Some(ref v) = dep.version {
                dep.version = Some(snapshot.interpolate(v));
            }
        }
    }

    /// Merge a parent POM's properties and dependency management downward.
    pub fn apply_parent(&mut self, parent: &Pom) {
        for (k, v) in &parent.properties {
            self.properties
                .entry(k.clone())
                .or_insert_with(|| v.clone());
        }
        if self.group_id.is_none() {
            self.group_id = parent.effective_group_id().map(|s| s.to_string());
        }
        if self.version.is_none() {
            self.version = parent.effective_version().map(|s| s.to_string());
        }
        for dm in &parent.dependency_management {
            let dominated = self.dependency_management.iter().any(|d| {
                d.group_id == dm.group_id
                    && d.artifact_id == dm.artifact_id
                    && d.classifier == dm.classifier
                    && d.type_ == dm.type_
            });
            if !dominated {
                self.dependency_management.push(dm.clone());
            }
        }
    }

    /// Look up the dependency-management entry matching a declaration by
    /// `(group, name, classifier, type)`.
    pub fn managed_entry(&self, dep: &PomDependency) -> Option<&PomDependency> {
        self.dependency_management.iter().find(|d| {
            d.group_id == dep.group_id
                && d.artifact_id == dep.artifact_id
                && d.classifier == dep.classifier
                && d.type_ == dep.type_
        })
    }

    /// BOM imports from dependency management (entries with
    /// `scope = "import"` and `type = "pom"`).
    pub fn bom_imports(&self) -> Vec<&PomDependency> {
        self.dependency_management
            .iter()
            .filter(|d| {
                d.scope.as_deref() == Some("import") && d.type_.as_deref().unwrap_or("jar") == "pom"
            })
            .collect()
    }
}

impl PomDependency {
    /// The dependency id this declaration names; `None` without a version.
    pub fn to_id(&self) -> Option<DependencyId> {
        let version = self.version.as_deref()?;
        let mut id = DependencyId::new(&self.group_id, &self.artifact_id, version);
        if let Some(ref classifier) = self.classifier {
            id = id.with_classifier(classifier);
        }
        id = match self.type_ {
            Some(ref t) => id.with_type(t),
            None => id.with_type(TYPE_CHOOSE_BY_PACKAGING),
        };
        Some(id)
    }

    /// Convert to a full [`Dependency`], applying the effective
    /// dependency-management entry when this declaration is incomplete.
    pub fn to_dependency(&self, managed: Option<&PomDependency>) -> Option<Dependency> {
        let mut merged = self.clone();
        if let Some(managed) = managed {
            if merged.version.is_none() {
                merged.version = managed.version.clone();
            }
            if merged.scope.is_none() {
                merged.scope = managed.scope.clone();
            }
            if !merged.optional {
                merged.optional = managed.optional;
            }
            for excl in &managed.exclusions {
                merged.exclusions.push(excl.clone());
            }
        }

        let id = merged.to_id()?;

        let scope = merged
            .scope
            .as_deref()
            .and_then(DepScope::parse)
            .unwrap_or_default();

        let exclusions = merged
            .exclusions
            .iter()
            .map(|e| DependencyExclusion {
                group: Some(e.group_id.clone()),
                name: e.artifact_id.clone(),
                ..DependencyExclusion::default()
            })
            .collect();

        Some(Dependency {
            id,
            scope,
            optional: merged.optional,
            exclusions,
            dependency_management: Vec::new(),
        })
    }
}

/// Parse a POM XML string into a [`Pom`]. Unknown elements are ignored.
pub fn parse_pom(xml: &str) -> miette::Result<Pom> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pom = Pom::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    let mut current_dep: Option<PomDependency> = None;
    let mut current_exclusion: Option<PomExclusion> = None;
    let mut current_parent: Option<ParentRef> = None;
    let mut in_dep_mgmt = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                path.push(tag);
                text_buf.clear();

                let ctx = path.join(">");
                match ctx.as_str() {
                    "project>dependencyManagement>dependencies>dependency" => {
                        in_dep_mgmt = true;
                        current_dep = Some(PomDependency::default());
                    }
                    "project>dependencies>dependency" => {
                        current_dep = Some(PomDependency::default());
                    }
                    "project>parent" => {
                        current_parent = Some(ParentRef {
                            group_id: String::new(),
                            artifact_id: String::new(),
                            version: String::new(),
                        });
                    }
                    _ if ctx.ends_with(">exclusion") && current_dep.is_some() => {
                        current_exclusion = Some(PomExclusion {
                            group_id: String::new(),
                            artifact_id: None,
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                let ctx = path.join(">");
                let depth = path.len();
                let last = path.last().map(|s| s.as_str());

                // Properties: <project><properties><key>value</key>
                if depth == 3 && path.get(1).map(|s| s.as_str()) == Some("properties") {
                    let prop_name = path.last().cloned().unwrap_or_default();
                    pom.properties.insert(prop_name, text_buf.clone());
                }

                if let Some(ref mut dep) = current_dep {
                    if let Some(ref mut excl) = current_exclusion {
                        match last {
                            Some("groupId") => excl.group_id = text_buf.clone(),
                            Some("artifactId") => excl.artifact_id = Some(text_buf.clone()),
                            _ => {}
                        }
                        if ctx.ends_with(">exclusion") {
                            if let Some(excl) = current_exclusion.take() {
                                dep.exclusions.push(excl);
                            }
                        }
                    } else {
                        match last {
                            Some("groupId") if ctx.ends_with(">dependency>groupId") => {
                                dep.group_id = text_buf.clone();
                            }
                            Some("artifactId") if ctx.ends_with(">dependency>artifactId") => {
                                dep.artifact_id = text_buf.clone();
                            }
                            Some("version") if ctx.ends_with(">dependency>version") => {
                                dep.version = Some(text_buf.clone());
                            }
                            Some("scope") if ctx.ends_with(">dependency>scope") => {
                                dep.scope = Some(text_buf.clone());
                            }
                            Some("optional") if ctx.ends_with(">dependency>optional") => {
                                dep.optional = text_buf.trim() == "true";
                            }
                            Some("classifier") if ctx.ends_with(">dependency>classifier") => {
                                dep.classifier = Some(text_buf.clone());
                            }
                            Some("type") if ctx.ends_with(">dependency>type") => {
                                dep.type_ = Some(text_buf.clone());
                            }
                            _ => {}
                        }
                    }

                    if ctx == "project>dependencies>dependency"
                        || ctx == "project>dependencyManagement>dependencies>dependency"
                    {
                        if let Some(dep) = current_dep.take() {
                            if in_dep_mgmt {
                                pom.dependency_management.push(dep);
                            } else {
                                pom.dependencies.push(dep);
                            }
                        }
                        in_dep_mgmt = false;
                    }
                }

                if let Some(ref mut parent) = current_parent {
                    match last {
                        Some("groupId") if ctx == "project>parent>groupId" => {
                            parent.group_id = text_buf.clone();
                        }
                        Some("artifactId") if ctx == "project>parent>artifactId" => {
                            parent.artifact_id = text_buf.clone();
                        }
                        Some("version") if ctx == "project>parent>version" => {
                            parent.version = text_buf.clone();
                        }
                        _ => {}
                    }
                    if ctx == "project>parent" {
                        pom.parent = current_parent.take();
                    }
                }

                if depth == 2 {
                    match last {
                        Some("groupId") => pom.group_id = Some(text_buf.clone()),
                        Some("artifactId") => pom.artifact_id = Some(text_buf.clone()),
                        Some("version") => pom.version = Some(text_buf.clone()),
                        Some("packaging") => pom.packaging = Some(text_buf.clone()),
                        _ => {}
                    }
                }

                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(JavelinError::Generic {
                    message: format!("Failed to parse POM XML: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Ok(pom)
}

//! Binding holders: projects, configurations, archetypes, and configuration
//! extensions.
//!
//! Holders are built through consuming builders and locked on `build()`;
//! a locked holder is immutable for the rest of the process. `bind` replaces
//! the producer for a key, `modify` appends to its modifier list, `extend`
//! attaches an extension holder consulted when the target configuration is
//! in scope.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::evaluator::{Eval, EvalError};
use crate::key::{Key, Value};

pub(crate) type AnyValue = Box<dyn Any + Send + Sync>;
pub(crate) type Producer =
    Arc<dyn Fn(&mut Eval<'_>) -> miette::Result<AnyValue> + Send + Sync>;
pub(crate) type Modifier =
    Arc<dyn Fn(&mut Eval<'_>, AnyValue) -> miette::Result<AnyValue> + Send + Sync>;

/// A locked holder: bindings, modifiers, and extensions for one project,
/// configuration, archetype, or extension.
pub(crate) struct HolderData {
    pub(crate) name: String,
    pub(crate) bindings: HashMap<String, Producer>,
    pub(crate) modifiers: HashMap<String, Vec<Modifier>>,
    /// Extension holders keyed by the target configuration's name.
    pub(crate) extensions: BTreeMap<String, Arc<HolderData>>,
}

impl fmt::Debug for HolderData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("name", &self.name)
            .field("bindings", &self.bindings.len())
            .field("modifiers", &self.modifiers.len())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Mutable accumulation state shared by every holder builder.
pub struct HolderBuilder {
    name: String,
    bindings: HashMap<String, Producer>,
    modifiers: HashMap<String, Vec<Modifier>>,
    extensions: BTreeMap<String, HolderBuilder>,
}

impl HolderBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            bindings: HashMap::new(),
            modifiers: HashMap::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Bind `key` to a producer function; replaces any previous binding.
    pub fn bind<V: Value>(
        &mut self,
        key: &Key<V>,
        producer: impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static,
    ) -> &mut Self {
        let erased: Producer =
            Arc::new(move |eval| producer(eval).map(|v| Box::new(v) as AnyValue));
        self.bindings.insert(key.name().to_string(), erased);
        self
    }

    /// Bind `key` to a fixed value.
    pub fn bind_value<V: Value>(&mut self, key: &Key<V>, value: V) -> &mut Self {
        self.bind(key, move |_| Ok(value.clone()))
    }

    /// Append a modifier transforming `key`'s value after its producer ran.
    pub fn modify<V: Value>(
        &mut self,
        key: &Key<V>,
        modifier: impl Fn(&mut Eval<'_>, V) -> miette::Result<V> + Send + Sync + 'static,
    ) -> &mut Self {
        let key_name = key.name().to_string();
        let type_name = std::any::type_name::<V>();
        let erased: Modifier = Arc::new(move |eval, any| {
            let value = any.downcast::<V>().map_err(|_| EvalError::TypeMismatch {
                key: key_name.clone(),
                expected: type_name,
            })?;
            modifier(eval, *value).map(|v| Box::new(v) as AnyValue)
        });
        self.modifiers
            .entry(key.name().to_string())
            .or_default()
            .push(erased);
        self
    }

    /// Declare bindings that apply only while `target` is in scope.
    ///
    /// The block receives the extension's own builder; nesting `extend`
    /// inside it yields extensions-of-extensions.
    pub fn extend(
        &mut self,
        target: &Configuration,
        block: impl FnOnce(&mut HolderBuilder),
    ) -> &mut Self {
        let name = format!("{}+{}", self.name, target.name());
        let builder = self
            .extensions
            .entry(target.name().to_string())
            .or_insert_with(|| HolderBuilder::new(name));
        block(builder);
        self
    }

    fn build(self) -> Arc<HolderData> {
        Arc::new(HolderData {
            name: self.name,
            bindings: self.bindings,
            modifiers: self.modifiers,
            extensions: self
                .extensions
                .into_iter()
                .map(|(target, builder)| (target, builder.build()))
                .collect(),
        })
    }
}

/// A named configuration, layered onto scopes with a `cfg:` query prefix.
#[derive(Clone)]
pub struct Configuration {
    name: Arc<str>,
    pub(crate) data: Arc<HolderData>,
    pub(crate) parent: Option<Arc<Configuration>>,
}

impl Configuration {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This configuration followed by its ancestors.
    pub(crate) fn chain(&self) -> Vec<&Configuration> {
        let mut chain = vec![self];
        let mut cursor = self.parent.as_deref();
        while let Some(config) = cursor {
            chain.push(config);
            cursor = config.parent.as_deref();
        }
        chain
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration({})", self.name)
    }
}

/// Builder for [`Configuration`].
pub struct ConfigurationBuilder {
    name: String,
    parent: Option<Configuration>,
    holder: HolderBuilder,
}

impl ConfigurationBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            holder: HolderBuilder::new(format!("config:{name}")),
            parent: None,
            name,
        }
    }

    /// Set the parent configuration, searched when this one lacks a binding.
    pub fn parent(mut self, parent: &Configuration) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn bind<V: Value>(
        mut self,
        key: &Key<V>,
        producer: impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static,
    ) -> Self {
        self.holder.bind(key, producer);
        self
    }

    pub fn bind_value<V: Value>(mut self, key: &Key<V>, value: V) -> Self {
        self.holder.bind_value(key, value);
        self
    }

    pub fn modify<V: Value>(
        mut self,
        key: &Key<V>,
        modifier: impl Fn(&mut Eval<'_>, V) -> miette::Result<V> + Send + Sync + 'static,
    ) -> Self {
        self.holder.modify(key, modifier);
        self
    }

    pub fn extend(mut self, target: &Configuration, block: impl FnOnce(&mut HolderBuilder)) -> Self {
        self.holder.extend(target, block);
        self
    }

    /// Lock the configuration.
    pub fn build(self) -> Configuration {
        Configuration {
            name: self.name.into(),
            data: self.holder.build(),
            parent: self.parent.map(Arc::new),
        }
    }
}

/// A configuration-like holder that is part of every scope of a project
/// listing it; not addressable from queries.
#[derive(Clone)]
pub struct Archetype {
    name: Arc<str>,
    pub(crate) data: Arc<HolderData>,
    pub(crate) parent: Option<Arc<Archetype>>,
}

impl Archetype {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn chain(&self) -> Vec<&Archetype> {
        let mut chain = vec![self];
        let mut cursor = self.parent.as_deref();
        while let Some(archetype) = cursor {
            chain.push(archetype);
            cursor = archetype.parent.as_deref();
        }
        chain
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Archetype({})", self.name)
    }
}

/// Builder for [`Archetype`].
pub struct ArchetypeBuilder {
    name: String,
    parent: Option<Archetype>,
    holder: HolderBuilder,
}

impl ArchetypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            holder: HolderBuilder::new(format!("archetype:{name}")),
            parent: None,
            name,
        }
    }

    pub fn parent(mut self, parent: &Archetype) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn bind<V: Value>(
        mut self,
        key: &Key<V>,
        producer: impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static,
    ) -> Self {
        self.holder.bind(key, producer);
        self
    }

    pub fn bind_value<V: Value>(mut self, key: &Key<V>, value: V) -> Self {
        self.holder.bind_value(key, value);
        self
    }

    pub fn modify<V: Value>(
        mut self,
        key: &Key<V>,
        modifier: impl Fn(&mut Eval<'_>, V) -> miette::Result<V> + Send + Sync + 'static,
    ) -> Self {
        self.holder.modify(key, modifier);
        self
    }

    pub fn extend(mut self, target: &Configuration, block: impl FnOnce(&mut HolderBuilder)) -> Self {
        self.holder.extend(target, block);
        self
    }

    pub fn build(self) -> Archetype {
        Archetype {
            name: self.name.into(),
            data: self.holder.build(),
            parent: self.parent.map(Arc::new),
        }
    }
}

/// A top-level holder: the root of every scope derived from it.
#[derive(Clone)]
pub struct Project {
    name: Arc<str>,
    root: Option<PathBuf>,
    pub(crate) data: Arc<HolderData>,
    pub(crate) archetypes: Vec<Archetype>,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Project({})", self.name)
    }
}

/// Builder for [`Project`].
pub struct ProjectBuilder {
    name: String,
    root: Option<PathBuf>,
    archetypes: Vec<Archetype>,
    holder: HolderBuilder,
}

impl ProjectBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            holder: HolderBuilder::new(format!("project:{name}")),
            root: None,
            archetypes: Vec::new(),
            name,
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Append an archetype; earlier archetypes are more significant.
    pub fn archetype(mut self, archetype: &Archetype) -> Self {
        self.archetypes.push(archetype.clone());
        self
    }

    pub fn bind<V: Value>(
        mut self,
        key: &Key<V>,
        producer: impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static,
    ) -> Self {
        self.holder.bind(key, producer);
        self
    }

    pub fn bind_value<V: Value>(mut self, key: &Key<V>, value: V) -> Self {
        self.holder.bind_value(key, value);
        self
    }

    pub fn modify<V: Value>(
        mut self,
        key: &Key<V>,
        modifier: impl Fn(&mut Eval<'_>, V) -> miette::Result<V> + Send + Sync + 'static,
    ) -> Self {
        self.holder.modify(key, modifier);
        self
    }

    pub fn extend(mut self, target: &Configuration, block: impl FnOnce(&mut HolderBuilder)) -> Self {
        self.holder.extend(target, block);
        self
    }

    /// Lock the project.
    pub fn build(self) -> Project {
        Project {
            name: self.name.into(),
            root: self.root,
            data: self.holder.build(),
            archetypes: self.archetypes,
        }
    }
}

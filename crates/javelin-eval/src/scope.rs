//! The scope arena: memoized layering of configurations over project base
//! scopes, including configuration extensions.
//!
//! Scopes form a DAG rooted at project base scopes. Each node owns an
//! ordered holder list (most significant first) and a parent link; nodes are
//! stored in an arena and addressed by index, memoized per
//! `(parent, configuration)` pair so repeated layering returns the same
//! node.

use std::collections::HashMap;
use std::sync::Arc;

use crate::holder::{Configuration, HolderData, Project};

/// A handle to a memoized scope node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(pub(crate) usize);

pub(crate) struct ScopeData {
    /// Display name: `project/config1:config2:`.
    pub(crate) name: String,
    /// Holders local to this node, most significant first.
    pub(crate) holders: Vec<Arc<HolderData>>,
    pub(crate) parent: Option<usize>,
    /// Names of configurations visible anywhere in this scope's chain
    /// (layered configurations and their ancestors).
    visible_configs: Vec<String>,
}

#[derive(Default)]
pub(crate) struct ScopeArena {
    scopes: Vec<ScopeData>,
    /// Memoization: `(parent scope, configuration name)` to child scope.
    children: HashMap<(usize, String), usize>,
    /// Project base scopes by project name.
    roots: HashMap<String, usize>,
}

impl ScopeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn data(&self, scope: Scope) -> &ScopeData {
        &self.scopes[scope.0]
    }

    pub(crate) fn name(&self, scope: Scope) -> &str {
        &self.scopes[scope.0].name
    }

    /// The base scope of a project: the project holder followed by its
    /// archetypes (most specific first) and their parents.
    pub(crate) fn root_scope(&mut self, project: &Project) -> Scope {
        if let Some(&idx) = self.roots.get(project.name()) {
            return Scope(idx);
        }

        let mut holders: Vec<Arc<HolderData>> = vec![project.data.clone()];
        for archetype in &project.archetypes {
            for link in archetype.chain() {
                holders.push(link.data.clone());
            }
        }
        dedupe(&mut holders);

        let idx = self.scopes.len();
        self.scopes.push(ScopeData {
            name: format!("{}/", project.name()),
            holders,
            parent: None,
            visible_configs: Vec::new(),
        });
        self.roots.insert(project.name().to_string(), idx);
        Scope(idx)
    }

    /// Layer `config` over `scope`.
    ///
    /// The new node's holders are, most significant first:
    /// 1. extensions targeting `config`, contributed by holders already in
    ///    the scope chain (more significant holders' extensions first);
    /// 2. `config` itself and its parents;
    /// 3. extensions contributed by `config`'s chain that target
    ///    configurations already visible in `scope`.
    /// Extension holders bring their own nested extensions along whenever
    /// the nested target is visible.
    pub(crate) fn layer(&mut self, scope: Scope, config: &Configuration) -> Scope {
        let memo_key = (scope.0, config.name().to_string());
        if let Some(&idx) = self.children.get(&memo_key) {
            return Scope(idx);
        }

        let chain_holders = self.chain_holders(scope);
        let config_chain = config.chain();

        let mut visible = self.scopes[scope.0].visible_configs.clone();
        for link in &config_chain {
            if !visible.iter().any(|n| n == link.name()) {
                visible.push(link.name().to_string());
            }
        }

        let mut holders: Vec<Arc<HolderData>> = Vec::new();

        // (1) extensions over the layered configuration, from holders
        // already in scope.
        for holder in &chain_holders {
            if let Some(extension) = holder.extensions.get(config.name()) {
                push_with_nested(extension.clone(), &visible, &mut holders);
            }
        }

        // (2) the configuration and its ancestors.
        for link in &config_chain {
            holders.push(link.data.clone());
        }

        // (3) extensions the configuration contributes over configurations
        // already in scope.
        let prior_visible = &self.scopes[scope.0].visible_configs;
        for link in &config_chain {
            for (target, extension) in &link.data.extensions {
                if prior_visible.iter().any(|n| n == target) {
                    push_with_nested(extension.clone(), &visible, &mut holders);
                }
            }
        }

        dedupe(&mut holders);

        let name = format!("{}{}:", self.scopes[scope.0].name, config.name());
        let idx = self.scopes.len();
        self.scopes.push(ScopeData {
            name,
            holders,
            parent: Some(scope.0),
            visible_configs: visible,
        });
        self.children.insert(memo_key, idx);
        Scope(idx)
    }

    /// All holders in the scope chain, most significant first.
    pub(crate) fn chain_holders(&self, scope: Scope) -> Vec<Arc<HolderData>> {
        let mut holders = Vec::new();
        let mut cursor = Some(scope.0);
        while let Some(idx) = cursor {
            holders.extend(self.scopes[idx].holders.iter().cloned());
            cursor = self.scopes[idx].parent;
        }
        holders
    }
}

/// Push an extension holder followed by its nested extensions whose targets
/// are visible.
fn push_with_nested(
    extension: Arc<HolderData>,
    visible: &[String],
    out: &mut Vec<Arc<HolderData>>,
) {
    for (target, nested) in &extension.extensions {
        if visible.iter().any(|n| n == target) {
            push_with_nested(nested.clone(), visible, out);
        }
    }
    out.push(extension);
}

/// Drop repeated holders, keeping the first (most significant) occurrence.
fn dedupe(holders: &mut Vec<Arc<HolderData>>) {
    let mut seen: Vec<*const HolderData> = Vec::new();
    holders.retain(|h| {
        let ptr = Arc::as_ptr(h);
        if seen.contains(&ptr) {
            false
        } else {
            seen.push(ptr);
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::{ConfigurationBuilder, ProjectBuilder};
    use crate::key::Key;

    #[test]
    fn root_scope_memoized_per_project() {
        let project = ProjectBuilder::new("app").build();
        let mut arena = ScopeArena::new();
        let first = arena.root_scope(&project);
        let second = arena.root_scope(&project);
        assert_eq!(first, second);
        assert_eq!(arena.name(first), "app/");
    }

    #[test]
    fn layering_memoized_per_parent_and_config() {
        let key: Key<u32> = Key::new("k", "");
        let config = ConfigurationBuilder::new("testing").bind_value(&key, 1).build();
        let project = ProjectBuilder::new("app").build();

        let mut arena = ScopeArena::new();
        let root = arena.root_scope(&project);
        let first = arena.layer(root, &config);
        let second = arena.layer(root, &config);
        assert_eq!(first, second);
        assert_eq!(arena.name(first), "app/testing:");
    }

    #[test]
    fn holder_list_has_no_duplicates() {
        let parent = ConfigurationBuilder::new("base").build();
        let config = ConfigurationBuilder::new("child").parent(&parent).build();
        let project = ProjectBuilder::new("app").build();

        let mut arena = ScopeArena::new();
        let root = arena.root_scope(&project);
        // Layer the parent, then a child extending it: the parent holder
        // appears once in the chain.
        let base = arena.layer(root, &parent);
        let scope = arena.layer(base, &config);

        let holders = arena.chain_holders(scope);
        let mut ptrs: Vec<*const HolderData> = holders.iter().map(|h| Arc::as_ptr(h)).collect();
        ptrs.sort();
        let before = ptrs.len();
        ptrs.dedup();
        // The parent's holder sits in the parent scope; the child scope must
        // not repeat it.
        assert_eq!(
            before,
            ptrs.len() + 1,
            "parent holder shared between child chain and layered parent scope"
        );
    }
}

//! Key runners and result formatting.
//!
//! Queries name keys by string; the registry maps each standard key name to
//! a runner that evaluates it with typed access and produces both a human
//! rendering and a machine value.

use std::collections::BTreeMap;

use serde::Serialize;

use javelin_eval::{Evaluator, Key, Scope, Value};
use javelin_util::errors::JavelinError;

use crate::keys::StandardKeys;

/// The result of one key evaluation, ready for output.
#[derive(Debug)]
pub struct RunOutcome {
    pub pretty: String,
    pub machine: serde_json::Value,
}

type RunFn =
    Box<dyn Fn(&Evaluator, Scope, Vec<(Option<String>, String)>) -> miette::Result<RunOutcome>>;

/// Maps key names to typed evaluation closures.
pub struct KeyRegistry {
    runners: BTreeMap<String, RunFn>,
}

impl KeyRegistry {
    /// Register every standard key.
    pub fn standard(keys: &StandardKeys) -> Self {
        let mut registry = Self {
            runners: BTreeMap::new(),
        };
        registry.register(&keys.project_name);
        registry.register(&keys.project_group);
        registry.register(&keys.project_version);
        registry.register(&keys.build_dir);
        registry.register(&keys.repositories);
        registry.register(&keys.library_dependencies);
        registry.register(&keys.internal_classpath);
        registry.register(&keys.external_classpath);
        registry.register(&keys.dependency_tree);
        registry.register(&keys.run_options);
        registry.register(&keys.run_environment);
        registry.register(&keys.assembly_output);
        registry.register(&keys.assembly);
        registry.register(&keys.clean);
        registry
    }

    pub fn register<V: Value + Serialize>(&mut self, key: &Key<V>) {
        let key = key.clone();
        let name = key.name().to_string();
        self.runners.insert(
            name,
            Box::new(move |evaluator, scope, inputs| {
                let value = evaluator.evaluate_with_inputs(scope, &key, inputs)?;
                let machine =
                    serde_json::to_value(&value).map_err(|e| JavelinError::Generic {
                        message: format!("failed to serialize '{}': {e}", key.name()),
                    })?;
                Ok(RunOutcome {
                    pretty: key.pretty(&value),
                    machine,
                })
            }),
        );
    }

    pub fn run(
        &self,
        key: &str,
        evaluator: &Evaluator,
        scope: Scope,
        inputs: Vec<(Option<String>, String)>,
    ) -> miette::Result<RunOutcome> {
        let runner = self.runners.get(key).ok_or_else(|| JavelinError::Query {
            message: format!(
                "unknown key '{key}' (known keys: {})",
                self.runners.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        })?;
        runner(evaluator, scope, inputs)
    }

    pub fn key_names(&self) -> Vec<&str> {
        self.runners.keys().map(String::as_str).collect()
    }
}

/// Render a machine value as one shell line: scalars verbatim, arrays
/// joined by tabs, structures as compact JSON.
pub fn shell_line(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(shell_line)
            .collect::<Vec<_>>()
            .join("\t"),
        other => other.to_string(),
    }
}

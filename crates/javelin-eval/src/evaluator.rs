//! The evaluator: scope walking, modifier application, the single-activation
//! guard, and listener dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::ThreadId;

use miette::Diagnostic;
use thiserror::Error;

use crate::cache::ExpirySignal;
use crate::holder::{AnyValue, Configuration, Project};
use crate::input::InputStore;
use crate::key::{Key, Value};
use crate::listener::EvalListener;
use crate::scope::{Scope, ScopeArena};

/// Errors raised by the evaluator itself (bindings propagate their own).
#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    /// No binding anywhere in the scope and the key has no default. This is
    /// a user-facing condition, not a crash; it renders without a stack
    /// trace.
    #[error("Key '{key}' is not assigned in scope {scope}")]
    #[diagnostic(help(
        "bind the key in the project or one of its configurations, or give it a default value"
    ))]
    KeyNotAssigned { key: String, scope: String },

    /// A second thread called `evaluate` while an activation was live.
    #[error("Evaluation is already active on another thread")]
    ConcurrentEvaluation,

    /// A binding produced a value of the wrong type (two keys sharing a
    /// name with different value types).
    #[error("Binding for '{key}' did not produce a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Cooperative cancellation was requested.
    #[error("Evaluation cancelled")]
    Cancelled,
}

/// Lock a mutex, ignoring poisoning: the evaluator's single-activation
/// invariant means a poisoned lock only ever reflects a panic that is
/// already unwinding this same thread's stack.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Activation {
    thread: Option<ThreadId>,
    depth: u32,
}

pub(crate) struct EvaluatorInner {
    arena: Mutex<ScopeArena>,
    listener: Mutex<Option<Box<dyn EvalListener + Send>>>,
    activation: Mutex<Activation>,
    pub(crate) inputs: Mutex<InputStore>,
    pub(crate) cache_frames: Mutex<Vec<Vec<ExpirySignal>>>,
    cancelled: AtomicBool,
    pub(crate) interactive: AtomicBool,
}

/// The key evaluator. Cheap to clone; clones share all state.
///
/// Exactly one activation may run at a time: the first `evaluate` records
/// the calling thread, nested re-entrance from that thread is counted, and
/// any other thread's `evaluate` fails immediately with
/// [`EvalError::ConcurrentEvaluation`].
#[derive(Clone)]
pub struct Evaluator {
    inner: Arc<EvaluatorInner>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator").finish_non_exhaustive()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EvaluatorInner {
                arena: Mutex::new(ScopeArena::new()),
                listener: Mutex::new(None),
                activation: Mutex::new(Activation {
                    thread: None,
                    depth: 0,
                }),
                inputs: Mutex::new(InputStore::new()),
                cache_frames: Mutex::new(Vec::new()),
                cancelled: AtomicBool::new(false),
                interactive: AtomicBool::new(false),
            }),
        }
    }

    /// The base scope of a project, memoized by project name.
    pub fn root_scope(&self, project: &Project) -> Scope {
        lock(&self.inner.arena).root_scope(project)
    }

    /// Layer a configuration over a scope; memoized per `(scope, config)`.
    pub fn layer(&self, scope: Scope, config: &Configuration) -> Scope {
        lock(&self.inner.arena).layer(scope, config)
    }

    pub fn scope_name(&self, scope: Scope) -> String {
        lock(&self.inner.arena).name(scope).to_string()
    }

    /// Install the listener, replacing any previous one.
    pub fn set_listener(&self, listener: Box<dyn EvalListener + Send>) {
        *lock(&self.inner.listener) = Some(listener);
    }

    pub fn clear_listener(&self) -> Option<Box<dyn EvalListener + Send>> {
        lock(&self.inner.listener).take()
    }

    /// Enable the interactive prompt as the input source of last resort.
    pub fn set_interactive(&self, interactive: bool) {
        self.inner.interactive.store(interactive, Ordering::SeqCst);
    }

    /// Request cooperative cancellation of the running evaluation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset_cancellation(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Evaluate `key` in `scope`.
    pub fn evaluate<V: Value>(&self, scope: Scope, key: &Key<V>) -> miette::Result<V> {
        self.eval_impl(scope, key, Vec::new(), None)
    }

    /// [`evaluate`](Self::evaluate) with ordered `(input key, text)` pairs
    /// available to `read_input` for the duration of the call.
    pub fn evaluate_with_inputs<V: Value>(
        &self,
        scope: Scope,
        key: &Key<V>,
        inputs: Vec<(Option<String>, String)>,
    ) -> miette::Result<V> {
        self.eval_impl(scope, key, inputs, None)
    }

    /// Evaluate, substituting `fallback` when the key is not assigned.
    pub fn evaluate_or_else<V: Value>(
        &self,
        scope: Scope,
        key: &Key<V>,
        fallback: V,
    ) -> miette::Result<V> {
        self.eval_impl(scope, key, Vec::new(), Some(fallback))
    }

    /// [`evaluate_or_else`](Self::evaluate_or_else) with ordered inputs.
    pub fn evaluate_or_else_with_inputs<V: Value>(
        &self,
        scope: Scope,
        key: &Key<V>,
        fallback: V,
        inputs: Vec<(Option<String>, String)>,
    ) -> miette::Result<V> {
        self.eval_impl(scope, key, inputs, Some(fallback))
    }

    fn eval_impl<V: Value>(
        &self,
        scope: Scope,
        key: &Key<V>,
        inputs: Vec<(Option<String>, String)>,
        fallback: Option<V>,
    ) -> miette::Result<V> {
        let _guard = self.enter(inputs)?;
        let scope_name = self.scope_name(scope);
        self.notify(|l| l.started(&scope_name, key.name()));

        let found = self.lookup(scope, key.name());
        for (holder_scope, holder, mods) in &found.modifier_stacks {
            let count = mods.len();
            self.notify(|l| l.has_modifiers(holder_scope, holder, count));
        }

        let mut eval = Eval {
            evaluator: self,
            scope,
        };

        let (initial, origin): (AnyValue, Option<(String, String)>) = match found.producer {
            Some((producer, origin_scope, origin_holder)) => match producer(&mut eval) {
                Ok(value) => (value, Some((origin_scope, origin_holder))),
                Err(e) => {
                    self.notify(|l| l.failed_error(&e.to_string(), true));
                    return Err(e);
                }
            },
            None => match key.default_value() {
                Some(default) => (Box::new((**default).clone()) as AnyValue, None),
                None => {
                    return match fallback {
                        Some(value) => {
                            let text = format!("{value:?}");
                            self.notify(|l| l.failed_no_binding(true, Some(text.as_str())));
                            Ok(value)
                        }
                        None => {
                            self.notify(|l| l.failed_no_binding(false, None));
                            Err(EvalError::KeyNotAssigned {
                                key: key.name().to_string(),
                                scope: scope_name,
                            }
                            .into())
                        }
                    };
                }
            },
        };

        // Modifiers run least-significant first (collected last in the
        // walk), declaration order within a holder, so the most specific
        // holder's modifier sees the already-shaped value and wins.
        let mut value = initial;
        for (_, _, mods) in found.modifier_stacks.iter().rev() {
            for modifier in mods {
                value = match modifier(&mut eval, value) {
                    Ok(value) => value,
                    Err(e) => {
                        self.notify(|l| l.failed_error(&e.to_string(), false));
                        return Err(e);
                    }
                };
            }
        }

        let value = match value.downcast::<V>() {
            Ok(boxed) => *boxed,
            Err(_) => {
                let err = EvalError::TypeMismatch {
                    key: key.name().to_string(),
                    expected: std::any::type_name::<V>(),
                };
                self.notify(|l| l.failed_error(&err.to_string(), true));
                return Err(err.into());
            }
        };

        let result_text = format!("{value:?}");
        match origin {
            Some((origin_scope, origin_holder)) => self.notify(|l| {
                l.succeeded(
                    key.name(),
                    Some(origin_scope.as_str()),
                    Some(origin_holder.as_str()),
                    &result_text,
                )
            }),
            None => self.notify(|l| l.succeeded(key.name(), None, None, &result_text)),
        }
        Ok(value)
    }

    /// Walk outward from `scope`, collecting modifier stacks until a holder
    /// with a binding is found. Modifiers beyond the binding's holder do
    /// not apply.
    fn lookup(&self, scope: Scope, key_name: &str) -> FoundBinding {
        let arena = lock(&self.inner.arena);
        let mut modifier_stacks = Vec::new();
        let mut cursor = Some(scope);
        while let Some(current) = cursor {
            let data = arena.data(current);
            for holder in &data.holders {
                if let Some(mods) = holder.modifiers.get(key_name) {
                    modifier_stacks.push((data.name.clone(), holder.name.clone(), mods.clone()));
                }
                if let Some(producer) = holder.bindings.get(key_name) {
                    return FoundBinding {
                        producer: Some((producer.clone(), data.name.clone(), holder.name.clone())),
                        modifier_stacks,
                    };
                }
            }
            cursor = data.parent.map(Scope);
        }
        FoundBinding {
            producer: None,
            modifier_stacks,
        }
    }

    fn enter(&self, inputs: Vec<(Option<String>, String)>) -> miette::Result<ActivationGuard> {
        let current = std::thread::current().id();
        {
            let mut activation = lock(&self.inner.activation);
            match activation.thread {
                Some(active) if active != current => {
                    return Err(EvalError::ConcurrentEvaluation.into());
                }
                Some(_) => activation.depth += 1,
                None => {
                    activation.thread = Some(current);
                    activation.depth = 1;
                }
            }
        }
        let input_base = {
            let mut store = lock(&self.inner.inputs);
            let base = store.len();
            store.push_entries(inputs);
            base
        };
        Ok(ActivationGuard {
            inner: self.inner.clone(),
            input_base,
        })
    }

    pub(crate) fn notify(&self, f: impl FnOnce(&mut dyn EvalListener)) {
        let mut guard = lock(&self.inner.listener);
        if let Some(listener) = guard.as_deref_mut() {
            f(listener);
        }
    }

    pub(crate) fn inner(&self) -> &EvaluatorInner {
        &self.inner
    }
}

struct FoundBinding {
    producer: Option<(crate::holder::Producer, String, String)>,
    /// `(scope name, holder name, modifiers)` in walk order: most
    /// significant first.
    modifier_stacks: Vec<(String, String, Vec<crate::holder::Modifier>)>,
}

struct ActivationGuard {
    inner: Arc<EvaluatorInner>,
    input_base: usize,
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        lock(&self.inner.inputs).truncate(self.input_base);
        let mut activation = lock(&self.inner.activation);
        activation.depth = activation.depth.saturating_sub(1);
        if activation.depth == 0 {
            activation.thread = None;
        }
    }
}

/// The context handed to bindings and modifiers: nested key reads, inputs,
/// cancellation, and cache-expiry signals, all against the current scope.
pub struct Eval<'a> {
    evaluator: &'a Evaluator,
    scope: Scope,
}

impl Eval<'_> {
    /// Evaluate another key in the current scope (re-entrant).
    pub fn get<V: Value>(&mut self, key: &Key<V>) -> miette::Result<V> {
        self.evaluator.evaluate(self.scope, key)
    }

    /// Evaluate another key, substituting `fallback` when unassigned.
    pub fn get_or_else<V: Value>(&mut self, key: &Key<V>, fallback: V) -> miette::Result<V> {
        self.evaluator.evaluate_or_else(self.scope, key, fallback)
    }

    /// Evaluate a key with `config` layered over the current scope.
    pub fn get_in<V: Value>(&mut self, config: &Configuration, key: &Key<V>) -> miette::Result<V> {
        let layered = self.evaluator.layer(self.scope, config);
        self.evaluator.evaluate(layered, key)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn scope_name(&self) -> String {
        self.evaluator.scope_name(self.scope)
    }

    pub fn evaluator(&self) -> &Evaluator {
        self.evaluator
    }

    /// Emit a `feature` event to the installed listener.
    pub fn feature(&self, tag: &str) {
        self.evaluator.notify(|l| l.feature(tag));
    }

    pub fn is_cancelled(&self) -> bool {
        self.evaluator.is_cancelled()
    }

    /// Fail with [`EvalError::Cancelled`] when cancellation was requested.
    /// Long-running bindings poll this between units of work.
    pub fn check_cancelled(&self) -> miette::Result<()> {
        if self.is_cancelled() {
            Err(EvalError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

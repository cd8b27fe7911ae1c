//! The evaluation listener protocol.
//!
//! An evaluator holds at most one installed listener. Events are strictly
//! nested: every `started` is paired with exactly one of `succeeded`,
//! `failed_no_binding`, or `failed_error` at the same depth; nested key
//! reads produce nested pairs in between. All callbacks run synchronously
//! on the evaluating thread.

/// Observer of key evaluations.
///
/// All methods have empty defaults so implementors override only what they
/// trace. Cache hits and similar one-off signals arrive as [`feature`]
/// events with a well-known tag.
///
/// [`feature`]: EvalListener::feature
pub trait EvalListener {
    /// A key evaluation began in `scope`.
    fn started(&mut self, scope: &str, key: &str) {
        let _ = (scope, key);
    }

    /// The walk found `count` modifiers on `holder` while resolving the
    /// current key.
    fn has_modifiers(&mut self, scope: &str, holder: &str, count: usize) {
        let _ = (scope, holder, count);
    }

    /// A tagged one-off signal, e.g. `"cache-hit"`.
    fn feature(&mut self, tag: &str) {
        let _ = tag;
    }

    /// The evaluation produced a value. Origins are `None` when the key's
    /// default value was used.
    fn succeeded(
        &mut self,
        key: &str,
        origin_scope: Option<&str>,
        origin_holder: Option<&str>,
        result: &str,
    ) {
        let _ = (key, origin_scope, origin_holder, result);
    }

    /// No binding and no default. `fallback` carries the substitute value
    /// when the caller supplied one.
    fn failed_no_binding(&mut self, has_fallback: bool, fallback: Option<&str>) {
        let _ = (has_fallback, fallback);
    }

    /// A binding (`from_binding`) or modifier threw.
    fn failed_error(&mut self, error: &str, from_binding: bool) {
        let _ = (error, from_binding);
    }
}

/// The feature tag emitted when a cached binding returns a stored value.
pub const FEATURE_CACHE_HIT: &str = "cache-hit";

/// A listener that records events as strings, for tests and tracing.
///
/// The event log is shared: keep a clone of [`events`](Self::events) before
/// installing the listener and read it after evaluation.
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub events: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

impl RecordingListener {
    fn push(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl EvalListener for RecordingListener {
    fn started(&mut self, scope: &str, key: &str) {
        self.push(format!("started {scope}{key}"));
    }

    fn has_modifiers(&mut self, _scope: &str, holder: &str, count: usize) {
        self.push(format!("modifiers {holder} x{count}"));
    }

    fn feature(&mut self, tag: &str) {
        self.push(format!("feature {tag}"));
    }

    fn succeeded(
        &mut self,
        key: &str,
        _origin_scope: Option<&str>,
        origin_holder: Option<&str>,
        result: &str,
    ) {
        self.push(format!(
            "succeeded {key} from {} = {result}",
            origin_holder.unwrap_or("default")
        ));
    }

    fn failed_no_binding(&mut self, has_fallback: bool, _fallback: Option<&str>) {
        self.push(format!("no-binding fallback={has_fallback}"));
    }

    fn failed_error(&mut self, error: &str, from_binding: bool) {
        self.push(format!("error from_binding={from_binding}: {error}"));
    }
}

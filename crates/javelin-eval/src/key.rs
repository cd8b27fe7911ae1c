//! Typed key handles.
//!
//! A key is identified by its name; the value type rides along as a phantom
//! tag checked when a binding's output is downcast during evaluation. Keys
//! own no state: the default value and printer are shared by every clone.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Values bindable to keys.
pub trait Value: Any + Clone + fmt::Debug + Send + Sync {}
impl<T: Any + Clone + fmt::Debug + Send + Sync> Value for T {}

/// Descriptor of an input a key's binding is known to consume, shown by
/// interactive help.
#[derive(Debug, Clone)]
pub struct InputKeyDescriptor {
    pub key: String,
    pub description: String,
}

/// A named, typed key.
pub struct Key<V: Value> {
    name: Arc<str>,
    description: Arc<str>,
    default: Option<Arc<V>>,
    printer: Option<Arc<dyn Fn(&V) -> String + Send + Sync>>,
    input_keys: Arc<[InputKeyDescriptor]>,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Value> Key<V> {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into().into(),
            description: description.into().into(),
            default: None,
            printer: None,
            input_keys: Arc::from(Vec::new().into_boxed_slice()),
            _marker: PhantomData,
        }
    }

    /// Attach a default value, used when no holder binds the key. The value
    /// is shared across evaluations and cloned on each use.
    pub fn with_default(mut self, value: V) -> Self {
        self.default = Some(Arc::new(value));
        self
    }

    /// Attach a pretty-printer used for human-facing output.
    pub fn with_printer(mut self, printer: impl Fn(&V) -> String + Send + Sync + 'static) -> Self {
        self.printer = Some(Arc::new(printer));
        self
    }

    /// Declare an input this key's binding reads.
    pub fn with_input_key(
        mut self,
        key: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let mut keys = self.input_keys.to_vec();
        keys.push(InputKeyDescriptor {
            key: key.into(),
            description: description.into(),
        });
        self.input_keys = Arc::from(keys.into_boxed_slice());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> Option<&Arc<V>> {
        self.default.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn input_keys(&self) -> &[InputKeyDescriptor] {
        &self.input_keys
    }

    /// Render a value with the key's printer, or `Debug` without one.
    pub fn pretty(&self, value: &V) -> String {
        match self.printer {
            Some(ref printer) => printer(value),
            None => format!("{value:?}"),
        }
    }
}

impl<V: Value> Clone for Key<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            default: self.default.clone(),
            printer: self.printer.clone(),
            input_keys: self.input_keys.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V: Value> PartialEq for Key<V> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<V: Value> Eq for Key<V> {}

impl<V: Value> std::hash::Hash for Key<V> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<V: Value> fmt::Debug for Key<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

impl<V: Value> fmt::Display for Key<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_by_name() {
        let a: Key<u32> = Key::new("version", "Project version");
        let b: Key<u32> = Key::new("version", "Different docs");
        let c: Key<u32> = Key::new("name", "Project name");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn default_value_shared_across_clones() {
        let key: Key<Vec<String>> = Key::new("tags", "Tags").with_default(vec!["a".into()]);
        let cloned = key.clone();
        assert!(key.has_default());
        assert!(Arc::ptr_eq(
            key.default_value().unwrap(),
            cloned.default_value().unwrap()
        ));
    }

    #[test]
    fn pretty_uses_printer_or_debug() {
        let plain: Key<u32> = Key::new("count", "");
        assert_eq!(plain.pretty(&3), "3");

        let printed: Key<u32> = Key::new("count", "").with_printer(|v| format!("<{v}>"));
        assert_eq!(printed.pretty(&3), "<3>");
    }

    #[test]
    fn input_key_descriptors_accumulate() {
        let key: Key<String> = Key::new("run", "")
            .with_input_key("main", "Main class")
            .with_input_key("args", "Arguments");
        assert_eq!(key.input_keys().len(), 2);
        assert_eq!(key.input_keys()[0].key, "main");
    }
}

//! Ordered sourcing of user-supplied parameters for key evaluation.
//!
//! `read_input` consults, in order: named stored inputs matching the input
//! key, positional ("free") stored inputs, and finally an interactive
//! prompt when interactive mode is on. A validator-rejected candidate is
//! skipped; the prompt re-asks until validated or cancelled. Consumed
//! inputs are never reused within the same top-level evaluation.

use std::sync::atomic::Ordering;

use crate::evaluator::{lock, Eval};

#[derive(Debug, Clone)]
pub(crate) struct InputEntry {
    key: Option<String>,
    text: String,
    consumed: bool,
}

/// The stack of inputs available to the current evaluation. Entries pushed
/// by nested `evaluate_with_inputs` calls are dropped when those calls
/// unwind.
#[derive(Debug, Default)]
pub(crate) struct InputStore {
    entries: Vec<InputEntry>,
}

impl InputStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub(crate) fn push_entries(&mut self, inputs: Vec<(Option<String>, String)>) {
        for (key, text) in inputs {
            self.entries.push(InputEntry {
                key,
                text,
                consumed: false,
            });
        }
    }

    /// Unconsumed candidate texts for `input_key`: named matches first,
    /// then free inputs, each in declaration order, as `(index, text)`.
    fn candidates(&self, input_key: &str) -> Vec<(usize, String)> {
        let named = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.consumed && e.key.as_deref() == Some(input_key));
        let free = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.consumed && e.key.is_none());
        named
            .chain(free)
            .map(|(i, e)| (i, e.text.clone()))
            .collect()
    }

    fn consume(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.consumed = true;
        }
    }
}

impl Eval<'_> {
    /// Read one input for `input_key`, validating candidates in order.
    ///
    /// Returns `Ok(None)` when no stored candidate validates and the
    /// interactive prompt is unavailable or cancelled.
    pub fn read_input<V>(
        &mut self,
        input_key: &str,
        prompt: &str,
        validator: impl Fn(&str) -> Result<V, String>,
    ) -> miette::Result<Option<V>> {
        let candidates = lock(&self.evaluator().inner().inputs).candidates(input_key);

        for (index, text) in candidates {
            match validator(&text) {
                Ok(value) => {
                    lock(&self.evaluator().inner().inputs).consume(index);
                    return Ok(Some(value));
                }
                Err(reason) => {
                    tracing::debug!("input '{text}' rejected for {input_key}: {reason}");
                }
            }
        }

        if !self.evaluator().inner().interactive.load(Ordering::SeqCst) {
            return Ok(None);
        }

        loop {
            let typed: Result<String, _> = dialoguer::Input::new()
                .with_prompt(format!("{prompt} ({input_key})"))
                .allow_empty(true)
                .interact_text();
            match typed {
                Ok(text) if text.is_empty() => return Ok(None),
                Ok(text) => match validator(&text) {
                    Ok(value) => return Ok(Some(value)),
                    Err(reason) => eprintln!("Invalid input: {reason}"),
                },
                Err(_) => return Ok(None),
            }
        }
    }
}

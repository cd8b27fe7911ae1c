//! Merge strategies for conflicting archive entries.

use crate::source::Candidate;

/// How to resolve a group of entries sharing one final path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Keep the entry from the earliest classpath element.
    First,
    /// Keep the entry from the latest classpath element.
    Last,
    /// Join all entries, newline-separated; for text-like service files.
    Concatenate,
    /// Refuse the conflict and abort the assembly.
    Fail,
    /// Drop the path from the output entirely.
    Discard,
}

/// Chooses a strategy per conflicting path.
pub type StrategyChooser = dyn Fn(&str) -> MergeStrategy + Send + Sync;

/// The default chooser: every unexpected conflict is an error.
pub fn no_conflict_chooser() -> Box<StrategyChooser> {
    Box::new(|_| MergeStrategy::Fail)
}

/// A chooser with the conventional jar rules: `META-INF/services/*` files
/// concatenate, `META-INF/MANIFEST.MF` takes the first, everything else
/// fails.
pub fn jar_chooser() -> Box<StrategyChooser> {
    Box::new(|path| {
        if path.starts_with("META-INF/services/") {
            MergeStrategy::Concatenate
        } else if path == "META-INF/MANIFEST.MF" {
            MergeStrategy::First
        } else {
            MergeStrategy::Fail
        }
    })
}

/// Concatenate candidate contents in classpath order, making sure each
/// part ends with a newline so service-file entries stay line-separated.
pub fn concatenate(group: &[Candidate]) -> Vec<u8> {
    let mut merged = Vec::new();
    for candidate in group {
        merged.extend_from_slice(&candidate.data);
        if !candidate.data.ends_with(b"\n") {
            merged.push(b'\n');
        }
    }
    merged
}

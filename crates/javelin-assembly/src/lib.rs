//! Fat-archive assembly: flatten an ordered list of classpath entries
//! (directories and archives) into a single deterministic archive, with
//! path renaming, per-path merge strategies, and map filtering.

pub mod archive;
pub mod merge;
pub mod source;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use javelin_util::errors::JavelinError;

use merge::{MergeStrategy, StrategyChooser};
use source::{enumerate, AssemblySource, Candidate};

/// Configuration of one assembly run.
pub struct AssemblyOptions {
    /// Maps each internal path to its final location (identity by default;
    /// prefix relocation for shading).
    pub rename: Option<Box<dyn Fn(&str) -> String + Send + Sync>>,
    /// Applied to the resolved map; paths returning `false` are dropped
    /// (e.g. signature files).
    pub filter: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
    /// Chooses the merge strategy per conflicting path. The default refuses
    /// every conflict.
    pub strategy: Box<StrategyChooser>,
    /// Raw bytes written before the archive itself, for self-executing
    /// archives with a shell header.
    pub prepend: Option<Vec<u8>>,
    pub compress: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            rename: None,
            filter: None,
            strategy: merge::no_conflict_chooser(),
            prepend: None,
            compress: true,
        }
    }
}

/// Assemble `sources` into a single archive at `output`.
///
/// The output is byte-stable for identical inputs: entries are sorted by
/// internal path and timestamps are normalized. On failure no partial
/// output file is left behind.
pub fn assemble(
    sources: &[AssemblySource],
    options: &AssemblyOptions,
    output: &Path,
) -> miette::Result<()> {
    let mut candidates = Vec::new();
    for source in sources {
        candidates.extend(enumerate(source)?);
    }

    if let Some(ref rename) = options.rename {
        for candidate in &mut candidates {
            candidate.path = rename(&candidate.path);
        }
    }

    let resolved = resolve_conflicts(candidates, &options.strategy)?;

    let filtered: BTreeMap<String, Vec<u8>> = match options.filter {
        Some(ref filter) => resolved
            .into_iter()
            .filter(|(path, _)| filter(path))
            .collect(),
        None => resolved,
    };

    archive::write(output, &filtered, options.prepend.as_deref(), options.compress)
}

/// Group candidates by final path and resolve each conflict group.
///
/// An `own` candidate (the project's outputs) always wins a tie against a
/// library candidate at the same path, regardless of input order; the
/// strategy only sees what remains.
fn resolve_conflicts(
    candidates: Vec<Candidate>,
    strategy: &StrategyChooser,
) -> miette::Result<BTreeMap<String, Vec<u8>>> {
    let mut groups: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        groups.entry(candidate.path.clone()).or_default().push(candidate);
    }

    let mut resolved = BTreeMap::new();
    for (path, mut group) in groups {
        if group.len() > 1 && group.iter().any(|c| c.own) {
            group.retain(|c| c.own);
        }
        if group.len() > 1 && group.windows(2).all(|w| w[0].data == w[1].data) {
            group.truncate(1);
        }

        if group.len() == 1 {
            if let Some(candidate) = group.pop() {
                resolved.insert(path, candidate.data);
            }
            continue;
        }

        match strategy(&path) {
            MergeStrategy::First => {
                if let Some(first) = group.into_iter().next() {
                    resolved.insert(path, first.data);
                }
            }
            MergeStrategy::Last => {
                if let Some(last) = group.into_iter().last() {
                    resolved.insert(path, last.data);
                }
            }
            MergeStrategy::Concatenate => {
                resolved.insert(path, merge::concatenate(&group));
            }
            MergeStrategy::Discard => {}
            MergeStrategy::Fail => {
                let sources: Vec<String> = group
                    .iter()
                    .map(|c| c.source.display().to_string())
                    .collect();
                return Err(JavelinError::Assembly {
                    message: format!(
                        "conflicting entries for '{path}' from: {}",
                        sources.join(", ")
                    ),
                }
                .into());
            }
        }
    }
    Ok(resolved)
}

/// Convenience: build sources from classpath entries, marking the first
/// `own_count` entries as the project's own.
pub fn sources_from_classpath(
    entries: &[PathBuf],
    own_count: usize,
) -> Vec<AssemblySource> {
    entries
        .iter()
        .enumerate()
        .map(|(i, path)| AssemblySource {
            root: path.clone(),
            own: i < own_count,
            extract: true,
        })
        .collect()
}

//! Enumeration of assembly inputs: directory trees and zip-like archives.

use std::io::Read;
use std::path::{Path, PathBuf};

use javelin_util::errors::JavelinError;

/// One classpath entry feeding the assembly.
#[derive(Debug, Clone)]
pub struct AssemblySource {
    /// A directory tree or an archive file.
    pub root: PathBuf,
    /// True for the project's own outputs (and aggregated ones); own
    /// entries win path ties against library entries.
    pub own: bool,
    /// Whether to descend into archives; a non-extracted archive becomes a
    /// single entry under its file name.
    pub extract: bool,
}

/// A candidate archive entry: where it came from, where it goes, its bytes.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source: PathBuf,
    /// Internal path within the output archive, `/`-separated.
    pub path: String,
    pub own: bool,
    pub data: Vec<u8>,
}

/// Enumerate one source into candidates, in a deterministic order.
pub fn enumerate(source: &AssemblySource) -> miette::Result<Vec<Candidate>> {
    if source.root.is_dir() {
        let mut candidates = Vec::new();
        walk_dir(&source.root, &source.root, source.own, &mut candidates)?;
        return Ok(candidates);
    }
    if !source.root.is_file() {
        return Err(JavelinError::Assembly {
            message: format!("classpath entry does not exist: {}", source.root.display()),
        }
        .into());
    }

    if source.extract {
        enumerate_archive(source)
    } else {
        let name = source
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "entry".to_string());
        let data = std::fs::read(&source.root).map_err(JavelinError::Io)?;
        Ok(vec![Candidate {
            source: source.root.clone(),
            path: name,
            own: source.own,
            data,
        }])
    }
}

fn walk_dir(
    root: &Path,
    current: &Path,
    own: bool,
    out: &mut Vec<Candidate>,
) -> miette::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(current)
        .map_err(JavelinError::Io)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            walk_dir(root, &entry, own, out)?;
        } else {
            let rel = entry
                .strip_prefix(root)
                .map_err(|_| JavelinError::Assembly {
                    message: format!("entry escaped its root: {}", entry.display()),
                })?;
            let path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let data = std::fs::read(&entry).map_err(JavelinError::Io)?;
            out.push(Candidate {
                source: root.to_path_buf(),
                path,
                own,
                data,
            });
        }
    }
    Ok(())
}

fn enumerate_archive(source: &AssemblySource) -> miette::Result<Vec<Candidate>> {
    let file = std::fs::File::open(&source.root).map_err(JavelinError::Io)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| JavelinError::Assembly {
        message: format!("failed to open archive {}: {e}", source.root.display()),
    })?;

    let mut candidates = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| JavelinError::Assembly {
            message: format!("failed to read {}: {e}", source.root.display()),
        })?;
        if entry.is_dir() {
            continue;
        }
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data).map_err(JavelinError::Io)?;
        candidates.push(Candidate {
            source: source.root.clone(),
            path: entry.name().to_string(),
            own: source.own,
            data,
        });
    }
    // Archive order is zip-internal; sort for deterministic grouping.
    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(candidates)
}

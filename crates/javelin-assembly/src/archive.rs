//! Deterministic archive emission.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use javelin_util::errors::JavelinError;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Write the resolved entry map as a zip archive at `output`.
///
/// Entries are written in path order with normalized timestamps, so the
/// result is byte-stable for identical inputs. The archive is built in a
/// temp file and persisted only on success, so a failing run leaves no
/// partial output. `prepend` bytes, when given, precede the archive data
/// (self-executing archives); zip readers locate the central directory from
/// the end of the file and tolerate the prefix.
pub fn write(
    output: &Path,
    entries: &BTreeMap<String, Vec<u8>>,
    prepend: Option<&[u8]>,
    compress: bool,
) -> miette::Result<()> {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(JavelinError::Io)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(JavelinError::Io)?;
    if let Some(prefix) = prepend {
        temp.write_all(prefix).map_err(JavelinError::Io)?;
    }

    let method = if compress {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    let options = SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut writer = zip::ZipWriter::new(temp.as_file_mut());
    for (path, data) in entries {
        writer
            .start_file(path.as_str(), options)
            .map_err(|e| JavelinError::Assembly {
                message: format!("failed to start entry '{path}': {e}"),
            })?;
        writer.write_all(data).map_err(JavelinError::Io)?;
    }
    writer.finish().map_err(|e| JavelinError::Assembly {
        message: format!("failed to finish archive: {e}"),
    })?;

    temp.persist(output).map_err(|e| JavelinError::Assembly {
        message: format!("failed to move archive into place: {e}"),
    })?;
    tracing::debug!("wrote {} entries to {}", entries.len(), output.display());
    Ok(())
}

/// Read every file entry of an archive into a map, for inspection and
/// round-trip tests.
pub fn read_entries(path: &Path) -> miette::Result<BTreeMap<String, Vec<u8>>> {
    use std::io::Read;

    let file = std::fs::File::open(path).map_err(JavelinError::Io)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| JavelinError::Assembly {
        message: format!("failed to open archive {}: {e}", path.display()),
    })?;

    let mut entries = BTreeMap::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| JavelinError::Assembly {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        if entry.is_dir() {
            continue;
        }
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data).map_err(JavelinError::Io)?;
        entries.insert(entry.name().to_string(), data);
    }
    Ok(entries)
}

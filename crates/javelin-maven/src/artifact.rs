//! On-disk artifacts with lazily loaded, retained content.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use javelin_util::errors::JavelinError;

/// A resolved artifact file.
///
/// `data()` reads the file once on first access and retains the bytes for
/// the life of the value; clones made before the first read share nothing,
/// clones made after share the loaded buffer.
#[derive(Debug, Clone)]
pub struct ArtifactPath {
    pub path: PathBuf,
    /// Name of the repository the artifact was resolved from.
    pub repository: Option<String>,
    /// Upstream URL the bytes were fetched from; `None` for cache hits and
    /// local repositories.
    pub origin_url: Option<String>,
    pub from_cache: bool,
    data: OnceLock<Arc<Vec<u8>>>,
}

impl ArtifactPath {
    pub fn new(
        path: PathBuf,
        repository: Option<String>,
        origin_url: Option<String>,
        from_cache: bool,
    ) -> Self {
        Self {
            path,
            repository,
            origin_url,
            from_cache,
            data: OnceLock::new(),
        }
    }

    /// The artifact's content, loaded from disk on first access.
    pub fn data(&self) -> miette::Result<Arc<Vec<u8>>> {
        if let Some(data) = self.data.get() {
            return Ok(data.clone());
        }
        let bytes = std::fs::read(&self.path).map_err(JavelinError::Io)?;
        Ok(self.data.get_or_init(|| Arc::new(bytes)).clone())
    }
}

//! The write-through artifact fetcher.
//!
//! A repository with a `cache` is a remote mirrored into a local directory:
//! reads are served from the cache when present (and fresh, for snapshot
//! files), misses go upstream, are checksum-verified, and are written into
//! the cache under a per-coordinate lock. A repository with a `file:` URL
//! and no cache is read in place. A remote without a cache keeps its
//! downloads in a scratch directory so [`ArtifactPath`]s always point at
//! real files.

use std::path::{Path, PathBuf};

use reqwest::Client;

use javelin_core::dependency::DependencyId;
use javelin_core::repository::Repository;
use javelin_util::errors::JavelinError;
use javelin_util::lock::CoordinateLock;
use javelin_util::{fs as jfs, hash};

use crate::artifact::ArtifactPath;
use crate::checksum;
use crate::download;
use crate::metadata;
use crate::pom::{self, Pom};

/// Fetches files from repositories with cache write-through.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    offline: bool,
    scratch: PathBuf,
}

impl Fetcher {
    pub fn new(offline: bool) -> miette::Result<Self> {
        Ok(Self {
            client: download::build_client()?,
            offline,
            scratch: std::env::temp_dir().join("javelin-artifacts"),
        })
    }

    /// Redirect cache-less remote downloads into `dir`.
    pub fn with_scratch(mut self, dir: PathBuf) -> Self {
        self.scratch = dir;
        self
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    /// Fetch the POM for `id` from one repository.
    pub async fn fetch_pom(
        &self,
        repo: &Repository,
        id: &DependencyId,
    ) -> miette::Result<Option<(Pom, ArtifactPath)>> {
        let version = self.concrete_version(repo, id).await?;
        let filename = format!("{}-{}.pom", id.name, version);
        let Some(artifact) = self.fetch_file(repo, id, &filename).await? else {
            return Ok(None);
        };
        let bytes = artifact.data()?;
        let xml = String::from_utf8_lossy(&bytes).to_string();
        let parsed = pom::parse_pom(&xml)?;
        Ok(Some((parsed, artifact)))
    }

    /// Fetch the artifact file for `id` with the given extension.
    pub async fn fetch_artifact(
        &self,
        repo: &Repository,
        id: &DependencyId,
        extension: &str,
    ) -> miette::Result<Option<ArtifactPath>> {
        let version = self.concrete_version(repo, id).await?;
        let filename = Repository::artifact_filename(id, &version, extension);
        self.fetch_file(repo, id, &filename).await
    }

    /// The version string used in this repository's filenames for `id`.
    ///
    /// Releases use the coordinate version as-is. Snapshots consult, in
    /// order: the id's `snapshot_version_override`, the repository's
    /// version-level `maven-metadata.xml` (unique snapshots), and finally
    /// the plain `-SNAPSHOT` version when no metadata is published.
    pub async fn concrete_version(
        &self,
        repo: &Repository,
        id: &DependencyId,
    ) -> miette::Result<String> {
        if !id.is_snapshot() {
            return Ok(id.version.clone());
        }

        let base = id
            .version
            .strip_suffix("-SNAPSHOT")
            .unwrap_or(&id.version)
            .to_string();

        if !id.snapshot_version_override.is_empty() {
            return Ok(format!("{base}-{}", id.snapshot_version_override));
        }

        let Some(meta_file) = self.fetch_file(repo, id, "maven-metadata.xml").await? else {
            return Ok(id.version.clone());
        };
        let bytes = meta_file.data()?;
        let meta = metadata::parse_snapshot_metadata(&String::from_utf8_lossy(&bytes))?;
        Ok(meta.concrete_version().unwrap_or_else(|| id.version.clone()))
    }

    /// Fetch a single file from `id`'s version directory in one repository,
    /// going through the repository's cache when it has one.
    pub async fn fetch_file(
        &self,
        repo: &Repository,
        id: &DependencyId,
        filename: &str,
    ) -> miette::Result<Option<ArtifactPath>> {
        if let Some(ref cache) = repo.cache {
            let Some(cache_root) = cache.file_root() else {
                return Err(JavelinError::Generic {
                    message: format!(
                        "cache repository '{}' of '{}' is not file-based",
                        cache.name, repo.name
                    ),
                }
                .into());
            };
            self.fetch_through_cache(repo, id, filename, &cache_root)
                .await
        } else if let Some(root) = repo.file_root() {
            let path = version_dir(&root, id).join(filename);
            if path.is_file() {
                Ok(Some(ArtifactPath::new(
                    path,
                    Some(repo.name.clone()),
                    None,
                    false,
                )))
            } else {
                Ok(None)
            }
        } else {
            let scratch_root = self.scratch.join(&repo.name);
            self.fetch_through_cache(repo, id, filename, &scratch_root)
                .await
        }
    }

    async fn fetch_through_cache(
        &self,
        repo: &Repository,
        id: &DependencyId,
        filename: &str,
        cache_root: &Path,
    ) -> miette::Result<Option<ArtifactPath>> {
        let cached = version_dir(cache_root, id).join(filename);
        let mutable = is_mutable(id, filename);

        if cached.is_file() && (!mutable || self.fresh(repo, &cached)) {
            tracing::debug!("cache hit: {}", cached.display());
            return Ok(Some(ArtifactPath::new(
                cached,
                Some(repo.name.clone()),
                None,
                true,
            )));
        }

        let url = repo.file_url(id, filename);
        let fetched = match download::download_bytes(&self.client, &url, self.offline).await {
            Ok(fetched) => fetched,
            Err(e) if cached.is_file() => {
                tracing::warn!("using stale {} after fetch failure: {e}", cached.display());
                return Ok(Some(ArtifactPath::new(
                    cached,
                    Some(repo.name.clone()),
                    None,
                    true,
                )));
            }
            Err(e) => return Err(e),
        };

        let Some(bytes) = fetched else {
            // Upstream says not-found; a stale copy still beats nothing.
            if cached.is_file() {
                return Ok(Some(ArtifactPath::new(
                    cached,
                    Some(repo.name.clone()),
                    None,
                    true,
                )));
            }
            return Ok(None);
        };

        checksum::verify(
            &self.client,
            &url,
            &bytes,
            repo.checksum_policy,
            self.offline,
        )
        .await?;

        let _lock = CoordinateLock::acquire(&cached)?;
        if let Some(parent) = cached.parent() {
            jfs::ensure_dir(parent).map_err(JavelinError::Io)?;
        }
        std::fs::write(&cached, &bytes).map_err(JavelinError::Io)?;
        if !filename.ends_with(".sha1") && !filename.ends_with(".sha256") && !filename.ends_with(".md5") {
            let sidecar = cached.with_file_name(format!("{filename}.sha1"));
            std::fs::write(&sidecar, hash::sha1_bytes(&bytes)).map_err(JavelinError::Io)?;
        }
        tracing::debug!("cached {url} -> {}", cached.display());

        Ok(Some(ArtifactPath::new(
            cached,
            Some(repo.name.clone()),
            Some(url),
            false,
        )))
    }

    /// Whether a cached snapshot file is still fresh per the repository's
    /// recheck interval.
    fn fresh(&self, repo: &Repository, cached: &Path) -> bool {
        if self.offline {
            return true;
        }
        match repo.snapshot_recheck_secs {
            None => true,
            Some(0) => false,
            Some(secs) => jfs::age_secs(cached).map(|age| age <= secs).unwrap_or(false),
        }
    }
}

/// Snapshot-mutable files must honor the recheck interval; everything else
/// is immutable once cached.
fn is_mutable(id: &DependencyId, filename: &str) -> bool {
    id.is_snapshot() && (filename == "maven-metadata.xml" || filename.contains("-SNAPSHOT"))
}

fn version_dir(root: &Path, id: &DependencyId) -> PathBuf {
    root.join(Repository::coordinate_path(
        &id.group,
        &id.name,
        &id.version,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_repo(root: &Path) -> Repository {
        Repository::local("fixtures", root)
    }

    fn publish(root: &Path, id: &DependencyId, filename: &str, content: &[u8]) {
        let dir = version_dir(root, id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(filename), content).unwrap();
    }

    #[tokio::test]
    async fn local_repository_reads_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "1.0");
        publish(tmp.path(), &id, "lib-1.0.jar", b"v1.0");

        let fetcher = Fetcher::new(false).unwrap();
        let repo = file_repo(tmp.path());

        let artifact = fetcher
            .fetch_artifact(&repo, &id, "jar")
            .await
            .unwrap()
            .unwrap();
        assert!(!artifact.from_cache);
        assert_eq!(&**artifact.data().unwrap(), b"v1.0");

        let missing = DependencyId::new("com.example", "lib", "9.9");
        assert!(fetcher.fetch_artifact(&repo, &missing, "jar").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cache_write_through_and_hit() {
        let upstream = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "1.0");
        publish(upstream.path(), &id, "lib-1.0.jar", b"v1.0");

        let repo = Repository::remote("up", format!("file://{}", upstream.path().display()))
            .with_cache(Repository::local("cache", cache.path()));
        let fetcher = Fetcher::new(false).unwrap();

        let first = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert!(!first.from_cache);
        assert!(version_dir(cache.path(), &id).join("lib-1.0.jar").is_file());
        assert!(version_dir(cache.path(), &id).join("lib-1.0.jar.sha1").is_file());

        let second = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert!(second.from_cache);
        assert_eq!(&**second.data().unwrap(), b"v1.0");
    }

    #[tokio::test]
    async fn release_cache_hit_survives_upstream_removal() {
        let upstream = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "1.0");
        publish(upstream.path(), &id, "lib-1.0.jar", b"v1.0");

        let repo = Repository::remote("up", format!("file://{}", upstream.path().display()))
            .with_cache(Repository::local("cache", cache.path()));

        let fetcher = Fetcher::new(false).unwrap();
        fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();

        // Upstream vanishes; the cache still answers.
        std::fs::remove_dir_all(upstream.path().join("com")).unwrap();
        let offline_fetcher = Fetcher::new(true).unwrap();
        let artifact = offline_fetcher
            .fetch_artifact(&repo, &id, "jar")
            .await
            .unwrap()
            .unwrap();
        assert!(artifact.from_cache);
        assert_eq!(&**artifact.data().unwrap(), b"v1.0");
    }

    #[tokio::test]
    async fn snapshot_recheck_zero_refetches() {
        let upstream = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "1.0-SNAPSHOT");
        publish(upstream.path(), &id, "lib-1.0-SNAPSHOT.jar", b"build-1");

        let repo = Repository::remote("up", format!("file://{}", upstream.path().display()))
            .with_cache(Repository::local("cache", cache.path()))
            .with_snapshot_recheck(Some(0));
        let fetcher = Fetcher::new(false).unwrap();

        let first = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert_eq!(&**first.data().unwrap(), b"build-1");

        publish(upstream.path(), &id, "lib-1.0-SNAPSHOT.jar", b"build-2");
        let second = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert_eq!(&**second.data().unwrap(), b"build-2");
    }

    #[tokio::test]
    async fn snapshot_recheck_daily_keeps_cached_build() {
        let upstream = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "1.0-SNAPSHOT");
        publish(upstream.path(), &id, "lib-1.0-SNAPSHOT.jar", b"build-1");

        let repo = Repository::remote("up", format!("file://{}", upstream.path().display()))
            .with_cache(Repository::local("cache", cache.path()))
            .with_snapshot_recheck(Some(24 * 60 * 60));
        let fetcher = Fetcher::new(false).unwrap();

        fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        publish(upstream.path(), &id, "lib-1.0-SNAPSHOT.jar", b"build-2");

        let second = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert!(second.from_cache);
        assert_eq!(&**second.data().unwrap(), b"build-1");
    }

    #[tokio::test]
    async fn snapshot_recheck_never_keeps_first_success() {
        let upstream = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "1.0-SNAPSHOT");
        publish(upstream.path(), &id, "lib-1.0-SNAPSHOT.jar", b"build-1");

        let repo = Repository::remote("up", format!("file://{}", upstream.path().display()))
            .with_cache(Repository::local("cache", cache.path()))
            .with_snapshot_recheck(None);
        let fetcher = Fetcher::new(false).unwrap();

        fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        publish(upstream.path(), &id, "lib-1.0-SNAPSHOT.jar", b"build-2");

        let second = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert!(second.from_cache);
        assert_eq!(&**second.data().unwrap(), b"build-1");
    }

    #[tokio::test]
    async fn unique_snapshot_resolved_from_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "2.0-SNAPSHOT");
        publish(
            tmp.path(),
            &id,
            "maven-metadata.xml",
            br#"<?xml version="1.0"?>
<metadata>
  <groupId>com.example</groupId>
  <artifactId>lib</artifactId>
  <version>2.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20190101.123456</timestamp>
      <buildNumber>2</buildNumber>
    </snapshot>
  </versioning>
</metadata>"#,
        );
        publish(tmp.path(), &id, "lib-2.0-20190101.123456-2.jar", b"unique-2");

        let fetcher = Fetcher::new(false).unwrap();
        let repo = file_repo(tmp.path());

        let artifact = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert_eq!(&**artifact.data().unwrap(), b"unique-2");
    }

    #[tokio::test]
    async fn snapshot_override_pins_build() {
        let tmp = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "2.0-SNAPSHOT")
            .with_snapshot_version("20190101.123456-1");
        publish(tmp.path(), &id, "lib-2.0-20190101.123456-1.jar", b"unique-1");
        publish(tmp.path(), &id, "lib-2.0-20190101.123456-2.jar", b"unique-2");

        let fetcher = Fetcher::new(false).unwrap();
        let repo = file_repo(tmp.path());

        let artifact = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert_eq!(&**artifact.data().unwrap(), b"unique-1");
    }

    #[tokio::test]
    async fn snapshot_without_metadata_uses_plain_name() {
        let tmp = tempfile::tempdir().unwrap();
        let id = DependencyId::new("com.example", "lib", "1.0-SNAPSHOT");
        publish(tmp.path(), &id, "lib-1.0-SNAPSHOT.jar", b"plain");

        let fetcher = Fetcher::new(false).unwrap();
        let repo = file_repo(tmp.path());

        let artifact = fetcher.fetch_artifact(&repo, &id, "jar").await.unwrap().unwrap();
        assert_eq!(&**artifact.data().unwrap(), b"plain");
    }
}

//! Raw file retrieval from repositories: HTTP with retries, `file:` URLs,
//! offline mode.

use std::time::Duration;

use reqwest::Client;

use javelin_util::errors::JavelinError;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Build a shared reqwest client for repository downloads.
pub fn build_client() -> miette::Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("javelin/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            JavelinError::Network {
                message: format!("Failed to create HTTP client: {e}"),
            }
            .into()
        })
}

/// Download raw bytes from a URL.
///
/// `file:` URLs are read from disk. HTTP URLs are retried on server errors
/// and connection failures. Returns `Ok(None)` for a definitive "not found"
/// (404, missing file, or any remote URL while offline).
pub async fn download_bytes(
    client: &Client,
    url: &str,
    offline: bool,
) -> miette::Result<Option<Vec<u8>>> {
    if let Some(path) = file_url_path(url) {
        return match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(JavelinError::Io(e).into()),
        };
    }

    if offline {
        tracing::debug!("offline: skipping {url}");
        return Ok(None);
    }

    let mut last_err = String::new();

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            tokio::time::sleep(RETRY_DELAY * attempt).await;
        }

        match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if status.is_server_error() {
                    last_err = format!("HTTP {status} from {url}");
                    continue;
                }
                if !status.is_success() {
                    return Err(JavelinError::Network {
                        message: format!("HTTP {status} fetching {url}"),
                    }
                    .into());
                }

                let total = resp.content_length().unwrap_or(0);
                let bar = (total > 100_000).then(|| {
                    let name = url.rsplit('/').next().unwrap_or(url);
                    javelin_util::progress::download_bar(total, name)
                });

                let bytes = resp.bytes().await.map_err(|e| JavelinError::Network {
                    message: format!("Failed to read response from {url}: {e}"),
                })?;
                if let Some(bar) = bar {
                    bar.set_position(bytes.len() as u64);
                    bar.finish_and_clear();
                }
                return Ok(Some(bytes.to_vec()));
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                last_err = format!("{e}");
                continue;
            }
            Err(e) => {
                return Err(JavelinError::Network {
                    message: format!("Request to {url} failed: {e}"),
                }
                .into());
            }
        }
    }

    Err(JavelinError::Network {
        message: format!("Failed after {MAX_RETRIES} retries for {url}: {last_err}"),
    }
    .into())
}

/// Download a text file (POM, metadata, checksum sidecar).
pub async fn download_text(
    client: &Client,
    url: &str,
    offline: bool,
) -> miette::Result<Option<String>> {
    match download_bytes(client, url, offline).await? {
        Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).to_string())),
        None => Ok(None),
    }
}

/// Filesystem path for a `file:` URL, `None` for other schemes.
fn file_url_path(url: &str) -> Option<std::path::PathBuf> {
    url.strip_prefix("file://")
        .or_else(|| url.strip_prefix("file:"))
        .map(std::path::PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_paths() {
        assert_eq!(
            file_url_path("file:///tmp/repo/a.jar").unwrap(),
            std::path::PathBuf::from("/tmp/repo/a.jar")
        );
        assert_eq!(
            file_url_path("file:/tmp/repo/a.jar").unwrap(),
            std::path::PathBuf::from("/tmp/repo/a.jar")
        );
        assert!(file_url_path("https://repo.example.com/a.jar").is_none());
    }

    #[tokio::test]
    async fn file_scheme_reads_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.txt");
        std::fs::write(&path, b"payload").unwrap();
        let client = build_client().unwrap();

        let url = format!("file://{}", path.display());
        let bytes = download_bytes(&client, &url, false).await.unwrap();
        assert_eq!(bytes.unwrap(), b"payload");

        let missing = format!("file://{}", tmp.path().join("nope").display());
        assert!(download_bytes(&client, &missing, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn offline_skips_remote() {
        let client = build_client().unwrap();
        let result = download_bytes(&client, "https://repo.invalid/a.jar", true)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn offline_still_reads_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.txt");
        std::fs::write(&path, b"cached").unwrap();
        let client = build_client().unwrap();

        let url = format!("file://{}", path.display());
        let bytes = download_bytes(&client, &url, true).await.unwrap();
        assert_eq!(bytes.unwrap(), b"cached");
    }
}

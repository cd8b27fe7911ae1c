//! Checksum sidecar verification (SHA-1, SHA-256, MD5) under a policy.

use reqwest::Client;

use javelin_core::repository::ChecksumPolicy;
use javelin_util::errors::JavelinError;
use javelin_util::hash;

use crate::download;

/// Verify downloaded data against sidecar files published next to it.
///
/// Tries the Maven-2 default SHA-1 sidecar first, then SHA-256, then MD5.
/// A missing sidecar is logged and accepted. A mismatch is an error under
/// [`ChecksumPolicy::Fail`], a warning under [`ChecksumPolicy::Warn`], and
/// invisible under [`ChecksumPolicy::Ignore`].
pub async fn verify(
    client: &Client,
    file_url: &str,
    data: &[u8],
    policy: ChecksumPolicy,
    offline: bool,
) -> miette::Result<()> {
    if policy == ChecksumPolicy::Ignore {
        return Ok(());
    }

    let algorithms: [(&str, fn(&[u8]) -> String); 3] = [
        ("SHA-1", hash::sha1_bytes),
        ("SHA-256", hash::sha256_bytes),
        ("MD5", hash::md5_bytes),
    ];

    for (algo, digest) in algorithms {
        let sidecar_url = format!("{file_url}.{}", sidecar_extension(algo));
        let Some(expected) = download::download_text(client, &sidecar_url, offline).await? else {
            continue;
        };
        let expected = extract_hash(&expected);
        let actual = digest(data);
        return check(&actual, &expected, algo, file_url, policy);
    }

    tracing::warn!("No checksum sidecar found for {file_url}");
    Ok(())
}

fn sidecar_extension(algo: &str) -> &'static str {
    match algo {
        "SHA-1" => "sha1",
        "SHA-256" => "sha256",
        _ => "md5",
    }
}

fn check(
    actual: &str,
    expected: &str,
    algo: &str,
    url: &str,
    policy: ChecksumPolicy,
) -> miette::Result<()> {
    if actual.eq_ignore_ascii_case(expected) {
        tracing::debug!("{algo} ok for {url}");
        return Ok(());
    }
    let message = format!("{algo} mismatch for {url}: expected {expected}, got {actual}");
    match policy {
        ChecksumPolicy::Warn => {
            tracing::warn!("{message}");
            Ok(())
        }
        _ => Err(JavelinError::Checksum { message }.into()),
    }
}

/// Extract the hex hash from a checksum file.
///
/// Maven checksum files may contain just the hash, or `hash  filename`.
fn extract_hash(content: &str) -> String {
    content.split_whitespace().next().unwrap_or("").to_string()
}

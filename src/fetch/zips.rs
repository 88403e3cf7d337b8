use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

use super::{with_retry, RetryPolicy};

/// Local file name for `url`: its last path segment.
pub fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .unwrap_or("download.zip")
        .to_string()
}

/// Download `url_str` into `dest_dir` under its original file name.
///
/// With `reuse_existing`, a non-empty file already at the destination is returned
/// without touching the network. Writes go through a temp file.
#[instrument(level = "info", skip(client, dest_dir, retry))]
pub async fn download_file(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
    retry: RetryPolicy,
    reuse_existing: bool,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url_str).with_context(|| format!("parsing {}", url_str))?;
    let dest_path = dest_dir.join(file_name_for(&url));

    if reuse_existing {
        if let Ok(meta) = fs::metadata(&dest_path).await {
            if meta.is_file() && meta.len() > 0 {
                info!(path = %dest_path.display(), "already downloaded");
                return Ok(dest_path);
            }
        }
    }

    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating {:?}", dest_dir))?;

    let bytes = with_retry(url.as_str(), retry, || async {
        let resp = client.get(url.as_str()).send().await?.error_for_status()?;
        Ok::<_, anyhow::Error>(resp.bytes().await?)
    })
    .await?;

    let temp_path = dest_path.with_extension("part");
    fs::write(&temp_path, &bytes)
        .await
        .with_context(|| format!("writing {:?}", temp_path))?;
    fs::rename(&temp_path, &dest_path)
        .await
        .with_context(|| format!("moving {:?} into place", temp_path))?;

    info!(path = %dest_path.display(), bytes = bytes.len(), "downloaded");
    Ok(dest_path)
}

/// Quarterly archives are immutable once published, so existing files are reused.
pub async fn download_zip(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
    retry: RetryPolicy,
) -> Result<PathBuf> {
    download_file(client, url_str, dest_dir, retry, true).await
}

// src/fetch/mod.rs

use anyhow::{Context, Result};
use futures::{stream::FuturesUnordered, StreamExt};
use glob::glob;
use reqwest::Client;
use std::{
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::time::sleep;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Config;

pub mod urls;
pub mod zips;

/// Exponential backoff at the download boundary: `initial_backoff_ms * 2^(attempt-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

pub(crate) async fn with_retry<T, F, Fut>(label: &str, retry: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempts < retry.max_retries => {
                attempts += 1;
                let backoff = retry.initial_backoff_ms * 2u64.pow(attempts - 1);
                warn!(op = %label, attempt = attempts, delay_ms = backoff, error = %e, "retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                error!(op = %label, error = %e, "exhausted retries");
                return Err(e);
            }
        }
    }
}

pub(crate) async fn get_text_with_retry(client: &Client, url: &Url, retry: RetryPolicy) -> Result<String> {
    with_retry(url.as_str(), retry, || async {
        client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("non-success status {}", url))?
            .text()
            .await
            .with_context(|| format!("reading text from {}", url))
    })
    .await
}

/// Download the newest `config.quarters` archives into `config.download_dir`.
///
/// A failed download is logged and left out; the returned paths are sorted.
pub async fn fetch_latest(client: &Client, config: &Config) -> Result<Vec<PathBuf>> {
    let retry = config.retry_policy();
    let listed =
        urls::list_quarter_archives(client, &config.base_url, config.quarters, retry).await?;
    let picked = urls::latest_quarters(listed, config.quarters);
    info!(
        quarters = ?picked.iter().map(|a| a.quarter.to_string()).collect::<Vec<_>>(),
        "selected quarters"
    );

    let max_concurrency = config.max_concurrent_downloads.max(1);
    let mut tasks = FuturesUnordered::new();
    let mut paths = Vec::with_capacity(picked.len());

    for archive in picked {
        let dest = config.download_dir.clone();
        tasks.push(async move {
            let res = zips::download_zip(client, archive.url.as_str(), &dest, retry).await;
            (archive, res)
        });

        // throttle concurrency
        if tasks.len() >= max_concurrency {
            if let Some(done) = tasks.next().await {
                collect_download(done, &mut paths);
            }
        }
    }
    while let Some(done) = tasks.next().await {
        collect_download(done, &mut paths);
    }

    paths.sort();
    Ok(paths)
}

fn collect_download(done: (urls::QuarterArchive, Result<PathBuf>), paths: &mut Vec<PathBuf>) {
    match done {
        (_, Ok(path)) => paths.push(path),
        (archive, Err(e)) => error!(quarter = %archive.quarter, url = %archive.url, error = %e, "download failed"),
    }
}

/// Fetch the operator registry CSV; it is refreshed upstream, so never reused.
pub async fn download_operator_registry(
    client: &Client,
    url: &str,
    dest_dir: &Path,
    retry: RetryPolicy,
) -> Result<PathBuf> {
    zips::download_file(client, url, dest_dir, retry, false).await
}

/// `*.zip` files already in `dir`, sorted by path.
pub fn discover_local(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.[zZ][iI][pP]", dir.display());
    let mut paths = Vec::new();
    for entry in glob(&pattern).with_context(|| format!("bad glob {}", pattern))? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "unreadable path while scanning archives"),
        }
    }
    paths.sort();
    Ok(paths)
}

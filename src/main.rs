use anyhow::{Context, Result};
use ansscraper::{
    config::Config,
    fetch,
    operators::load_operators_file,
    pipeline::{archive_name, Pipeline},
    process::Normalizer,
    sink::DirectorySink,
};
use reqwest::Client;
use std::{fs, path::PathBuf};
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ansscraper=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configure dirs ───────────────────────────────────────────
    let config = Config::load()?;
    info!(?config, "configuration");
    for d in [&config.download_dir, &config.output_dir] {
        fs::create_dir_all(d).with_context(|| format!("creating {:?}", d))?;
    }
    let client = Client::new();
    let sink = DirectorySink::new(&config.output_dir)?;

    // ─── 3) collect quarterly archives ───────────────────────────────
    let archives: Vec<PathBuf> = if config.offline {
        fetch::discover_local(&config.download_dir)?
    } else {
        match fetch::fetch_latest(&client, &config).await {
            Ok(paths) => paths,
            Err(e) => {
                warn!(error = %e, "listing failed; falling back to local archives");
                fetch::discover_local(&config.download_dir)?
            }
        }
    };
    info!(
        archives = ?archives.iter().map(|p| archive_name(p)).collect::<Vec<_>>(),
        "archives to ingest"
    );

    // ─── 4) operator registry ────────────────────────────────────────
    if !config.offline {
        match fetch::download_operator_registry(
            &client,
            &config.operators_url,
            &config.download_dir,
            config.retry_policy(),
        )
        .await
        {
            Ok(path) => {
                let stored = load_operators_file(&path, config.cnpj_padding)
                    .and_then(|load| sink.store_operators(&load));
                if let Err(e) = stored {
                    error!(error = %e, "operator registry skipped");
                }
            }
            Err(e) => warn!(error = %e, "operator registry unavailable"),
        }
    }

    // ─── 5) normalize off the async runtime ──────────────────────────
    let start = Instant::now();
    let pipeline = Pipeline::new(Normalizer::new(config.normalize_options()));
    let parallel = config.parallel;
    let run = tokio::task::spawn_blocking(move || {
        if parallel {
            pipeline.run_parallel(&archives)
        } else {
            pipeline.run(&archives)
        }
    })
    .await?;

    // ─── 6) hand off to storage ──────────────────────────────────────
    sink.store_run(&run)?;
    let r = &run.report;
    if r.is_empty_result() {
        warn!(
            skipped = r.files_skipped,
            quarantined = r.files_quarantined,
            "no archive produced usable data"
        );
    }
    info!(
        processed = r.files_processed,
        skipped = r.files_skipped,
        files_quarantined = r.files_quarantined,
        rows = r.rows_ingested,
        rows_quarantined = r.rows_quarantined,
        rows_filtered = r.rows_filtered,
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(())
}

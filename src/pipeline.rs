// src/pipeline.rs

use rayon::prelude::*;
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info, instrument, warn};

use crate::{
    error::IngestError,
    model::{NormalizedRecord, QuarantinedRow},
    process::{decode::TextEncoding, extract, Normalized, Normalizer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStatus {
    Processed,
    /// The archive itself was unusable.
    Skipped,
    /// The archive opened but its payload was rejected as a whole.
    Quarantined,
}

/// What happened to one input archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveOutcome {
    pub archive: String,
    pub status: ArchiveStatus,
    pub entry: Option<String>,
    pub encoding: Option<TextEncoding>,
    pub rows_ingested: u64,
    pub rows_quarantined: u64,
    pub rows_filtered: u64,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub files_processed: u64,
    pub files_skipped: u64,
    pub files_quarantined: u64,
    pub rows_ingested: u64,
    pub rows_quarantined: u64,
    pub rows_filtered: u64,
    pub archives: Vec<ArchiveOutcome>,
}

impl RunReport {
    /// No archive produced a parseable payload.
    pub fn is_empty_result(&self) -> bool {
        self.files_processed == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub records: Vec<NormalizedRecord>,
    pub quarantined: Vec<QuarantinedRow>,
    pub report: RunReport,
}

/// Result of one archive, before merging.
struct ArchiveResult {
    name: String,
    entry: Option<String>,
    result: Result<Normalized, IngestError>,
}

/// Base name of an archive path, used as the provenance tag.
pub fn archive_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract + normalize each archive and merge the results in input order.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    normalizer: Normalizer,
}

impl Pipeline {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    #[instrument(level = "info", skip_all, fields(archives = archives.len()))]
    pub fn run(&self, archives: &[PathBuf]) -> RunOutput {
        let start = Instant::now();
        let mut out = RunOutput::default();
        for path in archives {
            merge(&mut out, self.process_archive(path));
        }
        info!(elapsed = ?start.elapsed(), "run complete");
        out
    }

    /// Same output as [`Pipeline::run`]; archives are worked on a rayon pool.
    #[instrument(level = "info", skip_all, fields(archives = archives.len()))]
    pub fn run_parallel(&self, archives: &[PathBuf]) -> RunOutput {
        let start = Instant::now();
        // indexed collect keeps input order
        let results: Vec<ArchiveResult> = archives
            .par_iter()
            .map(|path| self.process_archive(path))
            .collect();

        let mut out = RunOutput::default();
        for r in results {
            merge(&mut out, r);
        }
        info!(elapsed = ?start.elapsed(), "run complete");
        out
    }

    fn process_archive(&self, path: &Path) -> ArchiveResult {
        let name = archive_name(path);
        info!(archive = %name, "processing");

        match extract(path) {
            Ok(payload) => {
                let result = self.normalizer.normalize(&payload.bytes, &name);
                ArchiveResult {
                    name,
                    entry: Some(payload.entry_name),
                    result,
                }
            }
            Err(e) => ArchiveResult {
                name,
                entry: None,
                result: Err(e),
            },
        }
    }
}

fn merge(out: &mut RunOutput, r: ArchiveResult) {
    let report = &mut out.report;
    match r.result {
        Ok(normalized) => {
            let ingested = normalized.records.len() as u64;
            let quarantined = normalized.quarantined.len() as u64;

            report.files_processed += 1;
            report.rows_ingested += ingested;
            report.rows_quarantined += quarantined;
            report.rows_filtered += normalized.filtered;
            report.archives.push(ArchiveOutcome {
                archive: r.name,
                status: ArchiveStatus::Processed,
                entry: r.entry,
                encoding: Some(normalized.encoding),
                rows_ingested: ingested,
                rows_quarantined: quarantined,
                rows_filtered: normalized.filtered,
                failure: None,
            });

            out.records.extend(normalized.records);
            out.quarantined.extend(normalized.quarantined);
        }
        Err(e) => {
            let status = if e.is_archive_level() {
                warn!(archive = %r.name, error = %e, "skipping archive");
                report.files_skipped += 1;
                ArchiveStatus::Skipped
            } else {
                error!(archive = %r.name, error = %e, "payload rejected, file quarantined");
                report.files_quarantined += 1;
                ArchiveStatus::Quarantined
            };
            report.archives.push(ArchiveOutcome {
                archive: r.name,
                status,
                entry: r.entry,
                encoding: None,
                rows_ingested: 0,
                rows_quarantined: 0,
                rows_filtered: 0,
                failure: Some(e.to_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::extract::tests::zip_bytes;
    use rust_decimal::Decimal;
    use std::fs;
    use tempfile::TempDir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,ansscraper=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const Q1: &str = "DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_FINAL
2025-01-01;123456;411111111;Despesas com Eventos/Sinistros;100,50
2025-01-01;123456;2222;Outra Despesa;200,00
2025-01-01;123456;3333;broken;n/a";

    const Q2: &str = "DATA;REGISTRO_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_FINAL
2025-04-01;654321;411111111;Eventos;7,25";

    fn write_zip(dir: &Path, name: &str, csv_name: &str, csv: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, zip_bytes(&[(csv_name, csv.as_bytes())])).unwrap();
        path
    }

    fn fixture(dir: &Path) -> Vec<PathBuf> {
        let bad = dir.join("bad.zip");
        fs::write(&bad, "This is not a zip file").unwrap();
        vec![
            write_zip(dir, "1T2025.zip", "1T2025.csv", Q1),
            bad,
            write_zip(dir, "2T2025.zip", "2T2025.csv", Q2),
        ]
    }

    #[test]
    fn corrupt_archive_is_skipped_and_run_continues() {
        init_test_logging();
        let dir = TempDir::new().unwrap();
        let out = Pipeline::default().run(&fixture(dir.path()));

        assert_eq!(out.report.files_processed, 2);
        assert_eq!(out.report.files_skipped, 1);
        assert_eq!(out.report.files_quarantined, 0);
        assert_eq!(out.report.rows_ingested, 3);
        assert_eq!(out.report.rows_quarantined, 1);
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.quarantined.len(), 1);
        assert!(!out.report.is_empty_result());

        let bad = &out.report.archives[1];
        assert_eq!(bad.archive, "bad.zip");
        assert_eq!(bad.status, ArchiveStatus::Skipped);
        assert!(bad.failure.is_some());
    }

    #[test]
    fn every_record_is_tagged_with_its_archive_base_name() {
        let dir = TempDir::new().unwrap();
        let out = Pipeline::default().run(&fixture(dir.path()));

        let tags: Vec<&str> = out
            .records
            .iter()
            .map(|r| r.source_archive_name.as_str())
            .collect();
        assert_eq!(tags, vec!["1T2025.zip", "1T2025.zip", "2T2025.zip"]);
        assert_eq!(out.quarantined[0].source_name, "1T2025.zip");
        assert_eq!(out.records[2].balance_value, Decimal::new(725, 2));
    }

    #[test]
    fn runs_are_idempotent_and_parallel_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let inputs = fixture(dir.path());
        let pipeline = Pipeline::default();

        let a = pipeline.run(&inputs);
        let b = pipeline.run(&inputs);
        let c = pipeline.run_parallel(&inputs);

        assert_eq!(a.records, b.records);
        assert_eq!(a.records, c.records);
        assert_eq!(a.quarantined, c.quarantined);
        assert_eq!(a.report, c.report);
    }

    #[test]
    fn undecodable_payload_quarantines_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin.zip");
        fs::write(&path, zip_bytes(&[("data.csv", b"DATA\x00;\x00")])).unwrap();

        let out = Pipeline::default().run(&[path]);
        assert_eq!(out.report.files_quarantined, 1);
        assert_eq!(out.report.files_skipped, 0);
        assert_eq!(out.report.archives[0].status, ArchiveStatus::Quarantined);
        assert_eq!(out.report.archives[0].entry.as_deref(), Some("data.csv"));
        assert!(out.report.is_empty_result());
    }

    #[test]
    fn no_archives_is_an_empty_result() {
        let out = Pipeline::default().run(&[]);
        assert!(out.report.is_empty_result());
        assert!(out.records.is_empty());
    }
}

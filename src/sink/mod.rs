// src/sink/mod.rs
pub mod parquet;
pub mod quarantine;

use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{operators::OperatorLoad, pipeline::RunOutput};

pub use self::parquet::{write_table, ArrowTable};

/// Hands a run's output to storage as files under one directory.
///
/// Passed explicitly to whatever drives the run; nothing here is global.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    out_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating output directory {:?}", &out_dir))?;
        Ok(Self { out_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.out_dir
    }

    /// `records.parquet`, `quarantined_rows.csv`, `report.json`.
    pub fn store_run(&self, run: &RunOutput) -> Result<()> {
        write_table(&self.out_dir, &run.records)?;
        quarantine::write_quarantined_rows(
            &self.out_dir.join("quarantined_rows.csv"),
            &run.quarantined,
        )?;

        let report_path = self.out_dir.join("report.json");
        let json = serde_json::to_string_pretty(&run.report)?;
        let mut f = fs::File::create(&report_path)
            .with_context(|| format!("creating {:?}", &report_path))?;
        f.write_all(json.as_bytes())?;
        f.write_all(b"\n")?;

        info!(
            dir = %self.out_dir.display(),
            records = run.records.len(),
            quarantined = run.quarantined.len(),
            "stored run"
        );
        Ok(())
    }

    /// `operators.parquet`, `rejected_operators.csv`.
    pub fn store_operators(&self, load: &OperatorLoad) -> Result<()> {
        write_table(&self.out_dir, &load.operators)?;
        quarantine::write_rejected_operators(
            &self.out_dir.join("rejected_operators.csv"),
            &load.rejected,
        )?;
        info!(
            operators = load.operators.len(),
            rejected = load.rejected.len(),
            "stored operators"
        );
        Ok(())
    }
}

// src/sink/quarantine.rs

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::{fs, path::Path};

use crate::{model::QuarantinedRow, operators::RejectedOperator};

/// Original fields are re-joined with the source delimiter.
fn join_raw(raw: &[String]) -> String {
    raw.join(";")
}

/// One line per quarantined data row: where it came from, why, and what it said.
pub fn write_quarantined_rows(path: &Path, rows: &[QuarantinedRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let mut w = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {:?}", path))?;
    w.write_record(["source_name", "line", "reason", "raw"])?;
    for row in rows {
        w.write_record(&[
            row.source_name.clone(),
            row.line.to_string(),
            row.reason.to_string(),
            join_raw(&row.raw),
        ])?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_rejected_operators(path: &Path, rows: &[RejectedOperator]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let mut w = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {:?}", path))?;
    w.write_record(["line", "reason", "raw"])?;
    for row in rows {
        w.write_record(&[
            row.line.to_string(),
            row.reason.to_string(),
            join_raw(&row.raw),
        ])?;
    }
    w.flush()?;
    Ok(())
}

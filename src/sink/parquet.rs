// src/sink/parquet.rs

use anyhow::{ensure, Context, Result};
use arrow::{
    array::{ArrayRef, BooleanArray, Date32Array, Decimal128Builder, StringArray},
    datatypes::{DataType, Field, Schema as ArrowSchema},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

use crate::model::{NormalizedRecord, Operator, Sign};

/// Precision/scale of the balance column. Values are rounded to cents.
const BALANCE_PRECISION: u8 = 38;
const BALANCE_SCALE: i8 = 2;

/// A row type that can be written as one Parquet table.
pub trait ArrowTable: Sized {
    /// File stem, e.g. `records` → `records.parquet`.
    const TABLE: &'static str;
    fn schema() -> ArrowSchema;
    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;
}

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

fn days_since_epoch(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

impl ArrowTable for NormalizedRecord {
    const TABLE: &'static str = "records";

    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("date", DataType::Date32, false),
            Field::new("reg_ans", DataType::Utf8, false),
            Field::new("account_code", DataType::Utf8, false),
            Field::new("description", DataType::Utf8, false),
            Field::new(
                "balance_value",
                DataType::Decimal128(BALANCE_PRECISION, BALANCE_SCALE),
                false,
            ),
            Field::new("balance_negative", DataType::Boolean, false),
            Field::new("source_archive_name", DataType::Utf8, false),
        ])
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let mut balance = Decimal128Builder::with_capacity(rows.len())
            .with_precision_and_scale(BALANCE_PRECISION, BALANCE_SCALE)?;
        for r in rows {
            let mut v = r.balance_value;
            v.rescale(BALANCE_SCALE as u32);
            // rescale stops short when the mantissa would overflow
            ensure!(
                v.scale() == BALANCE_SCALE as u32,
                "balance {} of {} cannot be stored with {} decimal places",
                r.balance_value,
                r.source_archive_name,
                BALANCE_SCALE
            );
            balance.append_value(v.mantissa());
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from_iter_values(
                rows.iter().map(|r| days_since_epoch(r.date)),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.operator_registration_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.account_code.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.description.as_str()),
            )),
            Arc::new(balance.finish()),
            Arc::new(BooleanArray::from(
                rows.iter()
                    .map(|r| r.balance_sign == Sign::Negative)
                    .collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.source_archive_name.as_str()),
            )),
        ];

        RecordBatch::try_new(Arc::new(Self::schema()), columns)
            .context("building records batch")
    }
}

impl ArrowTable for Operator {
    const TABLE: &'static str = "operators";

    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("cnpj", DataType::Utf8, false),
            Field::new("reg_ans", DataType::Utf8, false),
            Field::new("razao_social", DataType::Utf8, false),
            Field::new("uf", DataType::Utf8, false),
        ])
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|o| o.cnpj.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|o| o.reg_ans.as_str()))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|o| o.razao_social.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|o| o.uf.as_str()))),
        ];
        RecordBatch::try_new(Arc::new(Self::schema()), columns)
            .context("building operators batch")
    }
}

/// Write `rows` to `<dir>/<TABLE>.parquet`, via a temp file renamed into place.
pub fn write_table<T: ArrowTable>(dir: &Path, rows: &[T]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
    let out_path = dir.join(format!("{}.parquet", T::TABLE));
    let temp_path = out_path.with_extension("tmp");

    let schema = Arc::new(T::schema());
    let batch = T::to_batch(rows)?;

    let file =
        File::create(&temp_path).with_context(|| format!("creating {:?}", &temp_path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .with_context(|| format!("opening parquet writer for {}", T::TABLE))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing {} batch", T::TABLE))?;
    writer.close().context("closing parquet writer")?;

    fs::rename(&temp_path, &out_path)
        .with_context(|| format!("moving {:?} → {:?}", temp_path, out_path))?;
    debug!(table = T::TABLE, rows = rows.len(), path = %out_path.display(), "wrote parquet");
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Decimal128Array};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn read_back(path: &Path) -> Vec<RecordBatch> {
        let file = File::open(path).unwrap();
        ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap()
            .map(|b| b.unwrap())
            .collect()
    }

    #[test]
    fn records_round_trip_row_count_and_balance() {
        let dir = TempDir::new().unwrap();
        let rows = vec![
            NormalizedRecord {
                date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                operator_registration_id: "123456".into(),
                account_code: "411111111".into(),
                description: "Eventos".into(),
                balance_value: Decimal::new(10050, 2),
                balance_sign: Sign::Positive,
                source_archive_name: "1T2025.zip".into(),
            },
            NormalizedRecord {
                date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                operator_registration_id: "123456".into(),
                account_code: "41".into(),
                description: "Estorno".into(),
                balance_value: Decimal::new(7, 0),
                balance_sign: Sign::Negative,
                source_archive_name: "1T2025.zip".into(),
            },
        ];

        let path = write_table(dir.path(), &rows).unwrap();
        assert_eq!(path.file_name().unwrap(), "records.parquet");
        assert!(!dir.path().join("records.tmp").exists());

        let batches = read_back(&path);
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 2);

        let balances = batches[0]
            .column(4)
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(balances.value(0), 10050);
        assert_eq!(balances.value(1), 700);
        let negative = batches[0]
            .column(5)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap();
        assert!(!negative.value(0));
        assert!(negative.value(1));
        assert_eq!(balances.len(), 2);
    }

    #[test]
    fn balance_too_wide_for_cents_is_an_error() {
        let rec = NormalizedRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            operator_registration_id: "1".into(),
            account_code: "41".into(),
            description: "x".into(),
            balance_value: "1000000000000000000000000000".parse().unwrap(),
            balance_sign: Sign::Positive,
            source_archive_name: "1T2025.zip".into(),
        };
        assert!(NormalizedRecord::to_batch(&[rec]).is_err());
    }

    #[test]
    fn empty_tables_are_still_written() {
        let dir = TempDir::new().unwrap();
        let path = write_table::<Operator>(dir.path(), &[]).unwrap();
        assert!(path.exists());
        let total: usize = read_back(&path).iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn epoch_day_conversion() {
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 1);
    }
}

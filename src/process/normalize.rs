// src/process/normalize.rs

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::{
    error::{IngestError, RowError},
    model::{NormalizedRecord, QuarantinedRow},
    process::{
        columns::{AliasTable, ColumnIndex, LedgerField},
        date_parser::parse_date,
        decode::{decode, TextEncoding},
        rows::{for_each_row, semicolon_reader, Row},
        utils::{clean_str, parse_amount},
    },
};

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub aliases: AliasTable<LedgerField>,
    /// Keep only rows whose description contains this text (case-insensitive).
    pub description_filter: Option<String>,
}

/// Outcome of a payload that could be parsed at all.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub records: Vec<NormalizedRecord>,
    pub quarantined: Vec<QuarantinedRow>,
    /// Valid rows excluded by the description filter.
    pub filtered: u64,
    pub encoding: TextEncoding,
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    aliases: AliasTable<LedgerField>,
    description_filter: Option<String>,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self {
            aliases: options.aliases,
            description_filter: options
                .description_filter
                .map(|f| f.trim().to_lowercase())
                .filter(|f| !f.is_empty()),
        }
    }

    /// Parse a semicolon-delimited payload into typed records, tagged with `source_name`.
    ///
    /// Bad rows are quarantined and parsing continues; `Err` means nothing in the
    /// payload could be read (undecodable, no header, or a required column missing).
    #[tracing::instrument(level = "debug", skip(self, raw), fields(source = %source_name, bytes = raw.len()))]
    pub fn normalize(&self, raw: &[u8], source_name: &str) -> Result<Normalized, IngestError> {
        let decoded = decode(raw, source_name)?;

        let text: &str = &decoded.text;
        let mut rdr = semicolon_reader(text, true);

        let headers = match rdr.headers() {
            Ok(h) if h.iter().any(|c| !clean_str(c).is_empty()) => h.clone(),
            Ok(_) => {
                return Err(IngestError::MissingHeader {
                    source_name: source_name.to_string(),
                })
            }
            Err(e) => {
                warn!(source = %source_name, error = %e, "unreadable header");
                return Err(IngestError::MissingHeader {
                    source_name: source_name.to_string(),
                });
            }
        };
        let index = self
            .aliases
            .resolve(&headers)
            .map_err(|field| IngestError::UnresolvedColumn {
                source_name: source_name.to_string(),
                field: field.to_string(),
            })?;

        let mut out = Normalized {
            records: Vec::new(),
            quarantined: Vec::new(),
            filtered: 0,
            encoding: decoded.encoding,
        };
        let quarantine = |out: &mut Normalized, line: u64, reason: RowError, raw: Vec<String>| {
            debug!(source = %source_name, line, %reason, "row quarantined");
            out.quarantined.push(QuarantinedRow {
                source_name: source_name.to_string(),
                line,
                reason,
                raw,
            });
        };

        for_each_row(&mut rdr, text, 0, &mut |line, row: Row<'_>| match row {
            Row::Record(record) => match parse_row(&index, record, source_name) {
                Ok(rec) if self.keeps(&rec) => out.records.push(rec),
                Ok(_) => out.filtered += 1,
                Err(reason) => quarantine(
                    &mut out,
                    line,
                    reason,
                    record.iter().map(str::to_string).collect(),
                ),
            },
            Row::Malformed(msg) => quarantine(&mut out, line, RowError::Malformed(msg), Vec::new()),
            Row::UnbalancedQuote(raw) => {
                warn!(source = %source_name, line, "unbalanced quote, following lines read again");
                quarantine(&mut out, line, RowError::UnbalancedQuote, raw)
            }
        });

        info!(
            source = %source_name,
            encoding = ?out.encoding,
            records = out.records.len(),
            quarantined = out.quarantined.len(),
            filtered = out.filtered,
            "normalized"
        );
        Ok(out)
    }

    fn keeps(&self, rec: &NormalizedRecord) -> bool {
        match &self.description_filter {
            Some(needle) => rec.description.to_lowercase().contains(needle.as_str()),
            None => true,
        }
    }
}

/// Normalize with the built-in aliases and no filter.
pub fn normalize(raw: &[u8], source_name: &str) -> Result<Normalized, IngestError> {
    Normalizer::default().normalize(raw, source_name)
}

fn parse_row(
    index: &ColumnIndex<LedgerField>,
    record: &StringRecord,
    source_name: &str,
) -> Result<NormalizedRecord, RowError> {
    let field = |f: LedgerField| {
        index
            .get(record, f)
            .map(clean_str)
            .ok_or(RowError::MissingColumn(f))
    };
    let required = |f: LedgerField| {
        field(f).and_then(|v| {
            if v.is_empty() {
                Err(RowError::EmptyField(f))
            } else {
                Ok(v)
            }
        })
    };

    let raw_date = required(LedgerField::Date)?;
    let date = parse_date(raw_date).ok_or_else(|| RowError::InvalidDate {
        value: raw_date.to_string(),
    })?;

    let reg_ans = required(LedgerField::RegAns)?;
    if !reg_ans.chars().all(|c| c.is_ascii_digit()) {
        return Err(RowError::InvalidRegistryId {
            value: reg_ans.to_string(),
        });
    }

    let account_code = required(LedgerField::AccountCode)?;
    let description = field(LedgerField::Description)?;

    let raw_balance = required(LedgerField::Balance)?;
    let (balance_value, balance_sign) =
        parse_amount(raw_balance).ok_or_else(|| RowError::InvalidNumber {
            value: raw_balance.to_string(),
        })?;

    Ok(NormalizedRecord {
        date,
        operator_registration_id: reg_ans.to_string(),
        account_code: account_code.to_string(),
        description: description.to_string(),
        balance_value,
        balance_sign,
        source_archive_name: source_name.to_string(),
    })
}

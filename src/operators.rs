// src/operators.rs

use anyhow::Context;
use csv::StringRecord;
use serde::Serialize;
use std::{
    collections::HashSet,
    fmt::{self, Display},
    fs,
    path::Path,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    cnpj::{self, PaddingPolicy},
    error::IngestError,
    model::Operator,
    pipeline::archive_name,
    process::{
        columns::{AliasTable, CanonicalField, ColumnIndex},
        decode::decode,
        rows::{for_each_row, semicolon_reader, Row},
        utils::clean_str,
    },
};

/// Columns of the operator registry (CADOP) file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorField {
    RegAns,
    Cnpj,
    RazaoSocial,
    Uf,
}

impl Display for OperatorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatorField::RegAns => "reg_ans",
            OperatorField::Cnpj => "cnpj",
            OperatorField::RazaoSocial => "razao_social",
            OperatorField::Uf => "uf",
        })
    }
}

impl CanonicalField for OperatorField {
    fn all() -> &'static [Self] {
        &[
            OperatorField::RegAns,
            OperatorField::Cnpj,
            OperatorField::RazaoSocial,
            OperatorField::Uf,
        ]
    }

    fn default_aliases(self) -> &'static [&'static str] {
        match self {
            OperatorField::RegAns => &["REGISTRO_OPERADORA", "REGISTRO_ANS", "REG_ANS"],
            OperatorField::Cnpj => &["CNPJ"],
            OperatorField::RazaoSocial => &["RAZAO_SOCIAL"],
            OperatorField::Uf => &["UF"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum OperatorRejection {
    #[error("CNPJ `{0}` fails checksum validation")]
    InvalidIdentifier(String),

    #[error("registry id or CNPJ `{0}` already loaded")]
    DuplicateRegistry(String),

    #[error("missing value for `{0}`")]
    MissingField(String),

    #[error("unreadable registry row: {0}")]
    Malformed(String),
}

/// A registry row kept out of the operator table, for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedOperator {
    pub line: u64,
    pub reason: OperatorRejection,
    pub raw: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OperatorLoad {
    pub operators: Vec<Operator>,
    pub rejected: Vec<RejectedOperator>,
}

/// Parse the operator registry, validating every CNPJ under `policy`.
///
/// First occurrence wins for both `reg_ans` and `cnpj`.
#[tracing::instrument(level = "info", skip(raw), fields(bytes = raw.len()))]
pub fn load_operators(
    raw: &[u8],
    source_name: &str,
    policy: PaddingPolicy,
) -> Result<OperatorLoad, IngestError> {
    let decoded = decode(raw, source_name)?;
    let text: &str = &decoded.text;
    let mut rdr = semicolon_reader(text, true);

    let headers = match rdr.headers() {
        Ok(h) if h.iter().any(|c| !clean_str(c).is_empty()) => h.clone(),
        _ => {
            return Err(IngestError::MissingHeader {
                source_name: source_name.to_string(),
            })
        }
    };
    let index = AliasTable::<OperatorField>::with_defaults()
        .resolve(&headers)
        .map_err(|field| IngestError::UnresolvedColumn {
            source_name: source_name.to_string(),
            field: field.to_string(),
        })?;

    let mut load = OperatorLoad::default();
    let mut seen = Seen::default();

    for_each_row(&mut rdr, text, 0, &mut |line, row: Row<'_>| {
        let (reason, raw): (OperatorRejection, Vec<String>) = match row {
            Row::Record(record) => match admit(&index, record, policy, &mut seen) {
                Ok(operator) => {
                    load.operators.push(operator);
                    return;
                }
                Err(reason) => (reason, record.iter().map(str::to_string).collect()),
            },
            Row::Malformed(msg) => (OperatorRejection::Malformed(msg), Vec::new()),
            Row::UnbalancedQuote(raw) => (
                OperatorRejection::Malformed("unbalanced quote".to_string()),
                raw,
            ),
        };
        warn!(source = %source_name, line, %reason, raw = ?raw, "operator held for review");
        load.rejected.push(RejectedOperator { line, reason, raw });
    });

    info!(
        source = %source_name,
        operators = load.operators.len(),
        rejected = load.rejected.len(),
        "operator registry loaded"
    );
    Ok(load)
}

/// [`load_operators`] on a registry file already on disk.
pub fn load_operators_file(path: &Path, policy: PaddingPolicy) -> anyhow::Result<OperatorLoad> {
    let raw = fs::read(path).with_context(|| format!("reading {:?}", path))?;
    Ok(load_operators(&raw, &archive_name(path), policy)?)
}

/// Registry ids and CNPJs already admitted; first occurrence wins.
#[derive(Default)]
struct Seen {
    reg_ans: HashSet<String>,
    cnpj: HashSet<String>,
}

fn admit(
    index: &ColumnIndex<OperatorField>,
    record: &StringRecord,
    policy: PaddingPolicy,
    seen: &mut Seen,
) -> Result<Operator, OperatorRejection> {
    let value = |f: OperatorField| index.get(record, f).map(clean_str).unwrap_or("");

    if let Some(field) = OperatorField::all()
        .iter()
        .find(|f| **f != OperatorField::RazaoSocial && value(**f).is_empty())
    {
        return Err(OperatorRejection::MissingField(field.to_string()));
    }

    let raw_cnpj = value(OperatorField::Cnpj);
    let cnpj = cnpj::canonicalize(raw_cnpj, policy)
        .ok_or_else(|| OperatorRejection::InvalidIdentifier(raw_cnpj.to_string()))?;

    let reg_ans = value(OperatorField::RegAns).to_string();
    if seen.reg_ans.contains(&reg_ans) || seen.cnpj.contains(&cnpj) {
        return Err(OperatorRejection::DuplicateRegistry(format!("{reg_ans}/{cnpj}")));
    }
    seen.reg_ans.insert(reg_ans.clone());
    seen.cnpj.insert(cnpj.clone());

    Ok(Operator {
        cnpj,
        reg_ans,
        razao_social: value(OperatorField::RazaoSocial).to_string(),
        uf: value(OperatorField::Uf).to_uppercase(),
    })
}

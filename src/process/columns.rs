// src/process/columns.rs

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{self, Debug, Display},
    hash::Hash,
};

/// A canonical column the parsers need, with the header names it has been published under.
pub trait CanonicalField: Copy + Eq + Hash + Debug + Display + 'static {
    fn all() -> &'static [Self];
    fn default_aliases(self) -> &'static [&'static str];
}

/// Columns of the quarterly accounting statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    Date,
    RegAns,
    AccountCode,
    Description,
    Balance,
}

impl LedgerField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerField::Date => "date",
            LedgerField::RegAns => "reg_ans",
            LedgerField::AccountCode => "account_code",
            LedgerField::Description => "description",
            LedgerField::Balance => "balance",
        }
    }
}

impl Display for LedgerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CanonicalField for LedgerField {
    fn all() -> &'static [Self] {
        &[
            LedgerField::Date,
            LedgerField::RegAns,
            LedgerField::AccountCode,
            LedgerField::Description,
            LedgerField::Balance,
        ]
    }

    fn default_aliases(self) -> &'static [&'static str] {
        match self {
            LedgerField::Date => &["DATA", "DT_REFERENCIA", "DATA_REFERENCIA", "DT_REGISTRO"],
            LedgerField::RegAns => &["REG_ANS", "REGISTRO_ANS", "REGISTRO_OPERADORA", "CD_OPERADORA"],
            LedgerField::AccountCode => &["CD_CONTA_CONTABIL", "CD_CONTA", "CONTA_CONTABIL"],
            LedgerField::Description => &["DESCRICAO", "DS_CONTA", "DESCRICAO_CONTA"],
            LedgerField::Balance => &["VL_SALDO_FINAL", "VALOR_SALDO_FINAL", "VL_SALDO", "VALORDESPESAS"],
        }
    }
}

/// Canonical field → accepted header names, in priority order.
#[derive(Debug, Clone)]
pub struct AliasTable<F: CanonicalField> {
    aliases: HashMap<F, Vec<String>>,
}

impl<F: CanonicalField> Default for AliasTable<F> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<F: CanonicalField> AliasTable<F> {
    pub fn with_defaults() -> Self {
        let aliases = F::all()
            .iter()
            .map(|f| {
                let names = f.default_aliases().iter().map(|n| normalize_header(n)).collect();
                (*f, names)
            })
            .collect();
        Self { aliases }
    }

    /// Registers an extra header name for `field`, checked after the built-in ones.
    pub fn add_alias(&mut self, field: F, name: &str) {
        let name = normalize_header(name);
        let names = self.aliases.entry(field).or_default();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    /// Maps every canonical field to a header position, or names the first one missing.
    pub fn resolve(&self, headers: &StringRecord) -> Result<ColumnIndex<F>, F> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut positions = HashMap::with_capacity(F::all().len());

        for field in F::all() {
            let names = self.aliases.get(field).map(Vec::as_slice).unwrap_or(&[]);
            let pos = names
                .iter()
                .find_map(|name| normalized.iter().position(|h| h == name))
                .ok_or(*field)?;
            positions.insert(*field, pos);
        }

        Ok(ColumnIndex { positions })
    }
}

/// Resolved header positions for one payload.
#[derive(Debug, Clone)]
pub struct ColumnIndex<F: CanonicalField> {
    positions: HashMap<F, usize>,
}

impl<F: CanonicalField> ColumnIndex<F> {
    pub fn position(&self, field: F) -> Option<usize> {
        self.positions.get(&field).copied()
    }

    /// Raw value of `field` in `record`; `None` if the row is too short.
    pub fn get<'r>(&self, record: &'r StringRecord, field: F) -> Option<&'r str> {
        self.position(field).and_then(|i| record.get(i))
    }
}

/// Trim whitespace, BOM and stray quotes; compare case-insensitively.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .trim_matches('"')
        .trim()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cols: &[&str]) -> StringRecord {
        StringRecord::from(cols.to_vec())
    }

    #[test]
    fn resolves_canonical_names_in_any_order() {
        let table = AliasTable::<LedgerField>::with_defaults();
        let idx = table
            .resolve(&headers(&[
                "VL_SALDO_FINAL",
                "DESCRICAO",
                "CD_CONTA_CONTABIL",
                "REG_ANS",
                "DATA",
            ]))
            .unwrap();
        assert_eq!(idx.position(LedgerField::Date), Some(4));
        assert_eq!(idx.position(LedgerField::Balance), Some(0));
    }

    #[test]
    fn resolves_renamed_columns_case_insensitively() {
        let table = AliasTable::<LedgerField>::with_defaults();
        let idx = table
            .resolve(&headers(&[
                "\u{feff}data",
                "Registro_ANS",
                "cd_conta_contabil",
                "Descricao",
                "ValorDespesas",
            ]))
            .unwrap();
        assert_eq!(idx.position(LedgerField::Date), Some(0));
        assert_eq!(idx.position(LedgerField::RegAns), Some(1));
        assert_eq!(idx.position(LedgerField::Balance), Some(4));
    }

    #[test]
    fn reports_first_missing_field() {
        let table = AliasTable::<LedgerField>::with_defaults();
        let err = table
            .resolve(&headers(&["DATA", "REG_ANS", "CD_CONTA_CONTABIL", "DESCRICAO"]))
            .unwrap_err();
        assert_eq!(err, LedgerField::Balance);
    }

    #[test]
    fn extra_aliases_are_a_data_change() {
        let cols = headers(&["DATA", "REG_ANS", "CD_CONTA_CONTABIL", "DESCRICAO", "VL_FECHAMENTO"]);
        let mut table = AliasTable::<LedgerField>::with_defaults();
        assert!(table.resolve(&cols).is_err());

        table.add_alias(LedgerField::Balance, "vl_fechamento");
        let idx = table.resolve(&cols).unwrap();
        assert_eq!(idx.position(LedgerField::Balance), Some(4));
    }

    #[test]
    fn earlier_alias_wins_when_both_present() {
        let table = AliasTable::<LedgerField>::with_defaults();
        let idx = table
            .resolve(&headers(&[
                "DATA",
                "REG_ANS",
                "CD_CONTA_CONTABIL",
                "DESCRICAO",
                "VL_SALDO",
                "VL_SALDO_FINAL",
            ]))
            .unwrap();
        assert_eq!(idx.position(LedgerField::Balance), Some(5));
    }

    #[test]
    fn short_rows_yield_none() {
        let table = AliasTable::<LedgerField>::with_defaults();
        let idx = table
            .resolve(&headers(&["DATA", "REG_ANS", "CD_CONTA_CONTABIL", "DESCRICAO", "VL_SALDO_FINAL"]))
            .unwrap();
        let row = StringRecord::from(vec!["2025-01-01", "1"]);
        assert_eq!(idx.get(&row, LedgerField::RegAns), Some("1"));
        assert_eq!(idx.get(&row, LedgerField::Balance), None);
    }
}

// src/model.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RowError;

/// Length of a terminal (leaf) chart-of-accounts code.
pub const LEAF_ACCOUNT_CODE_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Positive,
    Negative,
}

/// One ledger line of a quarterly disclosure, typed and tagged with its archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub date: NaiveDate,
    pub operator_registration_id: String,
    pub account_code: String,
    pub description: String,
    /// Magnitude only, see `balance_sign`.
    pub balance_value: Decimal,
    pub balance_sign: Sign,
    pub source_archive_name: String,
}

impl NormalizedRecord {
    pub fn is_leaf_account(&self) -> bool {
        self.account_code.chars().count() == LEAF_ACCOUNT_CODE_LEN
    }

    pub fn signed_balance(&self) -> Decimal {
        match self.balance_sign {
            Sign::Positive => self.balance_value,
            Sign::Negative => -self.balance_value,
        }
    }
}

/// A data row that failed validation, kept for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantinedRow {
    pub source_name: String,
    /// 1-based line in the decoded payload.
    pub line: u64,
    pub reason: RowError,
    pub raw: Vec<String>,
}

/// A health-plan operator from the regulator's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Canonical 14-digit CNPJ, no formatting.
    pub cnpj: String,
    pub reg_ans: String,
    pub razao_social: String,
    pub uf: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, value: Decimal, sign: Sign) -> NormalizedRecord {
        NormalizedRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            operator_registration_id: "123456".into(),
            account_code: code.into(),
            description: "x".into(),
            balance_value: value,
            balance_sign: sign,
            source_archive_name: "1T2025.zip".into(),
        }
    }

    #[test]
    fn leaf_accounts_have_nine_characters() {
        assert!(record("411111111", Decimal::ONE, Sign::Positive).is_leaf_account());
        assert!(!record("4111", Decimal::ONE, Sign::Positive).is_leaf_account());
        assert!(!record("4111111110", Decimal::ONE, Sign::Positive).is_leaf_account());
    }

    #[test]
    fn signed_balance_reapplies_sign() {
        let r = record("41", Decimal::new(10050, 2), Sign::Negative);
        assert_eq!(r.signed_balance(), Decimal::new(-10050, 2));
        assert_eq!(r.balance_value, Decimal::new(10050, 2));
    }
}

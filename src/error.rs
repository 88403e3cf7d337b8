// src/error.rs

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::process::columns::LedgerField;

/// Failure for a whole archive or payload. None of these abort a run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{path:?} is not a readable ZIP archive: {source}")]
    InvalidArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} contains no tabular (.csv/.txt) entry")]
    NoTabularEntry { path: PathBuf },

    #[error("{source_name}: payload could not be decoded as text ({reason})")]
    DecodingFailure { source_name: String, reason: String },

    #[error("{source_name}: payload has no header row")]
    MissingHeader { source_name: String },

    #[error("{source_name}: header has no column for `{field}`")]
    UnresolvedColumn { source_name: String, field: String },
}

impl IngestError {
    /// Archive-level errors mean the container itself was unusable (the file is skipped);
    /// the rest mean the payload was found but rejected (the file is quarantined).
    pub fn is_archive_level(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidArchive { .. }
                | IngestError::Io { .. }
                | IngestError::NoTabularEntry { .. }
        )
    }
}

/// Why a single data row was sent to quarantine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RowError {
    #[error("row has no value for column `{0}`")]
    MissingColumn(LedgerField),

    #[error("required field `{0}` is empty")]
    EmptyField(LedgerField),

    #[error("`{value}` is not a valid amount")]
    InvalidNumber { value: String },

    #[error("`{value}` is not a valid date")]
    InvalidDate { value: String },

    #[error("`{value}` is not a valid registry id")]
    InvalidRegistryId { value: String },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("unbalanced quote; the row ran into the following lines")]
    UnbalancedQuote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_level_classification() {
        let skip = IngestError::NoTabularEntry {
            path: PathBuf::from("a.zip"),
        };
        let quarantine = IngestError::MissingHeader {
            source_name: "a.zip".into(),
        };
        assert!(skip.is_archive_level());
        assert!(!quarantine.is_archive_level());
    }

    #[test]
    fn row_error_messages_name_the_field() {
        let e = RowError::EmptyField(LedgerField::AccountCode);
        assert_eq!(e.to_string(), "required field `account_code` is empty");
    }
}

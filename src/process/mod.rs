// src/process/mod.rs
pub mod columns;
pub mod date_parser;
pub mod decode;
pub mod extract;
pub mod normalize;
pub mod rows;
pub mod utils;

pub use columns::{AliasTable, LedgerField};
pub use extract::{extract, Payload};
pub use normalize::{normalize, NormalizeOptions, Normalized, Normalizer};

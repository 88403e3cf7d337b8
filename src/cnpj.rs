// src/cnpj.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

const FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_LEN: usize = 14;

/// What to do with an identifier that lost its leading zero upstream
/// (13 digits after stripping, typically from a spreadsheet numeric column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingPolicy {
    /// Anything that is not exactly 14 digits is invalid.
    #[default]
    Reject,
    /// A 13-digit identifier is left-padded with one `0` before checking.
    LeftPad,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown CNPJ padding policy `{0}`, expected reject or left_pad")]
pub struct UnknownPaddingPolicy(String);

impl FromStr for PaddingPolicy {
    type Err = UnknownPaddingPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "reject" => Ok(PaddingPolicy::Reject),
            "left_pad" | "leftpad" | "pad" => Ok(PaddingPolicy::LeftPad),
            _ => Err(UnknownPaddingPolicy(s.to_string())),
        }
    }
}

/// Strict validation: formatting characters are ignored, length must be 14.
pub fn validate(identifier: &str) -> bool {
    validate_with(identifier, PaddingPolicy::Reject)
}

/// Same as [`validate`], with an absent value failing closed.
pub fn validate_opt(identifier: Option<&str>) -> bool {
    identifier.map(validate).unwrap_or(false)
}

pub fn validate_with(identifier: &str, policy: PaddingPolicy) -> bool {
    canonicalize(identifier, policy).is_some()
}

/// Returns the bare 14-digit form of `identifier` if it carries correct check digits.
pub fn canonicalize(identifier: &str, policy: PaddingPolicy) -> Option<String> {
    let mut digits: Vec<u32> = identifier.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() == CNPJ_LEN - 1 && policy == PaddingPolicy::LeftPad {
        digits.insert(0, 0);
    }
    if digits.len() != CNPJ_LEN {
        return None;
    }
    // repeated-digit placeholders (00000000000000, 11111111111111, ...) pass the math
    if digits.iter().all(|d| *d == digits[0]) {
        return None;
    }

    let first = check_digit(&digits[..12], &FIRST_WEIGHTS);
    let second = check_digit(&digits[..13], &SECOND_WEIGHTS);
    if digits[12] != first || digits[13] != second {
        return None;
    }

    Some(digits.iter().map(|d| char::from(b'0' + *d as u8)).collect())
}

fn check_digit(body: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = body.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

// src/process/decode.rs

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use serde::Serialize;
use std::borrow::Cow;
use tracing::debug;

use crate::error::IngestError;

/// Encoding a payload was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

#[derive(Debug)]
pub struct Decoded<'a> {
    pub text: Cow<'a, str>,
    pub encoding: TextEncoding,
}

/// BOM first, then strict UTF-8, then Windows-1252 (a Latin-1 superset, never fails).
///
/// Only binary-looking payloads (NUL bytes) and malformed UTF-16 are rejected.
pub fn decode<'a>(raw: &'a [u8], source_name: &str) -> Result<Decoded<'a>, IngestError> {
    let mut body = raw;

    if let Some((encoding, bom_len)) = Encoding::for_bom(raw) {
        body = &raw[bom_len..];
        if encoding != UTF_8 {
            let (text, had_errors) = encoding.decode_without_bom_handling(body);
            if had_errors {
                return Err(IngestError::DecodingFailure {
                    source_name: source_name.to_string(),
                    reason: format!("malformed {} sequence", encoding.name()),
                });
            }
            let encoding = if encoding == UTF_16LE {
                TextEncoding::Utf16Le
            } else {
                debug_assert!(encoding == UTF_16BE);
                TextEncoding::Utf16Be
            };
            return Ok(Decoded { text, encoding });
        }
    }

    if body.contains(&0) {
        return Err(IngestError::DecodingFailure {
            source_name: source_name.to_string(),
            reason: "payload contains NUL bytes".to_string(),
        });
    }

    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(body) {
        return Ok(Decoded {
            text,
            encoding: TextEncoding::Utf8,
        });
    }

    debug!(source = %source_name, "not valid UTF-8, falling back to windows-1252");
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(body);
    Ok(Decoded {
        text,
        encoding: TextEncoding::Windows1252,
    })
}

// src/process/extract.rs

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};
use tracing::{debug, warn};
use zip::{result::ZipError, ZipArchive};

use crate::error::IngestError;

const TABULAR_SUFFIXES: &[&str] = &[".csv", ".txt"];

/// Largest payload accepted from one entry. Quarterly files are tens of MiB.
pub const MAX_ENTRY_BYTES: u64 = 2 << 30;
/// Pre-allocation ceiling; the size in the archive header is not trusted beyond this.
const PREALLOC_LIMIT: u64 = 64 << 20;

/// The raw bytes of the tabular entry inside an archive.
#[derive(Debug, Clone)]
pub struct Payload {
    pub entry_name: String,
    pub bytes: Vec<u8>,
}

fn is_tabular(name: &str) -> bool {
    let lower = name.to_lowercase();
    !lower.starts_with("__macosx/") && TABULAR_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Open `zip_path` and read the first `.csv`/`.txt` entry, in archive order.
///
/// The archive handle lives only for this call.
pub fn extract<P: AsRef<Path>>(zip_path: P) -> Result<Payload, IngestError> {
    extract_with_limit(zip_path.as_ref(), MAX_ENTRY_BYTES)
}

/// [`extract`] with an explicit cap on the decompressed entry size.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn extract_with_limit(path: &Path, max_bytes: u64) -> Result<Payload, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|source| IngestError::InvalidArchive {
            path: path.to_path_buf(),
            source,
        })?;

    let mut payload: Option<Payload> = None;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|source| IngestError::InvalidArchive {
                path: path.to_path_buf(),
                source,
            })?;
        let name = entry.name().to_string();
        if !entry.is_file() || !is_tabular(&name) {
            continue;
        }
        if let Some(first) = &payload {
            warn!(
                first = %first.entry_name,
                ignored = %name,
                "archive has more than one tabular entry, using the first"
            );
            break;
        }

        let mut bytes = Vec::with_capacity(entry.size().min(PREALLOC_LIMIT).min(max_bytes) as usize);
        (&mut entry)
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| IngestError::InvalidArchive {
                path: path.to_path_buf(),
                source: ZipError::Io(e),
            })?;
        if bytes.len() as u64 > max_bytes {
            return Err(IngestError::InvalidArchive {
                path: path.to_path_buf(),
                source: ZipError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry {name} decompresses past {max_bytes} bytes"),
                )),
            });
        }
        payload = Some(Payload {
            entry_name: name,
            bytes,
        });
    }

    let Some(payload) = payload else {
        return Err(IngestError::NoTabularEntry {
            path: path.to_path_buf(),
        });
    };

    debug!(entry = %payload.entry_name, bytes = payload.bytes.len(), "extracted");
    Ok(payload)
}

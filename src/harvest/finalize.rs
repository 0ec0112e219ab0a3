//! Batch promotion
//!
//! Turns one batch of temporary page files into permanent, gzip-compressed
//! cache entries. The batch either lands completely or the cache is rolled
//! back to its pre-batch state; a rollback that itself fails leaves the
//! directory inconsistent and the error says so explicitly.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::HarvestError;
use crate::cache;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Promote every temporary file carrying the batch suffix, in page order.
///
/// Returns the promoted paths. An empty batch is valid and promotes
/// nothing.
pub(crate) fn promote_batch(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, HarvestError> {
    let staged = cache::temporary_files_with_suffix(dir, suffix);
    let mut promoted: Vec<PathBuf> = Vec::new();

    for temp in staged {
        let destination = promoted_path(&temp, suffix);
        if let Err(source) = promote_file(&temp, &destination) {
            // the half-written destination is part of the failed promotion
            let _ = fs::remove_file(&destination);
            let failure = HarvestError::Promotion {
                path: temp,
                source,
            };
            return match roll_back(&promoted) {
                Ok(()) => Err(failure),
                Err(cleanup) => Err(HarvestError::PurgeRequired {
                    dir: dir.to_path_buf(),
                    primary: Box::new(failure),
                    cleanup,
                }),
            };
        }
        debug!(path = %destination.display(), "promoted page");
        promoted.push(destination);
    }

    Ok(promoted)
}

/// Permanent name for a staged page: the batch suffix drops out and the
/// `.gz` extension marks the compressed payload.
fn promoted_path(temp: &Path, suffix: &str) -> PathBuf {
    let name = temp
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let base = name.strip_suffix(suffix).unwrap_or(name);
    temp.with_file_name(format!("{base}.gz"))
}

/// Move one staged page into place, compressing it unless it already is.
fn promote_file(source: &Path, destination: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(source)?);
    let head = reader.fill_buf()?;
    if head.starts_with(&GZIP_MAGIC) {
        drop(reader);
        return fs::rename(source, destination);
    }

    let mut encoder = GzEncoder::new(File::create(destination)?, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(source)
}

/// Undo the already promoted part of a failed batch. Files that are already
/// gone are fine, anything else aborts with the underlying error.
fn roll_back(promoted: &[PathBuf]) -> io::Result<()> {
    for path in promoted {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error),
        }
    }
    Ok(())
}

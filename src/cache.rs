//! On-disk cache layout and enumeration
//!
//! Every endpoint identity `(base_url, set, format)` maps to one directory
//! below a process-wide base directory. Inside it, each harvested page is an
//! immutable `YYYY-MM-DD-NNNNNNNN.xml.gz` file whose date component is the
//! right boundary of the harvesting window it belongs to. Pages that are
//! still in flight carry a per-batch `-tmp-N` suffix until they are promoted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the cache base directory.
pub const ENV_BASE_DIR: &str = "OAI_HARVEST_DIR";

/// Directory below the user's home used when no override is given.
const DEFAULT_DIR_NAME: &str = ".oai-harvest";

/// Matches promoted cache files and captures their date component.
static PAGE_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4}-[0-9]{2}-[0-9]{2})-[0-9]{8,}\.xml\.gz$").expect("pattern is valid")
});

/// Resolved location of the cache base directory.
///
/// The base directory is configuration read once at startup and passed
/// explicitly wherever a cache path is derived; nothing in the crate mutates
/// process state after resolution.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    base: PathBuf,
}

impl CacheLayout {
    /// Create a layout rooted at the given directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve the base directory from an explicit override, the
    /// `OAI_HARVEST_DIR` environment variable, or the per-user default, in
    /// that order.
    pub fn resolve(override_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = override_dir {
            return Self::new(dir);
        }
        if let Ok(dir) = std::env::var(ENV_BASE_DIR) {
            if !dir.is_empty() {
                return Self::new(dir);
            }
        }
        let home = directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(DEFAULT_DIR_NAME))
    }

    /// The base directory all endpoint caches live under.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory for one endpoint identity.
    ///
    /// The name is the URL-safe base64 encoding, without padding, of
    /// `set + "#" + format + "#" + base_url`. The encoding is part of the
    /// cache format: other tools locate a harvest by recomputing it.
    pub fn endpoint_dir(&self, base_url: &str, set: Option<&str>, format: &str) -> PathBuf {
        let identity = format!("{}#{}#{}", set.unwrap_or(""), format, base_url);
        self.base.join(URL_SAFE_NO_PAD.encode(identity.as_bytes()))
    }
}

/// Create the cache directory and any missing parents.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Permanent filename for a promoted page.
pub fn page_filename(date: NaiveDate, page: u32) -> String {
    format!("{}-{:08}.xml.gz", date.format("%Y-%m-%d"), page)
}

/// Transient filename for a page that has not been promoted yet.
pub fn temp_filename(date: NaiveDate, page: u32, suffix: &str) -> String {
    format!("{}-{:08}.xml{}", date.format("%Y-%m-%d"), page, suffix)
}

/// Choose a fresh random suffix marking one batch of temporary files.
pub fn batch_suffix() -> String {
    format!("-tmp-{}", rand::thread_rng().gen_range(0..1_000_000_000))
}

/// All promoted cache files in a harvest directory, sorted by name.
pub fn cached_files(dir: &Path) -> Vec<PathBuf> {
    glob_in(dir, "*.xml.gz")
}

/// All temporary files in a harvest directory, regardless of batch.
pub fn temporary_files(dir: &Path) -> Vec<PathBuf> {
    glob_in(dir, "*.xml-tmp-*")
}

/// Temporary files belonging to the batch with the given suffix, sorted by
/// name, which equals page order thanks to the zero-padded page index.
pub fn temporary_files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    glob_in(dir, &format!("*.xml{suffix}"))
}

/// The latest date covered by any promoted file, if the cache is non-empty.
pub fn last_cached_date(dir: &Path) -> Option<NaiveDate> {
    cached_files(dir)
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .filter_map(|name| PAGE_FILE_PATTERN.captures(name))
        .filter_map(|captures| NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d").ok())
        .max()
}

/// Remove every temporary file in the harvest directory.
///
/// A file that disappears concurrently is not an error; any other removal
/// failure aborts the sweep.
pub fn sweep_temporary_files(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for path in temporary_files(dir) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
            Err(error) => return Err(error),
        }
    }
    Ok(removed)
}

fn glob_in(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern);
    match glob::glob(&full) {
        Ok(paths) => {
            let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
            files.sort();
            files
        }
        Err(error) => {
            warn!(%error, "invalid glob pattern for cache directory");
            Vec::new()
        }
    }
}

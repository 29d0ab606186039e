//! Reading and writing baseline files.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use treeaudit_core::Snapshot;

use crate::format::{FormatError, decode_snapshot, encode_snapshot};

/// Errors from baseline persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No baseline at {path}")]
    NotFound { path: PathBuf },

    #[error("Baseline {path} is corrupt: {source}")]
    CorruptData {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("Cannot write baseline to {path}: destination directory does not exist or is not writable")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Snapshot could not be encoded: {0}")]
    Encode(#[source] FormatError),
}

impl StoreError {
    /// Whether the error only means there was nothing to load.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Write `snapshot` to `path`, replacing any previous baseline.
///
/// The bytes go to a temporary file in the destination directory which is
/// synced and then renamed over `path`, so readers see either the old or
/// the new baseline in full.
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<(), StoreError> {
    let bytes = encode_snapshot(snapshot).map_err(StoreError::Encode)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(StoreError::Destination {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "parent directory missing"),
        });
    }

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| StoreError::Destination {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    info!(path = %path.display(), bytes = bytes.len(), "baseline saved");
    Ok(())
}

/// Read the baseline at `path`.
pub fn load(path: &Path) -> Result<Snapshot, StoreError> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let snapshot = decode_snapshot(&bytes).map_err(|source| StoreError::CorruptData {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), bytes = bytes.len(), "baseline loaded");
    Ok(snapshot)
}

/// Read the baseline at `path`, treating a missing file as no baseline.
pub fn load_optional(path: &Path) -> Result<Option<Snapshot>, StoreError> {
    match load(path) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

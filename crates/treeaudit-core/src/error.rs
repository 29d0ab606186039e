//! Error and warning types for building snapshots.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::Identity;

/// Violations of the node model's insertion contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Child has no identity to be keyed by.
    #[error("Invalid child {name}: node has no identity")]
    InvalidChild { name: CompactString },

    /// A sibling already holds this identity.
    #[error("Duplicate child in {parent}: identity {identity} already present")]
    DuplicateChild {
        parent: CompactString,
        identity: Identity,
    },

    /// A child is stored under a key that is not its own identity.
    #[error("Child {name} of {parent} is stored under a foreign identity")]
    MismatchedKey {
        parent: CompactString,
        name: CompactString,
    },
}

/// Failure to fingerprint a single file.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The file could not be opened or became unreadable mid-stream.
    #[error("Read error at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FingerprintError {
    /// Create a read error with path context.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation was cancelled.
    #[error("Operation interrupted")]
    Interrupted,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The builder broke the node model's contract.
    #[error(transparent)]
    Node(#[from] NodeError),
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Symbolic link target does not exist.
    BrokenSymlink,
    /// Error reading file/directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// Filesystem boundary crossed (when not allowed).
    CrossFilesystem,
    /// Entry shares its identity with one already in the tree.
    DuplicateIdentity,
    /// Entry is recorded without a content fingerprint.
    Unhashable,
}

/// Non-fatal warning encountered during scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    #[serde(with = "crate::path_serde")]
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create a broken symlink warning.
    pub fn broken_symlink(path: impl Into<PathBuf>, target: &str) -> Self {
        let path = path.into();
        Self {
            message: format!("Broken symlink: {} -> {target}", path.display()),
            path,
            kind: WarningKind::BrokenSymlink,
        }
    }

    /// Create a read error warning, classifying permission failures.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        if error.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::permission_denied(path);
        }
        Self {
            message: format!("Read error: {error}"),
            path,
            kind: WarningKind::ReadError,
        }
    }

    /// Create a warning for a file that could not be fingerprinted.
    pub fn from_fingerprint(error: &FingerprintError) -> Self {
        match error {
            FingerprintError::Read { path, source } => {
                let mut warning = Self::read_error(path.clone(), source);
                warning.message = format!("Could not fingerprint: {}", warning.message);
                warning
            }
        }
    }
}

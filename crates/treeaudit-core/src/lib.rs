//! Core types for treeaudit.
//!
//! This crate provides the snapshot data model shared by the scanner, the
//! diff engine and the baseline store: file and directory nodes keyed by
//! identity, content fingerprints, scan configuration and error types.

mod config;
mod error;
mod fingerprint;
mod node;
mod path_serde;
mod tree;

pub use config::{DEFAULT_CHUNK_SIZE, IdentityStrategy, ScanConfig, ScanConfigBuilder};
pub use error::{FingerprintError, NodeError, ScanError, ScanWarning, WarningKind};
pub use fingerprint::{DIGEST_LEN, Fingerprint, HashAlgorithm};
pub use node::{DirectoryNode, FileKind, FileNode, Identity, InodeInfo, Node, Walk};
pub use tree::{Snapshot, TreeStats};

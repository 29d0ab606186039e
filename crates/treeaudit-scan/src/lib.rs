//! Snapshot builder for treeaudit.
//!
//! This crate walks a directory tree with jwalk and turns it into a
//! [`Snapshot`]: a tree of file and directory nodes keyed by identity,
//! with every file fingerprinted from its content.
//!
//! # Overview
//!
//! - **Deterministic** traversal, children sorted by name
//! - **Streaming fingerprints** (SHA-256 or BLAKE3) in fixed-size chunks
//! - **Partial results**: unreadable entries become warnings, not errors
//! - **Symlinks** recorded by target, never followed
//! - **Progress updates** via broadcast channels and cooperative cancellation
//!
//! # Example
//!
//! ```rust,no_run
//! use treeaudit_scan::{ScanConfig, SnapshotBuilder};
//!
//! let config = ScanConfig::new("/path/to/audit");
//! let snapshot = SnapshotBuilder::new().build(&config).unwrap();
//!
//! println!("Total size: {} bytes", snapshot.total_size());
//! for warning in &snapshot.warnings {
//!     eprintln!("warning: {}", warning.message);
//! }
//! ```

mod hasher;
mod inode;
mod progress;
mod scanner;

pub use hasher::{fingerprint_bytes, fingerprint_file};
pub use progress::ScanProgress;
pub use scanner::{SnapshotBuilder, build};

// Re-export core types for convenience
pub use treeaudit_core::{
    DirectoryNode, FileKind, FileNode, Fingerprint, FingerprintError, HashAlgorithm, Identity,
    IdentityStrategy, Node, ScanConfig, ScanError, ScanWarning, Snapshot, TreeStats, WarningKind,
};
pub use tokio_util::sync::CancellationToken;

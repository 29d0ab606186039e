//! Baseline persistence for treeaudit.
//!
//! A baseline is one [`Snapshot`] in a self-describing binary file: a
//! fixed header (magic, version, payload length, checksum) followed by the
//! encoded tree. Loading verifies every part of the header and the tree's
//! structure, so a damaged file is reported instead of silently diffed.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treeaudit_store::{load_optional, save};
//!
//! # fn run(snapshot: treeaudit_core::Snapshot) -> Result<(), treeaudit_store::StoreError> {
//! let path = Path::new("audit.log");
//! if let Some(previous) = load_optional(path)? {
//!     println!("previous baseline has {} files", previous.total_files());
//! }
//! save(&snapshot, path)?;
//! # Ok(())
//! # }
//! ```

mod format;
mod store;

pub use format::{
    FORMAT_VERSION, FormatError, HEADER_LEN, MAGIC, SnapshotHeader, decode_snapshot,
    encode_snapshot,
};
pub use store::{StoreError, load, load_optional, save};

pub use treeaudit_core::Snapshot;

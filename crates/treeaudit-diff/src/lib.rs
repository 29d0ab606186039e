//! Snapshot comparison for treeaudit.
//!
//! Compares an old snapshot (the baseline) with a new one and reports what
//! was added, removed, resized or rewritten. Unchanged files produce no
//! record: the output is a change list, not a listing.
//!
//! ```rust,ignore
//! use treeaudit_diff::DiffReport;
//! use treeaudit_scan::build;
//!
//! let before = build("/srv/www").unwrap();
//! // ... time passes ...
//! let after = build("/srv/www").unwrap();
//!
//! let report = DiffReport::between_snapshots(Some(&before), Some(&after));
//! for change in &report.changes {
//!     println!("{change}");
//! }
//! ```

mod change;
mod engine;

pub use change::{Change, ChangeKind, DiffSummary};
pub use engine::{DiffReport, diff, diff_snapshots};

// Re-export core types
pub use treeaudit_core::{DirectoryNode, FileNode, Fingerprint, Node, Snapshot};

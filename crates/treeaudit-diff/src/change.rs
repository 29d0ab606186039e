//! Change records produced by comparing two snapshots.

use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use treeaudit_core::Fingerprint;

/// What happened to a path between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Present only in the new snapshot.
    Added,
    /// Present only in the old snapshot.
    Removed,
    /// Size differs (directories, or files whose content could not be read).
    SizeChanged { from: u64, to: u64 },
    /// File content differs.
    ContentChanged { from: Fingerprint, to: Fingerprint },
}

impl ChangeKind {
    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Added => "Added",
            ChangeKind::Removed => "Removed",
            ChangeKind::SizeChanged { .. } => "Size changed",
            ChangeKind::ContentChanged { .. } => "Content changed",
        }
    }
}

/// One entry in a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Absolute path of the affected node.
    pub path: CompactString,
    /// Whether the affected node is a directory.
    pub is_dir: bool,
    /// What changed.
    pub kind: ChangeKind,
}

impl Change {
    pub fn new(path: impl Into<CompactString>, is_dir: bool, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            is_dir,
            kind,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.path)?;
        match &self.kind {
            ChangeKind::SizeChanged { from, to } => write!(f, " ({from} -> {to} bytes)"),
            ChangeKind::ContentChanged { from, to } => write!(f, " ({from} -> {to})"),
            ChangeKind::Added | ChangeKind::Removed => Ok(()),
        }
    }
}

/// Per-kind counts of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub size_changed: usize,
    pub content_changed: usize,
}

impl DiffSummary {
    /// Count the records in `changes`.
    pub fn from_changes(changes: &[Change]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.kind {
                ChangeKind::Added => summary.added += 1,
                ChangeKind::Removed => summary.removed += 1,
                ChangeKind::SizeChanged { .. } => summary.size_changed += 1,
                ChangeKind::ContentChanged { .. } => summary.content_changed += 1,
            }
        }
        summary
    }

    /// Total number of records.
    pub fn total(&self) -> usize {
        self.added + self.removed + self.size_changed + self.content_changed
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} size changed, {} content changed",
            self.added, self.removed, self.size_changed, self.content_changed
        )
    }
}

//! Snapshot container and statistics.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::IdentityStrategy;
use crate::error::ScanWarning;
use crate::fingerprint::HashAlgorithm;
use crate::node::{DirectoryNode, Node};

/// Summary statistics for a scanned tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total size in bytes.
    pub total_size: u64,
    /// Total number of files (symlinks and special files included).
    pub total_files: u64,
    /// Total number of directories, excluding the root.
    pub total_dirs: u64,
    /// Total number of symbolic links.
    pub total_symlinks: u64,
    /// Maximum depth reached.
    pub max_depth: u32,
    /// Largest file (path, size).
    #[serde(with = "crate::path_serde::sized")]
    pub largest_file: Option<(PathBuf, u64)>,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a file entry.
    pub fn record_file(&mut self, path: PathBuf, size: u64, depth: u32) {
        self.total_files += 1;
        self.total_size += size;
        self.max_depth = self.max_depth.max(depth);

        if self.largest_file.as_ref().is_none_or(|(_, s)| size > *s) {
            self.largest_file = Some((path, size));
        }
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.total_dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a symlink.
    pub fn record_symlink(&mut self) {
        self.total_symlinks += 1;
    }
}

/// Immutable picture of a directory tree at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Root directory node.
    pub root: DirectoryNode,

    /// Root path that was scanned.
    #[serde(with = "crate::path_serde")]
    pub root_path: PathBuf,

    /// When this snapshot was taken.
    pub taken_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Algorithm that produced the file fingerprints.
    pub algorithm: HashAlgorithm,

    /// How nodes are keyed.
    pub identity: IdentityStrategy,

    /// Summary statistics.
    pub stats: TreeStats,

    /// Warnings encountered during scan.
    pub warnings: Vec<ScanWarning>,
}

impl Snapshot {
    /// Wrap a root directory with default metadata.
    pub fn new(root: DirectoryNode, root_path: impl Into<PathBuf>) -> Self {
        Self {
            root,
            root_path: root_path.into(),
            taken_at: SystemTime::now(),
            scan_duration: Duration::ZERO,
            algorithm: HashAlgorithm::default(),
            identity: IdentityStrategy::default(),
            stats: TreeStats::new(),
            warnings: Vec::new(),
        }
    }

    /// Root as a generic node.
    pub fn root_node(&self) -> Node {
        Node::Directory(self.root.clone())
    }

    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.size()
    }

    /// Get the total number of files.
    pub fn total_files(&self) -> u64 {
        self.stats.total_files
    }

    /// Get the total number of directories.
    pub fn total_dirs(&self) -> u64 {
        self.stats.total_dirs
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::node::{FileNode, Identity};

    #[test]
    fn test_tree_stats_default() {
        let stats = TreeStats::default();
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.total_files, 0);
        assert_eq!(stats.total_dirs, 0);
    }

    #[test]
    fn test_tree_stats_record_file() {
        let mut stats = TreeStats::new();

        stats.record_file(PathBuf::from("/test/file.txt"), 1024, 2);
        stats.record_file(PathBuf::from("/test/small.txt"), 10, 1);

        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_size, 1034);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(
            stats.largest_file,
            Some((PathBuf::from("/test/file.txt"), 1024))
        );
    }

    #[test]
    fn test_snapshot_total_size() {
        let root = DirectoryNode::new("/r", Identity::name("r"))
            .with_child(FileNode::new("/r/a", Identity::name("a"), 12, Fingerprint::Unreadable))
            .unwrap();
        let snapshot = Snapshot::new(root, "/r");

        assert_eq!(snapshot.total_size(), 12);
        assert!(!snapshot.has_warnings());
    }
}

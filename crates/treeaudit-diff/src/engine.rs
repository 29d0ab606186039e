//! Tree comparison.
//!
//! Children are matched by identity. For every directory pair the engine
//! emits, in order:
//!
//! 1. a size change for the directory itself, if any,
//! 2. every new child subtree as `Added` (pre-order),
//! 3. every vanished child subtree as `Removed` (pre-order),
//! 4. the comparison of each child present on both sides.
//!
//! Children are visited in identity order, so the output for a given pair
//! of trees is always the same. The walk is driven by an explicit stack,
//! which keeps native stack use flat for arbitrarily deep trees.

use serde::{Deserialize, Serialize};

use treeaudit_core::{DirectoryNode, FileNode, Node, Snapshot};

use crate::change::{Change, ChangeKind, DiffSummary};

/// Borrowed view of either node variant.
#[derive(Clone, Copy)]
enum NodeRef<'a> {
    File(&'a FileNode),
    Directory(&'a DirectoryNode),
}

impl<'a> NodeRef<'a> {
    fn name(&self) -> &'a str {
        match self {
            NodeRef::File(file) => &file.name,
            NodeRef::Directory(dir) => &dir.name,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, NodeRef::Directory(_))
    }
}

impl<'a> From<&'a Node> for NodeRef<'a> {
    fn from(node: &'a Node) -> Self {
        match node {
            Node::File(file) => NodeRef::File(file),
            Node::Directory(dir) => NodeRef::Directory(dir),
        }
    }
}

impl<'a> From<&'a DirectoryNode> for NodeRef<'a> {
    fn from(dir: &'a DirectoryNode) -> Self {
        NodeRef::Directory(dir)
    }
}

enum Work<'a> {
    Added(NodeRef<'a>),
    Removed(NodeRef<'a>),
    Compare(NodeRef<'a>, NodeRef<'a>),
}

/// Compare two trees. Either side may be absent.
pub fn diff(old: Option<&Node>, new: Option<&Node>) -> Vec<Change> {
    run(old.map(NodeRef::from), new.map(NodeRef::from))
}

/// Compare two snapshots by their root directories.
pub fn diff_snapshots(old: Option<&Snapshot>, new: Option<&Snapshot>) -> Vec<Change> {
    run(
        old.map(|s| NodeRef::from(&s.root)),
        new.map(|s| NodeRef::from(&s.root)),
    )
}

fn run(old: Option<NodeRef<'_>>, new: Option<NodeRef<'_>>) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut stack = Vec::new();

    match (old, new) {
        (None, None) => {}
        (None, Some(new)) => stack.push(Work::Added(new)),
        (Some(old), None) => stack.push(Work::Removed(old)),
        // Roots are compared with each other whatever their identities.
        (Some(old), Some(new)) => stack.push(Work::Compare(old, new)),
    }

    while let Some(work) = stack.pop() {
        match work {
            Work::Added(node) => {
                changes.push(Change::new(node.name(), node.is_dir(), ChangeKind::Added));
                if let NodeRef::Directory(dir) = node {
                    stack.extend(dir.children().values().rev().map(|c| Work::Added(c.into())));
                }
            }
            Work::Removed(node) => {
                changes.push(Change::new(node.name(), node.is_dir(), ChangeKind::Removed));
                if let NodeRef::Directory(dir) = node {
                    stack.extend(dir.children().values().rev().map(|c| Work::Removed(c.into())));
                }
            }
            Work::Compare(old, new) => compare(old, new, &mut changes, &mut stack),
        }
    }

    changes
}

fn compare<'a>(
    old: NodeRef<'a>,
    new: NodeRef<'a>,
    changes: &mut Vec<Change>,
    stack: &mut Vec<Work<'a>>,
) {
    match (old, new) {
        (NodeRef::File(old), NodeRef::File(new)) => {
            if old.fingerprint != new.fingerprint {
                changes.push(Change::new(
                    new.name.clone(),
                    false,
                    ChangeKind::ContentChanged {
                        from: old.fingerprint,
                        to: new.fingerprint,
                    },
                ));
            } else if old.size != new.size {
                // Only reachable when neither side could be read.
                changes.push(Change::new(
                    new.name.clone(),
                    false,
                    ChangeKind::SizeChanged {
                        from: old.size,
                        to: new.size,
                    },
                ));
            }
        }
        (NodeRef::Directory(old), NodeRef::Directory(new)) => {
            let (from, to) = (old.size(), new.size());
            if from != to {
                changes.push(Change::new(
                    new.name.clone(),
                    true,
                    ChangeKind::SizeChanged { from, to },
                ));
            }

            let mut pending = Vec::new();
            for (identity, child) in new.children() {
                if old.get(identity).is_none() {
                    pending.push(Work::Added(child.into()));
                }
            }
            for (identity, child) in old.children() {
                if new.get(identity).is_none() {
                    pending.push(Work::Removed(child.into()));
                }
            }
            for (identity, old_child) in old.children() {
                if let Some(new_child) = new.get(identity) {
                    pending.push(Work::Compare(old_child.into(), new_child.into()));
                }
            }
            stack.extend(pending.into_iter().rev());
        }
        // Kind changed: the old subtree goes away, then the new one appears.
        (old, new) => {
            stack.push(Work::Added(new));
            stack.push(Work::Removed(old));
        }
    }
}

/// Result of comparing a baseline with a fresh snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    /// Ordered change records.
    pub changes: Vec<Change>,
    /// Per-kind counts.
    pub summary: DiffSummary,
}

impl DiffReport {
    /// Compare two trees.
    pub fn between(old: Option<&Node>, new: Option<&Node>) -> Self {
        Self::from_changes(diff(old, new))
    }

    /// Compare two snapshots.
    pub fn between_snapshots(old: Option<&Snapshot>, new: Option<&Snapshot>) -> Self {
        Self::from_changes(diff_snapshots(old, new))
    }

    fn from_changes(changes: Vec<Change>) -> Self {
        let summary = DiffSummary::from_changes(&changes);
        tracing::debug!(%summary, "diff complete");
        Self { changes, summary }
    }

    /// Check if the two sides were identical.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeaudit_core::{Fingerprint, HashAlgorithm, Identity};

    fn file(path: &str, size: u64, byte: u8) -> Node {
        let name = path.rsplit('/').next().unwrap_or(path);
        FileNode::new(
            path,
            Identity::name(name),
            size,
            Fingerprint::digest(HashAlgorithm::Sha256, [byte; 32]),
        )
        .into()
    }

    fn dir(path: &str, children: Vec<Node>) -> Node {
        let name = path.rsplit('/').next().unwrap_or(path);
        let mut node = DirectoryNode::new(path, Identity::name(name));
        for child in children {
            node.add_child(child).unwrap();
        }
        node.into()
    }

    fn rendered(changes: &[Change]) -> Vec<String> {
        changes.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_absent_sides() {
        assert!(diff(None, None).is_empty());

        let tree = dir("/r", vec![file("/r/a", 1, 1)]);
        let added = diff(None, Some(&tree));
        assert_eq!(rendered(&added), vec!["Added: /r", "Added: /r/a"]);

        let removed = diff(Some(&tree), None);
        assert_eq!(rendered(&removed), vec!["Removed: /r", "Removed: /r/a"]);
    }

    #[test]
    fn test_self_diff_is_empty() {
        let tree = dir(
            "/r",
            vec![
                file("/r/a", 1, 1),
                dir("/r/s", vec![dir("/r/s/t", vec![file("/r/s/t/x", 4, 4)])]),
            ],
        );
        assert!(diff(Some(&tree), Some(&tree)).is_empty());
    }

    #[test]
    fn test_content_change() {
        let old = dir("/r", vec![file("/r/a", 4, 1)]);
        let new = dir("/r", vec![file("/r/a", 4, 2)]);

        let changes = diff(Some(&old), Some(&new));
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0].kind, ChangeKind::ContentChanged { .. }));
        assert_eq!(changes[0].path, "/r/a");
    }

    #[test]
    fn test_unreadable_files_compare_by_size() {
        let unreadable = |size| -> Node {
            FileNode::new("/r/u", Identity::name("u"), size, Fingerprint::Unreadable).into()
        };
        let old = dir("/r", vec![unreadable(3)]);
        let new = dir("/r", vec![unreadable(8)]);

        let changes = diff(Some(&old), Some(&new));
        assert_eq!(
            rendered(&changes),
            vec!["Size changed: /r (3 -> 8 bytes)", "Size changed: /r/u (3 -> 8 bytes)"]
        );
    }

    #[test]
    fn test_kind_change_removes_then_adds() {
        let old = dir("/r", vec![file("/r/x", 2, 1)]);
        let new = dir("/r", vec![dir("/r/x", vec![file("/r/x/inner", 2, 1)])]);

        let changes = diff(Some(&old), Some(&new));
        assert_eq!(
            rendered(&changes),
            vec!["Removed: /r/x", "Added: /r/x", "Added: /r/x/inner"]
        );
    }

    #[test]
    fn test_added_before_removed_before_recursion() {
        let old = dir(
            "/r",
            vec![file("/r/gone", 0, 1), dir("/r/m", vec![file("/r/m/f", 0, 1)])],
        );
        let new = dir(
            "/r",
            vec![file("/r/fresh", 0, 1), dir("/r/m", vec![file("/r/m/f", 0, 2)])],
        );

        let changes = diff(Some(&old), Some(&new));
        assert_eq!(
            rendered(&changes)
                .iter()
                .map(|s| s.split(" (").next().unwrap().to_string())
                .collect::<Vec<_>>(),
            vec!["Added: /r/fresh", "Removed: /r/gone", "Content changed: /r/m/f"]
        );
    }

    #[test]
    fn test_report_summary() {
        let old = dir("/r", vec![file("/r/a", 10, 1)]);
        let new = dir("/r", vec![file("/r/a", 10, 1), file("/r/b", 5, 1)]);

        let report = DiffReport::between(Some(&old), Some(&new));
        assert!(!report.is_empty());
        assert_eq!(report.summary.added, 1);
        assert_eq!(report.summary.size_changed, 1);
        assert_eq!(report.summary.total(), 2);
    }
}

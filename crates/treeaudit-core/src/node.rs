//! File and directory node types.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::hash::{Hash, Hasher};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::fingerprint::Fingerprint;

/// Inode information for identity keying.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// Key that matches a node across two snapshots.
///
/// Ordering is total so children iterate deterministically: by entry name
/// for `Name` identities, by `(inode, device)` for `Inode` identities.
/// Names that are not valid UTF-8 sort after all UTF-8 names.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Identity {
    /// Entry name within its parent directory.
    Name(CompactString),
    /// Entry name that is not valid UTF-8, kept byte for byte.
    RawName(Vec<u8>),
    /// Filesystem inode.
    Inode(InodeInfo),
}

impl Identity {
    /// Create a name identity.
    pub fn name(name: impl Into<CompactString>) -> Self {
        Self::Name(name.into())
    }

    /// Name identity for an on-disk entry name.
    ///
    /// Two distinct names always give distinct identities, including names
    /// that only differ in bytes a lossy conversion would replace.
    pub fn from_os_str(name: &OsStr) -> Self {
        match name.to_str() {
            Some(name) => Self::Name(name.into()),
            None => Self::RawName(name.as_encoded_bytes().to_vec()),
        }
    }

    /// Create an inode identity.
    pub fn inode(inode: u64, device: u64) -> Self {
        Self::Inode(InodeInfo::new(inode, device))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Name(name) => f.write_str(name),
            Identity::RawName(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Identity::Inode(info) => write!(f, "inode {}:{}", info.device, info.inode),
        }
    }
}

/// What a file node stands for on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// Regular file, fingerprinted from its content.
    #[default]
    Regular,
    /// Symbolic link, fingerprinted from its target string.
    Symlink,
    /// FIFO, socket or device; tracked for presence only.
    Special,
}

/// A file leaf in the snapshot tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    /// Absolute path.
    pub name: CompactString,
    /// Key used to match this node across snapshots.
    pub identity: Option<Identity>,
    /// Size in bytes.
    pub size: u64,
    /// Content fingerprint.
    pub fingerprint: Fingerprint,
    /// Kind of filesystem entry.
    pub kind: FileKind,
}

impl FileNode {
    /// Create a regular file node.
    pub fn new(
        name: impl Into<CompactString>,
        identity: impl Into<Option<Identity>>,
        size: u64,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            name: name.into(),
            identity: identity.into(),
            size,
            fingerprint,
            kind: FileKind::Regular,
        }
    }

    /// Set the entry kind.
    pub fn with_kind(mut self, kind: FileKind) -> Self {
        self.kind = kind;
        self
    }
}

impl PartialEq for FileNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fingerprint == other.fingerprint
    }
}

impl Eq for FileNode {}

impl Hash for FileNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.fingerprint.hash(state);
    }
}

/// A directory in the snapshot tree.
///
/// The size is never stored; it is recomputed from the children on every
/// call so it cannot go stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Absolute path.
    pub name: CompactString,
    /// Key used to match this node across snapshots.
    pub identity: Option<Identity>,
    children: BTreeMap<Identity, Node>,
}

impl DirectoryNode {
    /// Create an empty directory node.
    pub fn new(name: impl Into<CompactString>, identity: impl Into<Option<Identity>>) -> Self {
        Self {
            name: name.into(),
            identity: identity.into(),
            children: BTreeMap::new(),
        }
    }

    /// Insert a child keyed by its identity.
    pub fn add_child(&mut self, child: impl Into<Node>) -> Result<(), NodeError> {
        let child = child.into();
        let Some(identity) = child.identity().cloned() else {
            return Err(NodeError::InvalidChild {
                name: child.name().into(),
            });
        };
        if self.children.contains_key(&identity) {
            return Err(NodeError::DuplicateChild {
                parent: self.name.clone(),
                identity,
            });
        }
        self.children.insert(identity, child);
        Ok(())
    }

    /// Builder-style variant of [`add_child`](Self::add_child).
    pub fn with_child(mut self, child: impl Into<Node>) -> Result<Self, NodeError> {
        self.add_child(child)?;
        Ok(self)
    }

    /// Children keyed by identity, in identity order.
    pub fn children(&self) -> &BTreeMap<Identity, Node> {
        &self.children
    }

    /// Look up a direct child.
    pub fn get(&self, identity: &Identity) -> Option<&Node> {
        self.children.get(identity)
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Check if the directory has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Verify that every descendant is stored under its own identity.
    ///
    /// Trees built through [`add_child`](Self::add_child) always pass; this
    /// guards trees that were deserialized.
    pub fn check_integrity(&self) -> Result<(), NodeError> {
        let mut stack = vec![self];
        while let Some(dir) = stack.pop() {
            for (key, child) in &dir.children {
                if child.identity() != Some(key) {
                    return Err(NodeError::MismatchedKey {
                        parent: dir.name.clone(),
                        name: child.name().into(),
                    });
                }
                if let Node::Directory(sub) = child {
                    stack.push(sub);
                }
            }
        }
        Ok(())
    }

    /// Recursive sum of all descendant file sizes.
    pub fn size(&self) -> u64 {
        let mut total = 0u64;
        let mut stack: Vec<&Node> = self.children.values().collect();
        while let Some(node) = stack.pop() {
            match node {
                Node::File(file) => total = total.saturating_add(file.size),
                Node::Directory(dir) => stack.extend(dir.children.values()),
            }
        }
        total
    }
}

impl PartialEq for DirectoryNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.children == other.children
    }
}

impl Eq for DirectoryNode {}

impl Hash for DirectoryNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.children.len().hash(state);
        for (identity, child) in &self.children {
            identity.hash(state);
            child.hash(state);
        }
    }
}

/// A single file or directory in the snapshot tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    File(FileNode),
    Directory(DirectoryNode),
}

impl Node {
    /// Absolute path of this node.
    pub fn name(&self) -> &str {
        match self {
            Node::File(file) => &file.name,
            Node::Directory(dir) => &dir.name,
        }
    }

    /// Identity of this node, if assigned.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Node::File(file) => file.identity.as_ref(),
            Node::Directory(dir) => dir.identity.as_ref(),
        }
    }

    /// Size in bytes (recursive for directories).
    pub fn size(&self) -> u64 {
        match self {
            Node::File(file) => file.size,
            Node::Directory(dir) => dir.size(),
        }
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(file) => Some(file),
            Node::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            Node::Directory(dir) => Some(dir),
            Node::File(_) => None,
        }
    }

    /// Pre-order traversal of this node and all of its descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Number of files in this subtree (1 for a file).
    pub fn file_count(&self) -> u64 {
        self.walk().filter(|n| n.is_file()).count() as u64
    }

    /// Number of directories below this node, excluding itself.
    pub fn dir_count(&self) -> u64 {
        self.walk().skip(1).filter(|n| n.is_dir()).count() as u64
    }

    /// Verify that every child is stored under its own identity.
    pub fn check_integrity(&self) -> Result<(), NodeError> {
        match self {
            Node::File(_) => Ok(()),
            Node::Directory(dir) => dir.check_integrity(),
        }
    }
}

impl From<FileNode> for Node {
    fn from(file: FileNode) -> Self {
        Node::File(file)
    }
}

impl From<DirectoryNode> for Node {
    fn from(dir: DirectoryNode) -> Self {
        Node::Directory(dir)
    }
}

/// Pre-order iterator over a subtree, driven by an explicit stack.
pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Node::Directory(dir) = node {
            self.stack.extend(dir.children.values().rev());
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::HashAlgorithm;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::digest(HashAlgorithm::Sha256, [byte; 32])
    }

    fn file(name: &str, size: u64) -> FileNode {
        let short = name.rsplit('/').next().unwrap_or(name);
        FileNode::new(name, Identity::name(short), size, fp(size as u8))
    }

    #[test]
    fn test_add_child_requires_identity() {
        let mut dir = DirectoryNode::new("/root", Identity::name("root"));
        let orphan = FileNode::new("/root/a", None, 1, fp(1));

        let err = dir.add_child(orphan).unwrap_err();
        assert!(matches!(err, NodeError::InvalidChild { .. }));
        assert!(dir.is_empty());
    }

    #[test]
    fn test_add_child_rejects_duplicate_identity() {
        let mut dir = DirectoryNode::new("/root", Identity::name("root"));
        dir.add_child(file("/root/a", 1)).unwrap();

        let err = dir.add_child(file("/root/a", 2)).unwrap_err();
        assert!(matches!(err, NodeError::DuplicateChild { .. }));
        assert_eq!(dir.size(), 1);
    }

    #[test]
    fn test_directory_size_is_recursive_sum() {
        let nested = DirectoryNode::new("/root/sub", Identity::name("sub"))
            .with_child(file("/root/sub/c", 7))
            .unwrap();
        let root = DirectoryNode::new("/root", Identity::name("root"))
            .with_child(file("/root/a", 3))
            .unwrap()
            .with_child(file("/root/b", 5))
            .unwrap()
            .with_child(nested)
            .unwrap();

        assert_eq!(root.size(), 15);
        assert_eq!(Node::from(root).file_count(), 3);
    }

    #[test]
    fn test_size_tracks_later_insertions() {
        let mut root = DirectoryNode::new("/root", Identity::name("root"));
        assert_eq!(root.size(), 0);
        root.add_child(file("/root/a", 10)).unwrap();
        assert_eq!(root.size(), 10);
        root.add_child(file("/root/b", 4)).unwrap();
        assert_eq!(root.size(), 14);
    }

    #[test]
    fn test_file_equality_ignores_identity_and_size() {
        let a = FileNode::new("/x", Identity::inode(1, 1), 10, fp(9));
        let b = FileNode::new("/x", Identity::inode(2, 1), 99, fp(9));
        let c = FileNode::new("/x", Identity::inode(1, 1), 10, fp(8));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_file_and_directory_never_equal() {
        let f = Node::from(FileNode::new("/x", Identity::name("x"), 0, Fingerprint::Unreadable));
        let d = Node::from(DirectoryNode::new("/x", Identity::name("x")));
        assert_ne!(f, d);
    }

    #[test]
    fn test_equal_nodes_hash_equal() {
        use std::collections::hash_map::DefaultHasher;

        let build = || {
            Node::from(
                DirectoryNode::new("/r", Identity::name("r"))
                    .with_child(file("/r/a", 1))
                    .unwrap()
                    .with_child(file("/r/b", 2))
                    .unwrap(),
            )
        };
        let hash = |n: &Node| {
            let mut h = DefaultHasher::new();
            n.hash(&mut h);
            h.finish()
        };

        assert_eq!(build(), build());
        assert_eq!(hash(&build()), hash(&build()));
    }

    #[test]
    fn test_walk_is_preorder_by_identity() {
        let sub = DirectoryNode::new("/r/sub", Identity::name("sub"))
            .with_child(file("/r/sub/z", 1))
            .unwrap();
        let root = Node::from(
            DirectoryNode::new("/r", Identity::name("r"))
                .with_child(file("/r/b", 1))
                .unwrap()
                .with_child(sub)
                .unwrap()
                .with_child(file("/r/a", 1))
                .unwrap(),
        );

        let names: Vec<&str> = root.walk().map(|n| n.name()).collect();
        assert_eq!(names, vec!["/r", "/r/a", "/r/b", "/r/sub", "/r/sub/z"]);
        assert_eq!(root.dir_count(), 1);
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::name("a.txt").to_string(), "a.txt");
        assert_eq!(Identity::inode(42, 7).to_string(), "inode 7:42");
    }

    #[test]
    fn test_os_str_identity() {
        assert_eq!(Identity::from_os_str(OsStr::new("a.txt")), Identity::name("a.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_stay_distinct() {
        use std::os::unix::ffi::OsStrExt;

        let ff = Identity::from_os_str(OsStr::from_bytes(b"a\xff"));
        let fe = Identity::from_os_str(OsStr::from_bytes(b"a\xfe"));

        assert_ne!(ff, fe);
        assert!(matches!(ff, Identity::RawName(_)));
        assert_eq!(ff.to_string(), fe.to_string());

        let mut dir = DirectoryNode::new("/r", Identity::name("r"));
        dir.add_child(FileNode::new("/r/a1", ff, 1, fp(1))).unwrap();
        dir.add_child(FileNode::new("/r/a2", fe, 2, fp(2))).unwrap();
        assert_eq!(dir.len(), 2);
    }
}

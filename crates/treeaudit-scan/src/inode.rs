//! Hard-link handling for inode-keyed snapshots.

use dashmap::DashSet;
use treeaudit_core::InodeInfo;

/// Inodes already placed in the snapshot being built.
///
/// Under inode identity every link to a file resolves to the same key, and
/// a directory can only hold one child per key. The first link in walk
/// order claims the inode; later links are reported and left out.
#[derive(Debug, Default)]
pub(crate) struct SeenInodes {
    claimed: DashSet<InodeInfo>,
}

impl SeenInodes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim `info` for the current entry. `false` means an earlier link
    /// already holds it.
    pub(crate) fn claim(&self, info: InodeInfo) -> bool {
        self.claimed.insert(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_link_claims_inode() {
        let seen = SeenInodes::new();
        let file = InodeInfo::new(812, 3);

        assert!(seen.claim(file));
        assert!(!seen.claim(file));
    }

    #[test]
    fn test_same_inode_number_on_other_device_is_distinct() {
        let seen = SeenInodes::new();

        assert!(seen.claim(InodeInfo::new(812, 3)));
        assert!(seen.claim(InodeInfo::new(812, 4)));
    }
}

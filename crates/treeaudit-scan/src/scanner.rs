//! JWalk-based snapshot builder.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use treeaudit_core::{
    DirectoryNode, FileKind, FileNode, Fingerprint, Identity, IdentityStrategy, InodeInfo, Node,
    NodeError, ScanConfig, ScanError, ScanWarning, Snapshot, TreeStats, WarningKind,
};

use crate::hasher::{fingerprint_bytes, fingerprint_file};
use crate::inode::SeenInodes;
use crate::progress::ScanProgress;

/// How often (in files) a progress update is broadcast.
const PROGRESS_INTERVAL: u64 = 1000;

/// Builds snapshots of a directory tree from the live filesystem.
pub struct SnapshotBuilder {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl SnapshotBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Snapshot the tree rooted at `config.root`.
    pub fn build(&self, config: &ScanConfig) -> Result<Snapshot, ScanError> {
        self.build_with_cancel(config, &CancellationToken::new())
    }

    /// Snapshot the tree, aborting with [`ScanError::Interrupted`] once
    /// `cancel` fires.
    ///
    /// Per-entry failures never abort the walk; they are collected in
    /// [`Snapshot::warnings`] and the entry is skipped or recorded with an
    /// unreadable fingerprint.
    pub fn build_with_cancel(
        &self,
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> Result<Snapshot, ScanError> {
        config.check()?;
        let start = Instant::now();
        let root_path = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;

        let root_metadata =
            std::fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !root_metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }

        let mut state = ScanState {
            config,
            ignore: config.ignore_matcher()?,
            root_device: get_dev(&root_metadata),
            seen_inodes: SeenInodes::new(),
            stats: TreeStats::new(),
            warnings: Vec::new(),
            entries_by_parent: HashMap::new(),
            dir_order: Vec::new(),
            pruned: HashSet::new(),
            bytes_hashed: 0,
            start,
        };

        let root_name = root_path.as_os_str();
        let root_identity = match state.identity_for(&root_path, root_name, &root_metadata) {
            Some(identity) => identity,
            None => Identity::from_os_str(root_name),
        };
        state.dir_order.push((root_path.clone(), root_identity));

        self.collect_entries(&mut state, &root_path, cancel)?;

        let ScanState {
            stats,
            mut warnings,
            entries_by_parent,
            dir_order,
            ..
        } = state;
        let root = assemble_tree(&root_path, dir_order, entries_by_parent, &mut warnings)?;

        tracing::debug!(
            root = %root_path.display(),
            files = stats.total_files,
            dirs = stats.total_dirs,
            warnings = warnings.len(),
            "snapshot built"
        );

        Ok(Snapshot {
            root,
            root_path,
            taken_at: SystemTime::now(),
            scan_duration: start.elapsed(),
            algorithm: config.algorithm,
            identity: config.identity,
            stats,
            warnings,
        })
    }

    /// Walk the tree in sorted order, fingerprinting files as they appear.
    fn collect_entries(
        &self,
        state: &mut ScanState<'_>,
        root_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), ScanError> {
        let config = state.config;
        let parallelism = match config.threads {
            0 | 1 => Parallelism::Serial,
            n => Parallelism::RayonNewPool(n),
        };

        let walker = WalkDir::new(root_path)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(!config.include_hidden)
            .follow_links(false)
            .min_depth(1)
            .max_depth(config.max_depth.map(|d| d as usize).unwrap_or(usize::MAX));

        let mut files_seen: u64 = 0;

        for entry_result in walker {
            if cancel.is_cancelled() {
                return Err(ScanError::Interrupted);
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let warning = match err.io_error() {
                        Some(io) => ScanWarning::read_error(path, io),
                        None => ScanWarning::new(path, err.to_string(), WarningKind::ReadError),
                    };
                    state.warn(warning);
                    continue;
                }
            };

            let path = entry.path();
            let Some(parent) = path.parent().map(Path::to_path_buf) else {
                continue;
            };
            let file_type = entry.file_type();
            let is_dir = file_type.is_dir();

            if state.pruned.contains(&parent) {
                if is_dir {
                    state.pruned.insert(path);
                }
                continue;
            }

            let file_name = entry.file_name().to_os_string();
            if state.ignore.is_match(&file_name) {
                tracing::trace!(path = %path.display(), "ignored");
                state.prune(path, is_dir);
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    let warning = match err.io_error() {
                        Some(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                            ScanWarning::permission_denied(&path)
                        }
                        _ => ScanWarning::new(&path, err.to_string(), WarningKind::MetadataError),
                    };
                    state.warn(warning);
                    state.prune(path, is_dir);
                    continue;
                }
            };

            if !config.cross_filesystems && get_dev(&metadata) != state.root_device {
                state.warn(ScanWarning::new(
                    &path,
                    format!("Skipped, on another filesystem: {}", path.display()),
                    WarningKind::CrossFilesystem,
                ));
                state.prune(path, is_dir);
                continue;
            }

            let Some(identity) = state.identity_for(&path, &file_name, &metadata) else {
                state.prune(path, is_dir);
                continue;
            };

            let depth = entry.depth() as u32;

            if is_dir {
                state.stats.record_dir(depth);
                state.dir_order.push((path.clone(), identity));
                state.push_entry(parent, EntryInfo {
                    path,
                    kind: EntryKind::Directory,
                });
                continue;
            }

            let size = metadata.len();
            let (fingerprint, kind) = if file_type.is_symlink() {
                state.stats.record_symlink();
                (state.fingerprint_symlink(&path), FileKind::Symlink)
            } else if file_type.is_file() {
                (state.fingerprint_regular(&path, size), FileKind::Regular)
            } else {
                state.warn(ScanWarning::new(
                    &path,
                    format!("Special file tracked without content: {}", path.display()),
                    WarningKind::Unhashable,
                ));
                (Fingerprint::Unreadable, FileKind::Special)
            };

            state.stats.record_file(path.clone(), size, depth);

            if files_seen % PROGRESS_INTERVAL == 0 {
                let _ = self.progress_tx.send(state.progress(&path));
            }
            files_seen += 1;

            state.push_entry(parent, EntryInfo {
                path,
                kind: EntryKind::File {
                    identity,
                    size,
                    fingerprint,
                    kind,
                },
            });
        }

        Ok(())
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot `root` with the default configuration.
pub fn build(root: impl Into<PathBuf>) -> Result<Snapshot, ScanError> {
    SnapshotBuilder::new().build(&ScanConfig::new(root))
}

/// Mutable bookkeeping for a single walk.
struct ScanState<'a> {
    config: &'a ScanConfig,
    ignore: globset::GlobSet,
    root_device: u64,
    seen_inodes: SeenInodes,
    stats: TreeStats,
    warnings: Vec<ScanWarning>,
    entries_by_parent: HashMap<PathBuf, Vec<EntryInfo>>,
    /// Directories in walk (pre-)order, root first.
    dir_order: Vec<(PathBuf, Identity)>,
    /// Directories whose contents are skipped.
    pruned: HashSet<PathBuf>,
    bytes_hashed: u64,
    start: Instant,
}

impl ScanState<'_> {
    fn warn(&mut self, warning: ScanWarning) {
        tracing::debug!(
            path = %warning.path.display(),
            kind = ?warning.kind,
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    fn prune(&mut self, path: PathBuf, is_dir: bool) {
        if is_dir {
            self.pruned.insert(path);
        }
    }

    fn push_entry(&mut self, parent: PathBuf, entry: EntryInfo) {
        self.entries_by_parent.entry(parent).or_default().push(entry);
    }

    /// Identity for an entry, or `None` if it must be skipped.
    fn identity_for(&mut self, path: &Path, name: &OsStr, metadata: &Metadata) -> Option<Identity> {
        match self.config.identity {
            IdentityStrategy::Name => Some(Identity::from_os_str(name)),
            IdentityStrategy::Inode => {
                let info = InodeInfo::new(get_ino(metadata), get_dev(metadata));
                if self.seen_inodes.claim(info) {
                    Some(Identity::Inode(info))
                } else {
                    self.warn(ScanWarning::new(
                        path,
                        format!(
                            "Skipped hard link, inode {} already recorded: {}",
                            info.inode,
                            path.display()
                        ),
                        WarningKind::DuplicateIdentity,
                    ));
                    None
                }
            }
        }
    }

    fn fingerprint_regular(&mut self, path: &Path, size: u64) -> Fingerprint {
        match fingerprint_file(path, self.config.algorithm, self.config.chunk_size) {
            Ok(fingerprint) => {
                self.bytes_hashed += size;
                fingerprint
            }
            Err(err) => {
                self.warn(ScanWarning::from_fingerprint(&err));
                Fingerprint::Unreadable
            }
        }
    }

    /// Symlinks are never followed; the target string is the content.
    fn fingerprint_symlink(&mut self, path: &Path) -> Fingerprint {
        match std::fs::read_link(path) {
            Ok(target) => {
                if !path.exists() {
                    self.warn(ScanWarning::broken_symlink(path, &target.to_string_lossy()));
                }
                fingerprint_bytes(target.as_os_str().as_encoded_bytes(), self.config.algorithm)
            }
            Err(err) => {
                self.warn(ScanWarning::read_error(path, &err));
                Fingerprint::Unreadable
            }
        }
    }

    fn progress(&self, current: &Path) -> ScanProgress {
        ScanProgress {
            files_scanned: self.stats.total_files,
            dirs_scanned: self.stats.total_dirs,
            bytes_hashed: self.bytes_hashed,
            current_path: current.to_path_buf(),
            warnings_count: self.warnings.len() as u64,
            elapsed: self.start.elapsed(),
        }
    }
}

/// Temporary struct for collecting entry information.
struct EntryInfo {
    path: PathBuf,
    kind: EntryKind,
}

enum EntryKind {
    Directory,
    File {
        identity: Identity,
        size: u64,
        fingerprint: Fingerprint,
        kind: FileKind,
    },
}

/// Assemble directories bottom-up without recursion.
///
/// `dir_order` is in pre-order, so walking it backwards completes every
/// subdirectory before its parent is assembled. An entry whose identity is
/// already taken in its parent is dropped with a warning.
fn assemble_tree(
    root_path: &Path,
    dir_order: Vec<(PathBuf, Identity)>,
    mut entries_by_parent: HashMap<PathBuf, Vec<EntryInfo>>,
    warnings: &mut Vec<ScanWarning>,
) -> Result<DirectoryNode, ScanError> {
    let mut built: HashMap<PathBuf, DirectoryNode> = HashMap::new();

    for (path, identity) in dir_order.into_iter().rev() {
        let mut dir = DirectoryNode::new(path_name(&path), identity);

        for entry in entries_by_parent.remove(&path).unwrap_or_default() {
            let child: Node = match entry.kind {
                EntryKind::Directory => match built.remove(&entry.path) {
                    Some(child) => child.into(),
                    None => continue,
                },
                EntryKind::File {
                    identity,
                    size,
                    fingerprint,
                    kind,
                } => FileNode::new(path_name(&entry.path), identity, size, fingerprint)
                    .with_kind(kind)
                    .into(),
            };

            match dir.add_child(child) {
                Ok(()) => {}
                Err(NodeError::DuplicateChild { identity, .. }) => {
                    let warning = ScanWarning::new(
                        &entry.path,
                        format!(
                            "Skipped, identity {identity} already recorded: {}",
                            entry.path.display()
                        ),
                        WarningKind::DuplicateIdentity,
                    );
                    tracing::debug!(path = %entry.path.display(), "{}", warning.message);
                    warnings.push(warning);
                }
                Err(e) => return Err(e.into()),
            }
        }

        built.insert(path, dir);
    }

    built.remove(root_path).ok_or_else(|| ScanError::NotFound {
        path: root_path.to_path_buf(),
    })
}

fn path_name(path: &Path) -> CompactString {
    CompactString::new(path.to_string_lossy())
}

// Cross-platform metadata helpers

/// Get the device ID from metadata.
#[cfg(unix)]
fn get_dev(metadata: &Metadata) -> u64 {
    metadata.dev()
}

#[cfg(not(unix))]
fn get_dev(_metadata: &Metadata) -> u64 {
    0
}

/// Get the inode number from metadata.
#[cfg(unix)]
fn get_ino(metadata: &Metadata) -> u64 {
    metadata.ino()
}

#[cfg(not(unix))]
fn get_ino(_metadata: &Metadata) -> u64 {
    0
}

//! Progress updates broadcast while a snapshot is being built.

use std::path::PathBuf;
use std::time::Duration;

/// Point-in-time view of a running scan.
///
/// Sent on the builder's broadcast channel for the first file and then
/// periodically, so a long audit can show that it is still moving.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Files recorded so far, symlinks and special files included.
    pub files_scanned: u64,
    /// Directories recorded so far.
    pub dirs_scanned: u64,
    /// Bytes fingerprinted so far.
    pub bytes_hashed: u64,
    /// Entry that triggered this update.
    pub current_path: PathBuf,
    /// Warnings recorded so far.
    pub warnings_count: u64,
    /// Time since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Fingerprinting throughput in bytes per second, zero until time has
    /// passed.
    pub fn hash_rate(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.bytes_hashed as f64 / secs) as u64
        } else {
            0
        }
    }
}

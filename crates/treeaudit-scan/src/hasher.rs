//! Streaming content fingerprints.
//!
//! Files are read through a fixed-size buffer so memory use is bounded by
//! the chunk size regardless of file size. The file handle is dropped as
//! soon as hashing finishes or fails.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use treeaudit_core::{DEFAULT_CHUNK_SIZE, DIGEST_LEN, Fingerprint, FingerprintError, HashAlgorithm};

/// Incremental hasher for one of the supported algorithms.
enum StreamHasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl StreamHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> [u8; DIGEST_LEN] {
        match self {
            Self::Sha256(h) => h.finalize().into(),
            Self::Blake3(h) => *h.finalize().as_bytes(),
        }
    }
}

/// Fingerprint a file's content, reading `chunk_size` bytes at a time.
pub fn fingerprint_file(
    path: &Path,
    algorithm: HashAlgorithm,
    chunk_size: usize,
) -> Result<Fingerprint, FingerprintError> {
    let mut file = File::open(path).map_err(|e| FingerprintError::read(path, e))?;
    let mut hasher = StreamHasher::new(algorithm);
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FingerprintError::read(path, e)),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Fingerprint::digest(algorithm, hasher.finalize()))
}

/// Fingerprint in-memory bytes, e.g. a symlink target.
pub fn fingerprint_bytes(data: &[u8], algorithm: HashAlgorithm) -> Fingerprint {
    let mut hasher = StreamHasher::new(algorithm);
    for chunk in data.chunks(DEFAULT_CHUNK_SIZE) {
        hasher.update(chunk);
    }
    Fingerprint::digest(algorithm, hasher.finalize())
}

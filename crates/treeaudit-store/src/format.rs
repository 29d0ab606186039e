//! On-disk baseline format.
//!
//! ```text
//! offset  size  field
//! 0       8     magic "TREEAUDT"
//! 8       2     format version (u16, little endian)
//! 10      8     payload length (u64, little endian)
//! 18      32    BLAKE3 checksum of the payload
//! 50      n     payload: bincode-encoded Snapshot
//! ```
//!
//! The payload is the snapshot's recursive record structure: every node is
//! a variant tag followed by its fields, strings and maps length-prefixed.
//! Anything that does not check out is rejected before or during decoding.

use bincode::Options;
use thiserror::Error;

use treeaudit_core::{NodeError, Snapshot};

/// File signature.
pub const MAGIC: &[u8; 8] = b"TREEAUDT";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the fixed header.
pub const HEADER_LEN: usize = 8 + 2 + 8 + 32;

/// Reasons a baseline cannot be decoded.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("file is {actual} bytes, shorter than the {expected}-byte header")]
    Truncated { expected: usize, actual: usize },

    #[error("not a treeaudit baseline (bad magic)")]
    BadMagic,

    #[error("unsupported format version {found} (expected {FORMAT_VERSION})")]
    UnsupportedVersion { found: u16 },

    #[error("payload length mismatch: header says {declared} bytes, found {actual}")]
    LengthMismatch { declared: u64, actual: u64 },

    #[error("payload checksum mismatch")]
    ChecksumMismatch,

    #[error("payload does not decode: {0}")]
    Decode(#[source] bincode::Error),

    #[error("snapshot could not be encoded: {0}")]
    Encode(#[source] bincode::Error),

    #[error("tree structure is inconsistent: {0}")]
    Integrity(#[from] NodeError),
}

/// Fixed-size header preceding the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u16,
    pub payload_len: u64,
    pub checksum: [u8; 32],
}

impl SnapshotHeader {
    /// Build the header describing `payload`.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            version: FORMAT_VERSION,
            payload_len: payload.len() as u64,
            checksum: *blake3::hash(payload).as_bytes(),
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..8].copy_from_slice(MAGIC);
        out[8..10].copy_from_slice(&self.version.to_le_bytes());
        out[10..18].copy_from_slice(&self.payload_len.to_le_bytes());
        out[18..].copy_from_slice(&self.checksum);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if &bytes[..8] != MAGIC {
            return Err(FormatError::BadMagic);
        }

        let mut version = [0u8; 2];
        version.copy_from_slice(&bytes[8..10]);
        let version = u16::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion { found: version });
        }

        let mut payload_len = [0u8; 8];
        payload_len.copy_from_slice(&bytes[10..18]);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&bytes[18..HEADER_LEN]);

        Ok(Self {
            version,
            payload_len: u64::from_le_bytes(payload_len),
            checksum,
        })
    }
}

fn codec(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(limit)
        .reject_trailing_bytes()
}

/// Serialize a snapshot into header + payload.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, FormatError> {
    let payload = bincode::DefaultOptions::new()
        .serialize(snapshot)
        .map_err(FormatError::Encode)?;
    let header = SnapshotHeader::for_payload(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse and verify a serialized snapshot.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, FormatError> {
    let header = SnapshotHeader::decode(bytes)?;
    let payload = &bytes[HEADER_LEN..];

    if header.payload_len != payload.len() as u64 {
        return Err(FormatError::LengthMismatch {
            declared: header.payload_len,
            actual: payload.len() as u64,
        });
    }
    if *blake3::hash(payload).as_bytes() != header.checksum {
        return Err(FormatError::ChecksumMismatch);
    }

    let snapshot: Snapshot = codec(header.payload_len)
        .deserialize(payload)
        .map_err(FormatError::Decode)?;
    snapshot.root.check_integrity()?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeaudit_core::{DirectoryNode, FileNode, Fingerprint, HashAlgorithm, Identity};

    fn sample() -> Snapshot {
        let root = DirectoryNode::new("/r", Identity::name("/r"))
            .with_child(FileNode::new(
                "/r/a",
                Identity::name("a"),
                3,
                Fingerprint::digest(HashAlgorithm::Sha256, [5; 32]),
            ))
            .unwrap();
        Snapshot::new(root, "/r")
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_snapshot(&sample()).unwrap();
        assert_eq!(&bytes[..8], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), FORMAT_VERSION);

        let header = SnapshotHeader::decode(&bytes).unwrap();
        assert_eq!(header.payload_len as usize, bytes.len() - HEADER_LEN);
    }

    #[test]
    fn test_roundtrip() {
        let snapshot = sample();
        let decoded = decode_snapshot(&encode_snapshot(&snapshot).unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_rejects_short_input() {
        let err = decode_snapshot(b"TREE").unwrap_err();
        assert!(matches!(err, FormatError::Truncated { actual: 4, .. }));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode_snapshot(&sample()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode_snapshot(&bytes), Err(FormatError::BadMagic)));
    }

    #[test]
    fn test_rejects_future_version() {
        let mut bytes = encode_snapshot(&sample()).unwrap();
        bytes[8..10].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(FormatError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let bytes = encode_snapshot(&sample()).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            decode_snapshot(cut),
            Err(FormatError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_flipped_payload_bit() {
        let mut bytes = encode_snapshot(&sample()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(FormatError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_rejects_well_formed_garbage_payload() {
        let payload = vec![0xffu8; 64];
        let mut bytes = SnapshotHeader::for_payload(&payload).encode().to_vec();
        bytes.extend_from_slice(&payload);
        assert!(matches!(decode_snapshot(&bytes), Err(FormatError::Decode(_))));
    }
}

//! Content fingerprints and the hash algorithms that produce them.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Length in bytes of every supported digest.
pub const DIGEST_LEN: usize = 32;

/// Hash algorithm used to fingerprint file content, selectable by name.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HashAlgorithm {
    /// SHA-256 (reference algorithm).
    #[default]
    #[strum(to_string = "sha256", serialize = "sha-256")]
    Sha256,
    /// BLAKE3.
    Blake3,
}

impl HashAlgorithm {
    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Content-derived value that changes iff the file's bytes change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fingerprint {
    /// Digest of the full content.
    Digest {
        algorithm: HashAlgorithm,
        bytes: [u8; DIGEST_LEN],
    },
    /// Content could not be read; presence is still tracked.
    Unreadable,
}

impl Fingerprint {
    /// Create a digest fingerprint.
    pub fn digest(algorithm: HashAlgorithm, bytes: [u8; DIGEST_LEN]) -> Self {
        Self::Digest { algorithm, bytes }
    }

    /// Check whether the content was actually hashed.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Digest { .. })
    }

    /// Algorithm that produced this fingerprint, if any.
    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        match self {
            Self::Digest { algorithm, .. } => Some(*algorithm),
            Self::Unreadable => None,
        }
    }

    /// Get the digest as a hex string (`None` for unreadable content).
    pub fn to_hex(&self) -> Option<String> {
        match self {
            Self::Digest { bytes, .. } => Some(bytes.iter().map(|b| format!("{b:02x}")).collect()),
            Self::Unreadable => None,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest { algorithm, bytes } => {
                write!(f, "{algorithm}:")?;
                for b in &bytes[..6] {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Self::Unreadable => f.write_str("unreadable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_algorithm_from_name() {
        assert_eq!(HashAlgorithm::from_str("sha256").unwrap(), HashAlgorithm::Sha256);
        assert_eq!(HashAlgorithm::from_str("SHA-256").unwrap(), HashAlgorithm::Sha256);
        assert_eq!(HashAlgorithm::from_str("blake3").unwrap(), HashAlgorithm::Blake3);
        assert!(HashAlgorithm::from_str("md5").is_err());
    }

    #[test]
    fn test_algorithm_name() {
        assert_eq!(HashAlgorithm::Sha256.name(), "sha256");
        assert_eq!(HashAlgorithm::Blake3.to_string(), "blake3");
    }

    #[test]
    fn test_fingerprint_hex() {
        let fp = Fingerprint::digest(HashAlgorithm::Sha256, [0xab; DIGEST_LEN]);
        let hex = fp.to_hex().unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("abab"));
        assert_eq!(Fingerprint::Unreadable.to_hex(), None);
    }

    #[test]
    fn test_fingerprint_display() {
        let fp = Fingerprint::digest(HashAlgorithm::Blake3, [0x01; DIGEST_LEN]);
        assert_eq!(fp.to_string(), "blake3:010101010101");
        assert_eq!(Fingerprint::Unreadable.to_string(), "unreadable");
    }

    #[test]
    fn test_same_bytes_different_algorithm_differ() {
        let a = Fingerprint::digest(HashAlgorithm::Sha256, [7; DIGEST_LEN]);
        let b = Fingerprint::digest(HashAlgorithm::Blake3, [7; DIGEST_LEN]);
        assert_ne!(a, b);
    }
}

//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ScanError;
use crate::fingerprint::HashAlgorithm;

/// Default read chunk for fingerprinting.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// How nodes are keyed when matching two snapshots.
///
/// `Name` survives copies and restores but turns a rename into remove + add.
/// `Inode` survives renames within a filesystem, but inode numbers may be
/// reused after deletion and change whenever a file is rewritten by copy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IdentityStrategy {
    /// Entry name relative to its parent.
    #[default]
    Name,
    /// Inode and device number (unix only).
    Inode,
}

/// Configuration for scanning operations.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Hash algorithm for file fingerprints.
    #[builder(default)]
    #[serde(default)]
    pub algorithm: HashAlgorithm,

    /// Read buffer size for fingerprinting.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// How children are keyed.
    #[builder(default)]
    #[serde(default)]
    pub identity: IdentityStrategy,

    /// Cross filesystem boundaries.
    #[builder(default = "false")]
    #[serde(default)]
    pub cross_filesystems: bool,

    /// Maximum depth to traverse (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Entry names to skip, in glob syntax.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Threads reading directories (1 = serial).
    #[builder(default = "1")]
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,
}

fn default_true() -> bool {
    true
}

fn default_threads() -> usize {
    1
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be greater than zero".to_string());
        }
        if cfg!(not(unix)) && self.identity == Some(IdentityStrategy::Inode) {
            return Err("Inode identities are only available on unix".to_string());
        }
        if let Some(ref patterns) = self.ignore_patterns {
            compile_patterns(patterns).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            algorithm: HashAlgorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            identity: IdentityStrategy::default(),
            cross_filesystems: false,
            max_depth: None,
            ignore_patterns: Vec::new(),
            threads: 1,
            include_hidden: true,
        }
    }

    /// Compile the ignore patterns into a matcher.
    pub fn ignore_matcher(&self) -> Result<GlobSet, ScanError> {
        compile_patterns(&self.ignore_patterns)
    }

    /// Check a config that was not produced by the builder.
    pub fn check(&self) -> Result<(), ScanError> {
        let invalid = |message: &str| ScanError::InvalidConfig {
            message: message.to_string(),
        };
        if self.root.as_os_str().is_empty() {
            return Err(invalid("Root path cannot be empty"));
        }
        if self.chunk_size == 0 {
            return Err(invalid("Chunk size must be greater than zero"));
        }
        if cfg!(not(unix)) && self.identity == IdentityStrategy::Inode {
            return Err(invalid("Inode identities are only available on unix"));
        }
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

fn compile_patterns(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
            message: format!("Bad ignore pattern {pattern:?}: {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ScanError::InvalidConfig {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .root("/home/user")
            .algorithm(HashAlgorithm::Blake3)
            .chunk_size(4096usize)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert_eq!(config.algorithm, HashAlgorithm::Blake3);
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.identity, IdentityStrategy::Name);
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn test_config_simple() {
        let config = ScanConfig::new("/home/user");
        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert_eq!(config.algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_builder_rejects_zero_chunk() {
        let result = ScanConfig::builder().root("/x").chunk_size(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_bad_pattern() {
        let result = ScanConfig::builder()
            .root("/x")
            .ignore_patterns(vec!["[unclosed".to_string()])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_ignore_matcher() {
        let config = ScanConfig::builder()
            .root("/test")
            .ignore_patterns(vec!["node_modules".to_string(), "*.log".to_string()])
            .build()
            .unwrap();
        let matcher = config.ignore_matcher().unwrap();

        assert!(matcher.is_match("node_modules"));
        assert!(matcher.is_match("test.log"));
        assert!(!matcher.is_match("src"));
    }

    #[test]
    fn test_identity_strategy_from_name() {
        use std::str::FromStr;
        assert_eq!(IdentityStrategy::from_str("inode").unwrap(), IdentityStrategy::Inode);
        assert_eq!(IdentityStrategy::from_str("Name").unwrap(), IdentityStrategy::Name);
        assert_eq!(IdentityStrategy::Inode.to_string(), "inode");
    }
}

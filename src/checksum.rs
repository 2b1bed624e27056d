//! Checksum utilities for skipping unchanged output files

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// SHA256 checksum of file content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a string
    pub fn from_str(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Checksum of a file on disk, `None` if it does not exist
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(Self::from_bytes(&data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that content matches this checksum
    pub fn verify(&self, content: &str) -> bool {
        let computed = Self::from_str(content);
        self.0 == computed.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What [`write_if_changed`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Write `content` to `path` unless the file already holds exactly that content
pub fn write_if_changed(path: &Path, content: &str) -> Result<WriteOutcome> {
    if let Some(existing) = Checksum::from_file(path)? {
        if existing.verify(content) {
            return Ok(WriteOutcome::Unchanged);
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(WriteOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"Quests": []}"#;
        let checksum1 = Checksum::from_str(content);
        let checksum2 = Checksum::from_str(content);
        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_verification() {
        let content = r#"{"Quests": []}"#;
        let checksum = Checksum::from_str(content);
        assert!(checksum.verify(content));
        assert!(!checksum.verify("different content"));
    }

    #[test]
    fn test_write_if_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("quest.json");

        assert_eq!(write_if_changed(&path, "{}").unwrap(), WriteOutcome::Written);
        assert_eq!(write_if_changed(&path, "{}").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(write_if_changed(&path, "[]").unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_missing_file_has_no_checksum() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Checksum::from_file(&dir.path().join("nope.json")).unwrap(), None);
    }
}

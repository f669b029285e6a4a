//! Archive collaborator interface
//!
//! The bundle is an archive (a ZIP file in practice) holding the manifest
//! and the firmware images. The pipeline only needs to load it and read
//! named entries; decoding is left to an implementation such as
//! `fwprov-zip`.

use std::collections::HashMap;
use thiserror::Error;

/// Errors reported by archive implementations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ArchiveError(pub String);

impl ArchiveError {
    /// Create an error from any displayable cause
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A loaded archive
pub trait Archive {
    /// Read a file by name
    ///
    /// Returns `Ok(None)` if the archive has no entry with that name, and
    /// an error if the entry exists but cannot be decoded.
    fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError>;

    /// Read a file by name as UTF-8 text
    fn read_text(&mut self, name: &str) -> Result<Option<String>, ArchiveError> {
        match self.read_file(name)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| ArchiveError::new(format!("{} is not valid UTF-8: {}", name, e))),
            None => Ok(None),
        }
    }
}

/// Turns downloaded bytes into an [`Archive`]
pub trait ArchiveLoader {
    /// Archive type produced by this loader
    type Archive: Archive;

    /// Parse archive bytes
    fn load(&self, bytes: Vec<u8>) -> Result<Self::Archive, ArchiveError>;
}

/// An archive held as a name -> contents map
///
/// Useful for tests and for front-ends that already have the files unpacked.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryArchive {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file
    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), contents.into());
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the archive has no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Archive for MemoryArchive {
    fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        Ok(self.files.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_archive_lookup() {
        let mut archive = MemoryArchive::new().with_file("a.bin", vec![1, 2, 3]);
        assert_eq!(archive.read_file("a.bin").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(archive.read_file("missing.bin").unwrap(), None);
    }

    #[test]
    fn test_read_text_rejects_invalid_utf8() {
        let mut archive = MemoryArchive::new()
            .with_file("ok.json", "{}")
            .with_file("bad.json", vec![0xFF, 0xFE]);
        assert_eq!(archive.read_text("ok.json").unwrap().as_deref(), Some("{}"));
        assert!(archive.read_text("bad.json").is_err());
        assert_eq!(archive.read_text("none.json").unwrap(), None);
    }
}

//! Reading bundles

use std::io::{Cursor, Read};

use fwprov_core::archive::{Archive, ArchiveError, ArchiveLoader};
use zip::result::ZipError;
use zip::ZipArchive;

/// Upper bound on the buffer reserved from an entry's declared size
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Opens downloaded bundle bytes as a zip archive
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipLoader;

impl ZipLoader {
    /// Create a loader
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveLoader for ZipLoader {
    type Archive = ZipBundle;

    fn load(&self, bytes: Vec<u8>) -> Result<ZipBundle, ArchiveError> {
        let len = bytes.len();
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
        log::debug!("Opened bundle: {} bytes, {} entries", len, archive.len());
        Ok(ZipBundle { archive })
    }
}

/// An opened zip bundle
pub struct ZipBundle {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ZipBundle {
    /// Number of entries, directories included
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Names of all file entries, sorted
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }
}

impl Archive for ZipBundle {
    fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(archive_error(e)),
        };
        if file.is_dir() {
            return Ok(None);
        }

        let mut data = Vec::with_capacity(file.size().min(MAX_PREALLOC) as usize);
        file.read_to_end(&mut data)
            .map_err(|e| ArchiveError::new(format!("failed to read {}: {}", name, e)))?;
        Ok(Some(data))
    }
}

fn archive_error(e: ZipError) -> ArchiveError {
    ArchiveError::new(e.to_string())
}

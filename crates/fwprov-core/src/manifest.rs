//! Flash manifest parsing
//!
//! The manifest is the `flasher_args.json` file produced by the firmware
//! build and packed at the root of the bundle:
//!
//! ```json
//! {
//!     "flash_settings": { "flash_mode": "dio", "flash_size": "4MB", "flash_freq": "80m" },
//!     "flash_files": {
//!         "0x0": "bootloader/bootloader.bin",
//!         "0x8000": "partition_table/partition-table.bin",
//!         "0x10000": "app.bin"
//!     },
//!     "extra_esptool_args": { "chip": "esp32c3" }
//! }
//! ```
//!
//! Only `flash_files` is required. Its entries are kept in document order:
//! that order is the order the images are written in.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::archive::Archive;
use crate::error::{ProvisionError, Result};

/// File name of the manifest inside a bundle
pub const MANIFEST_FILE_NAME: &str = "flasher_args.json";

/// One address -> image mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Flash offset to write the image at
    pub address: u32,
    /// Path of the image inside the bundle
    pub file: String,
}

/// Flash parameters recorded by the build (informational)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashSettings {
    /// SPI flash mode (e.g. "dio")
    pub flash_mode: Option<String>,
    /// Flash size (e.g. "4MB")
    pub flash_size: Option<String>,
    /// Flash frequency (e.g. "80m")
    pub flash_freq: Option<String>,
}

/// A validated flash manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashManifest {
    entries: Vec<ManifestEntry>,
    /// Chip the bundle was built for, if the build recorded it
    pub target_chip: Option<String>,
    /// Flash settings, if the build recorded them
    pub flash_settings: Option<FlashSettings>,
}

fn malformed(reason: impl Into<String>) -> ProvisionError {
    ProvisionError::ManifestMalformed(reason.into())
}

/// Parse an address key, hex (0x...) or decimal
fn parse_address(s: &str) -> core::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex address {:?}: {}", s, e))
    } else {
        s.parse()
            .map_err(|e| format!("invalid address {:?}: {}", s, e))
    }
}

fn optional_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

impl FlashManifest {
    /// Read and parse the manifest from a bundle
    ///
    /// Fails with `ManifestMissing` if the archive has no entry called
    /// `name`.
    pub fn from_archive<A: Archive + ?Sized>(archive: &mut A, name: &str) -> Result<Self> {
        let text = archive
            .read_text(name)
            .map_err(|e| ProvisionError::ArchiveCorrupt(e.to_string()))?
            .ok_or_else(|| ProvisionError::ManifestMissing(name.to_string()))?;
        Self::parse(&text)
    }

    /// Parse manifest JSON
    pub fn parse(text: &str) -> Result<Self> {
        let doc: Value =
            serde_json::from_str(text).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
        let root = doc
            .as_object()
            .ok_or_else(|| malformed("top level is not an object"))?;

        let files = match root.get("flash_files") {
            Some(Value::Object(files)) => files,
            Some(_) => return Err(malformed("'flash_files' is not an object")),
            None => return Err(malformed("'flash_files' not found")),
        };

        let mut entries = Vec::with_capacity(files.len());
        let mut seen = HashSet::new();
        for (key, value) in files {
            let address = parse_address(key).map_err(malformed)?;
            let file = value
                .as_str()
                .ok_or_else(|| malformed(format!("file name for {} is not a string", key)))?;
            if !seen.insert(address) {
                return Err(malformed(format!("address 0x{:X} listed twice", address)));
            }
            entries.push(ManifestEntry {
                address,
                file: file.to_string(),
            });
        }

        if entries.is_empty() {
            return Err(malformed("'flash_files' is empty"));
        }

        let target_chip = root
            .get("extra_esptool_args")
            .and_then(Value::as_object)
            .and_then(|args| optional_string(args, "chip"));

        let flash_settings = root
            .get("flash_settings")
            .and_then(Value::as_object)
            .map(|settings| FlashSettings {
                flash_mode: optional_string(settings, "flash_mode"),
                flash_size: optional_string(settings, "flash_size"),
                flash_freq: optional_string(settings, "flash_freq"),
            });

        log::debug!("Manifest lists {} image(s)", entries.len());

        Ok(Self {
            entries,
            target_chip,
            flash_settings,
        })
    }

    /// Entries in manifest order
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Number of entries (always at least one)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a parsed manifest
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;

    fn err_of(text: &str) -> ProvisionError {
        FlashManifest::parse(text).unwrap_err()
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1000").unwrap(), 4096);
        assert_eq!(parse_address("0X8000").unwrap(), 32768);
        assert_eq!(parse_address("65536").unwrap(), 65536);
        assert!(parse_address("bootloader").is_err());
        assert!(parse_address("-1").is_err());
        assert!(parse_address("0x100000000").is_err());
    }

    #[test]
    fn test_keeps_document_order() {
        let manifest = FlashManifest::parse(
            r#"{"flash_files": {"0x10000": "app.bin", "0x0": "bootloader.bin", "0x8000": "pt.bin"}}"#,
        )
        .unwrap();
        let order: Vec<_> = manifest
            .entries()
            .iter()
            .map(|e| (e.address, e.file.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![(0x10000, "app.bin"), (0, "bootloader.bin"), (0x8000, "pt.bin")]
        );
    }

    #[test]
    fn test_metadata() {
        let manifest = FlashManifest::parse(
            r#"{
                "flash_settings": {"flash_mode": "dio", "flash_size": "4MB", "flash_freq": "80m"},
                "flash_files": {"0x0": "bootloader.bin"},
                "extra_esptool_args": {"after": "hard_reset", "chip": "esp32c3"}
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.target_chip.as_deref(), Some("esp32c3"));
        let settings = manifest.flash_settings.unwrap();
        assert_eq!(settings.flash_mode.as_deref(), Some("dio"));
        assert_eq!(settings.flash_size.as_deref(), Some("4MB"));
        assert_eq!(settings.flash_freq.as_deref(), Some("80m"));
    }

    #[test]
    fn test_missing_flash_files() {
        assert!(matches!(
            err_of(r#"{"flash_settings": {}}"#),
            ProvisionError::ManifestMalformed(_)
        ));
    }

    #[test]
    fn test_malformed_shapes() {
        for text in [
            "not json",
            "[1, 2]",
            r#"{"flash_files": ["app.bin"]}"#,
            r#"{"flash_files": {"0x0": 7}}"#,
            r#"{"flash_files": {"boot": "bootloader.bin"}}"#,
            r#"{"flash_files": {}}"#,
            r#"{"flash_files": {"0x1000": "a.bin", "4096": "b.bin"}}"#,
        ] {
            assert!(
                matches!(err_of(text), ProvisionError::ManifestMalformed(_)),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_from_archive_missing() {
        let mut archive = MemoryArchive::new().with_file("app.bin", vec![1]);
        assert_eq!(
            FlashManifest::from_archive(&mut archive, MANIFEST_FILE_NAME).unwrap_err(),
            ProvisionError::ManifestMissing(MANIFEST_FILE_NAME.to_string())
        );
    }

    #[test]
    fn test_from_archive() {
        let mut archive = MemoryArchive::new()
            .with_file(MANIFEST_FILE_NAME, r#"{"flash_files": {"0x1000": "bootloader.bin"}}"#);
        let manifest = FlashManifest::from_archive(&mut archive, MANIFEST_FILE_NAME).unwrap();
        assert_eq!(
            manifest.entries(),
            &[ManifestEntry {
                address: 0x1000,
                file: "bootloader.bin".to_string()
            }]
        );
        assert_eq!(manifest.target_chip, None);
        assert_eq!(manifest.flash_settings, None);
    }
}

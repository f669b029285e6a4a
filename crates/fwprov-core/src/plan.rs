//! Flash plan construction
//!
//! A plan pairs every manifest address with its transcoded image, in
//! manifest order. Building a plan validates the whole bundle before the
//! device is touched: either every image is present and non-empty, or no
//! plan exists.

use crate::archive::Archive;
use crate::error::{ProvisionError, Result};
use crate::manifest::FlashManifest;
use crate::transcode::{encode, BinaryString};

/// One image ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPlanEntry {
    /// Flash offset
    pub address: u32,
    /// Image path inside the bundle
    pub file: String,
    /// Encoded image data
    pub payload: BinaryString,
}

/// Ordered, validated list of images to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPlan {
    entries: Vec<FlashPlanEntry>,
}

impl FlashPlan {
    /// Build a plan by reading every image the manifest lists
    ///
    /// Stops at the first missing or empty image.
    pub fn build<A: Archive + ?Sized>(archive: &mut A, manifest: &FlashManifest) -> Result<Self> {
        let mut entries = Vec::with_capacity(manifest.len());

        for entry in manifest.entries() {
            let data = archive
                .read_file(&entry.file)
                .map_err(|e| ProvisionError::ArchiveCorrupt(e.to_string()))?
                .ok_or_else(|| ProvisionError::FirmwareFileMissing(entry.file.clone()))?;

            if data.is_empty() {
                return Err(ProvisionError::FirmwareFileEmpty(entry.file.clone()));
            }

            log::debug!(
                "Image {} ({} bytes) -> 0x{:08X}",
                entry.file,
                data.len(),
                entry.address
            );

            entries.push(FlashPlanEntry {
                address: entry.address,
                file: entry.file.clone(),
                payload: encode(&data),
            });
        }

        Ok(Self { entries })
    }

    /// Entries in write order
    pub fn entries(&self) -> &[FlashPlanEntry] {
        &self.entries
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan has no images (never true for a built plan)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total image bytes across all entries
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.payload.byte_len()).sum()
    }
}

//! Error types for the provisioning pipeline

use thiserror::Error;

use crate::session::Stage;

/// Errors produced while connecting or running a flashing attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    /// A flashing attempt was requested without a connected device
    #[error("device not connected")]
    NotConnected,

    /// Port selection, transport setup or the flasher handshake failed
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The bundle server answered with a non-success status
    #[error("firmware bundle download failed (HTTP {0})")]
    BundleDownloadFailed(u16),

    /// The bundle could not be retrieved at all (no status available)
    #[error("firmware bundle unavailable: {0}")]
    BundleUnavailable(String),

    /// The bundle is not a readable archive
    #[error("firmware bundle is corrupt: {0}")]
    ArchiveCorrupt(String),

    /// The archive has no manifest entry
    #[error("manifest {0} not found in firmware bundle")]
    ManifestMissing(String),

    /// The manifest exists but does not describe a usable flash layout
    #[error("manifest is malformed: {0}")]
    ManifestMalformed(String),

    /// A file referenced by the manifest is not in the archive
    #[error("firmware file {0} not found in bundle")]
    FirmwareFileMissing(String),

    /// A file referenced by the manifest is empty
    #[error("firmware file {0} is empty")]
    FirmwareFileEmpty(String),

    /// The flashing service reported a failure while writing
    #[error("flash write failed: {0}")]
    WriteFailed(String),

    /// Disconnecting the transport failed
    ///
    /// Only ever logged; never returned as the outcome of an attempt.
    #[error("teardown failed: {0}")]
    TeardownFailed(String),
}

/// A failed flashing attempt, tagged with the stage that failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {error}")]
pub struct AttemptError {
    /// Stage in which the attempt failed
    pub stage: Stage,
    /// The underlying error, unchanged
    #[source]
    pub error: ProvisionError,
}

impl AttemptError {
    /// Tag an error with the stage it occurred in
    pub fn new(stage: Stage, error: ProvisionError) -> Self {
        Self { stage, error }
    }
}

/// Result type alias using [`ProvisionError`]
pub type Result<T> = core::result::Result<T, ProvisionError>;

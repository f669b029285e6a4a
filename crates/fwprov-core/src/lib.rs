//! fwprov-core - Core library for firmware bundle provisioning
//!
//! This crate implements the provisioning pipeline that takes a packaged
//! firmware bundle and writes it to a serial-connected microcontroller:
//!
//! ```text
//! bundle bytes ──► archive ──► manifest ──► flash plan ──► write_flash
//!   (fetch)      (extract)    (resolve)    (transcode)    (progress)
//! ```
//!
//! The device side (port selection, transport, flashing protocol engine),
//! the archive decoder and the bundle download are collaborators described
//! by the traits in [`service`] and [`archive`]. Front-ends plug concrete
//! implementations into a [`ProvisioningSession`], which owns the connection
//! and sequences a flashing attempt.
//!
//! # Example
//!
//! ```ignore
//! use fwprov_core::{ChipFamily, MemorySurface, ProvisionConfig, ProvisioningSession};
//!
//! let mut ui = MemorySurface::new();
//! let mut session = ProvisioningSession::new(backend, ProvisionConfig::default());
//! session.toggle_connect(ChipFamily::Esp32C3, &mut ui).await?;
//! let report = session.flash(&mut source, &loader, &mut ui).await?;
//! println!("Wrote {} bytes", report.total_bytes);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Collaborators are single-threaded and generic; no Send bounds are needed
#![allow(async_fn_in_trait)]

pub mod archive;
pub mod chip;
pub mod config;
pub mod error;
pub mod manifest;
pub mod plan;
pub mod progress;
pub mod service;
pub mod session;
pub mod surface;
pub mod transcode;

pub use archive::{Archive, ArchiveError, ArchiveLoader, MemoryArchive};
pub use chip::ChipFamily;
pub use config::ProvisionConfig;
pub use error::{AttemptError, ProvisionError, Result};
pub use manifest::{FlashManifest, FlashSettings, ManifestEntry, MANIFEST_FILE_NAME};
pub use plan::{FlashPlan, FlashPlanEntry};
pub use service::{
    BackendError, BundleSource, DeviceBackend, FetchError, FlashProgress, FlashSize,
    FlashingService, Transport, WriteFlashRequest,
};
pub use session::{
    ConnectionEvent, ConnectionHandle, ConnectionState, FlashReport, FlashedImage,
    ProvisioningSession, Stage,
};
pub use surface::{Affordances, ConnectLabel, ControlSurface, LogSink, MemorySurface};
pub use transcode::{encode, BinaryString, TranscodeError};

//! Collaborator trait definitions
//!
//! These traits describe everything the pipeline needs from the outside
//! world: the bundle download, the serial device and the flashing engine
//! running over it. Implementations live in the front-end crates (WebSerial
//! and esptool-js in the browser, the in-memory emulator in
//! `fwprov-dummy`).
//!
//! All methods are `async fn`s awaited from a single task; nothing here
//! requires `Send`.

use core::fmt;
use thiserror::Error;

use crate::plan::FlashPlan;

/// Error reported by a device-side collaborator
///
/// Carries the collaborator's own message, which is shown to the user
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    /// Create an error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Error reported by a [`BundleSource`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),
    /// No response was obtained
    #[error("{0}")]
    Unavailable(String),
}

/// Retrieves the firmware bundle
pub trait BundleSource {
    /// Fetch the bundle at `location` and return its bytes
    async fn fetch(&mut self, location: &str) -> Result<Vec<u8>, FetchError>;
}

/// Transport over the selected serial device
pub trait Transport {
    /// Close the underlying port
    async fn disconnect(&mut self) -> Result<(), BackendError>;

    /// Whether the port is still open
    fn is_connected(&self) -> bool;
}

/// Target flash size setting passed to the flashing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlashSize {
    /// Keep the size stored in the image header
    #[default]
    Keep,
    /// Detect the size from the chip
    Detect,
}

impl FlashSize {
    /// Value understood by the flashing engine
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Detect => "detect",
        }
    }
}

impl fmt::Display for FlashSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a flash write
#[derive(Debug, Clone, Copy)]
pub struct WriteFlashRequest<'a> {
    /// Images to write, in order
    pub plan: &'a FlashPlan,
    /// Flash size handling
    pub flash_size: FlashSize,
    /// Erase the whole chip first
    pub erase_all: bool,
    /// Compress data on the wire
    pub compress: bool,
}

/// Receives write progress from the flashing engine
pub trait FlashProgress {
    /// Called zero or more times during a write
    ///
    /// `bytes_written` increases with every call and reaches `total_bytes`
    /// when the write completes.
    fn update(&mut self, bytes_written: usize, total_bytes: usize);
}

/// Flashing protocol engine bound to a transport
pub trait FlashingService {
    /// Synchronize with the chip's ROM loader
    async fn connect(&mut self) -> Result<(), BackendError>;

    /// Name of the detected chip, once connected
    fn chip_name(&self) -> Option<String>;

    /// Write every image of the plan, in order
    async fn write_flash(
        &mut self,
        request: WriteFlashRequest<'_>,
        progress: &mut dyn FlashProgress,
    ) -> Result<(), BackendError>;
}

/// Factory for the device, transport and flasher of one connection
pub trait DeviceBackend {
    /// Handle to the selected serial device
    type Device;
    /// Transport opened over the device
    type Transport: Transport;
    /// Flashing engine bound to the transport
    type Flasher: FlashingService;

    /// Ask the user to pick a serial device
    async fn request_device(&mut self) -> Result<Self::Device, BackendError>;

    /// Open a transport over the device
    fn open_transport(&mut self, device: &Self::Device) -> Result<Self::Transport, BackendError>;

    /// Create the flashing engine for the transport at the given baud rate
    fn create_flasher(
        &mut self,
        transport: &Self::Transport,
        baud_rate: u32,
    ) -> Result<Self::Flasher, BackendError>;
}

//! fwprov-dummy - In-memory device emulator for testing
//!
//! This crate provides a device backend that emulates a serial port and a
//! flashing engine in memory. It's useful for testing and development
//! without real hardware. Every step of the connection can be made to fail
//! through [`Faults`], and everything the emulator sees is recorded for
//! inspection.

#![allow(async_fn_in_trait)]

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use fwprov_core::service::{
    BackendError, DeviceBackend, FlashProgress, FlashSize, FlashingService, Transport,
    WriteFlashRequest,
};

/// Configuration for the emulated device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Chip name reported after connecting
    pub chip_name: String,
    /// Flash size in bytes
    pub size: usize,
    /// Bytes written between progress reports
    pub block_size: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            chip_name: "ESP32-C3 (QFN32) (revision v0.4)".to_string(),
            size: 4 * 1024 * 1024,
            block_size: 0x4000,
        }
    }
}

/// Injected failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Port selection is cancelled
    pub request_device: bool,
    /// The port cannot be opened
    pub open_transport: bool,
    /// The flasher cannot be created
    pub create_flasher: bool,
    /// The ROM loader handshake fails
    pub connect: bool,
    /// Closing the port fails (the port is closed anyway)
    pub disconnect: bool,
    /// The write fails once this many bytes have been written
    pub write_after: Option<usize>,
}

/// A write the emulator received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    /// Flash offset
    pub address: u32,
    /// Image length in bytes
    pub len: usize,
}

/// Write parameters the emulator received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRecord {
    /// Flash size handling
    pub flash_size: FlashSize,
    /// Whole-chip erase requested
    pub erase_all: bool,
    /// Compression requested
    pub compress: bool,
}

/// Everything the emulator has seen
#[derive(Debug)]
pub struct DummyState {
    config: DummyConfig,
    data: Vec<u8>,
    /// Failures to inject
    pub faults: Faults,
    /// Whether the port is open
    pub port_open: bool,
    /// Port selections requested
    pub devices_requested: usize,
    /// Transports opened
    pub transports_opened: usize,
    /// Handshakes attempted
    pub connect_calls: usize,
    /// Port closes requested
    pub disconnect_calls: usize,
    /// Baud rate of the last flasher created
    pub baud_rate: Option<u32>,
    /// Images written, in order
    pub writes: Vec<WriteRecord>,
    /// Parameters of the last write request
    pub last_request: Option<RequestRecord>,
}

/// Shared handle to an emulated device
///
/// Clones refer to the same device, so a test can keep one to inspect the
/// state after handing the backend to a session.
#[derive(Debug, Clone)]
pub struct DummyFlash {
    state: Rc<RefCell<DummyState>>,
}

impl DummyFlash {
    /// Create a device with erased flash
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            state: Rc::new(RefCell::new(DummyState {
                config,
                data,
                faults: Faults::default(),
                port_open: false,
                devices_requested: 0,
                transports_opened: 0,
                connect_calls: 0,
                disconnect_calls: 0,
                baud_rate: None,
                writes: Vec::new(),
                last_request: None,
            })),
        }
    }

    /// Create a device with the default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Builder-style fault injection
    pub fn with_faults(self, faults: Faults) -> Self {
        self.state.borrow_mut().faults = faults;
        self
    }

    /// Replace the injected faults
    pub fn set_faults(&self, faults: Faults) {
        self.state.borrow_mut().faults = faults;
    }

    /// Borrow the recorded state
    pub fn state(&self) -> Ref<'_, DummyState> {
        self.state.borrow()
    }

    /// Copy of the flash contents
    pub fn data(&self) -> Vec<u8> {
        self.state.borrow().data.clone()
    }

    /// Copy of `len` bytes of flash starting at `address`
    pub fn read(&self, address: u32, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        let start = (address as usize).min(state.data.len());
        let end = start.saturating_add(len).min(state.data.len());
        state.data[start..end].to_vec()
    }

    /// Emulated chip name
    pub fn chip_name(&self) -> String {
        self.state.borrow().config.chip_name.clone()
    }
}

/// Emulated serial device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyPort {
    /// Port name
    pub name: String,
}

/// Emulated transport
#[derive(Debug, Clone)]
pub struct DummyTransport {
    flash: DummyFlash,
}

impl Transport for DummyTransport {
    async fn disconnect(&mut self) -> Result<(), BackendError> {
        let mut state = self.flash.state.borrow_mut();
        state.disconnect_calls += 1;
        state.port_open = false;
        if state.faults.disconnect {
            return Err(BackendError::new("The port is already closed."));
        }
        log::debug!("dummy: port closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.flash.state.borrow().port_open
    }
}

/// Emulated flashing engine
#[derive(Debug)]
pub struct DummyFlasher {
    flash: DummyFlash,
    synced: bool,
}

impl FlashingService for DummyFlasher {
    async fn connect(&mut self) -> Result<(), BackendError> {
        let mut state = self.flash.state.borrow_mut();
        state.connect_calls += 1;
        if state.faults.connect || !state.port_open {
            return Err(BackendError::new(
                "Failed to connect with the device (no serial data received)",
            ));
        }
        self.synced = true;
        Ok(())
    }

    fn chip_name(&self) -> Option<String> {
        self.synced.then(|| self.flash.chip_name())
    }

    async fn write_flash(
        &mut self,
        request: WriteFlashRequest<'_>,
        progress: &mut dyn FlashProgress,
    ) -> Result<(), BackendError> {
        if !self.synced {
            return Err(BackendError::new("flasher not connected"));
        }

        let mut state = self.flash.state.borrow_mut();
        state.last_request = Some(RequestRecord {
            flash_size: request.flash_size,
            erase_all: request.erase_all,
            compress: request.compress,
        });
        if request.erase_all {
            state.data.fill(0xFF);
        }

        let total = request.plan.total_bytes();
        let block_size = state.config.block_size.max(1);
        let write_after = state.faults.write_after;
        let mut written = 0;

        for entry in request.plan.entries() {
            let image = entry.payload.decode();
            let start = entry.address as usize;
            let end = start + image.len();
            if end > state.data.len() {
                return Err(BackendError::new(format!(
                    "image {} (0x{:X}..0x{:X}) exceeds flash size 0x{:X}",
                    entry.file,
                    start,
                    end,
                    state.data.len()
                )));
            }

            for (i, block) in image.chunks(block_size).enumerate() {
                let offset = start + i * block_size;
                state.data[offset..offset + block.len()].copy_from_slice(block);
                written += block.len();
                progress.update(written, total);

                if matches!(write_after, Some(limit) if written >= limit && written < total) {
                    return Err(BackendError::new("Timed out waiting for packet header"));
                }
            }

            state.writes.push(WriteRecord {
                address: entry.address,
                len: image.len(),
            });
            log::debug!("dummy: wrote {} bytes at 0x{:08X}", image.len(), start);
        }

        Ok(())
    }
}

/// Device backend over a [`DummyFlash`]
#[derive(Debug, Clone)]
pub struct DummyBackend {
    flash: DummyFlash,
}

impl DummyBackend {
    /// Create a backend for the given device
    pub fn new(flash: DummyFlash) -> Self {
        Self { flash }
    }

    /// The emulated device
    pub fn flash(&self) -> &DummyFlash {
        &self.flash
    }
}

impl DeviceBackend for DummyBackend {
    type Device = DummyPort;
    type Transport = DummyTransport;
    type Flasher = DummyFlasher;

    async fn request_device(&mut self) -> Result<DummyPort, BackendError> {
        let mut state = self.flash.state.borrow_mut();
        state.devices_requested += 1;
        if state.faults.request_device {
            return Err(BackendError::new("No port selected by the user."));
        }
        Ok(DummyPort {
            name: "dummy0".to_string(),
        })
    }

    fn open_transport(&mut self, device: &DummyPort) -> Result<DummyTransport, BackendError> {
        let mut state = self.flash.state.borrow_mut();
        if state.faults.open_transport {
            return Err(BackendError::new(format!("Failed to open {}", device.name)));
        }
        state.transports_opened += 1;
        state.port_open = true;
        Ok(DummyTransport {
            flash: self.flash.clone(),
        })
    }

    fn create_flasher(
        &mut self,
        transport: &DummyTransport,
        baud_rate: u32,
    ) -> Result<DummyFlasher, BackendError> {
        let mut state = transport.flash.state.borrow_mut();
        if state.faults.create_flasher {
            return Err(BackendError::new(format!("Unsupported baud rate {}", baud_rate)));
        }
        state.baud_rate = Some(baud_rate);
        Ok(DummyFlasher {
            flash: transport.flash.clone(),
            synced: false,
        })
    }
}

#[cfg(test)]
mod session_tests;

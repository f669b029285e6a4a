//! Provisioning session: connection lifecycle and flashing attempts
//!
//! A [`ProvisioningSession`] owns the connection to one device. The
//! connection is a single [`ConnectionHandle`] holding the device, the
//! transport and the flasher together, stored as an `Option`, so it is
//! either fully present or absent.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected ──toggle──► Connecting ──ok──► Connected
//!      ▲                       │                 │
//!      └────────── error ──────┘◄──── toggle ────┘
//! ```
//!
//! # Flashing attempt
//!
//! ```text
//! Idle ► Fetching ► Extracting ► ManifestParsing ► PlanBuilding ► Writing ► Completed
//!            │           │              │                │            │          │
//!            └───────────┴──────────────┴────── Failed ◄─┴────────────┘          │
//!                                                  │                             │
//!                                                  └────► TearingDown ◄──────────┘
//!                                                              │
//!                                                              ▼
//!                                                             Idle
//! ```
//!
//! A completed attempt always disconnects, which restarts the device. A
//! failed write tears the connection down as well. Failures before the
//! write (download, extraction, manifest, plan) do not tear down: the
//! device has not been touched, so it stays connected and the attempt can
//! be retried without reconnecting. This differs from tearing down after
//! every attempt regardless of outcome.

use core::fmt;

use crate::archive::ArchiveLoader;
use crate::chip::{chip_names_match, ChipFamily};
use crate::config::ProvisionConfig;
use crate::error::{AttemptError, ProvisionError, Result};
use crate::manifest::FlashManifest;
use crate::plan::FlashPlan;
use crate::progress::LogProgress;
use crate::service::{
    BackendError, BundleSource, DeviceBackend, FetchError, FlashSize, FlashingService, Transport,
    WriteFlashRequest,
};
use crate::surface::{Affordances, ConnectLabel, ControlSurface, LogSink};

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No device
    Disconnected,
    /// Port selection and handshake in progress
    Connecting,
    /// Device connected and synchronized
    Connected,
}

/// Stage of a flashing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No attempt running
    Idle,
    /// Downloading the bundle
    Fetching,
    /// Opening the bundle archive
    Extracting,
    /// Reading the manifest
    ManifestParsing,
    /// Reading and encoding the images
    PlanBuilding,
    /// Writing to the device
    Writing,
    /// Write finished
    Completed,
    /// Attempt failed
    Failed,
    /// Releasing the connection
    TearingDown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::ManifestParsing => "manifest parsing",
            Self::PlanBuilding => "plan building",
            Self::Writing => "writing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TearingDown => "tearing down",
        };
        f.write_str(name)
    }
}

/// Outcome of [`ProvisioningSession::toggle_connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A device was connected
    Connected {
        /// Chip reported by the flasher
        chip: Option<String>,
    },
    /// The device was disconnected
    Disconnected,
}

/// Device, transport and flasher of one connection
pub struct ConnectionHandle<B: DeviceBackend> {
    device: B::Device,
    transport: B::Transport,
    flasher: B::Flasher,
}

impl<B: DeviceBackend> ConnectionHandle<B> {
    /// Selected device
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Open transport
    pub fn transport(&self) -> &B::Transport {
        &self.transport
    }

    /// Connected flasher
    pub fn flasher(&self) -> &B::Flasher {
        &self.flasher
    }
}

/// One image written by a successful attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashedImage {
    /// Flash offset
    pub address: u32,
    /// Image path inside the bundle
    pub file: String,
    /// Image size in bytes
    pub size: usize,
}

/// Summary of a successful attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    /// Chip the images were written to
    pub chip: Option<String>,
    /// Images, in write order
    pub images: Vec<FlashedImage>,
    /// Total bytes written
    pub total_bytes: usize,
}

/// Owner of a device connection and runner of flashing attempts
pub struct ProvisioningSession<B: DeviceBackend> {
    backend: B,
    config: ProvisionConfig,
    connection: Option<ConnectionHandle<B>>,
    state: ConnectionState,
    stage: Stage,
}

fn connect_failed(e: BackendError) -> ProvisionError {
    ProvisionError::ConnectFailed(e.0)
}

/// Close a transport, logging instead of returning a failure
async fn close_quietly<T: Transport>(transport: &mut T) {
    if !transport.is_connected() {
        return;
    }
    if let Err(e) = transport.disconnect().await {
        log::debug!("{}", ProvisionError::TeardownFailed(e.0));
    }
}

impl<B: DeviceBackend> ProvisioningSession<B> {
    /// Create a disconnected session
    pub fn new(backend: B, config: ProvisionConfig) -> Self {
        Self {
            backend,
            config,
            connection: None,
            state: ConnectionState::Disconnected,
            stage: Stage::Idle,
        }
    }

    /// Configuration used for attempts
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// The device backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The device backend, mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current attempt stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Whether a device is connected
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The current connection, if any
    pub fn connection(&self) -> Option<&ConnectionHandle<B>> {
        self.connection.as_ref()
    }

    /// Control state matching the session state
    pub fn affordances(&self) -> Affordances {
        if self.stage != Stage::Idle || self.state == ConnectionState::Connecting {
            return Affordances {
                connect_enabled: false,
                connect_label: if self.is_connected() {
                    ConnectLabel::Disconnect
                } else {
                    ConnectLabel::Connect
                },
                flash_enabled: false,
            };
        }
        if self.is_connected() {
            Affordances {
                connect_enabled: true,
                connect_label: ConnectLabel::Disconnect,
                flash_enabled: true,
            }
        } else {
            Affordances::READY_TO_CONNECT
        }
    }

    /// Connect if disconnected, disconnect if connected
    pub async fn toggle_connect<U>(
        &mut self,
        family: ChipFamily,
        ui: &mut U,
    ) -> Result<ConnectionEvent>
    where
        U: LogSink + ControlSurface + ?Sized,
    {
        if self.is_connected() {
            if let Err(e) = self.disconnect().await {
                log::debug!("{}", e);
            }
            ui.write_line("Device disconnected.");
            log::info!("Device disconnected");
            ui.apply(&self.affordances());
            return Ok(ConnectionEvent::Disconnected);
        }

        self.state = ConnectionState::Connecting;
        ui.apply(&self.affordances());
        ui.write_line("Connecting to device...");
        log::info!(
            "Connecting ({} at {} baud)",
            family,
            family.baud_rate()
        );

        match self.open_connection(family).await {
            Ok(handle) => {
                let chip = handle.flasher.chip_name();
                self.connection = Some(handle);
                self.state = ConnectionState::Connected;
                ui.write_line("Device connected!");
                if let Some(chip) = &chip {
                    ui.write_line(&format!("Chip: {}", chip));
                    log::info!("Connected to {}", chip);
                }
                ui.apply(&self.affordances());
                Ok(ConnectionEvent::Connected { chip })
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                ui.write_line(&format!("Error: {}", e));
                log::error!("{}", e);
                ui.apply(&self.affordances());
                Err(e)
            }
        }
    }

    /// Build a connection; on failure release whatever was opened
    async fn open_connection(&mut self, family: ChipFamily) -> Result<ConnectionHandle<B>> {
        let device = self
            .backend
            .request_device()
            .await
            .map_err(connect_failed)?;
        let mut transport = self
            .backend
            .open_transport(&device)
            .map_err(connect_failed)?;

        let mut flasher = match self.backend.create_flasher(&transport, family.baud_rate()) {
            Ok(flasher) => flasher,
            Err(e) => {
                close_quietly(&mut transport).await;
                return Err(connect_failed(e));
            }
        };

        if let Err(e) = flasher.connect().await {
            close_quietly(&mut transport).await;
            return Err(connect_failed(e));
        }

        Ok(ConnectionHandle {
            device,
            transport,
            flasher,
        })
    }

    /// Release the connection
    ///
    /// The transport is disconnected exactly once per connection. Calling
    /// this without a connection does nothing.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;
        let Some(mut handle) = self.connection.take() else {
            return Ok(());
        };
        if !handle.transport.is_connected() {
            return Ok(());
        }
        handle
            .transport
            .disconnect()
            .await
            .map_err(|e| ProvisionError::TeardownFailed(e.0))
    }

    fn enter<U: ControlSurface + ?Sized>(&mut self, stage: Stage, ui: &mut U) {
        log::debug!("Stage: {} -> {}", self.stage, stage);
        self.stage = stage;
        ui.stage_changed(stage);
    }

    /// Run one flashing attempt
    ///
    /// Requires a connected device. The log surface is cleared first, and
    /// both controls stay disabled until the attempt is over.
    pub async fn flash<S, L, U>(
        &mut self,
        source: &mut S,
        loader: &L,
        ui: &mut U,
    ) -> core::result::Result<FlashReport, AttemptError>
    where
        S: BundleSource,
        L: ArchiveLoader,
        U: LogSink + ControlSurface + ?Sized,
    {
        if !self.is_connected() {
            ui.write_line("Error: device not connected.");
            return Err(AttemptError::new(Stage::Idle, ProvisionError::NotConnected));
        }

        self.enter(Stage::Fetching, ui);
        ui.apply(&self.affordances());
        ui.clear();
        ui.write_line("Starting flashing process...");

        let outcome = self.run_attempt(source, loader, ui).await;

        match &outcome {
            Ok(report) => {
                self.enter(Stage::Completed, ui);
                ui.write_line("\n\nFlashing complete!");
                log::info!(
                    "Wrote {} image(s), {} bytes",
                    report.images.len(),
                    report.total_bytes
                );
                self.enter(Stage::TearingDown, ui);
                ui.write_line("Disconnecting to restart the device...");
                if let Err(e) = self.disconnect().await {
                    log::debug!("{}", e);
                }
                ui.write_line("Device restarted and disconnected.");
            }
            Err(err) => {
                self.enter(Stage::Failed, ui);
                ui.write_line(&format!("\n\nFlashing failed: {}", err.error));
                log::error!("{}", err);
                self.enter(Stage::TearingDown, ui);
                if err.stage == Stage::Writing && self.is_connected() {
                    if let Err(e) = self.disconnect().await {
                        log::debug!("{}", e);
                    }
                }
            }
        }

        self.enter(Stage::Idle, ui);
        ui.apply(&self.affordances());
        outcome
    }

    async fn run_attempt<S, L, U>(
        &mut self,
        source: &mut S,
        loader: &L,
        ui: &mut U,
    ) -> core::result::Result<FlashReport, AttemptError>
    where
        S: BundleSource,
        L: ArchiveLoader,
        U: LogSink + ControlSurface + ?Sized,
    {
        let location = self.config.bundle_location.clone();
        ui.write_line(&format!("Downloading firmware bundle: {}...", location));
        let bytes = source.fetch(&location).await.map_err(|e| {
            let error = match e {
                FetchError::Status(status) => ProvisionError::BundleDownloadFailed(status),
                FetchError::Unavailable(reason) => ProvisionError::BundleUnavailable(reason),
            };
            AttemptError::new(Stage::Fetching, error)
        })?;
        ui.write_line(&format!(
            "Bundle downloaded ({} bytes), extracting...",
            bytes.len()
        ));

        self.enter(Stage::Extracting, ui);
        let mut archive = loader.load(bytes).map_err(|e| {
            AttemptError::new(Stage::Extracting, ProvisionError::ArchiveCorrupt(e.0))
        })?;
        ui.write_line("Bundle extracted.");

        self.enter(Stage::ManifestParsing, ui);
        let manifest = FlashManifest::from_archive(&mut archive, &self.config.manifest_name)
            .map_err(|e| AttemptError::new(Stage::ManifestParsing, e))?;
        ui.write_line(&format!(
            "Manifest parsed: {} image(s).",
            manifest.len()
        ));

        let chip = self
            .connection
            .as_ref()
            .and_then(|handle| handle.flasher.chip_name());
        if let (Some(target), Some(detected)) = (&manifest.target_chip, &chip) {
            if !chip_names_match(detected, target) {
                let warning = format!(
                    "Warning: bundle was built for {}, connected chip is {}",
                    target, detected
                );
                ui.write_line(&warning);
                log::warn!("{}", warning);
            }
        }

        self.enter(Stage::PlanBuilding, ui);
        for entry in manifest.entries() {
            ui.write_line(&format!(" -> Reading {}...", entry.file));
        }
        let plan = FlashPlan::build(&mut archive, &manifest)
            .map_err(|e| AttemptError::new(Stage::PlanBuilding, e))?;
        ui.write_line("All firmware images ready.");

        self.enter(Stage::Writing, ui);
        ui.write_line("Writing to device...");
        let request = WriteFlashRequest {
            plan: &plan,
            flash_size: FlashSize::Keep,
            erase_all: self.config.erase_all,
            compress: self.config.compress,
        };
        let handle = self
            .connection
            .as_mut()
            .ok_or_else(|| AttemptError::new(Stage::Writing, ProvisionError::NotConnected))?;
        let mut progress = LogProgress::new(ui);
        handle
            .flasher
            .write_flash(request, &mut progress)
            .await
            .map_err(|e| AttemptError::new(Stage::Writing, ProvisionError::WriteFailed(e.0)))?;

        Ok(FlashReport {
            chip,
            images: plan
                .entries()
                .iter()
                .map(|e| FlashedImage {
                    address: e.address,
                    file: e.file.clone(),
                    size: e.payload.byte_len(),
                })
                .collect(),
            total_bytes: plan.total_bytes(),
        })
    }
}

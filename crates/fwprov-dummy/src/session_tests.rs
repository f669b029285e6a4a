//! Provisioning session tests against the emulated device

use super::*;
use fwprov_core::archive::{ArchiveError, ArchiveLoader, MemoryArchive};
use fwprov_core::service::{BundleSource, FetchError};
use fwprov_core::{
    Affordances, ChipFamily, ConnectLabel, ConnectionEvent, ConnectionState, MemorySurface,
    ProvisionConfig, ProvisionError, ProvisioningSession, Stage,
};

/// Bundle source answering every fetch the same way
struct FixedSource {
    response: Result<Vec<u8>, FetchError>,
    requested: Vec<String>,
}

impl FixedSource {
    fn ok() -> Self {
        Self {
            response: Ok(b"PK\x03\x04bundle".to_vec()),
            requested: Vec::new(),
        }
    }

    fn failing(error: FetchError) -> Self {
        Self {
            response: Err(error),
            requested: Vec::new(),
        }
    }

    fn bytes(bytes: &[u8]) -> Self {
        Self {
            response: Ok(bytes.to_vec()),
            requested: Vec::new(),
        }
    }
}

impl BundleSource for FixedSource {
    async fn fetch(&mut self, location: &str) -> Result<Vec<u8>, FetchError> {
        self.requested.push(location.to_string());
        self.response.clone()
    }
}

/// Loader that hands out a prepared archive for anything that looks like a zip
struct FixedLoader(MemoryArchive);

impl ArchiveLoader for FixedLoader {
    type Archive = MemoryArchive;

    fn load(&self, bytes: Vec<u8>) -> Result<MemoryArchive, ArchiveError> {
        if bytes.starts_with(b"PK") {
            Ok(self.0.clone())
        } else {
            Err(ArchiveError::new("invalid Zip archive: Invalid zip header"))
        }
    }
}

const MANIFEST: &str = r#"{
    "flash_files": {
        "0x0": "bootloader/bootloader.bin",
        "0x8000": "partition_table/partition-table.bin",
        "0x10000": "app.bin"
    },
    "extra_esptool_args": { "chip": "esp32c3" }
}"#;

fn bundle() -> MemoryArchive {
    MemoryArchive::new()
        .with_file("flasher_args.json", MANIFEST)
        .with_file("bootloader/bootloader.bin", vec![0xE9; 1000])
        .with_file("partition_table/partition-table.bin", vec![0xAA; 3000])
        .with_file("app.bin", vec![0x80, 0xFF, 0x00, 0x41].repeat(1500))
}

fn session(flash: &DummyFlash) -> ProvisioningSession<DummyBackend> {
    ProvisioningSession::new(DummyBackend::new(flash.clone()), ProvisionConfig::default())
}

async fn connected(
    flash: &DummyFlash,
    ui: &mut MemorySurface,
) -> ProvisioningSession<DummyBackend> {
    let mut session = session(flash);
    session.toggle_connect(ChipFamily::Esp32C3, ui).await.unwrap();
    assert_eq!(session.state(), ConnectionState::Connected);
    session
}

#[tokio::test]
async fn test_connect_and_disconnect() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = session(&flash);

    let event = session.toggle_connect(ChipFamily::Esp32C3, &mut ui).await.unwrap();
    assert_eq!(
        event,
        ConnectionEvent::Connected {
            chip: Some("ESP32-C3 (QFN32) (revision v0.4)".to_string())
        }
    );
    assert!(session.is_connected());
    assert!(ui.contains("Device connected!"));
    assert!(ui.contains("Chip: ESP32-C3"));
    let controls = ui.controls().unwrap();
    assert!(controls.connect_enabled);
    assert!(controls.flash_enabled);
    assert_eq!(controls.connect_label, ConnectLabel::Disconnect);
    // Controls are disabled while connecting
    assert!(!ui.control_history()[0].connect_enabled);

    let event = session.toggle_connect(ChipFamily::Esp32C3, &mut ui).await.unwrap();
    assert_eq!(event, ConnectionEvent::Disconnected);
    assert!(!session.is_connected());
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(ui.contains("Device disconnected."));
    assert_eq!(ui.controls(), Some(&Affordances::READY_TO_CONNECT));
    assert_eq!(flash.state().disconnect_calls, 1);
    assert!(!flash.state().port_open);
}

#[tokio::test]
async fn test_baud_rate_follows_chip_family() {
    for (family, expected) in [
        (ChipFamily::Esp32C3, 115_200),
        (ChipFamily::Esp32, 921_600),
        (ChipFamily::Esp32S3, 921_600),
    ] {
        let flash = DummyFlash::new_default();
        let mut ui = MemorySurface::new();
        let mut session = session(&flash);
        session.toggle_connect(family, &mut ui).await.unwrap();
        assert_eq!(flash.state().baud_rate, Some(expected), "{}", family);
    }
}

#[tokio::test]
async fn test_disconnect_twice_closes_once() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;

    session.disconnect().await.unwrap();
    session.disconnect().await.unwrap();

    assert_eq!(flash.state().disconnect_calls, 1);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_cancelled_port_selection() {
    let flash = DummyFlash::new_default().with_faults(Faults {
        request_device: true,
        ..Faults::default()
    });
    let mut ui = MemorySurface::new();
    let mut session = session(&flash);

    let err = session
        .toggle_connect(ChipFamily::Esp32C3, &mut ui)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProvisionError::ConnectFailed("No port selected by the user.".to_string())
    );
    assert!(ui.contains("Error: connection failed: No port selected by the user."));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(flash.state().transports_opened, 0);
}

#[tokio::test]
async fn test_open_transport_failure_leaves_no_connection() {
    let flash = DummyFlash::new_default().with_faults(Faults {
        open_transport: true,
        ..Faults::default()
    });
    let mut ui = MemorySurface::new();
    let mut session = session(&flash);

    assert!(session
        .toggle_connect(ChipFamily::Esp32C3, &mut ui)
        .await
        .is_err());
    assert!(!session.is_connected());
    assert!(session.connection().is_none());
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(ui.controls(), Some(&Affordances::READY_TO_CONNECT));
}

#[tokio::test]
async fn test_failed_handshake_closes_port() {
    let flash = DummyFlash::new_default().with_faults(Faults {
        connect: true,
        ..Faults::default()
    });
    let mut ui = MemorySurface::new();
    let mut session = session(&flash);

    assert!(session
        .toggle_connect(ChipFamily::Esp32C3, &mut ui)
        .await
        .is_err());
    assert!(!session.is_connected());
    assert_eq!(flash.state().connect_calls, 1);
    assert_eq!(flash.state().disconnect_calls, 1);
    assert!(!flash.state().port_open);
}

#[tokio::test]
async fn test_failed_flasher_creation_closes_port() {
    let flash = DummyFlash::new_default().with_faults(Faults {
        create_flasher: true,
        ..Faults::default()
    });
    let mut ui = MemorySurface::new();
    let mut session = session(&flash);

    assert!(session
        .toggle_connect(ChipFamily::Esp32C3, &mut ui)
        .await
        .is_err());
    assert_eq!(flash.state().connect_calls, 0);
    assert!(!flash.state().port_open);
}

#[tokio::test]
async fn test_flash_requires_connection() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = session(&flash);
    let mut source = FixedSource::ok();

    let err = session
        .flash(&mut source, &FixedLoader(bundle()), &mut ui)
        .await
        .unwrap_err();
    assert_eq!(err.error, ProvisionError::NotConnected);
    assert!(source.requested.is_empty());
    assert!(ui.contains("device not connected"));
}

#[tokio::test]
async fn test_successful_flash() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;
    let mut source = FixedSource::ok();

    let report = session
        .flash(&mut source, &FixedLoader(bundle()), &mut ui)
        .await
        .unwrap();

    assert_eq!(source.requested, vec!["./firmware.zip".to_string()]);
    assert_eq!(report.total_bytes, 10_000);
    let addresses: Vec<u32> = report.images.iter().map(|i| i.address).collect();
    assert_eq!(addresses, vec![0x0, 0x8000, 0x10000]);

    // Images land byte-exact, high bytes included
    assert_eq!(flash.read(0, 1000), vec![0xE9; 1000]);
    assert_eq!(flash.read(0x8000, 3000), vec![0xAA; 3000]);
    assert_eq!(
        flash.read(0x10000, 6000),
        vec![0x80, 0xFF, 0x00, 0x41].repeat(1500)
    );
    assert_eq!(
        flash.state().last_request,
        Some(RequestRecord {
            flash_size: FlashSize::Keep,
            erase_all: false,
            compress: true,
        })
    );

    // Completed attempts always disconnect
    assert!(!session.is_connected());
    assert_eq!(flash.state().disconnect_calls, 1);
    assert!(ui.contains(&format!("Flashing progress: 100% [{}]", "=".repeat(50))));
    assert!(ui.contains("Flashing complete!"));
    assert!(ui.contains("Device restarted and disconnected."));
    assert_eq!(ui.controls(), Some(&Affordances::READY_TO_CONNECT));
    assert_eq!(session.stage(), Stage::Idle);
}

#[tokio::test]
async fn test_stage_sequence() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;

    session
        .flash(&mut FixedSource::ok(), &FixedLoader(bundle()), &mut ui)
        .await
        .unwrap();

    assert_eq!(
        ui.stages(),
        &[
            Stage::Fetching,
            Stage::Extracting,
            Stage::ManifestParsing,
            Stage::PlanBuilding,
            Stage::Writing,
            Stage::Completed,
            Stage::TearingDown,
            Stage::Idle,
        ]
    );
}

#[tokio::test]
async fn test_controls_disabled_during_attempt() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;
    let before = ui.control_history().len();

    session
        .flash(&mut FixedSource::ok(), &FixedLoader(bundle()), &mut ui)
        .await
        .unwrap();

    let during = &ui.control_history()[before];
    assert!(!during.connect_enabled);
    assert!(!during.flash_enabled);
}

#[tokio::test]
async fn test_log_cleared_at_start() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;

    session
        .flash(&mut FixedSource::ok(), &FixedLoader(bundle()), &mut ui)
        .await
        .unwrap();

    assert_eq!(ui.clear_count(), 1);
    assert!(!ui.contains("Device connected!"));
    assert_eq!(ui.lines()[0], "Starting flashing process...");
}

#[tokio::test]
async fn test_download_failure_keeps_connection() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;

    let err = session
        .flash(
            &mut FixedSource::failing(FetchError::Status(404)),
            &FixedLoader(bundle()),
            &mut ui,
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Fetching);
    assert_eq!(err.error, ProvisionError::BundleDownloadFailed(404));
    assert!(ui.contains("Flashing failed: firmware bundle download failed (HTTP 404)"));
    assert!(session.is_connected());
    assert_eq!(flash.state().disconnect_calls, 0);
    assert!(flash.state().writes.is_empty());

    let controls = ui.controls().unwrap();
    assert!(controls.connect_enabled);
    assert!(controls.flash_enabled);
}

#[tokio::test]
async fn test_retry_after_failed_download() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;

    assert!(session
        .flash(
            &mut FixedSource::failing(FetchError::Unavailable("connection refused".into())),
            &FixedLoader(bundle()),
            &mut ui,
        )
        .await
        .is_err());
    assert!(session
        .flash(&mut FixedSource::ok(), &FixedLoader(bundle()), &mut ui)
        .await
        .is_ok());
    assert_eq!(flash.state().connect_calls, 1);
}

#[tokio::test]
async fn test_corrupt_archive() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;

    let err = session
        .flash(
            &mut FixedSource::bytes(b"<html>not found</html>"),
            &FixedLoader(bundle()),
            &mut ui,
        )
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Extracting);
    assert!(matches!(err.error, ProvisionError::ArchiveCorrupt(_)));
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_missing_manifest() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;
    let archive = MemoryArchive::new().with_file("app.bin", vec![1, 2, 3]);

    let err = session
        .flash(&mut FixedSource::ok(), &FixedLoader(archive), &mut ui)
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::ManifestParsing);
    assert_eq!(
        err.error,
        ProvisionError::ManifestMissing("flasher_args.json".to_string())
    );
    assert!(flash.state().writes.is_empty());
}

#[tokio::test]
async fn test_missing_image_writes_nothing() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;
    let archive = MemoryArchive::new()
        .with_file("flasher_args.json", MANIFEST)
        .with_file("bootloader/bootloader.bin", vec![0xE9; 1000]);

    let err = session
        .flash(&mut FixedSource::ok(), &FixedLoader(archive), &mut ui)
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::PlanBuilding);
    assert_eq!(
        err.error,
        ProvisionError::FirmwareFileMissing("partition_table/partition-table.bin".to_string())
    );
    assert!(flash.state().last_request.is_none());
    assert_eq!(flash.read(0, 4), vec![0xFF; 4]);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_manifest_without_flash_files_writes_nothing() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;
    let archive = MemoryArchive::new()
        .with_file(
            "flasher_args.json",
            r#"{"extra_esptool_args": {"chip": "esp32c3"}}"#,
        )
        .with_file("app.bin", vec![0x41; 100]);

    let err = session
        .flash(&mut FixedSource::ok(), &FixedLoader(archive), &mut ui)
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::ManifestParsing);
    assert!(matches!(err.error, ProvisionError::ManifestMalformed(_)));
    assert!(ui.contains("Flashing failed: "));
    assert!(flash.state().last_request.is_none());
    assert!(flash.state().writes.is_empty());
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_empty_image_writes_nothing() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;
    let archive = MemoryArchive::new()
        .with_file("flasher_args.json", MANIFEST)
        .with_file("bootloader/bootloader.bin", vec![0xE9; 1000])
        .with_file("partition_table/partition-table.bin", Vec::<u8>::new())
        .with_file("app.bin", vec![0x41; 100]);

    let err = session
        .flash(&mut FixedSource::ok(), &FixedLoader(archive), &mut ui)
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::PlanBuilding);
    assert_eq!(
        err.error,
        ProvisionError::FirmwareFileEmpty("partition_table/partition-table.bin".to_string())
    );
    assert!(flash.state().last_request.is_none());
    assert!(flash.state().writes.is_empty());
    assert_eq!(flash.read(0, 4), vec![0xFF; 4]);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_write_failure_tears_down() {
    let flash = DummyFlash::new(DummyConfig {
        block_size: 1000,
        ..DummyConfig::default()
    });
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;
    flash.set_faults(Faults {
        write_after: Some(4000),
        disconnect: true,
        ..Faults::default()
    });

    let err = session
        .flash(&mut FixedSource::ok(), &FixedLoader(bundle()), &mut ui)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Writing);
    assert_eq!(
        err.error,
        ProvisionError::WriteFailed("Timed out waiting for packet header".to_string())
    );
    assert!(ui.contains("Flashing progress: 40% "));
    assert!(ui.contains("Flashing failed: flash write failed: Timed out waiting for packet header"));
    // The teardown error is not reported over the write error
    assert!(!ui.contains("already closed"));

    assert!(!session.is_connected());
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(flash.state().disconnect_calls, 1);
    assert_eq!(ui.controls(), Some(&Affordances::READY_TO_CONNECT));
}

#[tokio::test]
async fn test_chip_mismatch_warns() {
    let flash = DummyFlash::new(DummyConfig {
        chip_name: "ESP32-S3 (QFN56) (revision v0.2)".to_string(),
        ..DummyConfig::default()
    });
    let mut ui = MemorySurface::new();
    let mut session = connected(&flash, &mut ui).await;

    session
        .flash(&mut FixedSource::ok(), &FixedLoader(bundle()), &mut ui)
        .await
        .unwrap();
    assert!(ui.contains("Warning: bundle was built for esp32c3, connected chip is ESP32-S3"));
}

#[tokio::test]
async fn test_config_is_forwarded() {
    let flash = DummyFlash::new_default();
    let mut ui = MemorySurface::new();
    let config = ProvisionConfig {
        erase_all: true,
        compress: false,
        ..ProvisionConfig::default()
    }
    .with_bundle_location("https://example.com/fw/esp32c3.zip");
    let mut session = ProvisioningSession::new(DummyBackend::new(flash.clone()), config);
    session.toggle_connect(ChipFamily::Esp32C3, &mut ui).await.unwrap();

    let mut source = FixedSource::ok();
    session
        .flash(&mut source, &FixedLoader(bundle()), &mut ui)
        .await
        .unwrap();

    assert_eq!(source.requested, vec!["https://example.com/fw/esp32c3.zip"]);
    let request = flash.state().last_request.unwrap();
    assert!(request.erase_all);
    assert!(!request.compress);
}

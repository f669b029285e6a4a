//! Flash command implementation

use super::{load_config, runtime, AnySource, TerminalSurface};
use crate::cli::BundleArgs;
use crate::programmers;
use fwprov_core::{ChipFamily, DeviceBackend, FlashReport, ProvisionConfig, ProvisioningSession};
use fwprov_zip::ZipLoader;
use std::path::Path;

/// Options for [`run_flash`]
pub struct FlashOptions<'a> {
    /// Device backend name
    pub programmer: &'a str,
    /// Target chip family
    pub chip: ChipFamily,
    /// Bundle location and config
    pub bundle: &'a BundleArgs,
    /// Erase the whole chip first
    pub erase_all: bool,
    /// Disable wire compression
    pub no_compress: bool,
    /// Where to save the emulated flash contents
    pub dump: Option<&'a Path>,
}

/// Connect, flash the bundle, and let the session disconnect the device
pub fn run_flash(options: FlashOptions<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(options.bundle)?;
    if options.erase_all {
        config.erase_all = true;
    }
    if options.no_compress {
        config.compress = false;
    }

    let name = programmers::find_programmer(options.programmer).ok_or_else(|| {
        format!(
            "Unknown programmer: {} [available: {}]",
            options.programmer,
            programmers::programmer_names_short()
        )
    })?;

    let rt = runtime()?;
    match name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            use fwprov_dummy::{DummyBackend, DummyConfig, DummyFlash};

            let flash = DummyFlash::new(DummyConfig {
                chip_name: emulated_chip_name(options.chip),
                ..DummyConfig::default()
            });
            let backend = DummyBackend::new(flash.clone());
            let report = rt.block_on(provision(backend, options.chip, config, options.bundle))?;
            print_report(&report);

            if let Some(path) = options.dump {
                std::fs::write(path, flash.data())?;
                println!("Emulated flash saved to {}", path.display());
            }
            Ok(())
        }
        _ => Err(format!("Programmer {} is not supported", name).into()),
    }
}

async fn provision<B: DeviceBackend>(
    backend: B,
    chip: ChipFamily,
    config: ProvisionConfig,
    bundle: &BundleArgs,
) -> Result<FlashReport, Box<dyn std::error::Error>> {
    let mut source = AnySource::for_location(&config.bundle_location, bundle.base_url.as_deref())?;
    let mut ui = TerminalSurface::new();
    let mut session = ProvisioningSession::new(backend, config);

    session.toggle_connect(chip, &mut ui).await?;
    let report = session.flash(&mut source, &ZipLoader::new(), &mut ui).await?;
    Ok(report)
}

/// Chip name the emulator reports for a family ("esp32c3" -> "ESP32-C3")
#[cfg(feature = "dummy")]
fn emulated_chip_name(chip: ChipFamily) -> String {
    let name = chip.as_str().to_uppercase();
    match name.strip_prefix("ESP32") {
        Some(variant) if !variant.is_empty() => format!("ESP32-{} (emulated)", variant),
        _ => format!("{} (emulated)", name),
    }
}

fn print_report(report: &FlashReport) {
    println!();
    if let Some(chip) = &report.chip {
        println!("Chip:    {}", chip);
    }
    for image in &report.images {
        println!(
            "  0x{:08X}  {:>10} bytes  {}",
            image.address, image.size, image.file
        );
    }
    println!("Total:   {} bytes", report.total_bytes);
}

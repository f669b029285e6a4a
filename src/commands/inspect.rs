//! Inspect command implementation

use super::{load_config, runtime, AnySource};
use crate::cli::BundleArgs;
use fwprov_core::{ArchiveLoader, BundleSource, FlashManifest, FlashPlan};
use fwprov_zip::ZipLoader;

/// Fetch a bundle and print the flash plan it resolves to
pub fn run_inspect(args: &BundleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    let mut source = AnySource::for_location(&config.bundle_location, args.base_url.as_deref())?;

    let bytes = runtime()?.block_on(source.fetch(&config.bundle_location))?;
    println!("Bundle:          {} ({} bytes)", config.bundle_location, bytes.len());

    let mut bundle = ZipLoader::new().load(bytes)?;
    let manifest = FlashManifest::from_archive(&mut bundle, &config.manifest_name)?;
    let plan = FlashPlan::build(&mut bundle, &manifest)?;

    println!(
        "Target chip:     {}",
        manifest.target_chip.as_deref().unwrap_or("(not specified)")
    );
    if let Some(settings) = &manifest.flash_settings {
        println!(
            "Flash settings:  mode={} size={} freq={}",
            settings.flash_mode.as_deref().unwrap_or("-"),
            settings.flash_size.as_deref().unwrap_or("-"),
            settings.flash_freq.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("{:<12} {:>10}  File", "Address", "Size");
    println!("{}", "-".repeat(60));
    for entry in plan.entries() {
        println!(
            "0x{:08X}   {:>10}  {}",
            entry.address,
            entry.payload.byte_len(),
            entry.file
        );
    }
    println!();
    println!("{} image(s), {} bytes", plan.len(), plan.total_bytes());

    let unused: Vec<String> = bundle
        .file_names()
        .into_iter()
        .filter(|name| {
            name != &config.manifest_name && !manifest.entries().iter().any(|e| &e.file == name)
        })
        .collect();
    if !unused.is_empty() {
        log::info!("Files not referenced by the manifest: {}", unused.join(", "));
    }

    Ok(())
}

//! Package command implementation

use fwprov_zip::{package_bundle, PackageOptions};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Package a build directory and report the bundle name to CI
pub fn run_package(
    build_dir: &Path,
    options: PackageOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = package_bundle(build_dir, &options)?;

    for file in &report.files {
        println!("  packaged  {}", file);
    }
    for file in &report.empty {
        println!("  warning   {} is empty", file);
    }
    for file in &report.skipped {
        println!("  skipped   {} (not found)", file);
    }
    println!("Created {}", report.output.display());

    if let Some(path) = std::env::var_os("GITHUB_OUTPUT") {
        let mut out = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(out, "zip_filename={}", options.file_name())?;
        log::debug!("Wrote zip_filename to {:?}", path);
    }

    Ok(())
}

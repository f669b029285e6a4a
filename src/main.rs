//! fwprov - Firmware bundle provisioning
//!
//! Writes a packaged firmware bundle (a zip holding `flasher_args.json` and
//! the images it lists) to a serial-connected microcontroller.
//!
//! # Architecture
//!
//! The pipeline lives in `fwprov-core` and is driven through a
//! `ProvisioningSession`:
//! - **Bundle sources** (`fwprov-http`) - download over HTTP(S) or read from
//!   disk
//! - **Archive loader** (`fwprov-zip`) - open the bundle
//! - **Device backends** - port, transport and flashing engine; the
//!   in-memory emulator (`fwprov-dummy`) on the command line, WebSerial
//!   with esptool-js in the browser (`fwprov-web`)
//!
//! This binary is the terminal front-end. It also packages build outputs
//! into bundles.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};
use commands::FlashOptions;
use fwprov_zip::PackageOptions;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Flash {
            programmer,
            chip,
            bundle,
            erase_all,
            no_compress,
            dump,
        } => commands::run_flash(FlashOptions {
            programmer: &programmer,
            chip,
            bundle: &bundle,
            erase_all,
            no_compress,
            dump: dump.as_deref(),
        }),
        Commands::Inspect { bundle } => commands::run_inspect(&bundle),
        Commands::Package {
            build_dir,
            ref_name,
            target,
            output_dir,
            zip_name_prefix,
        } => commands::run_package(
            &build_dir,
            PackageOptions {
                ref_name,
                target,
                output_dir,
                zip_name_prefix,
            },
        ),
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
        Commands::ListChips => {
            commands::list_chips();
            Ok(())
        }
    }
}

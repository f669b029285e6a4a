//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use fwprov_core::ChipFamily;
use std::path::PathBuf;

/// Parse a chip family name ("esp32c3", "ESP32-C3", ...)
fn parse_chip(s: &str) -> Result<ChipFamily, String> {
    s.parse()
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Device backend to use [available: {}]",
        programmers::programmer_names_short()
    )
}

/// Generate dynamic help text for the chip argument
fn chip_help() -> String {
    let names: Vec<&str> = ChipFamily::ALL.iter().map(|c| c.as_str()).collect();
    format!("Target chip family [{}]", names.join(", "))
}

#[derive(Parser)]
#[command(name = "fwprov")]
#[command(author, version, about = "Firmware bundle provisioning", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Bundle options shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BundleArgs {
    /// Bundle location: URL, file path, or a path relative to --base-url
    #[arg(short, long)]
    pub bundle: Option<String>,

    /// Base URL for relative bundle locations
    #[arg(long)]
    pub base_url: Option<String>,

    /// Provisioning config file (TOML format)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to a device and write a firmware bundle to it
    Flash {
        /// Device backend to use
        #[arg(short, long, default_value = "dummy", help = programmer_help())]
        programmer: String,

        /// Target chip family (selects the baud rate)
        #[arg(long, value_parser = parse_chip, default_value = "esp32c3", help = chip_help())]
        chip: ChipFamily,

        #[command(flatten)]
        bundle: BundleArgs,

        /// Erase the whole chip before writing
        #[arg(long)]
        erase_all: bool,

        /// Send data uncompressed
        #[arg(long)]
        no_compress: bool,

        /// Save the emulated flash contents after writing (dummy only)
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Resolve a bundle and show its flash plan without a device
    Inspect {
        #[command(flatten)]
        bundle: BundleArgs,
    },

    /// Package a build directory into a firmware bundle
    Package {
        /// Directory containing flasher_args.json and the build outputs
        #[arg(long, default_value = "build")]
        build_dir: PathBuf,

        /// Git reference name (tag or branch)
        #[arg(long)]
        ref_name: String,

        /// Target chip of the build (e.g. esp32c3)
        #[arg(long)]
        target: String,

        /// Directory the bundle is written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Bundle file name prefix
        #[arg(long, default_value = "firmware")]
        zip_name_prefix: String,
    },

    /// List available device backends
    ListProgrammers,

    /// List supported chip families
    ListChips,
}

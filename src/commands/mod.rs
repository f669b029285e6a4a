//! CLI command implementations
//!
//! ## Bundle sources
//!
//! Remote locations (and any location when `--base-url` is given) are
//! downloaded over HTTP; everything else is read from the filesystem.
//!
//! ## Terminal surface
//!
//! [`TerminalSurface`] plays the part of the log area and buttons of the
//! web front-end: log lines go to stdout, and the progress line is drawn
//! with an indicatif bar while the device is being written.

mod flash;
mod inspect;
mod list;
mod package;
mod surface;

pub use flash::{run_flash, FlashOptions};
pub use inspect::run_inspect;
pub use list::{list_chips, list_programmers};
pub use package::run_package;
pub use surface::TerminalSurface;

use crate::cli::BundleArgs;
use fwprov_core::service::{BundleSource, FetchError};
use fwprov_core::ProvisionConfig;
use fwprov_http::{is_remote, FileBundleSource, HttpBundleSource};

/// Bundle source picked from the location
pub enum AnySource {
    /// Download over HTTP(S)
    Http(HttpBundleSource),
    /// Read from the filesystem
    File(FileBundleSource),
}

impl AnySource {
    /// Pick a source for `location`
    pub fn for_location(
        location: &str,
        base_url: Option<&str>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(base) = base_url {
            let base: url::Url = base
                .parse()
                .map_err(|e| format!("Invalid base URL {}: {}", base, e))?;
            return Ok(Self::Http(HttpBundleSource::new().with_base(base)));
        }
        if is_remote(location) {
            Ok(Self::Http(HttpBundleSource::new()))
        } else {
            Ok(Self::File(FileBundleSource))
        }
    }
}

impl BundleSource for AnySource {
    async fn fetch(&mut self, location: &str) -> Result<Vec<u8>, FetchError> {
        match self {
            Self::Http(source) => source.fetch(location).await,
            Self::File(source) => source.fetch(location).await,
        }
    }
}

/// Load the config file, if any, and apply the bundle override
pub fn load_config(args: &BundleArgs) -> Result<ProvisionConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let config = ProvisionConfig::from_toml_file(path)?;
            log::info!("Loaded config from {:?}", path);
            config
        }
        None => ProvisionConfig::default(),
    };
    if let Some(bundle) = &args.bundle {
        config = config.with_bundle_location(bundle.clone());
    }
    Ok(config)
}

/// Single-threaded runtime for the session futures
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_source_selection() {
        assert!(matches!(
            AnySource::for_location("https://example.com/fw.zip", None).unwrap(),
            AnySource::Http(_)
        ));
        assert!(matches!(
            AnySource::for_location("./firmware.zip", None).unwrap(),
            AnySource::File(_)
        ));
        assert!(matches!(
            AnySource::for_location("./firmware.zip", Some("http://localhost:8000/")).unwrap(),
            AnySource::Http(_)
        ));
        assert!(AnySource::for_location("./firmware.zip", Some("not a url")).is_err());
    }

    #[test]
    fn test_load_config_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bundle_location = \"https://example.com/a.zip\"").unwrap();
        writeln!(file, "erase_all = true").unwrap();

        let args = BundleArgs {
            config: Some(file.path().to_path_buf()),
            ..BundleArgs::default()
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.bundle_location, "https://example.com/a.zip");
        assert!(config.erase_all);

        let args = BundleArgs {
            bundle: Some("b.zip".to_string()),
            ..args
        };
        assert_eq!(load_config(&args).unwrap().bundle_location, "b.zip");
    }
}

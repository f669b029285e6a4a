//! Provisioning configuration
//!
//! ```toml
//! bundle_location = "./firmware-v1.2.0-esp32c3.zip"
//! manifest_name = "flasher_args.json"
//! compress = true
//! erase_all = false
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::manifest::MANIFEST_FILE_NAME;

/// Default bundle location, relative to the page (or working directory)
pub const DEFAULT_BUNDLE_LOCATION: &str = "./firmware.zip";

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for this schema
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for a flashing attempt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Where to fetch the bundle from
    pub bundle_location: String,
    /// Manifest file name inside the bundle
    pub manifest_name: String,
    /// Ask the flashing engine to compress data on the wire
    pub compress: bool,
    /// Erase the whole chip before writing
    pub erase_all: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            bundle_location: DEFAULT_BUNDLE_LOCATION.to_string(),
            manifest_name: MANIFEST_FILE_NAME.to_string(),
            compress: true,
            erase_all: false,
        }
    }
}

impl ProvisionConfig {
    /// Load from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override the bundle location
    pub fn with_bundle_location(mut self, location: impl Into<String>) -> Self {
        self.bundle_location = location.into();
        self
    }
}

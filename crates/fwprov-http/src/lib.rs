//! fwprov-http - Bundle retrieval
//!
//! [`HttpBundleSource`] downloads the firmware bundle over HTTP(S) with
//! `reqwest`. It works natively and in the browser, where `reqwest` goes
//! through the page's `fetch`. Relative locations such as `./firmware.zip`
//! are resolved against a base URL (the page URL in the browser).
//!
//! [`FileBundleSource`] reads bundles from the local filesystem and is only
//! available natively.

#![warn(rust_2018_idioms)]
#![allow(async_fn_in_trait)]

use fwprov_core::service::{BundleSource, FetchError};
use url::Url;

/// Resolve a bundle location to an absolute URL
///
/// Absolute locations are used as-is. Relative locations need a base.
pub fn resolve_location(base: Option<&Url>, location: &str) -> Result<Url, FetchError> {
    match Url::parse(location) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(location).map_err(|e| {
                FetchError::Unavailable(format!("invalid bundle location {}: {}", location, e))
            }),
            None => Err(FetchError::Unavailable(format!(
                "relative bundle location {} needs a base URL",
                location
            ))),
        },
        Err(e) => Err(FetchError::Unavailable(format!(
            "invalid bundle location {}: {}",
            location, e
        ))),
    }
}

/// Downloads bundles over HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpBundleSource {
    client: reqwest::Client,
    base: Option<Url>,
}

impl HttpBundleSource {
    /// Create a source without a base URL
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locations against `base`
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    /// Base URL for relative locations
    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }
}

impl BundleSource for HttpBundleSource {
    async fn fetch(&mut self, location: &str) -> Result<Vec<u8>, FetchError> {
        let url = resolve_location(self.base.as_ref(), location)?;
        log::info!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("GET {} returned {}", url, status);
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;
        log::debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}

/// Reads bundles from the local filesystem
///
/// `file://` URLs are accepted as well as plain paths.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBundleSource;

#[cfg(not(target_arch = "wasm32"))]
impl BundleSource for FileBundleSource {
    async fn fetch(&mut self, location: &str) -> Result<Vec<u8>, FetchError> {
        let path = match Url::parse(location) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|_| FetchError::Unavailable(format!("invalid file URL {}", location)))?,
            _ => std::path::PathBuf::from(location),
        };
        log::info!("Reading bundle from {}", path.display());
        std::fs::read(&path)
            .map_err(|e| FetchError::Unavailable(format!("{}: {}", path.display(), e)))
    }
}

/// Whether a location names a remote bundle
pub fn is_remote(location: &str) -> bool {
    matches!(
        Url::parse(location).map(|url| url.scheme().to_string()).as_deref(),
        Ok("http") | Ok("https")
    )
}

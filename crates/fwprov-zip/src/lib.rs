//! fwprov-zip - Zip firmware bundles
//!
//! Firmware bundles are plain zip files with the manifest at the root and
//! every image at the path the manifest names. This crate reads them
//! ([`ZipLoader`], an [`ArchiveLoader`] for the provisioning session) and
//! produces them from a build directory ([`package_bundle`]).
//!
//! [`ArchiveLoader`]: fwprov_core::ArchiveLoader

#![warn(rust_2018_idioms)]

mod package;
mod reader;

pub use package::{package_bundle, PackageError, PackageOptions, PackageReport};
pub use reader::{ZipBundle, ZipLoader};

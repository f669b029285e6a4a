//! Packaging a build directory into a bundle

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fwprov_core::MANIFEST_FILE_NAME;
use serde_json::Value;
use thiserror::Error;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Packaging errors
#[derive(Debug, Error)]
pub enum PackageError {
    /// The build directory has no manifest
    #[error("{0} not found")]
    ManifestNotFound(PathBuf),

    /// The manifest is not valid JSON
    #[error("failed to parse {path}: {source}")]
    ManifestInvalid {
        /// Manifest path
        path: PathBuf,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// Reading the build directory or writing the bundle failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The zip writer failed
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Where and how to write a bundle
#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Git reference the build came from (tag or branch)
    pub ref_name: String,
    /// Target chip of the build
    pub target: String,
    /// Directory the bundle is written to
    pub output_dir: PathBuf,
    /// File name prefix
    pub zip_name_prefix: String,
}

impl PackageOptions {
    /// Options with the default prefix, writing to the current directory
    pub fn new(ref_name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            target: target.into(),
            output_dir: PathBuf::from("."),
            zip_name_prefix: "firmware".to_string(),
        }
    }

    /// Bundle file name: `<prefix>-<ref>-<target>.zip`
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.zip",
            self.zip_name_prefix, self.ref_name, self.target
        )
    }
}

/// Outcome of [`package_bundle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    /// Path of the written bundle
    pub output: PathBuf,
    /// Image files packaged, in manifest order
    pub files: Vec<String>,
    /// Image files listed in the manifest but not found
    pub skipped: Vec<String>,
    /// Packaged image files with no content; flashing rejects them
    pub empty: Vec<String>,
}

/// Package the images a build directory's manifest lists into a bundle
///
/// The manifest is stored at the root of the bundle and each image at the
/// path the manifest gives for it. Windows path separators are turned into
/// `/` in both the entry names and the stored manifest. Images that do not
/// exist are skipped with a warning; empty images are packaged with one.
pub fn package_bundle(
    build_dir: impl AsRef<Path>,
    options: &PackageOptions,
) -> Result<PackageReport, PackageError> {
    let build_dir = build_dir.as_ref();
    let manifest_path = build_dir.join(MANIFEST_FILE_NAME);
    if !manifest_path.is_file() {
        return Err(PackageError::ManifestNotFound(manifest_path));
    }

    log::info!("Reading file list from {}", manifest_path.display());
    let manifest_bytes = fs::read(&manifest_path)?;
    let mut manifest: Value =
        serde_json::from_slice(&manifest_bytes).map_err(|source| PackageError::ManifestInvalid {
            path: manifest_path.clone(),
            source,
        })?;

    let rewritten = normalize_separators(&mut manifest);
    let listed = listed_files(&manifest);
    if listed.is_empty() {
        log::warn!("No 'flash_files' listed in {}", manifest_path.display());
    }

    fs::create_dir_all(&options.output_dir)?;
    let output = options.output_dir.join(options.file_name());
    let mut writer = ZipWriter::new(File::create(&output)?);
    let file_options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    let mut empty = Vec::new();
    for name in listed {
        let source = build_dir.join(&name);
        if !source.is_file() {
            log::warn!("File '{}' not found, skipping", source.display());
            skipped.push(name);
            continue;
        }
        if files.contains(&name) {
            continue;
        }
        let data = fs::read(&source)?;
        if data.is_empty() {
            log::warn!("File '{}' is empty and cannot be flashed", source.display());
            empty.push(name.clone());
        }
        log::info!("Adding {}", name);
        writer.start_file(name.as_str(), file_options)?;
        writer.write_all(&data)?;
        files.push(name);
    }

    writer.start_file(MANIFEST_FILE_NAME, file_options)?;
    if rewritten {
        let pretty = serde_json::to_vec_pretty(&manifest).map_err(|source| {
            PackageError::ManifestInvalid {
                path: manifest_path.clone(),
                source,
            }
        })?;
        writer.write_all(&pretty)?;
    } else {
        writer.write_all(&manifest_bytes)?;
    }
    writer.finish()?;

    log::info!("Created {}", output.display());
    Ok(PackageReport {
        output,
        files,
        skipped,
        empty,
    })
}

/// Replace `\` with `/` in every `flash_files` path; true if any changed
fn normalize_separators(manifest: &mut Value) -> bool {
    let Some(files) = manifest.get_mut("flash_files").and_then(Value::as_object_mut) else {
        return false;
    };
    let mut changed = false;
    for value in files.values_mut() {
        if let Some(name) = value.as_str().filter(|name| name.contains('\\')) {
            let normalized = name.replace('\\', "/");
            *value = Value::String(normalized);
            changed = true;
        }
    }
    changed
}

/// Image paths listed under `flash_files`, in manifest order
fn listed_files(manifest: &Value) -> Vec<String> {
    manifest
        .get("flash_files")
        .and_then(Value::as_object)
        .map(|files| {
            files
                .values()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

//! Zip bundle of a run's artifacts.
//!
//! The bundle holds the document, summary, diagrams, run log, event journal
//! and the serialized concept result, plus a `manifest.json` describing what
//! was included and what could not be read.

use crate::concept_paths::versioned_path;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludedFile {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub created_at: String,
    pub run_id: String,
    pub project_name: String,
    pub included_files: Vec<IncludedFile>,
    pub missing_files: Vec<String>,
}

/// A file to copy into the bundle under `archive_name`.
pub struct BundleFile {
    pub archive_name: String,
    pub path: PathBuf,
}

impl BundleFile {
    pub fn new(archive_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            archive_name: archive_name.into(),
            path: path.into(),
        }
    }
}

pub struct BundleRequest<'a> {
    pub bundles_dir: &'a Path,
    pub stem: &'a str,
    pub run_id: &'a str,
    pub project_name: &'a str,
    pub files: Vec<BundleFile>,
    /// Generated content written directly, as `(archive_name, content)`.
    pub contents: Vec<(String, String)>,
}

/// Writes `concept_<stem>_vN.zip`. Unreadable files are listed as missing
/// in the manifest instead of failing the bundle.
pub fn create_bundle(request: BundleRequest<'_>) -> Result<PathBuf> {
    let bundle_path = versioned_path(
        request.bundles_dir,
        &format!("concept_{}", request.stem),
        "zip",
    )?;

    let file = File::create(&bundle_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut included_files = Vec::new();
    let mut missing_files = Vec::new();

    for (name, content) in &request.contents {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(content.as_bytes())?;
        included_files.push(IncludedFile {
            name: name.clone(),
            size: content.len() as u64,
        });
    }

    for entry in &request.files {
        match add_file_to_zip(&mut zip, &entry.path, &entry.archive_name, options) {
            Ok(info) => included_files.push(info),
            Err(e) => {
                tracing::warn!(
                    "Bundle: skipping {} ({}): {}",
                    entry.archive_name,
                    entry.path.display(),
                    e
                );
                missing_files.push(entry.archive_name.clone());
            }
        }
    }

    let manifest = BundleManifest {
        created_at: chrono::Utc::now().to_rfc3339(),
        run_id: request.run_id.to_string(),
        project_name: request.project_name.to_string(),
        included_files,
        missing_files,
    };

    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    zip.start_file("manifest.json", options)?;
    zip.write_all(manifest_json.as_bytes())?;

    zip.finish()?;

    Ok(bundle_path)
}

fn add_file_to_zip(
    zip: &mut ZipWriter<File>,
    path: &Path,
    archive_name: &str,
    options: SimpleFileOptions,
) -> Result<IncludedFile> {
    let mut buffer = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;
    let size = fs::metadata(path)?.len();

    zip.start_file(archive_name, options)?;
    zip.write_all(&buffer)?;

    Ok(IncludedFile {
        name: archive_name.to_string(),
        size,
    })
}

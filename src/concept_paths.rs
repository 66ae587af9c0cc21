//! Storage paths for settings and run artifacts.
//!
//! Settings live under `~/.concept-forge/`. Run artifacts live under the
//! configured output directory:
//! - `docs/` - Assembled concept documents
//! - `diagrams/` - Rendered diagram images
//! - `summaries/` - Plain-text run summaries
//! - `logs/` - Run logs and event journals
//! - `bundles/` - Zipped run artifacts

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

const CONCEPT_FORGE_DIR: &str = ".concept-forge";

/// Longest output path we write; longer paths break on some platforms.
pub const MAX_OUTPUT_PATH_LEN: usize = 250;

const MAX_FILE_STEM_LEN: usize = 100;

static FORBIDDEN_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));
static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_\s]+").expect("valid regex"));

#[derive(Debug, Error)]
pub enum OutputPathError {
    #[error(
        "output path is {len} characters long (limit {limit}): {path}. \
         Choose a shorter output directory or project name"
    )]
    TooLong {
        path: PathBuf,
        len: usize,
        limit: usize,
    },

    #[error(
        "permission denied for {path}. Check the folder permissions or choose another output directory"
    )]
    PermissionDenied { path: PathBuf },

    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OutputPathError {
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            OutputPathError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            OutputPathError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Returns `~/.concept-forge/`, creating it if needed.
pub fn concept_forge_home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory for settings")?;
    let dir = home.join(CONCEPT_FORGE_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create settings directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns `~/.concept-forge/settings.json`.
pub fn settings_path() -> Result<PathBuf> {
    Ok(concept_forge_home_dir()?.join("settings.json"))
}

/// Subdirectories of the output directory used by one run.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn docs_dir(&self) -> Result<PathBuf, OutputPathError> {
        self.subdir("docs")
    }

    pub fn diagrams_dir(&self) -> Result<PathBuf, OutputPathError> {
        self.subdir("diagrams")
    }

    pub fn summaries_dir(&self) -> Result<PathBuf, OutputPathError> {
        self.subdir("summaries")
    }

    pub fn logs_dir(&self) -> Result<PathBuf, OutputPathError> {
        self.subdir("logs")
    }

    pub fn bundles_dir(&self) -> Result<PathBuf, OutputPathError> {
        self.subdir("bundles")
    }

    fn subdir(&self, name: &str) -> Result<PathBuf, OutputPathError> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).map_err(|e| OutputPathError::from_io(&dir, e))?;
        Ok(dir)
    }
}

/// First free `<stem>_vN.<ext>` in `dir`, starting at `_v1`.
pub fn versioned_path(dir: &Path, stem: &str, ext: &str) -> Result<PathBuf, OutputPathError> {
    let mut version = 1u32;
    loop {
        let candidate = dir.join(format!("{}_v{}.{}", stem, version, ext));
        check_path_length(&candidate)?;
        if !candidate.exists() {
            return Ok(candidate);
        }
        version += 1;
    }
}

pub fn check_path_length(path: &Path) -> Result<(), OutputPathError> {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let len = absolute.as_os_str().len();
    if len > MAX_OUTPUT_PATH_LEN {
        return Err(OutputPathError::TooLong {
            path: absolute,
            len,
            limit: MAX_OUTPUT_PATH_LEN,
        });
    }
    Ok(())
}

/// Turns a project name into a file stem: forbidden characters become `_`,
/// whitespace and underscore runs collapse, and the result is capped.
pub fn sanitize_file_stem(name: &str) -> String {
    let replaced = FORBIDDEN_FILE_CHARS.replace_all(name, "_");
    let collapsed = SEPARATOR_RUNS.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches(|c: char| c == '_' || c == ' ');
    if trimmed.is_empty() {
        return "unnamed_project".to_string();
    }
    trimmed
        .chars()
        .take(MAX_FILE_STEM_LEN)
        .collect::<String>()
        .trim_end_matches('_')
        .to_string()
}

#[cfg(test)]
#[path = "tests/concept_paths_tests.rs"]
mod tests;

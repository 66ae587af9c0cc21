//! Project input: the brief a concept is generated from.
//!
//! A brief is read from JSON (`{"name", "link", "description"}`) or from a
//! tagged text file:
//!
//! ```text
//! [name]
//! Inventory Sync
//! [link]
//! https://example.com/job/123
//! [description]
//! Build a service that...
//! ```
//!
//! Text outside any tag is treated as description.

use crate::concept_paths::{sanitize_file_stem, versioned_path};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectBrief {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Link,
    Description,
}

fn tag_field(line: &str) -> Option<Field> {
    let tag = line.trim().strip_prefix('[')?.strip_suffix(']')?;
    match tag.trim().to_lowercase().as_str() {
        "name" | "project_name" => Some(Field::Name),
        "link" | "upwork_link" | "url" => Some(Field::Link),
        "description" | "summary" => Some(Field::Description),
        _ => None,
    }
}

impl ProjectBrief {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project file: {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
            || content.trim_start().starts_with('{');
        let brief = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse project JSON: {}", path.display()))?
        } else {
            Self::parse_tagged(&content)
        };
        if brief.description.trim().is_empty() {
            anyhow::bail!("Project file has no description: {}", path.display());
        }
        Ok(brief)
    }

    pub fn parse_tagged(content: &str) -> Self {
        let mut name = Vec::new();
        let mut link = Vec::new();
        let mut description = Vec::new();
        let mut current = Field::Description;

        for line in content.lines() {
            if let Some(field) = tag_field(line) {
                current = field;
                continue;
            }
            match current {
                Field::Name => name.push(line),
                Field::Link => link.push(line),
                Field::Description => description.push(line),
            }
        }

        let link = link.join("\n").trim().to_string();
        Self {
            name: name.join(" ").trim().to_string(),
            link: if link.is_empty() { None } else { Some(link) },
            description: description.join("\n").trim().to_string(),
        }
    }

    /// File stem for artifacts of this project.
    pub fn file_stem(&self) -> String {
        sanitize_file_stem(&self.name)
    }

    /// Writes the brief as JSON into `dir` under a versioned, sanitized name.
    pub fn export_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create JSON output directory: {}", dir.display()))?;
        let path = versioned_path(dir, &self.file_stem(), "json")?;
        let content = serde_json::to_string_pretty(self).context("Failed to serialize project")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write project file: {}", path.display()))?;
        Ok(path)
    }
}

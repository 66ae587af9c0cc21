//! Section catalog: which sections a concept contains and how they are judged.
//!
//! The catalog is YAML. An embedded default ships with the binary and can be
//! replaced through the `sections_file` setting.

use crate::errors::ConfigError;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

/// Target used when a description carries no recognizable length phrase.
pub const DEFAULT_TARGET_WORDS: u32 = 250;

/// Upper limit for a section's word range.
pub const MAX_SECTION_WORDS: u32 = 20_000;

static EXPLICIT_MAX_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmax(?:imum)?\s+(\d+)\s+words").expect("valid regex"));
static THIRD_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)one\s+third\s+of\s+a\s+page").expect("valid regex"));
static HALF_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)half\s+a\s+page").expect("valid regex"));
static ONE_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bone\s+page").expect("valid regex"));
static SECTION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid regex"));

/// Accepted word range for a section, with the length the prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBounds {
    pub target: u32,
    pub min: u32,
    pub max: u32,
}

impl WordBounds {
    /// Bounds around a target: minimum at 60% and maximum at 130% of it.
    pub fn from_target(target: u32) -> Self {
        let scaled = |percent: u64| {
            u32::try_from(u64::from(target) * percent / 100).unwrap_or(u32::MAX)
        };
        Self {
            target,
            min: scaled(60),
            max: scaled(130),
        }
    }

    /// Derives bounds from phrases like "max 200 words" or "Maximum length: half a page".
    pub fn from_description(description: &str) -> Self {
        let target = EXPLICIT_MAX_WORDS
            .captures(description)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .or_else(|| {
                if THIRD_PAGE.is_match(description) {
                    Some(170)
                } else if HALF_PAGE.is_match(description) {
                    Some(250)
                } else if ONE_PAGE.is_match(description) {
                    Some(500)
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_TARGET_WORDS);
        Self::from_target(target)
    }

    pub fn contains(&self, words: usize) -> bool {
        words >= self.min as usize && words <= self.max as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionSpec {
    pub key: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub word_count: Option<WordBounds>,
    /// Whether the section gets an auxiliary diagram.
    #[serde(default)]
    pub diagram: bool,
    #[serde(default)]
    pub diagram_hint: Option<String>,
    /// Keywords used to pick lines out of an unstructured single-pass response.
    #[serde(default)]
    pub fallback_keywords: Vec<String>,
}

impl SectionSpec {
    pub fn bounds(&self) -> WordBounds {
        self.word_count
            .unwrap_or_else(|| WordBounds::from_description(&self.description))
    }

    pub fn placeholder_text(&self) -> String {
        format!("(No information available for {})", self.title)
    }
}

/// Trigger words in a section description that make the keywords expected in its text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicRule {
    pub triggers: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionCatalog {
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    pub topics: Vec<TopicRule>,
}

impl SectionCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read section catalog: {}", path.display()))?;
        let catalog: Self = serde_yaml::from_str(&content).with_context(|| {
            format!("Failed to parse section catalog as YAML: {}", path.display())
        })?;
        catalog
            .validate()
            .with_context(|| format!("Section catalog rejected: {}", path.display()))?;
        Ok(catalog)
    }

    pub fn default_catalog() -> Self {
        const DEFAULT_SECTIONS_YAML: &str = include_str!("../sections.yaml");

        serde_yaml::from_str(DEFAULT_SECTIONS_YAML)
            .expect("Failed to parse embedded sections.yaml - this is a bug in the sections.yaml file")
    }

    /// Loads `path` when given, otherwise the embedded catalog.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default_catalog()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sections.is_empty() {
            return Err(ConfigError::InvalidCatalog(
                "at least one section must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for section in &self.sections {
            if !SECTION_KEY.is_match(&section.key) {
                return Err(ConfigError::InvalidCatalog(format!(
                    "section key `{}` must be lowercase letters, digits and underscores",
                    section.key
                )));
            }
            if !seen.insert(section.key.as_str()) {
                return Err(ConfigError::InvalidCatalog(format!(
                    "duplicate section key `{}`",
                    section.key
                )));
            }
            if section.title.trim().is_empty() {
                return Err(ConfigError::InvalidCatalog(format!(
                    "section `{}` has an empty title",
                    section.key
                )));
            }
            let bounds = section.bounds();
            if bounds.max == 0 || bounds.min > bounds.max {
                return Err(ConfigError::InvalidCatalog(format!(
                    "section `{}` has an empty word range ({}..={})",
                    section.key, bounds.min, bounds.max
                )));
            }
            if bounds.max > MAX_SECTION_WORDS {
                return Err(ConfigError::InvalidCatalog(format!(
                    "section `{}` allows up to {} words (limit {})",
                    section.key, bounds.max, MAX_SECTION_WORDS
                )));
            }
        }

        for topic in &self.topics {
            if topic.triggers.is_empty() || topic.keywords.is_empty() {
                return Err(ConfigError::InvalidCatalog(
                    "topic rules need at least one trigger and one keyword".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&SectionSpec> {
        self.sections.iter().find(|s| s.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.key.as_str())
    }
}

/// Keywords of every topic rule with a trigger occurring in `description`.
pub fn expected_keywords<'a>(topics: &'a [TopicRule], description: &str) -> Vec<&'a str> {
    let description = description.to_lowercase();
    topics
        .iter()
        .filter(|topic| {
            topic
                .triggers
                .iter()
                .any(|t| description.contains(&t.to_lowercase()))
        })
        .flat_map(|topic| topic.keywords.iter().map(String::as_str))
        .collect()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

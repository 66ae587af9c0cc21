//! Concept generation: prompting the provider and collecting section texts.

pub mod diagram_source;
pub mod orchestrator;
pub mod prompts;
pub mod single_pass;
pub mod state;

pub use orchestrator::SectionOrchestrator;
pub use prompts::ConceptInput;
pub use single_pass::SinglePassGenerator;

use crate::cancel::CancelToken;
use crate::config::SectionCatalog;
use crate::events::EventSender;
use crate::providers::TextProvider;
use crate::run_log::{LogCategory, RunLog};
use crate::settings::GenerationMode;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const GENERATED_BY: &str = "concept-forge";

/// How a section's final text came about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionOutcome {
    Accepted { attempts: u32, score: f64 },
    /// Highest-scoring rejected attempt after the bound was exhausted.
    BestEffort { attempts: u32, score: f64, reason: String },
    /// Cut out of a single-pass response without review.
    Extracted,
    Placeholder { reason: String },
}

impl SectionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SectionOutcome::Accepted { .. } => "accepted",
            SectionOutcome::BestEffort { .. } => "best effort",
            SectionOutcome::Extracted => "extracted",
            SectionOutcome::Placeholder { .. } => "placeholder",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionEntry {
    pub key: String,
    pub title: String,
    pub text: String,
    pub outcome: SectionOutcome,
    /// DOT source for the section's diagram, when one was obtained.
    pub dot_code: Option<String>,
}

impl SectionEntry {
    pub fn placeholder(section: &crate::config::SectionSpec, reason: &str) -> Self {
        Self {
            key: section.key.clone(),
            title: section.title.clone(),
            text: section.placeholder_text(),
            outcome: SectionOutcome::Placeholder {
                reason: reason.to_string(),
            },
            dot_code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConceptMetadata {
    pub provider: String,
    pub model: String,
    pub mode: GenerationMode,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConceptResult {
    pub entries: Vec<SectionEntry>,
    pub metadata: ConceptMetadata,
}

impl ConceptResult {
    pub fn new(provider: &dyn TextProvider, mode: GenerationMode) -> Self {
        Self {
            entries: Vec::new(),
            metadata: ConceptMetadata {
                provider: provider.name().to_string(),
                model: provider.model().to_string(),
                mode,
                generated_at: Utc::now(),
                generated_by: GENERATED_BY.to_string(),
                cancelled: false,
            },
        }
    }

    pub fn get(&self, key: &str) -> Option<&SectionEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Reorders entries to catalog order and fills every missing or blank
    /// section with a placeholder. Entries for unknown keys are dropped.
    pub fn ensure_complete(&mut self, catalog: &SectionCatalog) {
        let mut entries = std::mem::take(&mut self.entries);
        self.entries = catalog
            .sections
            .iter()
            .map(|section| {
                match entries.iter().position(|e| e.key == section.key) {
                    Some(idx) => {
                        let entry = entries.swap_remove(idx);
                        if entry.text.trim().is_empty() {
                            SectionEntry::placeholder(section, "empty text")
                        } else {
                            entry
                        }
                    }
                    None => SectionEntry::placeholder(section, "not generated"),
                }
            })
            .collect();
    }

    pub fn count(&self, label: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.label() == label)
            .count()
    }
}

/// Shared collaborators for one generation run.
pub struct GenerationContext<'a> {
    pub provider: &'a dyn TextProvider,
    pub catalog: &'a SectionCatalog,
    pub cancel: &'a CancelToken,
    pub events: &'a EventSender,
    pub log: Option<&'a RunLog>,
}

impl GenerationContext<'_> {
    pub(crate) fn info(&self, category: LogCategory, message: &str) {
        tracing::info!("{}", message);
        if let Some(log) = self.log {
            log.info(category, message);
        }
    }

    pub(crate) fn warn(&self, category: LogCategory, message: &str) {
        tracing::warn!("{}", message);
        if let Some(log) = self.log {
            log.warn(category, message);
        }
    }

    pub(crate) fn debug(&self, category: LogCategory, message: &str) {
        tracing::debug!("{}", message);
        if let Some(log) = self.log {
            log.debug(category, message);
        }
    }
}

#[cfg(test)]
#[path = "tests/generation_tests.rs"]
mod tests;

//! Diagram rendering for sections that carry DOT source.
//!
//! Rendering never fails the run: every problem is logged and the section is
//! simply left without an image.

pub mod backend;
pub mod style;

pub use backend::{GraphvizCommand, RenderBackend, RenderError};
pub use style::style_dot;

use crate::cancel::CancelToken;
use crate::concept_paths::versioned_path;
use crate::config::SectionCatalog;
use crate::events::{EventSender, PipelineEvent};
use crate::generation::ConceptResult;
use crate::run_log::{LogCategory, RunLog};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramRecord {
    pub section_key: String,
    /// Styled DOT source that was rendered.
    pub source: String,
    pub image_path: PathBuf,
}

pub struct DiagramRenderer<'a> {
    backend: &'a dyn RenderBackend,
    output_dir: &'a Path,
    events: &'a EventSender,
    log: Option<&'a RunLog>,
}

impl<'a> DiagramRenderer<'a> {
    pub fn new(backend: &'a dyn RenderBackend, output_dir: &'a Path, events: &'a EventSender) -> Self {
        Self {
            backend,
            output_dir,
            events,
            log: None,
        }
    }

    pub fn with_log(mut self, log: Option<&'a RunLog>) -> Self {
        self.log = log;
        self
    }

    /// Renders one image per entry with DOT source. Diagram-flagged sections
    /// without source are reported as skipped.
    pub fn create_diagrams(
        &self,
        concept: &ConceptResult,
        catalog: &SectionCatalog,
        cancel: &CancelToken,
    ) -> Vec<DiagramRecord> {
        let mut records = Vec::new();

        for entry in &concept.entries {
            if cancel.is_cancelled() {
                self.note(&format!("Diagram rendering cancelled before {}", entry.key));
                break;
            }
            let Some(dot) = entry.dot_code.as_deref().filter(|d| !d.trim().is_empty()) else {
                if catalog.get(&entry.key).is_some_and(|s| s.diagram) {
                    self.skip(&entry.key, "no DOT code available");
                }
                continue;
            };

            match self.render_one(&entry.key, dot) {
                Ok(record) => {
                    self.note(&format!(
                        "Rendered diagram for {}: {}",
                        entry.key,
                        record.image_path.display()
                    ));
                    self.events.send(PipelineEvent::DiagramRendered {
                        key: entry.key.clone(),
                        path: record.image_path.clone(),
                    });
                    records.push(record);
                }
                Err(reason) => self.skip(&entry.key, &reason),
            }
        }

        records
    }

    fn render_one(&self, key: &str, dot: &str) -> Result<DiagramRecord, String> {
        let source = style_dot(dot);
        let image_path = versioned_path(self.output_dir, &format!("{}_diagram", key), "png")
            .map_err(|e| e.to_string())?;
        self.backend
            .render(&source, &image_path)
            .map_err(|e| format!("{} rendering failed: {}", self.backend.name(), e))?;
        Ok(DiagramRecord {
            section_key: key.to_string(),
            source,
            image_path,
        })
    }

    fn note(&self, message: &str) {
        tracing::info!("{}", message);
        if let Some(log) = self.log {
            log.info(LogCategory::Diagram, message);
        }
    }

    fn skip(&self, key: &str, reason: &str) {
        tracing::warn!("Diagram skipped for {}: {}", key, reason);
        if let Some(log) = self.log {
            log.warn(
                LogCategory::Diagram,
                &format!("Diagram skipped for {}: {}", key, reason),
            );
        }
        self.events.send(PipelineEvent::DiagramSkipped {
            key: key.to_string(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
#[path = "tests/diagram_tests.rs"]
mod tests;

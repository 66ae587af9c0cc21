//! Plain-text summary of a finished run.

use crate::concept_paths::versioned_path;
use crate::config::SectionCatalog;
use crate::diagram::DiagramRecord;
use crate::generation::{ConceptResult, SectionOutcome};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub struct SummaryInput<'a> {
    pub run_id: &'a str,
    pub project_name: &'a str,
    pub concept: &'a ConceptResult,
    pub catalog: &'a SectionCatalog,
    pub diagrams: &'a [DiagramRecord],
    pub document: Option<&'a Path>,
    pub template: Option<&'a Path>,
}

fn outcome_detail(outcome: &SectionOutcome) -> String {
    match outcome {
        SectionOutcome::Accepted { attempts, score } => {
            format!("accepted (attempt {}, score {:.2})", attempts, score)
        }
        SectionOutcome::BestEffort {
            attempts,
            score,
            reason,
        } => format!(
            "best effort after {} attempts (score {:.2}): {}",
            attempts, score, reason
        ),
        SectionOutcome::Extracted => "extracted from single response".to_string(),
        SectionOutcome::Placeholder { reason } => format!("placeholder: {}", reason),
    }
}

pub fn render_summary(input: &SummaryInput<'_>) -> String {
    let meta = &input.concept.metadata;
    let mut out = String::new();

    let _ = writeln!(out, "Technical Concept Summary");
    let _ = writeln!(out, "=========================");
    let _ = writeln!(out, "Project: {}", input.project_name);
    let _ = writeln!(out, "Run: {}", input.run_id);
    let _ = writeln!(
        out,
        "Generated: {}",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Provider: {} ({})", meta.provider, meta.model);
    let _ = writeln!(out, "Mode: {}", meta.mode.as_str());
    if meta.cancelled {
        let _ = writeln!(out, "Status: cancelled");
    }
    let _ = writeln!(
        out,
        "Document: {}",
        input
            .document
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not written)".to_string())
    );
    let _ = writeln!(
        out,
        "Template: {}",
        input
            .template
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(plain layout)".to_string())
    );

    let _ = writeln!(out, "\nSections:");
    for (index, entry) in input.concept.entries.iter().enumerate() {
        let title = input
            .catalog
            .get(&entry.key)
            .map_or(entry.title.as_str(), |s| s.title.as_str());
        let _ = writeln!(
            out,
            "  {}. {}: {}",
            index + 1,
            title,
            outcome_detail(&entry.outcome)
        );
    }

    let _ = writeln!(out, "\nDiagrams:");
    if input.diagrams.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for record in input.diagrams {
        let _ = writeln!(
            out,
            "  {}: {}",
            record.section_key,
            record.image_path.display()
        );
    }

    let _ = writeln!(
        out,
        "\nTotals: {} accepted, {} best effort, {} extracted, {} placeholder",
        input.concept.count("accepted"),
        input.concept.count("best effort"),
        input.concept.count("extracted"),
        input.concept.count("placeholder")
    );
    out
}

/// Writes `summary_<stem>_vN.txt` into `dir`.
pub fn write_summary(dir: &Path, stem: &str, input: &SummaryInput<'_>) -> Result<PathBuf> {
    let path = versioned_path(dir, &format!("summary_{}", stem), "txt")?;
    std::fs::write(&path, render_summary(input))
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;
    Ok(path)
}

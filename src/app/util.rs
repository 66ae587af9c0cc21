use crate::app::cli::ProjectArgs;
use crate::concept_paths::settings_path;
use crate::events::PipelineEvent;
use crate::project::ProjectBrief;
use crate::settings::Settings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub fn truncate_for_summary(text: &str, max_len: usize) -> String {
    let cleaned = text.replace('\n', " ");
    if cleaned.chars().count() <= max_len {
        return cleaned;
    }
    let mut shortened: String = cleaned.chars().take(max_len.saturating_sub(3)).collect();
    shortened.push_str("...");
    shortened
}

/// Loads settings from `path` (or the default location), creating the file
/// with defaults when missing, then applies environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<(Settings, PathBuf)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => settings_path()?,
    };
    let mut settings = Settings::load_or_create(&path)?;
    settings.apply_env_overrides();
    Ok((settings, path))
}

/// Builds the brief from a project file and command-line overrides.
pub fn load_brief(args: &ProjectArgs) -> Result<ProjectBrief> {
    let mut brief = match &args.project {
        Some(path) => ProjectBrief::load(path)?,
        None => ProjectBrief::default(),
    };
    if let Some(description) = args.description.as_deref().filter(|d| !d.trim().is_empty()) {
        brief.description = description.trim().to_string();
    }
    if let Some(name) = args.name.as_deref().filter(|n| !n.trim().is_empty()) {
        brief.name = name.trim().to_string();
    }
    if let Some(link) = args.link.as_deref().filter(|l| !l.trim().is_empty()) {
        brief.link = Some(link.trim().to_string());
    }
    if brief.description.trim().is_empty() {
        anyhow::bail!("No project description given (use --project or --description)");
    }
    Ok(brief)
}

pub fn read_context(path: Option<&Path>) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read proposal context: {}", path.display()))?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

/// One status line per event; `None` for events not worth printing.
pub fn format_event(event: &PipelineEvent) -> Option<String> {
    let line = match event {
        PipelineEvent::RunStarted {
            run_id,
            provider,
            model,
            mode,
            sections,
        } => format!(
            "[run] {} started: {} ({}), {} mode, {} sections",
            run_id, provider, model, mode, sections
        ),
        PipelineEvent::StageStarted { stage } => format!("\n=== {} ===", stage.label().to_uppercase()),
        PipelineEvent::SectionStarted { title, .. } => format!("[section] {}", title),
        PipelineEvent::AttemptStarted { .. } => return None,
        PipelineEvent::AttemptRejected {
            attempt,
            score,
            reason,
            ..
        } => match score {
            Some(score) => format!(
                "  attempt {} rejected (score {:.2}): {}",
                attempt,
                score,
                truncate_for_summary(reason, 120)
            ),
            None => format!(
                "  attempt {} failed: {}",
                attempt,
                truncate_for_summary(reason, 120)
            ),
        },
        PipelineEvent::SectionAccepted { attempt, score, .. } => {
            format!("  accepted on attempt {} (score {:.2})", attempt, score)
        }
        PipelineEvent::SectionBestEffort { score, .. } => {
            format!("  using best effort (score {:.2})", score)
        }
        PipelineEvent::SectionExtracted { key, chars } => {
            format!("[section] {} extracted ({} chars)", key, chars)
        }
        PipelineEvent::SectionPlaceholder { key, reason } => format!(
            "[section] {} left as placeholder: {}",
            key,
            truncate_for_summary(reason, 120)
        ),
        PipelineEvent::DiagramRendered { key, path } => {
            format!("[diagram] {} -> {}", key, path.display())
        }
        PipelineEvent::DiagramSkipped { key, reason } => format!(
            "[diagram] {} skipped: {}",
            key,
            truncate_for_summary(reason, 120)
        ),
        PipelineEvent::DocumentWritten {
            path,
            from_template,
        } => format!(
            "[document] {} ({})",
            path.display(),
            if *from_template {
                "template"
            } else {
                "plain layout"
            }
        ),
        PipelineEvent::SummaryWritten { path } => format!("[summary] {}", path.display()),
        PipelineEvent::BundleWritten { path } => format!("[bundle] {}", path.display()),
        PipelineEvent::Cancelled { stage } => {
            format!("[cancelled] stopped during: {}", stage.label())
        }
        PipelineEvent::Finished { document } => match document {
            Some(path) => format!("\nDone. Document: {}", path.display()),
            None => "\nDone. No document was written.".to_string(),
        },
        PipelineEvent::Failed { error } => format!("[error] {}", error),
    };
    Some(line)
}

#[cfg(test)]
#[path = "tests/util_tests.rs"]
mod tests;

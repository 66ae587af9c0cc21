//! Obtaining DOT source for diagram-flagged sections.

use super::prompts::{diagram_prompt, ConceptInput, DIAGRAM_SYSTEM_PROMPT};
use super::{GenerationContext, SectionEntry, SectionOutcome};
use crate::config::SectionSpec;
use crate::providers::{ProviderError, TextProvider};
use crate::run_log::LogCategory;
use regex::Regex;
use std::sync::LazyLock;

static DOT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```\s*dot\s*([\s\S]+?)```").expect("valid regex"));

/// Body of the first ```` ```dot ```` block in `text`, if any.
pub fn extract_dot(text: &str) -> Option<String> {
    let body = DOT_BLOCK.captures(text)?.get(1)?.as_str().trim();
    (!body.is_empty()).then(|| body.to_string())
}

/// Extracts DOT from a provider response. Responses without a fence are
/// accepted when they are a bare graph definition.
pub fn dot_from_response(response: &str) -> Option<String> {
    if let Some(dot) = extract_dot(response) {
        return Some(dot);
    }
    let trimmed = response.trim();
    let lower = trimmed.to_lowercase();
    let bare = lower.starts_with("digraph")
        || lower.starts_with("graph")
        || lower.starts_with("strict");
    (bare && trimmed.ends_with('}')).then(|| trimmed.to_string())
}

/// Asks the provider for a diagram of `section`. `Ok(None)` means the
/// response held no usable DOT.
pub fn request_dot(
    provider: &dyn TextProvider,
    input: &ConceptInput,
    section: &SectionSpec,
    section_text: &str,
) -> Result<Option<String>, ProviderError> {
    let prompt = diagram_prompt(input, section, section_text);
    let response = provider.complete(DIAGRAM_SYSTEM_PROMPT, &prompt)?;
    Ok(dot_from_response(&response))
}

/// Fills `entry.dot_code` from inline DOT or, failing that, a diagram request.
/// Placeholder entries and cancelled runs get nothing.
pub(crate) fn attach_dot(
    ctx: &GenerationContext<'_>,
    input: &ConceptInput,
    section: &SectionSpec,
    entry: &mut SectionEntry,
) {
    if matches!(entry.outcome, SectionOutcome::Placeholder { .. }) {
        return;
    }
    if let Some(dot) = extract_dot(&entry.text) {
        entry.dot_code = Some(dot);
        return;
    }
    if ctx.cancel.is_cancelled() {
        return;
    }
    match request_dot(ctx.provider, input, section, &entry.text) {
        Ok(Some(dot)) => {
            ctx.debug(
                LogCategory::Diagram,
                &format!("Received DOT code for {} ({} chars)", section.key, dot.len()),
            );
            entry.dot_code = Some(dot);
        }
        Ok(None) => ctx.warn(
            LogCategory::Diagram,
            &format!("Diagram response for {} held no DOT code", section.key),
        ),
        Err(e) => ctx.warn(
            LogCategory::Diagram,
            &format!("Diagram request for {} failed: {}", section.key, e),
        ),
    }
}

//! Single-pass generation: one request for the whole concept, then the
//! response is split into sections by their headers.

use super::diagram_source::attach_dot;
use super::prompts::{single_pass_prompt, ConceptInput, SYSTEM_PROMPT};
use super::{ConceptResult, GenerationContext, SectionEntry, SectionOutcome};
use crate::config::{SectionCatalog, SectionSpec};
use crate::events::{PipelineEvent, Stage};
use crate::run_log::LogCategory;
use crate::settings::GenerationMode;
use regex::Regex;
use std::sync::LazyLock;

/// Extracted text shorter than this is treated as a failed extraction.
const MIN_EXTRACTED_CHARS: usize = 50;
/// Header lines are short; longer lines are body text.
const MAX_HEADER_CHARS: usize = 100;

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d.{0,3}\.").expect("valid regex"));

/// Cuts the text under `section`'s header out of `response`.
///
/// The header is the first line that starts with the title or, for lines
/// shorter than 100 characters, contains it. The section ends at the next
/// short numbered line or at another section's title.
pub fn extract_section(response: &str, section: &SectionSpec, catalog: &SectionCatalog) -> Option<String> {
    let title = section.title.to_lowercase();
    let titles: Vec<String> = catalog
        .sections
        .iter()
        .map(|s| s.title.to_lowercase())
        .collect();
    let lines: Vec<&str> = response.lines().collect();

    let start = lines.iter().position(|line| {
        let clean = line.trim().to_lowercase();
        clean.starts_with(&title)
            || (clean.contains(&title) && clean.chars().count() < MAX_HEADER_CHARS)
    })?;

    let end = lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, line)| {
            let clean = line.trim();
            if clean.is_empty() || clean.chars().count() >= MAX_HEADER_CHARS {
                return false;
            }
            let lower = clean.to_lowercase();
            NUMBERED_LINE.is_match(clean) || titles.iter().any(|t| lower.contains(t))
        })
        .map(|(i, _)| i)
        .unwrap_or(lines.len());

    let header_rest = header_remainder(lines[start], &section.title);
    let body = lines
        .iter()
        .take(end)
        .skip(start + 1)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    let content = match header_rest {
        Some(rest) => format!("{}\n{}", rest, body),
        None => body,
    };
    let content = content.trim();
    (!content.is_empty()).then(|| content.to_string())
}

/// Text following the title on a header line, without separators.
fn header_remainder(line: &str, title: &str) -> Option<String> {
    let pattern = Regex::new(&format!("(?i){}", regex::escape(title))).ok()?;
    let rest = pattern.splitn(line, 2).nth(1)?;
    let rest = rest.trim_start_matches([':', '*', '#', '-', ' ']).trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Lines mentioning any of the section's fallback keywords.
pub fn extract_by_keywords(response: &str, section: &SectionSpec) -> Option<String> {
    let keywords: Vec<String> = section
        .fallback_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .collect();
    if keywords.is_empty() {
        return None;
    }
    let lines: Vec<&str> = response
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .collect();
    let content = lines.join("\n");
    let content = content.trim();
    (!content.is_empty()).then(|| content.to_string())
}

fn usable(text: &str) -> bool {
    text.chars().count() >= MIN_EXTRACTED_CHARS
}

pub struct SinglePassGenerator<'a> {
    ctx: GenerationContext<'a>,
    max_attempts: u32,
    request_diagrams: bool,
}

impl<'a> SinglePassGenerator<'a> {
    pub fn new(ctx: GenerationContext<'a>, max_attempts: u32) -> Self {
        Self {
            ctx,
            max_attempts: max_attempts.max(1),
            request_diagrams: true,
        }
    }

    pub fn with_diagram_requests(mut self, enabled: bool) -> Self {
        self.request_diagrams = enabled;
        self
    }

    /// Requests the whole concept, retrying provider errors up to the
    /// attempt bound, and splits the response into sections.
    pub fn generate(&self, input: &ConceptInput) -> ConceptResult {
        let mut result = ConceptResult::new(self.ctx.provider, GenerationMode::SinglePass);
        let catalog = self.ctx.catalog;

        let response = match self.request(input) {
            Ok(response) => response,
            Err(reason) => {
                if self.ctx.cancel.is_cancelled() {
                    result.metadata.cancelled = true;
                    self.ctx.events.send(PipelineEvent::Cancelled {
                        stage: Stage::Generation,
                    });
                }
                for section in &catalog.sections {
                    self.ctx.events.send(PipelineEvent::SectionPlaceholder {
                        key: section.key.clone(),
                        reason: reason.clone(),
                    });
                    result
                        .entries
                        .push(SectionEntry::placeholder(section, &reason));
                }
                return result;
            }
        };

        for section in &catalog.sections {
            let mut entry = self.extract(&response, section);
            if section.diagram && self.request_diagrams {
                attach_dot(&self.ctx, input, section, &mut entry);
            }
            result.entries.push(entry);
        }
        if self.ctx.cancel.is_cancelled() {
            result.metadata.cancelled = true;
            self.ctx.events.send(PipelineEvent::Cancelled {
                stage: Stage::Generation,
            });
        }
        result.ensure_complete(catalog);
        result
    }

    fn request(&self, input: &ConceptInput) -> Result<String, String> {
        let prompt = single_pass_prompt(input, self.ctx.catalog);
        let mut last_error = String::from("no attempt made");
        for attempt in 1..=self.max_attempts {
            if self.ctx.cancel.is_cancelled() {
                return Err("cancelled".to_string());
            }
            self.ctx.events.send(PipelineEvent::AttemptStarted {
                key: "concept".to_string(),
                attempt,
                max_attempts: self.max_attempts,
            });
            match self.ctx.provider.complete(SYSTEM_PROMPT, &prompt) {
                Ok(response) => {
                    self.ctx.info(
                        LogCategory::Provider,
                        &format!("Single-pass response received ({} chars)", response.len()),
                    );
                    return Ok(response);
                }
                Err(e) => {
                    last_error = format!("Provider error ({}): {}", e.display_name(), e);
                    self.ctx.warn(
                        LogCategory::Provider,
                        &format!("Single-pass attempt {} failed: {}", attempt, last_error),
                    );
                    self.ctx.events.send(PipelineEvent::AttemptRejected {
                        key: "concept".to_string(),
                        attempt,
                        score: None,
                        reason: last_error.clone(),
                    });
                    if !e.is_retryable() {
                        break;
                    }
                }
            }
        }
        Err(last_error)
    }

    fn extract(&self, response: &str, section: &SectionSpec) -> SectionEntry {
        let by_header = extract_section(response, section, self.ctx.catalog);
        let text = match by_header {
            Some(text) if usable(&text) => Some(text),
            other => {
                self.ctx.debug(
                    LogCategory::Workflow,
                    &format!("Header extraction failed for {}, trying keywords", section.key),
                );
                extract_by_keywords(response, section)
                    .filter(|t| usable(t))
                    .or(other)
            }
        };

        match text {
            Some(text) => {
                self.ctx.events.send(PipelineEvent::SectionExtracted {
                    key: section.key.clone(),
                    chars: text.chars().count(),
                });
                SectionEntry {
                    key: section.key.clone(),
                    title: section.title.clone(),
                    text,
                    outcome: SectionOutcome::Extracted,
                    dot_code: None,
                }
            }
            None => {
                let reason = "section not found in response";
                self.ctx.events.send(PipelineEvent::SectionPlaceholder {
                    key: section.key.clone(),
                    reason: reason.to_string(),
                });
                SectionEntry::placeholder(section, reason)
            }
        }
    }
}

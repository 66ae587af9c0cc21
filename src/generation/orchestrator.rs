//! The per-section generate/review/retry loop.

use super::diagram_source::attach_dot;
use super::prompts::{section_prompt, ConceptInput, SYSTEM_PROMPT};
use super::state::{SectionRun, SectionState};
use super::{ConceptResult, GenerationContext, SectionEntry, SectionOutcome};
use crate::config::SectionSpec;
use crate::events::{PipelineEvent, Stage};
use crate::review::Reviewer;
use crate::run_log::LogCategory;
use crate::settings::GenerationMode;
use anyhow::Result;

/// A rejected attempt that produced text and a score.
#[derive(Debug, Clone)]
struct ScoredAttempt {
    number: u32,
    text: String,
    score: f64,
    reason: String,
}

pub struct SectionOrchestrator<'a> {
    ctx: GenerationContext<'a>,
    reviewer: &'a dyn Reviewer,
    max_attempts: u32,
    request_diagrams: bool,
}

impl<'a> SectionOrchestrator<'a> {
    pub fn new(ctx: GenerationContext<'a>, reviewer: &'a dyn Reviewer, max_attempts: u32) -> Self {
        Self {
            ctx,
            reviewer,
            max_attempts: max_attempts.max(1),
            request_diagrams: true,
        }
    }

    /// Whether diagram-flagged sections without inline DOT get a separate
    /// diagram request.
    pub fn with_diagram_requests(mut self, enabled: bool) -> Self {
        self.request_diagrams = enabled;
        self
    }

    /// Generates every catalog section in order. Only an internal state
    /// machine violation returns an error; provider and review failures
    /// degrade the affected section.
    pub fn generate(&self, input: &ConceptInput) -> Result<ConceptResult> {
        let mut result = ConceptResult::new(self.ctx.provider, GenerationMode::Sectioned);

        for section in &self.ctx.catalog.sections {
            if result.metadata.cancelled {
                result
                    .entries
                    .push(SectionEntry::placeholder(section, "cancelled"));
                continue;
            }

            self.ctx.events.send(PipelineEvent::SectionStarted {
                key: section.key.clone(),
                title: section.title.clone(),
            });
            self.ctx.info(
                LogCategory::Workflow,
                &format!("Processing section: {}", section.key),
            );

            match self.run_section(input, section)? {
                Some(mut entry) => {
                    if section.diagram && self.request_diagrams {
                        attach_dot(&self.ctx, input, section, &mut entry);
                    }
                    result.entries.push(entry);
                }
                None => {
                    self.ctx.info(
                        LogCategory::Workflow,
                        &format!("Generation cancelled during section {}", section.key),
                    );
                    self.ctx.events.send(PipelineEvent::Cancelled {
                        stage: Stage::Generation,
                    });
                    result.metadata.cancelled = true;
                    result
                        .entries
                        .push(SectionEntry::placeholder(section, "cancelled"));
                }
            }
        }

        result.ensure_complete(self.ctx.catalog);
        Ok(result)
    }

    /// Runs the loop for one section. `None` means cancellation was observed
    /// before an attempt. A non-retryable provider error ends the loop early.
    fn run_section(&self, input: &ConceptInput, section: &SectionSpec) -> Result<Option<SectionEntry>> {
        let mut run = SectionRun::new(&section.key);
        let mut failures: Vec<String> = Vec::new();
        let mut best: Option<ScoredAttempt> = None;

        loop {
            if self.ctx.cancel.is_cancelled() {
                run.transition(SectionState::Cancelled)?;
                return Ok(None);
            }
            run.transition(SectionState::Generating)?;
            let attempt = run.attempts();
            self.ctx.events.send(PipelineEvent::AttemptStarted {
                key: section.key.clone(),
                attempt,
                max_attempts: self.max_attempts,
            });
            self.ctx.debug(
                LogCategory::Provider,
                &format!(
                    "Text generation attempt {}/{} for section: {}",
                    attempt, self.max_attempts, section.key
                ),
            );

            let prompt = section_prompt(input, section, &failures);
            let mut retryable = true;
            let (score, reason) = match self.ctx.provider.complete(SYSTEM_PROMPT, &prompt) {
                Ok(response) => {
                    run.transition(SectionState::Reviewing)?;
                    let text = response.trim().to_string();
                    let verdict = self.reviewer.review(section, &text);
                    self.ctx.debug(
                        LogCategory::Review,
                        &format!(
                            "Section {} review result: score={:.2}, words={}, reason={}",
                            section.key, verdict.score, verdict.words, verdict.reason
                        ),
                    );

                    if verdict.accepted {
                        run.transition(SectionState::Accepted)?;
                        self.ctx.info(
                            LogCategory::Workflow,
                            &format!(
                                "Section {} accepted after {} attempts",
                                section.key, attempt
                            ),
                        );
                        self.ctx.events.send(PipelineEvent::SectionAccepted {
                            key: section.key.clone(),
                            attempt,
                            score: verdict.score,
                        });
                        return Ok(Some(SectionEntry {
                            key: section.key.clone(),
                            title: section.title.clone(),
                            text,
                            outcome: SectionOutcome::Accepted {
                                attempts: attempt,
                                score: verdict.score,
                            },
                            dot_code: None,
                        }));
                    }

                    let improves = match &best {
                        Some(current) => verdict.score > current.score,
                        None => true,
                    };
                    if improves {
                        best = Some(ScoredAttempt {
                            number: attempt,
                            text,
                            score: verdict.score,
                            reason: verdict.reason.clone(),
                        });
                    }
                    (Some(verdict.score), verdict.reason)
                }
                Err(e) => {
                    retryable = e.is_retryable();
                    (
                        None,
                        format!("Provider error ({}): {}", e.display_name(), e),
                    )
                }
            };

            self.ctx.warn(
                LogCategory::Review,
                &format!(
                    "Section {} rejected (attempt {}): {}",
                    section.key, attempt, reason
                ),
            );
            self.ctx.events.send(PipelineEvent::AttemptRejected {
                key: section.key.clone(),
                attempt,
                score,
                reason: reason.clone(),
            });
            if !failures.contains(&reason) {
                failures.push(reason);
            }

            if attempt >= self.max_attempts || !retryable {
                run.transition(SectionState::Exhausted)?;
                break;
            }
            run.transition(SectionState::Retry)?;
        }

        match best {
            Some(best) => {
                run.transition(SectionState::BestEffort)?;
                self.ctx.warn(
                    LogCategory::Workflow,
                    &format!(
                        "Section {} using best effort (attempt {}, score {:.2}) after {} failed attempts",
                        section.key,
                        best.number,
                        best.score,
                        run.attempts()
                    ),
                );
                self.ctx.events.send(PipelineEvent::SectionBestEffort {
                    key: section.key.clone(),
                    score: best.score,
                    reason: best.reason.clone(),
                });
                Ok(Some(SectionEntry {
                    key: section.key.clone(),
                    title: section.title.clone(),
                    text: best.text,
                    outcome: SectionOutcome::BestEffort {
                        attempts: run.attempts(),
                        score: best.score,
                        reason: best.reason,
                    },
                    dot_code: None,
                }))
            }
            None => {
                run.transition(SectionState::Placeholder)?;
                let reason = failures
                    .last()
                    .cloned()
                    .unwrap_or_else(|| "no attempt produced text".to_string());
                self.ctx.warn(
                    LogCategory::Workflow,
                    &format!("Section {} left as placeholder: {}", section.key, reason),
                );
                self.ctx.events.send(PipelineEvent::SectionPlaceholder {
                    key: section.key.clone(),
                    reason: reason.clone(),
                });
                Ok(Some(SectionEntry::placeholder(section, &reason)))
            }
        }
    }
}

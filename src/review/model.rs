//! Review by asking the provider to grade the text.
//!
//! The length check still runs locally first; only texts within bounds are
//! sent for grading. The provider answers `SCORE: <0-100> - <reason>`.
//! Texts outside the bounds score below the lowest non-zero grade.

use super::heuristic::{length_factor, HeuristicReviewer};
use super::{ReviewVerdict, Reviewer, ACCEPTED_REASON};
use crate::config::SectionSpec;
use crate::providers::TextProvider;
use regex::Regex;
use std::sync::{Arc, LazyLock};

static SCORE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)SCORE:\s*(\d+)[^\d]*(.*)").expect("valid regex"));

const REVIEW_SYSTEM_PROMPT: &str = "You are an expert technical reviewer.";

/// Score ceiling for texts that fail the length check; one grade point.
pub const LENGTH_FAILURE_CAP: f64 = 0.01;

pub struct ModelReviewer {
    provider: Arc<dyn TextProvider>,
    local: HeuristicReviewer,
    threshold: f64,
}

/// Grade parsed from a review response, scaled to 0.0..=1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub score: f64,
    pub reason: String,
}

pub fn parse_grade(response: &str) -> Option<Grade> {
    let caps = SCORE_LINE.captures(response)?;
    let raw: u32 = caps.get(1)?.as_str().parse().ok()?;
    let reason = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(Grade {
        score: f64::from(raw.min(100)) / 100.0,
        reason,
    })
}

pub fn review_prompt(section: &SectionSpec, text: &str) -> String {
    format!(
        "Please review the following text for the section '{}' according to these requirements: {}\n\n\
         Text:\n{}\n\n\
         Give a score from 0 to 100 based on how well the text fulfills ALL requirements. \
         Then, in one line, output only: SCORE: <number> - <short reason>.",
        section.title, section.description, text
    )
}

impl ModelReviewer {
    pub fn new(provider: Arc<dyn TextProvider>, local: HeuristicReviewer, threshold: f64) -> Self {
        Self {
            provider,
            local,
            threshold,
        }
    }
}

impl Reviewer for ModelReviewer {
    fn review(&self, section: &SectionSpec, text: &str) -> ReviewVerdict {
        let local = self.local.review(section, text);
        let bounds = section.bounds();
        if !bounds.contains(local.words) {
            return ReviewVerdict {
                score: length_factor(&bounds, local.words) * LENGTH_FAILURE_CAP,
                ..local
            };
        }

        let prompt = review_prompt(section, text);
        let (score, reason) = match self.provider.complete(REVIEW_SYSTEM_PROMPT, &prompt) {
            Ok(response) => match parse_grade(&response) {
                Some(grade) => (
                    grade.score,
                    format!(
                        "Review score {:.0}/100: {}",
                        grade.score * 100.0,
                        grade.reason
                    ),
                ),
                None => (
                    0.0,
                    format!("[REVIEW ERROR] Could not parse score: {}", response.trim()),
                ),
            },
            Err(e) => (0.0, format!("[REVIEW ERROR] {}", e)),
        };

        let accepted = score >= self.threshold;
        ReviewVerdict {
            accepted,
            score,
            words: local.words,
            reason: if accepted {
                ACCEPTED_REASON.to_string()
            } else {
                reason
            },
        }
    }
}

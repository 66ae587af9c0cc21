//! Word-count and keyword-alignment review.

use super::{ReviewVerdict, Reviewer, ACCEPTED_REASON};
use crate::config::{expected_keywords, SectionSpec, TopicRule, WordBounds};
use regex::Regex;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

/// Alignment used when no topic rule applies to a section.
pub const NEUTRAL_ALIGNMENT: f64 = 0.5;

pub fn word_count(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Share of `keywords` found (case-insensitively) in `text`.
pub fn alignment_score(keywords: &[&str], text: &str) -> f64 {
    if keywords.is_empty() {
        return NEUTRAL_ALIGNMENT;
    }
    let text = text.to_lowercase();
    let covered = keywords
        .iter()
        .filter(|keyword| text.contains(&keyword.to_lowercase()))
        .count();
    covered as f64 / keywords.len() as f64
}

/// 1.0 within bounds, shrinking with the distance outside them.
pub fn length_factor(bounds: &WordBounds, words: usize) -> f64 {
    if bounds.contains(words) {
        1.0
    } else if words < bounds.min as usize {
        words as f64 / f64::from(bounds.min.max(1))
    } else {
        f64::from(bounds.max) / words as f64
    }
}

pub fn length_rejection(bounds: &WordBounds, words: usize) -> String {
    format!(
        "Section length out of bounds: {} words (min {}, max {})",
        words, bounds.min, bounds.max
    )
}

pub struct HeuristicReviewer {
    topics: Vec<TopicRule>,
    threshold: f64,
}

impl HeuristicReviewer {
    pub fn new(topics: Vec<TopicRule>, threshold: f64) -> Self {
        Self { topics, threshold }
    }

    pub fn alignment(&self, section: &SectionSpec, text: &str) -> f64 {
        let keywords = expected_keywords(&self.topics, &section.description);
        alignment_score(&keywords, text)
    }
}

impl Reviewer for HeuristicReviewer {
    fn review(&self, section: &SectionSpec, text: &str) -> ReviewVerdict {
        let bounds = section.bounds();
        let words = word_count(text);
        let alignment = self.alignment(section, text);
        let score = alignment * length_factor(&bounds, words);

        let (accepted, reason) = if !bounds.contains(words) {
            (false, length_rejection(&bounds, words))
        } else if alignment < self.threshold {
            (
                false,
                format!(
                    "Content does not align well with section requirements (alignment score: {:.2})",
                    alignment
                ),
            )
        } else {
            (true, ACCEPTED_REASON.to_string())
        };

        tracing::debug!(
            section = %section.key,
            words,
            alignment,
            score,
            accepted,
            "heuristic review"
        );
        ReviewVerdict {
            accepted,
            score,
            words,
            reason,
        }
    }
}

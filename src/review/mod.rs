//! Section review: decides whether a generated text is accepted and scores it
//! so the best rejected attempt can be kept.

pub mod heuristic;
pub mod model;

use crate::config::SectionSpec;
use serde::{Deserialize, Serialize};

pub use heuristic::{alignment_score, length_factor, word_count, HeuristicReviewer};
pub use model::ModelReviewer;

/// Reason reported for accepted sections.
pub const ACCEPTED_REASON: &str = "ok";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub accepted: bool,
    /// Higher is better; comparable across attempts of one section.
    pub score: f64,
    pub words: usize,
    pub reason: String,
}

pub trait Reviewer: Send + Sync {
    fn review(&self, section: &SectionSpec, text: &str) -> ReviewVerdict;
}

#[cfg(test)]
#[path = "tests/review_tests.rs"]
mod tests;

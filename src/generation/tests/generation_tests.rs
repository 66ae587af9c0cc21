use super::single_pass::{extract_by_keywords, extract_section};
use super::*;
use crate::cancel::{cancel_pair, CancelToken};
use crate::config::{SectionSpec, TopicRule, WordBounds};
use crate::events::PipelineEvent;
use crate::project::ProjectBrief;
use crate::providers::scripted::ScriptedProvider;
use crate::providers::ProviderError;
use crate::review::{HeuristicReviewer, ModelReviewer, ReviewVerdict, Reviewer};
use proptest::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Reads the score from texts shaped like `<0-100>|<label>`.
struct ScoreReviewer {
    threshold: f64,
}

impl Reviewer for ScoreReviewer {
    fn review(&self, _section: &SectionSpec, text: &str) -> ReviewVerdict {
        let score = text
            .split('|')
            .next()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
            / 100.0;
        let accepted = score >= self.threshold;
        ReviewVerdict {
            accepted,
            score,
            words: 1,
            reason: if accepted {
                "ok".to_string()
            } else {
                format!("score too low: {:.2}", score)
            },
        }
    }
}

fn spec(key: &str, title: &str, diagram: bool) -> SectionSpec {
    SectionSpec {
        key: key.to_string(),
        title: title.to_string(),
        description: format!("Describe {}", title),
        word_count: Some(WordBounds::from_target(100)),
        diagram,
        diagram_hint: None,
        fallback_keywords: vec![key.to_string()],
    }
}

fn catalog(sections: Vec<SectionSpec>) -> SectionCatalog {
    SectionCatalog {
        sections,
        topics: Vec::new(),
    }
}

fn two_sections() -> SectionCatalog {
    catalog(vec![spec("alpha", "Alpha Part", false), spec("beta", "Beta Part", false)])
}

fn input() -> ConceptInput {
    ConceptInput::new(ProjectBrief {
        name: "Demo".to_string(),
        link: None,
        description: "A demo project".to_string(),
    })
}

fn run_sectioned(
    provider: &ScriptedProvider,
    catalog: &SectionCatalog,
    cancel: &CancelToken,
    threshold: f64,
    max_attempts: u32,
) -> ConceptResult {
    let events = EventSender::silent();
    let reviewer = ScoreReviewer { threshold };
    let ctx = GenerationContext {
        provider,
        catalog,
        cancel,
        events: &events,
        log: None,
    };
    SectionOrchestrator::new(ctx, &reviewer, max_attempts)
        .generate(&input())
        .unwrap()
}

#[test]
fn test_first_accepted_attempt_wins() {
    let provider = ScriptedProvider::new(vec![
        Ok("30|weak".to_string()),
        Ok("80|good alpha".to_string()),
        Ok("95|good beta".to_string()),
    ]);
    let result = run_sectioned(&provider, &two_sections(), &CancelToken::never(), 0.6, 10);

    assert_eq!(provider.calls(), 3);
    let alpha = result.get("alpha").unwrap();
    assert_eq!(alpha.text, "80|good alpha");
    assert_eq!(
        alpha.outcome,
        SectionOutcome::Accepted {
            attempts: 2,
            score: 0.8
        }
    );
    assert_eq!(result.get("beta").unwrap().text, "95|good beta");
    assert!(!result.metadata.cancelled);
    assert_eq!(result.metadata.mode, GenerationMode::Sectioned);
}

#[test]
fn test_model_review_best_effort_prefers_graded_text() {
    let catalog = catalog(vec![spec("alpha", "Alpha Part", false)]);
    let long = vec!["alpha"; 180].join(" ");
    let fitting = vec!["alpha"; 100].join(" ");
    let provider = ScriptedProvider::new(vec![Ok(long), Ok(fitting.clone())]);
    let grader = Arc::new(ScriptedProvider::repeating("SCORE: 50 - lacks detail"));
    let local = HeuristicReviewer::new(
        vec![TopicRule {
            triggers: vec!["alpha".to_string()],
            keywords: vec!["alpha".to_string()],
        }],
        0.6,
    );
    let reviewer = ModelReviewer::new(grader.clone(), local, 0.6);
    let events = EventSender::silent();
    let cancel = CancelToken::never();
    let ctx = GenerationContext {
        provider: &provider,
        catalog: &catalog,
        cancel: &cancel,
        events: &events,
        log: None,
    };

    let result = SectionOrchestrator::new(ctx, &reviewer, 2)
        .generate(&input())
        .unwrap();

    assert_eq!(grader.calls(), 1);
    let entry = result.get("alpha").unwrap();
    assert_eq!(entry.text, fitting);
    assert!(matches!(
        entry.outcome,
        SectionOutcome::BestEffort { score, .. } if score == 0.5
    ));
}

#[test]
fn test_exhausted_section_keeps_best_attempt() {
    let catalog = catalog(vec![spec("alpha", "Alpha Part", false)]);
    let provider = ScriptedProvider::new(vec![
        Ok("20|first".to_string()),
        Ok("50|second".to_string()),
        Ok("50|third".to_string()),
        Ok("10|fourth".to_string()),
    ]);
    let result = run_sectioned(&provider, &catalog, &CancelToken::never(), 0.9, 4);

    assert_eq!(provider.calls(), 4);
    let entry = result.get("alpha").unwrap();
    assert_eq!(entry.text, "50|second");
    assert_eq!(
        entry.outcome,
        SectionOutcome::BestEffort {
            attempts: 4,
            score: 0.5,
            reason: "score too low: 0.50".to_string()
        }
    );
}

#[test]
fn test_provider_error_feeds_retry_prompt() {
    let catalog = catalog(vec![spec("alpha", "Alpha Part", false)]);
    let provider = ScriptedProvider::new(vec![
        Err(ProviderError::Timeout(30)),
        Ok("90|fine".to_string()),
    ]);
    let result = run_sectioned(&provider, &catalog, &CancelToken::never(), 0.6, 10);

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("<previous-issues>"));
    assert!(prompts[1].contains("- Provider error (Timeout): request timed out after 30s"));
    assert!(matches!(
        result.get("alpha").unwrap().outcome,
        SectionOutcome::Accepted { attempts: 2, .. }
    ));
}

#[test]
fn test_repeated_reasons_listed_once() {
    let catalog = catalog(vec![spec("alpha", "Alpha Part", false)]);
    let provider = ScriptedProvider::new(vec![
        Ok("10|a".to_string()),
        Ok("10|b".to_string()),
        Ok("20|c".to_string()),
        Ok("90|d".to_string()),
    ]);
    run_sectioned(&provider, &catalog, &CancelToken::never(), 0.6, 10);

    let last = provider.prompts().pop().unwrap();
    assert_eq!(last.matches("- score too low: 0.10").count(), 1);
    let first_reason = last.find("score too low: 0.10").unwrap();
    let second_reason = last.find("score too low: 0.20").unwrap();
    assert!(first_reason < second_reason);
}

#[test]
fn test_only_provider_errors_give_placeholder() {
    let catalog = catalog(vec![spec("alpha", "Alpha Part", false)]);
    let provider = ScriptedProvider::new(vec![
        Err(ProviderError::Network("refused".to_string())),
        Err(ProviderError::EmptyResponse),
        Err(ProviderError::EmptyResponse),
    ]);
    let result = run_sectioned(&provider, &catalog, &CancelToken::never(), 0.6, 3);

    assert_eq!(provider.calls(), 3);
    let entry = result.get("alpha").unwrap();
    assert_eq!(entry.text, "(No information available for Alpha Part)");
    assert_eq!(
        entry.outcome,
        SectionOutcome::Placeholder {
            reason: "Provider error (Empty Response): provider returned an empty response"
                .to_string()
        }
    );
}

#[test]
fn test_authentication_error_stops_retrying() {
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Authentication {
        status: 401,
        message: "bad key".to_string(),
    })])
    .with_fallback("99|never used");
    let catalog = catalog(vec![spec("alpha", "Alpha Part", false)]);
    let result = run_sectioned(&provider, &catalog, &CancelToken::never(), 0.6, 10);

    assert_eq!(provider.calls(), 1);
    assert!(matches!(
        result.get("alpha").unwrap().outcome,
        SectionOutcome::Placeholder { .. }
    ));
}

#[test]
fn test_cancel_stops_provider_calls_at_attempt_boundary() {
    let (handle, token) = cancel_pair();
    let provider = ScriptedProvider::repeating("10|never good enough").on_call(move |call| {
        if call == 2 {
            handle.cancel();
        }
    });
    let result = run_sectioned(&provider, &two_sections(), &token, 0.6, 10);

    assert_eq!(provider.calls(), 2);
    assert!(result.metadata.cancelled);
    assert_eq!(result.entries.len(), 2);
    for entry in &result.entries {
        assert!(matches!(entry.outcome, SectionOutcome::Placeholder { .. }));
        assert!(!entry.text.is_empty());
    }
}

#[test]
fn test_events_trace_each_attempt() {
    let catalog = catalog(vec![spec("alpha", "Alpha Part", false)]);
    let provider = ScriptedProvider::new(vec![Ok("10|x".to_string()), Ok("70|y".to_string())]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let events = EventSender::new(tx);
    let reviewer = ScoreReviewer { threshold: 0.6 };
    let cancel = CancelToken::never();
    let ctx = GenerationContext {
        provider: &provider,
        catalog: &catalog,
        cancel: &cancel,
        events: &events,
        log: None,
    };
    SectionOrchestrator::new(ctx, &reviewer, 5)
        .generate(&input())
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen[0], PipelineEvent::SectionStarted { .. }));
    assert!(matches!(
        seen[2],
        PipelineEvent::AttemptRejected {
            attempt: 1,
            score: Some(_),
            ..
        }
    ));
    assert!(matches!(
        seen.last(),
        Some(PipelineEvent::SectionAccepted { attempt: 2, .. })
    ));
}

#[test]
fn test_diagram_section_requests_dot_when_missing() {
    let catalog = catalog(vec![spec("scope", "Scope", true)]);
    let provider = ScriptedProvider::new(vec![
        Ok("90|scope text".to_string()),
        Ok("```dot\ndigraph G { a -> b }\n```".to_string()),
    ]);
    let result = run_sectioned(&provider, &catalog, &CancelToken::never(), 0.6, 3);

    assert_eq!(provider.calls(), 2);
    assert_eq!(
        result.get("scope").unwrap().dot_code.as_deref(),
        Some("digraph G { a -> b }")
    );
}

#[test]
fn test_inline_dot_skips_diagram_request() {
    let catalog = catalog(vec![spec("scope", "Scope", true)]);
    let provider =
        ScriptedProvider::new(vec![Ok("90|text\n```dot\ndigraph I { x }\n```".to_string())]);
    let result = run_sectioned(&provider, &catalog, &CancelToken::never(), 0.6, 3);

    assert_eq!(provider.calls(), 1);
    assert_eq!(
        result.get("scope").unwrap().dot_code.as_deref(),
        Some("digraph I { x }")
    );
}

#[test]
fn test_ensure_complete_orders_and_fills() {
    let catalog = two_sections();
    let provider = ScriptedProvider::repeating("");
    let mut result = ConceptResult::new(&provider, GenerationMode::Sectioned);
    result.entries.push(SectionEntry {
        key: "beta".to_string(),
        title: "Beta Part".to_string(),
        text: "beta text".to_string(),
        outcome: SectionOutcome::Extracted,
        dot_code: None,
    });
    result.entries.push(SectionEntry {
        key: "unknown".to_string(),
        title: "Unknown".to_string(),
        text: "dropped".to_string(),
        outcome: SectionOutcome::Extracted,
        dot_code: None,
    });

    result.ensure_complete(&catalog);

    let keys: Vec<&str> = result.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["alpha", "beta"]);
    assert_eq!(result.entries[0].text, "(No information available for Alpha Part)");
    assert_eq!(result.entries[1].text, "beta text");
    assert_eq!(result.count("placeholder"), 1);
}

const SINGLE_PASS_RESPONSE: &str = "\
1. Alpha Part
Covers the main alpha workflow of the system in detail, with enough words.
It spans two lines.

2. Beta Part: Beta details follow right on the header line, long enough to count as content.
3. Gamma Part
short";

fn three_sections() -> SectionCatalog {
    catalog(vec![
        spec("alpha", "Alpha Part", false),
        spec("beta", "Beta Part", false),
        spec("gamma", "Gamma Part", false),
    ])
}

#[test]
fn test_extract_section_by_header() {
    let catalog = three_sections();
    let alpha = extract_section(SINGLE_PASS_RESPONSE, &catalog.sections[0], &catalog).unwrap();
    assert_eq!(
        alpha,
        "Covers the main alpha workflow of the system in detail, with enough words.\nIt spans two lines."
    );
    let beta = extract_section(SINGLE_PASS_RESPONSE, &catalog.sections[1], &catalog).unwrap();
    assert_eq!(
        beta,
        "Beta details follow right on the header line, long enough to count as content."
    );
    let gamma = extract_section(SINGLE_PASS_RESPONSE, &catalog.sections[2], &catalog).unwrap();
    assert_eq!(gamma, "short");
    assert!(extract_section("nothing here", &catalog.sections[0], &catalog).is_none());
}

#[test]
fn test_keyword_fallback_collects_matching_lines() {
    let section = spec("gamma", "Gamma Part", false);
    let text = "intro\nThe GAMMA service handles gamma rays.\nunrelated\nMore gamma here.";
    assert_eq!(
        extract_by_keywords(text, &section).as_deref(),
        Some("The GAMMA service handles gamma rays.\nMore gamma here.")
    );
}

fn run_single_pass(provider: &ScriptedProvider, catalog: &SectionCatalog, cancel: &CancelToken) -> ConceptResult {
    let events = EventSender::silent();
    let ctx = GenerationContext {
        provider,
        catalog,
        cancel,
        events: &events,
        log: None,
    };
    SinglePassGenerator::new(ctx, 3).generate(&input())
}

#[test]
fn test_single_pass_extracts_and_falls_back() {
    let catalog = three_sections();
    let provider = ScriptedProvider::new(vec![Ok(SINGLE_PASS_RESPONSE.to_string())]);
    let result = run_single_pass(&provider, &catalog, &CancelToken::never());

    assert_eq!(provider.calls(), 1);
    assert_eq!(result.metadata.mode, GenerationMode::SinglePass);
    assert_eq!(result.get("alpha").unwrap().outcome, SectionOutcome::Extracted);
    assert_eq!(result.get("beta").unwrap().outcome, SectionOutcome::Extracted);
    // "short" is below the extraction minimum and no line mentions "gamma"
    // except the header, so the short header text is kept.
    assert_eq!(result.get("gamma").unwrap().text, "short");
}

#[test]
fn test_single_pass_provider_failure_fills_placeholders() {
    let catalog = three_sections();
    let provider = ScriptedProvider::new(vec![
        Err(ProviderError::Timeout(1)),
        Err(ProviderError::Timeout(1)),
        Err(ProviderError::Timeout(1)),
    ]);
    let result = run_single_pass(&provider, &catalog, &CancelToken::never());

    assert_eq!(provider.calls(), 3);
    assert_eq!(result.entries.len(), 3);
    assert_eq!(result.count("placeholder"), 3);
    assert!(!result.metadata.cancelled);
}

#[test]
fn test_single_pass_cancelled_before_request() {
    let (handle, token) = cancel_pair();
    handle.cancel();
    let provider = ScriptedProvider::repeating(SINGLE_PASS_RESPONSE);
    let result = run_single_pass(&provider, &three_sections(), &token);

    assert_eq!(provider.calls(), 0);
    assert!(result.metadata.cancelled);
    assert_eq!(result.count("placeholder"), 3);
}

proptest! {
    #[test]
    fn prop_attempts_bounded_and_best_is_max(scores in proptest::collection::vec(0u32..90, 1..12)) {
        let max_attempts = scores.len() as u32;
        let catalog = catalog(vec![spec("alpha", "Alpha Part", false)]);
        let responses = scores
            .iter()
            .enumerate()
            .map(|(i, s)| Ok(format!("{}|attempt {}", s, i + 1)))
            .collect();
        let provider = ScriptedProvider::new(responses).with_fallback("99|beyond bound");
        let result = run_sectioned(&provider, &catalog, &CancelToken::never(), 0.95, max_attempts);

        prop_assert_eq!(provider.calls(), scores.len());
        let best = *scores.iter().max().unwrap();
        let first_best = scores.iter().position(|s| *s == best).unwrap() + 1;
        let entry = result.get("alpha").unwrap();
        prop_assert_eq!(&entry.text, &format!("{}|attempt {}", best, first_best));
        match &entry.outcome {
            SectionOutcome::BestEffort { attempts, score, .. } => {
                prop_assert_eq!(*attempts, max_attempts);
                prop_assert!((score - f64::from(best) / 100.0).abs() < 1e-9);
            }
            other => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }
}

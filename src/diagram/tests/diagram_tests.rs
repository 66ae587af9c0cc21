use super::*;
use crate::cancel::{cancel_pair, CancelToken};
use crate::config::SectionCatalog;
use crate::generation::{ConceptResult, SectionEntry, SectionOutcome};
use crate::providers::scripted::ScriptedProvider;
use crate::settings::GenerationMode;
use std::sync::Mutex;
use tempfile::tempdir;
use tokio::sync::mpsc;

#[derive(Default)]
struct RecordingBackend {
    sources: Mutex<Vec<String>>,
}

impl RenderBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn render(&self, dot: &str, output: &Path) -> Result<(), RenderError> {
        self.sources.lock().unwrap().push(dot.to_string());
        std::fs::write(output, b"PNG")?;
        Ok(())
    }
}

struct BrokenBackend;

impl RenderBackend for BrokenBackend {
    fn name(&self) -> &str {
        "broken"
    }

    fn render(&self, _dot: &str, _output: &Path) -> Result<(), RenderError> {
        Err(RenderError::NotFound("dot".to_string()))
    }
}

fn concept(dots: &[(&str, Option<&str>)]) -> ConceptResult {
    let provider = ScriptedProvider::repeating("");
    let mut result = ConceptResult::new(&provider, GenerationMode::Sectioned);
    for (key, dot) in dots {
        result.entries.push(SectionEntry {
            key: key.to_string(),
            title: key.to_string(),
            text: "text".to_string(),
            outcome: SectionOutcome::Extracted,
            dot_code: dot.map(str::to_string),
        });
    }
    result
}

#[test]
fn test_renders_entries_with_dot() {
    let dir = tempdir().unwrap();
    let backend = RecordingBackend::default();
    let events = EventSender::silent();
    let catalog = SectionCatalog::default_catalog();
    let concept = concept(&[
        ("system_scope", Some("digraph G {\n  a [label=\"A\"];\n}")),
        ("ci_cd", None),
    ]);

    let records = DiagramRenderer::new(&backend, dir.path(), &events).create_diagrams(
        &concept,
        &catalog,
        &CancelToken::never(),
    );

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].section_key, "system_scope");
    assert!(records[0].image_path.ends_with("system_scope_diagram_v1.png"));
    assert!(records[0].image_path.exists());
    assert!(records[0].source.contains("fillcolor"));
    assert_eq!(backend.sources.lock().unwrap()[0], records[0].source);
}

#[test]
fn test_repeated_runs_version_images() {
    let dir = tempdir().unwrap();
    let backend = RecordingBackend::default();
    let events = EventSender::silent();
    let catalog = SectionCatalog::default_catalog();
    let concept = concept(&[("system_scope", Some("digraph G {}"))]);
    let renderer = DiagramRenderer::new(&backend, dir.path(), &events);

    renderer.create_diagrams(&concept, &catalog, &CancelToken::never());
    let second = renderer.create_diagrams(&concept, &catalog, &CancelToken::never());
    assert!(second[0].image_path.ends_with("system_scope_diagram_v2.png"));
}

#[test]
fn test_failures_are_skipped_not_raised() {
    let dir = tempdir().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let events = EventSender::new(tx);
    let catalog = SectionCatalog::default_catalog();
    let concept = concept(&[
        ("system_scope", Some("digraph G {}")),
        ("architecture_tech_stack", None),
    ]);

    let records = DiagramRenderer::new(&BrokenBackend, dir.path(), &events).create_diagrams(
        &concept,
        &catalog,
        &CancelToken::never(),
    );

    assert!(records.is_empty());
    let mut skipped = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::DiagramSkipped { key, reason } = event {
            skipped.push((key, reason));
        }
    }
    assert_eq!(skipped.len(), 2);
    assert!(skipped[0].1.starts_with("broken rendering failed"));
    assert_eq!(skipped[1].1, "no DOT code available");
}

#[test]
fn test_cancelled_run_renders_nothing() {
    let dir = tempdir().unwrap();
    let backend = RecordingBackend::default();
    let events = EventSender::silent();
    let (handle, token) = cancel_pair();
    handle.cancel();

    let records = DiagramRenderer::new(&backend, dir.path(), &events).create_diagrams(
        &concept(&[("system_scope", Some("digraph G {}"))]),
        &SectionCatalog::default_catalog(),
        &token,
    );
    assert!(records.is_empty());
    assert!(backend.sources.lock().unwrap().is_empty());
}

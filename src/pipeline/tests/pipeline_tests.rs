use super::*;
use crate::cancel::cancel_pair;
use crate::diagram::RenderError;
use crate::providers::scripted::ScriptedProvider;
use std::fs::File;
use std::io::Read;
use tempfile::{tempdir, TempDir};
use tokio::sync::mpsc;

const SECTION_TEXT: &str = "The platform handles orders and inventory for the shop with clear boundaries.\n\n```dot\ndigraph G { shop -> stock }\n```";

struct PngWriter;

impl RenderBackend for PngWriter {
    fn name(&self) -> &str {
        "png-writer"
    }

    fn render(&self, _dot: &str, output: &Path) -> Result<(), RenderError> {
        std::fs::write(output, b"PNG")?;
        Ok(())
    }
}

fn settings(dir: &TempDir) -> Settings {
    Settings {
        output_directory: dir.path().join("out"),
        templates_directory: dir.path().join("templates"),
        max_attempts: 2,
        ..Settings::default()
    }
}

fn request(name: &str) -> RunRequest {
    RunRequest {
        brief: ProjectBrief {
            name: name.to_string(),
            link: None,
            description: "An online shop that keeps stock levels in sync.".to_string(),
        },
        ..RunRequest::default()
    }
}

fn pipeline(settings: Settings, provider: Arc<ScriptedProvider>) -> Pipeline {
    Pipeline::new(
        settings,
        SectionCatalog::default_catalog(),
        provider,
        Box::new(PngWriter),
    )
}

fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_full_run_writes_artifacts() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::repeating(SECTION_TEXT));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let outcome = pipeline(settings(&dir), provider)
        .with_events(EventSender::new(tx))
        .run(request("Shop"))
        .unwrap();

    assert!(!outcome.cancelled);
    assert_eq!(outcome.project_name, "Shop");
    assert_eq!(outcome.concept.entries.len(), 7);
    assert_eq!(outcome.concept.count("placeholder"), 0);
    assert_eq!(outcome.diagrams.len(), 2);

    let document = outcome.document.clone().unwrap();
    assert!(document.ends_with("docs/technical_concept_Shop_v1.md"));
    let markdown = std::fs::read_to_string(&document).unwrap();
    assert!(markdown.starts_with("# Technical Concept Document"));
    assert!(markdown.contains(
        "![System Scope and Boundaries diagram](../diagrams/system_scope_diagram_v1.png)"
    ));
    assert!(!markdown.contains("digraph"));

    let summary = std::fs::read_to_string(outcome.summary.as_ref().unwrap()).unwrap();
    assert!(summary.contains("Project: Shop"));
    assert!(outcome.bundle.is_none());

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(PipelineEvent::RunStarted { sections: 7, .. })));
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Finished {
            document: Some(document.clone())
        })
    );
    assert!(events.contains(&PipelineEvent::DocumentWritten {
        path: document,
        from_template: false
    }));

    let journal = std::fs::read_to_string(&outcome.journal_path).unwrap();
    assert_eq!(journal.lines().count(), events.len());
    assert!(journal.lines().next().unwrap().contains("\"type\":\"run_started\""));

    let log = std::fs::read_to_string(&outcome.log_path).unwrap();
    assert!(log.contains("[WORKFLOW]"));
}

#[test]
fn test_blank_name_is_suggested_by_provider() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new(vec![Ok("\"Bike Shop Portal\".".to_string())])
            .with_fallback(SECTION_TEXT),
    );

    let outcome = pipeline(settings(&dir), provider.clone())
        .run(request("  "))
        .unwrap();

    assert_eq!(outcome.project_name, "Bike Shop Portal");
    assert!(provider.prompts()[0].contains("project name"));
}

#[test]
fn test_cancelled_run_writes_no_document() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::repeating(SECTION_TEXT));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (handle, token) = cancel_pair();
    handle.cancel();

    let outcome = pipeline(settings(&dir), provider.clone())
        .with_events(EventSender::new(tx))
        .with_cancel(token)
        .run(request("Shop"))
        .unwrap();

    assert!(outcome.cancelled);
    assert!(outcome.document.is_none());
    assert!(outcome.diagrams.is_empty());
    assert!(outcome.summary.is_some());
    assert_eq!(provider.calls(), 0);
    assert_eq!(outcome.concept.count("placeholder"), 7);

    let events = drain(&mut rx);
    let cancels = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::Cancelled { .. }))
        .count();
    assert_eq!(cancels, 1);
    assert_eq!(events.last(), Some(&PipelineEvent::Finished { document: None }));
}

#[test]
fn test_template_run_with_bundle() {
    let dir = tempdir().unwrap();
    let settings = settings(&dir);
    std::fs::create_dir_all(&settings.templates_directory).unwrap();
    std::fs::write(
        settings.templates_directory.join("concept.md"),
        "# {{project_name}}\n\n{{ci_cd}}\n",
    )
    .unwrap();
    let provider = Arc::new(ScriptedProvider::repeating(SECTION_TEXT));

    let outcome = pipeline(settings, provider)
        .run(RunRequest {
            template: Some("concept.md".to_string()),
            bundle: true,
            ..request("Shop")
        })
        .unwrap();

    let markdown = std::fs::read_to_string(outcome.document.as_ref().unwrap()).unwrap();
    assert!(markdown.starts_with("# Shop\n\nThe platform handles orders"));

    let summary = std::fs::read_to_string(outcome.summary.as_ref().unwrap()).unwrap();
    assert!(summary.contains("concept.md"));

    let bundle = outcome.bundle.unwrap();
    assert!(bundle.ends_with("concept_Shop_v1.zip"));
    let mut archive = zip::ZipArchive::new(File::open(&bundle).unwrap()).unwrap();
    let mut concept_json = String::new();
    archive
        .by_name("concept.json")
        .unwrap()
        .read_to_string(&mut concept_json)
        .unwrap();
    assert!(concept_json.contains("\"ci_cd\""));
    assert!(archive.by_name("docs/technical_concept_Shop_v1.md").is_ok());
    assert!(archive.by_name("diagrams/system_scope_diagram_v1.png").is_ok());
    assert!(archive.by_name("manifest.json").is_ok());
}

#[test]
fn test_unreadable_template_falls_back_to_plain_layout() {
    let dir = tempdir().unwrap();
    let mut settings = settings(&dir);
    settings.selected_template = Some("absent.md".to_string());
    let provider = Arc::new(ScriptedProvider::repeating(SECTION_TEXT));

    let outcome = pipeline(settings, provider).run(request("Shop")).unwrap();

    let markdown = std::fs::read_to_string(outcome.document.as_ref().unwrap()).unwrap();
    assert!(markdown.starts_with("# Technical Concept Document"));
}

#[test]
fn test_single_pass_mode_override() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::repeating(SECTION_TEXT));

    let outcome = pipeline(settings(&dir), provider)
        .run(RunRequest {
            mode: Some(GenerationMode::SinglePass),
            ..request("Shop")
        })
        .unwrap();

    assert_eq!(outcome.concept.metadata.mode, GenerationMode::SinglePass);
    assert_eq!(outcome.concept.entries.len(), 7);
    assert!(outcome.document.is_some());
}

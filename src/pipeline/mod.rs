//! One concept run: generate, render diagrams, assemble, summarize and
//! optionally bundle.
//!
//! The pipeline is synchronous and runs on a single worker. Progress goes out
//! through an [`EventSender`]; cancellation is polled between stages and, inside
//! generation, between attempts.

pub mod summary;

use crate::bundle::{create_bundle, BundleFile, BundleRequest};
use crate::cancel::CancelToken;
use crate::concept_paths::{versioned_path, OutputLayout};
use crate::config::SectionCatalog;
use crate::diagram::{DiagramRecord, DiagramRenderer, RenderBackend};
use crate::document::template::resolve_template_path;
use crate::document::{assemble, AssemblyInput, Template};
use crate::events::{EventSender, PipelineEvent, Stage};
use crate::generation::prompts::{parse_project_name, project_name_prompt, SYSTEM_PROMPT};
use crate::generation::{
    ConceptInput, ConceptResult, GenerationContext, SectionOrchestrator, SinglePassGenerator,
};
use crate::journal::EventJournal;
use crate::project::ProjectBrief;
use crate::providers::{ProviderError, TextProvider};
use crate::review::{HeuristicReviewer, ModelReviewer, Reviewer};
use crate::run_log::{LogCategory, LogLevel, RunLog};
use crate::settings::{GenerationMode, ReviewMode, Settings};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use summary::{write_summary, SummaryInput};

pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

/// Asks the provider for a short project name.
pub fn suggest_project_name(
    provider: &dyn TextProvider,
    description: &str,
) -> Result<Option<String>, ProviderError> {
    let response = provider.complete(SYSTEM_PROMPT, &project_name_prompt(description))?;
    Ok(parse_project_name(&response))
}

/// Run id shared by the run log and the event journal file names.
pub fn new_run_id() -> String {
    let short: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("{}-{}", chrono::Local::now().format("%Y%m%d-%H%M%S"), short)
}

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub brief: ProjectBrief,
    pub proposal_context: Option<String>,
    /// Template name or path; overrides the configured template.
    pub template: Option<String>,
    /// Overrides the configured generation mode.
    pub mode: Option<GenerationMode>,
    pub bundle: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub project_name: String,
    pub concept: ConceptResult,
    pub diagrams: Vec<DiagramRecord>,
    pub document: Option<PathBuf>,
    pub summary: Option<PathBuf>,
    pub bundle: Option<PathBuf>,
    pub log_path: PathBuf,
    pub journal_path: PathBuf,
    pub cancelled: bool,
}

/// Per-run handles threaded through the stages.
struct RunScope<'a> {
    run_id: &'a str,
    layout: &'a OutputLayout,
    log: &'a RunLog,
    journal: &'a EventJournal,
    events: &'a EventSender,
}

impl RunScope<'_> {
    fn stage(&self, stage: Stage) {
        self.log.info(LogCategory::Workflow, stage.label());
        tracing::info!("{}", stage.label());
        self.events.send(PipelineEvent::StageStarted { stage });
    }

    fn cancelled(&self, stage: Stage) {
        self.log.info(
            LogCategory::Workflow,
            &format!("Run cancelled during stage: {}", stage.label()),
        );
        self.events.send(PipelineEvent::Cancelled { stage });
    }
}

pub struct Pipeline {
    settings: Settings,
    catalog: SectionCatalog,
    provider: Arc<dyn TextProvider>,
    renderer: Box<dyn RenderBackend>,
    events: EventSender,
    cancel: CancelToken,
    log_level: LogLevel,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        catalog: SectionCatalog,
        provider: Arc<dyn TextProvider>,
        renderer: Box<dyn RenderBackend>,
    ) -> Self {
        Self {
            settings,
            catalog,
            provider,
            renderer,
            events: EventSender::silent(),
            cancel: CancelToken::never(),
            log_level: LogLevel::Info,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Runs every stage. Errors are logged, reported as a `Failed` event and
    /// returned; section-level problems never surface here.
    pub fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        let layout = OutputLayout::new(&self.settings.output_directory);
        let logs_dir = layout.logs_dir()?;
        let run_id = new_run_id();
        let log = RunLog::create(&logs_dir, &run_id, self.log_level)?;
        let journal = Arc::new(
            EventJournal::new(&run_id, &logs_dir)
                .with_context(|| format!("Failed to open event journal in {}", logs_dir.display()))?,
        );
        let events = self.events.clone().with_journal(journal.clone());
        let scope = RunScope {
            run_id: &run_id,
            layout: &layout,
            log: &log,
            journal: &journal,
            events: &events,
        };

        match self.execute(&scope, request) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = format!("{:#}", e);
                log.error(LogCategory::Workflow, &format!("Run failed: {}", message));
                tracing::error!("Run {} failed: {}", run_id, message);
                events.send(PipelineEvent::Failed { error: message });
                Err(e)
            }
        }
    }

    fn execute(&self, scope: &RunScope<'_>, request: RunRequest) -> Result<RunOutcome> {
        let mode = request.mode.unwrap_or(self.settings.generation_mode);
        let mut brief = request.brief;
        brief.name = self.project_name(&brief, scope.log);
        let stem = brief.file_stem();

        scope.log.info(
            LogCategory::Workflow,
            &format!(
                "Run {} started: project '{}', provider {} ({}), mode {}",
                scope.run_id,
                brief.name,
                self.provider.name(),
                self.provider.model(),
                mode.as_str()
            ),
        );
        scope.events.send(PipelineEvent::RunStarted {
            run_id: scope.run_id.to_string(),
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
            mode: mode.as_str().to_string(),
            sections: self.catalog.sections.len(),
        });

        scope.stage(Stage::Generation);
        let input = ConceptInput::new(brief.clone()).with_context(request.proposal_context);
        let mut concept = self.generate(scope, &input, mode)?;
        if !concept.metadata.cancelled && self.cancel.is_cancelled() {
            concept.metadata.cancelled = true;
            scope.cancelled(Stage::Generation);
        }
        let mut cancelled = concept.metadata.cancelled;

        let mut diagrams = Vec::new();
        if self.settings.render_diagrams && !cancelled {
            scope.stage(Stage::Diagrams);
            let dir = scope.layout.diagrams_dir()?;
            diagrams = DiagramRenderer::new(self.renderer.as_ref(), &dir, scope.events)
                .with_log(Some(scope.log))
                .create_diagrams(&concept, &self.catalog, &self.cancel);
            if self.cancel.is_cancelled() {
                cancelled = true;
                scope.cancelled(Stage::Diagrams);
            }
        }

        let mut document = None;
        let mut template_path = None;
        if !cancelled {
            scope.stage(Stage::Assembly);
            let template = self.load_template(request.template.as_deref(), scope.log);
            let docs_dir = scope.layout.docs_dir()?;
            let assembled = assemble(
                template.as_ref(),
                &AssemblyInput {
                    concept: &concept,
                    catalog: &self.catalog,
                    diagrams: &diagrams,
                    brief: &brief,
                    initiator: &self.settings.initiator,
                    document_dir: &docs_dir,
                },
            );
            let path = versioned_path(&docs_dir, &format!("technical_concept_{}", stem), "md")?;
            assembled.document.write(&path)?;
            scope.log.info(
                LogCategory::Document,
                &format!(
                    "Document written to {} ({})",
                    path.display(),
                    if assembled.from_template {
                        "template"
                    } else {
                        "plain layout"
                    }
                ),
            );
            scope.events.send(PipelineEvent::DocumentWritten {
                path: path.clone(),
                from_template: assembled.from_template,
            });
            if assembled.from_template {
                template_path = template.and_then(|t| t.path);
            }
            document = Some(path);
        }

        scope.stage(Stage::Summary);
        let summaries_dir = scope.layout.summaries_dir()?;
        let summary = write_summary(
            &summaries_dir,
            &stem,
            &SummaryInput {
                run_id: scope.run_id,
                project_name: &brief.name,
                concept: &concept,
                catalog: &self.catalog,
                diagrams: &diagrams,
                document: document.as_deref(),
                template: template_path.as_deref(),
            },
        )?;
        scope.events.send(PipelineEvent::SummaryWritten {
            path: summary.clone(),
        });

        let bundle = if request.bundle {
            scope.stage(Stage::Bundle);
            let outputs = [document.as_deref(), Some(summary.as_path())];
            self.bundle(scope, &stem, &brief.name, &concept, &diagrams, &outputs)
        } else {
            None
        };

        scope.log.info(
            LogCategory::Workflow,
            &format!(
                "Run {} {}: {} accepted, {} best effort, {} extracted, {} placeholder",
                scope.run_id,
                if cancelled { "cancelled" } else { "finished" },
                concept.count("accepted"),
                concept.count("best effort"),
                concept.count("extracted"),
                concept.count("placeholder")
            ),
        );
        scope.events.send(PipelineEvent::Finished {
            document: document.clone(),
        });

        Ok(RunOutcome {
            run_id: scope.run_id.to_string(),
            project_name: brief.name,
            concept,
            diagrams,
            document,
            summary: Some(summary),
            bundle,
            log_path: scope.log.path().to_path_buf(),
            journal_path: scope.journal.path().to_path_buf(),
            cancelled,
        })
    }

    fn generate(
        &self,
        scope: &RunScope<'_>,
        input: &ConceptInput,
        mode: GenerationMode,
    ) -> Result<ConceptResult> {
        let ctx = GenerationContext {
            provider: self.provider.as_ref(),
            catalog: &self.catalog,
            cancel: &self.cancel,
            events: scope.events,
            log: Some(scope.log),
        };
        match mode {
            GenerationMode::Sectioned => {
                let reviewer = self.reviewer();
                SectionOrchestrator::new(ctx, reviewer.as_ref(), self.settings.max_attempts)
                    .with_diagram_requests(self.settings.render_diagrams)
                    .generate(input)
            }
            GenerationMode::SinglePass => Ok(SinglePassGenerator::new(ctx, self.settings.max_attempts)
                .with_diagram_requests(self.settings.render_diagrams)
                .generate(input)),
        }
    }

    fn reviewer(&self) -> Box<dyn Reviewer> {
        let threshold = self.settings.alignment_threshold;
        let local = HeuristicReviewer::new(self.catalog.topics.clone(), threshold);
        match self.settings.review_mode {
            ReviewMode::Heuristic => Box::new(local),
            ReviewMode::Model => Box::new(ModelReviewer::new(self.provider.clone(), local, threshold)),
        }
    }

    /// The brief's name, or a provider suggestion when it is blank.
    fn project_name(&self, brief: &ProjectBrief, log: &RunLog) -> String {
        let name = brief.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        if self.cancel.is_cancelled() {
            return DEFAULT_PROJECT_NAME.to_string();
        }
        match suggest_project_name(self.provider.as_ref(), &brief.description) {
            Ok(Some(name)) => {
                log.info(LogCategory::Provider, &format!("Generated project name: {}", name));
                name
            }
            Ok(None) => DEFAULT_PROJECT_NAME.to_string(),
            Err(e) => {
                log.warn(
                    LogCategory::Provider,
                    &format!("Project name generation failed: {}", e),
                );
                DEFAULT_PROJECT_NAME.to_string()
            }
        }
    }

    /// Loads the requested or configured template. A template that cannot be
    /// read falls back to the plain layout.
    fn load_template(&self, requested: Option<&str>, log: &RunLog) -> Option<Template> {
        let selected = requested
            .or(self.settings.selected_template.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        let path = resolve_template_path(&self.settings.templates_directory, selected);
        match Template::load(&path) {
            Ok(template) => {
                log.info(
                    LogCategory::Document,
                    &format!("Using template {}", path.display()),
                );
                Some(template)
            }
            Err(e) => {
                log.warn(
                    LogCategory::Document,
                    &format!("Template unavailable, using plain layout: {:#}", e),
                );
                tracing::warn!("Template unavailable, using plain layout: {:#}", e);
                None
            }
        }
    }

    /// Bundle failures are logged and never fail the run.
    fn bundle(
        &self,
        scope: &RunScope<'_>,
        stem: &str,
        project_name: &str,
        concept: &ConceptResult,
        diagrams: &[DiagramRecord],
        outputs: &[Option<&Path>],
    ) -> Option<PathBuf> {
        let archived = |folder: &str, path: &Path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            BundleFile::new(format!("{}/{}", folder, name), path)
        };

        let mut files: Vec<BundleFile> = outputs
            .iter()
            .flatten()
            .map(|path| {
                let folder = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "output".to_string());
                archived(&folder, path)
            })
            .collect();
        files.extend(diagrams.iter().map(|d| archived("diagrams", &d.image_path)));
        files.push(archived("logs", scope.log.path()));
        files.push(archived("logs", scope.journal.path()));

        let contents = match serde_json::to_string_pretty(concept) {
            Ok(json) => vec![("concept.json".to_string(), json)],
            Err(e) => {
                scope.log.warn(
                    LogCategory::Workflow,
                    &format!("Concept result not serializable for bundle: {}", e),
                );
                Vec::new()
            }
        };

        let bundles_dir = match scope.layout.bundles_dir() {
            Ok(dir) => dir,
            Err(e) => {
                scope.log.warn(LogCategory::Workflow, &format!("Bundle skipped: {}", e));
                return None;
            }
        };

        match create_bundle(BundleRequest {
            bundles_dir: &bundles_dir,
            stem,
            run_id: scope.run_id,
            project_name,
            files,
            contents,
        }) {
            Ok(path) => {
                scope.log.info(
                    LogCategory::Workflow,
                    &format!("Bundle written to {}", path.display()),
                );
                scope.events.send(PipelineEvent::BundleWritten { path: path.clone() });
                Some(path)
            }
            Err(e) => {
                scope.log.warn(
                    LogCategory::Workflow,
                    &format!("Failed to create bundle: {:#}", e),
                );
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;

//! Progress events posted from the generation worker to the front end.

use crate::journal::EventJournal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generation,
    Diagrams,
    Assembly,
    Summary,
    Bundle,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Generation => "Generating sections",
            Stage::Diagrams => "Rendering diagrams",
            Stage::Assembly => "Assembling document",
            Stage::Summary => "Writing summary",
            Stage::Bundle => "Bundling artifacts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        provider: String,
        model: String,
        mode: String,
        sections: usize,
    },
    StageStarted {
        stage: Stage,
    },
    SectionStarted {
        key: String,
        title: String,
    },
    AttemptStarted {
        key: String,
        attempt: u32,
        max_attempts: u32,
    },
    AttemptRejected {
        key: String,
        attempt: u32,
        score: Option<f64>,
        reason: String,
    },
    SectionAccepted {
        key: String,
        attempt: u32,
        score: f64,
    },
    SectionBestEffort {
        key: String,
        score: f64,
        reason: String,
    },
    SectionExtracted {
        key: String,
        chars: usize,
    },
    SectionPlaceholder {
        key: String,
        reason: String,
    },
    DiagramRendered {
        key: String,
        path: PathBuf,
    },
    DiagramSkipped {
        key: String,
        reason: String,
    },
    DocumentWritten {
        path: PathBuf,
        from_template: bool,
    },
    SummaryWritten {
        path: PathBuf,
    },
    BundleWritten {
        path: PathBuf,
    },
    Cancelled {
        stage: Stage,
    },
    Finished {
        document: Option<PathBuf>,
    },
    Failed {
        error: String,
    },
}

/// Sends events to the front end and mirrors them into the run journal.
///
/// Sending never fails; a closed receiver only means nobody is watching.
#[derive(Clone, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
    journal: Option<Arc<EventJournal>>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self {
            tx: Some(tx),
            journal: None,
        }
    }

    /// A sender that drops every event.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: Arc<EventJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn send(&self, event: PipelineEvent) {
        if let Some(journal) = &self.journal {
            journal.record("Pipeline", &event);
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

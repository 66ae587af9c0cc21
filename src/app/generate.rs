//! The `generate` command: runs the pipeline on a blocking worker and prints
//! its events until it finishes. Ctrl-C requests cooperative cancellation.

use crate::app::cli::GenerateArgs;
use crate::app::util::{format_event, load_brief, load_settings, read_context};
use crate::cancel::cancel_pair;
use crate::concept_paths::OutputLayout;
use crate::config::SectionCatalog;
use crate::diagram::GraphvizCommand;
use crate::events::{EventSender, PipelineEvent};
use crate::pipeline::{Pipeline, RunOutcome, RunRequest};
use crate::providers::{build_provider, TextProvider};
use crate::run_log::{latest_run_log, LogLevel};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

fn print_event(event: &PipelineEvent) {
    if let Some(line) = format_event(event) {
        println!("{}", line);
    }
}

fn print_outcome(outcome: &RunOutcome) {
    println!(
        "Sections: {} accepted, {} best effort, {} extracted, {} placeholder",
        outcome.concept.count("accepted"),
        outcome.concept.count("best effort"),
        outcome.concept.count("extracted"),
        outcome.concept.count("placeholder")
    );
    if let Some(summary) = &outcome.summary {
        println!("Summary: {}", summary.display());
    }
    if let Some(bundle) = &outcome.bundle {
        println!("Bundle: {}", bundle.display());
    }
    println!("Run log: {}", outcome.log_path.display());
}

pub async fn run_generate(settings_file: Option<&Path>, verbose: bool, args: GenerateArgs) -> Result<()> {
    let (settings, _) = load_settings(settings_file)?;
    settings.validate()?;
    let catalog = SectionCatalog::resolve(settings.sections_file.as_deref())?;
    catalog.validate()?;

    let brief = load_brief(&args.project)?;
    let proposal_context = read_context(args.context.as_deref())?;
    let provider: Arc<dyn TextProvider> = Arc::from(build_provider(&settings)?);

    let renderer = GraphvizCommand::new(settings.dot_commands.clone());
    if settings.render_diagrams && !renderer.is_available() {
        eprintln!(
            "[diagram] No Graphviz renderer found (tried: {}); diagrams will be skipped",
            settings.dot_commands.join(", ")
        );
    }

    let logs_dir = OutputLayout::new(&settings.output_directory).logs_dir()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (cancel_handle, cancel_token) = cancel_pair();
    let pipeline = Pipeline::new(settings, catalog, provider, Box::new(renderer))
        .with_events(EventSender::new(tx))
        .with_cancel(cancel_token)
        .with_log_level(if verbose { LogLevel::Debug } else { LogLevel::Info });

    let request = RunRequest {
        brief,
        proposal_context,
        template: args.template,
        mode: args.mode.map(Into::into),
        bundle: args.bundle,
    };

    let mut worker = tokio::task::spawn_blocking(move || pipeline.run(request));
    let mut cancel_requested = false;

    let joined = loop {
        tokio::select! {
            Some(event) = rx.recv() => print_event(&event),
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                cancel_requested = true;
                cancel_handle.cancel();
                eprintln!("[cancel] Cancellation requested, stopping after the current step...");
            }
            joined = &mut worker => break joined,
        }
    };
    while let Ok(event) = rx.try_recv() {
        print_event(&event);
    }

    match joined {
        Ok(Ok(outcome)) => {
            print_outcome(&outcome);
            if outcome.cancelled {
                println!("Run was cancelled; no document was assembled.");
            }
            Ok(())
        }
        Ok(Err(e)) => {
            if let Some(log) = latest_run_log(&logs_dir) {
                eprintln!("See run log: {}", log.display());
            }
            Err(e)
        }
        Err(join_error) => {
            let error = if join_error.is_panic() {
                "generation worker panicked".to_string()
            } else {
                format!("generation worker stopped: {}", join_error)
            };
            print_event(&PipelineEvent::Failed {
                error: error.clone(),
            });
            tracing::error!("{}", error);
            anyhow::bail!(error)
        }
    }
}

use anyhow::Result;
use clap::Parser;
use concept_forge::app::cli::{Cli, Command};
use concept_forge::app::{commands, run_generate};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "concept_forge=debug" } else { "concept_forge=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = cli.settings.as_deref();

    match cli.command {
        Command::Generate(args) => run_generate(settings, cli.verbose, args).await,
        Command::Settings { action } => commands::run_settings(settings, action),
        Command::SpecJson(args) => commands::run_spec_json(settings, args).await,
        Command::Sections => commands::run_sections(settings),
        Command::Templates => commands::run_templates(settings),
        Command::Name(args) => commands::run_name(settings, args).await,
        Command::Logs => commands::run_logs(settings),
    }
}

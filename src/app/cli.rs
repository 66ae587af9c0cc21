use crate::settings::GenerationMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "concept")]
#[command(about = "Generate technical concept documents from a project description")]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Show debug output on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to ~/.concept-forge/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a technical concept document
    Generate(GenerateArgs),

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Write the project brief as JSON into the JSON output directory
    SpecJson(ProjectArgs),

    /// List the configured sections
    Sections,

    /// List usable templates in the templates directory
    Templates,

    /// Suggest a project name for a description
    Name(ProjectArgs),

    /// Print the most recent run log
    Logs,
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print all settings
    Show,
    /// Change one setting
    Set { key: String, value: String },
    /// Restore defaults
    Reset,
    /// Print the settings file location
    Path,
}

/// Where the project brief comes from.
#[derive(Args, Clone, Default)]
pub struct ProjectArgs {
    /// Project file: JSON or tagged text
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Project description (instead of or overriding --project)
    #[arg(short, long)]
    pub description: Option<String>,

    /// Project name; generated by the provider when omitted
    #[arg(short, long)]
    pub name: Option<String>,

    /// Project link
    #[arg(long)]
    pub link: Option<String>,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Existing proposal text to stay consistent with
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Template name (in the templates directory) or path
    #[arg(short, long)]
    pub template: Option<String>,

    /// Override the configured generation mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Zip all run artifacts into the bundles directory
    #[arg(long)]
    pub bundle: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Sectioned,
    SinglePass,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sectioned => GenerationMode::Sectioned,
            ModeArg::SinglePass => GenerationMode::SinglePass,
        }
    }
}

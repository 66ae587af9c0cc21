//! Small commands that do not run the pipeline.

use crate::app::cli::{ProjectArgs, SettingsAction};
use crate::app::util::{load_brief, load_settings};
use crate::concept_paths::OutputLayout;
use crate::config::SectionCatalog;
use crate::document::list_templates;
use crate::pipeline::{suggest_project_name, DEFAULT_PROJECT_NAME};
use crate::project::ProjectBrief;
use crate::providers::build_provider;
use crate::run_log::latest_run_log;
use crate::settings::Settings;
use anyhow::{Context, Result};
use std::path::Path;

pub fn run_settings(settings_file: Option<&Path>, action: SettingsAction) -> Result<()> {
    let (mut settings, path) = load_settings(settings_file)?;
    match action {
        SettingsAction::Show => {
            println!("Settings file: {}", path.display());
            for (key, value) in settings.display_pairs() {
                println!("  {} = {}", key, value);
            }
        }
        SettingsAction::Set { key, value } => {
            // Reload without env overrides so they are not persisted.
            settings = Settings::load(&path)?;
            settings.set_value(&key, &value)?;
            settings.save_atomic(&path)?;
            println!("Updated {} in {}", key, path.display());
        }
        SettingsAction::Reset => {
            Settings::default().save_atomic(&path)?;
            println!("Restored default settings in {}", path.display());
        }
        SettingsAction::Path => println!("{}", path.display()),
    }
    Ok(())
}

pub fn run_sections(settings_file: Option<&Path>) -> Result<()> {
    let (settings, _) = load_settings(settings_file)?;
    let catalog = SectionCatalog::resolve(settings.sections_file.as_deref())?;
    for (index, section) in catalog.sections.iter().enumerate() {
        let bounds = section.bounds();
        println!(
            "{}. {} [{}] {}-{} words (target {}){}",
            index + 1,
            section.title,
            section.key,
            bounds.min,
            bounds.max,
            bounds.target,
            if section.diagram { ", diagram" } else { "" }
        );
    }
    Ok(())
}

pub fn run_templates(settings_file: Option<&Path>) -> Result<()> {
    let (settings, _) = load_settings(settings_file)?;
    let catalog = SectionCatalog::resolve(settings.sections_file.as_deref())?;
    let dir = &settings.templates_directory;
    let valid: Vec<_> = list_templates(dir, &catalog)?
        .into_iter()
        .filter(|t| t.is_valid())
        .collect();

    if valid.is_empty() {
        println!("No usable templates in {}", dir.display());
        return Ok(());
    }
    for template in valid {
        let marker = if settings.selected_template.as_deref() == Some(template.name.as_str()) {
            " (selected)"
        } else {
            ""
        };
        println!(
            "{} - {} section placeholders{}",
            template.name, template.section_placeholders, marker
        );
    }
    Ok(())
}

pub fn run_logs(settings_file: Option<&Path>) -> Result<()> {
    let (settings, _) = load_settings(settings_file)?;
    let logs_dir = OutputLayout::new(&settings.output_directory).logs_dir()?;
    let Some(path) = latest_run_log(&logs_dir) else {
        println!("No run logs in {}", logs_dir.display());
        return Ok(());
    };
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read run log: {}", path.display()))?;
    println!("{}", path.display());
    print!("{}", content);
    Ok(())
}

/// Name for `brief`: its own, a provider suggestion, or the default.
fn resolve_name(settings: &Settings, brief: &ProjectBrief) -> Result<String> {
    if !brief.name.trim().is_empty() {
        return Ok(brief.name.trim().to_string());
    }
    let provider = build_provider(settings)?;
    Ok(suggest_project_name(provider.as_ref(), &brief.description)?
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()))
}

pub async fn run_name(settings_file: Option<&Path>, args: ProjectArgs) -> Result<()> {
    let (settings, _) = load_settings(settings_file)?;
    let brief = load_brief(&ProjectArgs { name: None, ..args })?;
    let name = tokio::task::spawn_blocking(move || resolve_name(&settings, &brief)).await??;
    println!("{}", name);
    Ok(())
}

pub async fn run_spec_json(settings_file: Option<&Path>, args: ProjectArgs) -> Result<()> {
    let (settings, _) = load_settings(settings_file)?;
    let mut brief = load_brief(&args)?;
    let dir = settings.json_output_directory.clone();
    let path = tokio::task::spawn_blocking(move || -> Result<_> {
        brief.name = resolve_name(&settings, &brief)?;
        brief.export_json(&dir)
    })
    .await??;
    println!("Project file written to {}", path.display());
    Ok(())
}

//! Builds the concept document from a template, or a plain layout when no
//! usable template is available.

use super::clean::clean_section_text;
use super::template::{placeholder_keys, placeholder_pattern, Template};
use super::{relative_link, Block, Document};
use crate::config::{SectionCatalog, SectionSpec};
use crate::diagram::DiagramRecord;
use crate::generation::{ConceptResult, SectionOutcome};
use crate::project::ProjectBrief;
use regex::NoExpand;
use std::path::Path;

pub const FALLBACK_TITLE: &str = "Technical Concept Document";
pub const DIAGRAM_CAPTION: &str = "Diagram generated from Graphviz DOT code.";
pub const NO_DIAGRAM_TEXT: &str = "[No diagram available for this section]";
pub const DOCUMENT_VERSION: &str = "1.0";

const DATE_FORMAT: &str = "%B %d, %Y";
const TIMESTAMP_FORMAT: &str = "%B %d, %Y at %H:%M:%S UTC";

pub struct AssemblyInput<'a> {
    pub concept: &'a ConceptResult,
    pub catalog: &'a SectionCatalog,
    pub diagrams: &'a [DiagramRecord],
    pub brief: &'a ProjectBrief,
    pub initiator: &'a str,
    /// Directory the document is written to; image links are relative to it.
    pub document_dir: &'a Path,
}

#[derive(Debug)]
pub struct Assembled {
    pub document: Document,
    pub from_template: bool,
}

/// Everything placed for one section.
struct SectionContent {
    title: String,
    text: String,
    note: Option<String>,
    image: Option<String>,
    expects_diagram: bool,
}

impl SectionContent {
    fn prepare(section: &SectionSpec, input: &AssemblyInput<'_>) -> Self {
        let entry = input.concept.get(&section.key);
        let text = entry
            .and_then(|e| clean_section_text(&e.text, &section.title))
            .unwrap_or_else(|| section.placeholder_text());
        let note = entry.and_then(|e| match &e.outcome {
            SectionOutcome::BestEffort { reason, .. } => {
                Some(format!("[Best effort] Review note: {}", reason))
            }
            _ => None,
        });
        let image = input
            .diagrams
            .iter()
            .find(|d| d.section_key == section.key)
            .map(|d| relative_link(input.document_dir, &d.image_path));
        Self {
            title: section.title.clone(),
            text,
            note,
            image,
            expects_diagram: section.diagram,
        }
    }

    fn alt(&self) -> String {
        format!("{} diagram", self.title)
    }

    /// Blocks following the section text in paragraph position.
    fn trailing_blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        if let Some(note) = &self.note {
            blocks.push(Block::Paragraph(note.clone()));
        }
        match &self.image {
            Some(path) => {
                blocks.push(Block::Image {
                    path: path.clone(),
                    alt: self.alt(),
                });
                blocks.push(Block::Paragraph(DIAGRAM_CAPTION.to_string()));
            }
            None if self.expects_diagram => {
                blocks.push(Block::Paragraph(NO_DIAGRAM_TEXT.to_string()));
            }
            None => {}
        }
        blocks
    }

    fn blocks(&self) -> Vec<Block> {
        let mut blocks = split_paragraphs(&self.text);
        blocks.extend(self.trailing_blocks());
        blocks
    }

    /// Single-cell rendering with `<br>` line breaks.
    fn cell_text(&self) -> String {
        let mut cell = self.text.replace('\n', "<br>");
        if let Some(note) = &self.note {
            cell.push_str("<br><br>");
            cell.push_str(note);
        }
        match &self.image {
            Some(path) => {
                cell.push_str(&format!("<br>![{}]({})<br>{}", self.alt(), path, DIAGRAM_CAPTION));
            }
            None if self.expects_diagram => {
                cell.push_str("<br>");
                cell.push_str(NO_DIAGRAM_TEXT);
            }
            None => {}
        }
        cell
    }
}

fn split_paragraphs(text: &str) -> Vec<Block> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| Block::Paragraph(p.to_string()))
        .collect()
}

fn metadata_values(input: &AssemblyInput<'_>) -> Vec<(&'static str, String)> {
    vec![
        ("project_name", input.brief.name.clone()),
        (
            "date",
            input.concept.metadata.generated_at.format(DATE_FORMAT).to_string(),
        ),
        ("initiator", input.initiator.to_string()),
        ("project_link", input.brief.link.clone().unwrap_or_default()),
        ("description", input.brief.description.clone()),
    ]
}

fn replace_metadata(text: &str, values: &[(&'static str, String)]) -> String {
    let mut out = text.to_string();
    for (key, value) in values {
        out = placeholder_pattern(key)
            .replace_all(&out, NoExpand(value))
            .into_owned();
    }
    out
}

/// Catalog sections whose placeholder occurs in `text`.
fn sections_in<'c>(text: &str, catalog: &'c SectionCatalog) -> Vec<&'c SectionSpec> {
    let keys = placeholder_keys(text);
    catalog
        .sections
        .iter()
        .filter(|s| keys.iter().any(|k| k.eq_ignore_ascii_case(&s.key)))
        .collect()
}

/// Blocks for a paragraph or heading holding section placeholders: the
/// substituted text as paragraphs, then each section's trailing blocks.
fn section_blocks(
    text: &str,
    sections: &[&SectionSpec],
    input: &AssemblyInput<'_>,
    metadata: &[(&'static str, String)],
) -> Vec<Block> {
    let contents: Vec<SectionContent> = sections
        .iter()
        .map(|s| SectionContent::prepare(s, input))
        .collect();
    let mut text = replace_metadata(text, metadata);
    for (section, content) in sections.iter().zip(&contents) {
        text = placeholder_pattern(&section.key)
            .replace_all(&text, NoExpand(&content.text))
            .into_owned();
    }
    let mut blocks = split_paragraphs(&text);
    for content in &contents {
        blocks.extend(content.trailing_blocks());
    }
    blocks
}

fn fill_template(template: &Template, input: &AssemblyInput<'_>) -> Document {
    let metadata = metadata_values(input);
    let mut blocks = Vec::new();

    for block in &template.document.blocks {
        match block {
            Block::Heading { level, text } => {
                let sections = sections_in(text, input.catalog);
                if sections.is_empty() {
                    blocks.push(Block::Heading {
                        level: *level,
                        text: replace_metadata(text, &metadata),
                    });
                } else {
                    blocks.extend(section_blocks(text, &sections, input, &metadata));
                }
            }
            Block::Paragraph(text) => {
                let sections = sections_in(text, input.catalog);
                if sections.is_empty() {
                    blocks.push(Block::Paragraph(replace_metadata(text, &metadata)));
                } else {
                    blocks.extend(section_blocks(text, &sections, input, &metadata));
                }
            }
            Block::Table { rows } => {
                let rows = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|cell| {
                                let mut cell_text = replace_metadata(cell, &metadata);
                                for section in sections_in(cell, input.catalog) {
                                    let content = SectionContent::prepare(section, input);
                                    cell_text = placeholder_pattern(&section.key)
                                        .replace_all(&cell_text, NoExpand(&content.cell_text()))
                                        .into_owned();
                                }
                                cell_text
                            })
                            .collect()
                    })
                    .collect();
                blocks.push(Block::Table { rows });
            }
            Block::Image { .. } => blocks.push(block.clone()),
        }
    }

    Document { blocks }
}

fn build_plain(input: &AssemblyInput<'_>) -> Document {
    let meta = &input.concept.metadata;
    let mut doc = Document::default();

    doc.heading(1, FALLBACK_TITLE);
    if !input.brief.name.trim().is_empty() {
        doc.paragraph(format!("Project: {}", input.brief.name.trim()));
    }
    if let Some(link) = input.brief.link.as_deref().filter(|l| !l.trim().is_empty()) {
        doc.paragraph(format!("Project link: {}", link));
    }
    doc.paragraph(format!("Generated on: {}", meta.generated_at.format(DATE_FORMAT)));

    for (index, section) in input.catalog.sections.iter().enumerate() {
        doc.heading(2, format!("{}. {}", index + 1, section.title));
        doc.blocks
            .extend(SectionContent::prepare(section, input).blocks());
    }

    doc.heading(2, "Document Information");
    doc.paragraph(format!("Generated by: {}", meta.generated_by));
    doc.paragraph(format!(
        "Generated on: {}",
        meta.generated_at.format(TIMESTAMP_FORMAT)
    ));
    if !input.initiator.trim().is_empty() {
        doc.paragraph(format!("Initiator: {}", input.initiator.trim()));
    }
    doc.paragraph(format!("Provider: {} ({})", meta.provider, meta.model));
    doc.paragraph(format!("Generation mode: {}", meta.mode.as_str()));
    doc.paragraph(format!("Document version: {}", DOCUMENT_VERSION));
    doc
}

/// Fills `template` when it has at least one section placeholder, otherwise
/// builds the plain layout.
pub fn assemble(template: Option<&Template>, input: &AssemblyInput<'_>) -> Assembled {
    match template {
        Some(template) if !template.section_placeholders(input.catalog).is_empty() => Assembled {
            document: fill_template(template, input),
            from_template: true,
        },
        Some(template) => {
            tracing::warn!(
                "Template {} has no section placeholders, building plain document",
                template
                    .path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
            Assembled {
                document: build_plain(input),
                from_template: false,
            }
        }
        None => Assembled {
            document: build_plain(input),
            from_template: false,
        },
    }
}

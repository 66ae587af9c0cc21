//! Concept documents: a small block model that templates are parsed into and
//! that is written out as Markdown.

pub mod assembler;
pub mod clean;
pub mod template;

pub use assembler::{assemble, AssemblyInput, Assembled};
pub use template::{list_templates, Template, TemplateInfo};

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: usize, text: String },
    Paragraph(String),
    Table { rows: Vec<Vec<String>> },
    Image { path: String, alt: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn heading(&mut self, level: usize, text: impl Into<String>) {
        self.blocks.push(Block::Heading {
            level,
            text: text.into(),
        });
    }

    pub fn paragraph(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Paragraph(text.into()));
    }

    /// Renders the document as Markdown. The first table row is the header.
    pub fn to_markdown(&self) -> String {
        let rendered: Vec<String> = self
            .blocks
            .iter()
            .map(|block| match block {
                Block::Heading { level, text } => {
                    format!("{} {}", "#".repeat((*level).clamp(1, 6)), text)
                }
                Block::Paragraph(text) => text.clone(),
                Block::Image { path, alt } => format!("![{}]({})", alt, path),
                Block::Table { rows } => render_table(rows),
            })
            .collect();
        let mut out = rendered.join("\n\n");
        out.push('\n');
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_markdown())
            .with_context(|| format!("Failed to write document: {}", path.display()))
    }
}

fn render_row(cells: &[String], width: usize) -> String {
    let mut padded: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
    padded.resize(width, String::new());
    format!("| {} |", padded.join(" | "))
}

fn render_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let mut lines = Vec::new();
    let mut iter = rows.iter();
    let header = iter.next().cloned().unwrap_or_default();
    lines.push(render_row(&header, width));
    lines.push(format!("|{}", " --- |".repeat(width)));
    lines.extend(iter.map(|row| render_row(row, width)));
    lines.join("\n")
}

/// Path of `target` relative to `base_dir`, with `/` separators, for image
/// links inside documents.
pub fn relative_link(base_dir: &Path, target: &Path) -> String {
    let absolute = |p: &Path| std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
    let base = absolute(base_dir);
    let target = absolute(target);
    let base_parts: Vec<Component> = base.components().collect();
    let target_parts: Vec<Component> = target.components().collect();
    let common = base_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return target.to_string_lossy().replace('\\', "/");
    }
    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in target_parts.iter().skip(common) {
        relative.push(part.as_os_str());
    }
    relative.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod tests;

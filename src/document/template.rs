//! Document templates: Markdown files with `{{ key }}` placeholder tokens.

use super::{Block, Document};
use crate::config::SectionCatalog;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("valid regex"));
static IMAGE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!\[([^\]]*)\]\(([^)]+)\)$").expect("valid regex"));

const TEMPLATE_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Regex matching the placeholder for `key`, case-insensitive with optional
/// inner whitespace.
pub fn placeholder_pattern(key: &str) -> Regex {
    Regex::new(&format!(r"(?i)\{{\{{\s*{}\s*\}}\}}", regex::escape(key)))
        .expect("escaped key forms a valid regex")
}

/// Lowercased placeholder keys in `text`, in order of appearance.
pub fn placeholder_keys(text: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_lowercase()))
        .collect()
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = line.trim_start_matches('#');
    if !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim().to_string()))
}

fn is_separator_row(line: &str) -> bool {
    line.contains('-') && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn parse_cells(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

#[derive(Debug, Clone)]
pub struct Template {
    pub path: Option<PathBuf>,
    pub document: Document,
}

impl Template {
    pub fn parse(content: &str) -> Self {
        let mut blocks = Vec::new();
        let mut paragraph: Vec<&str> = Vec::new();
        let mut table: Vec<Vec<String>> = Vec::new();

        fn flush_paragraph(blocks: &mut Vec<Block>, paragraph: &mut Vec<&str>) {
            if !paragraph.is_empty() {
                blocks.push(Block::Paragraph(paragraph.join("\n")));
                paragraph.clear();
            }
        }
        fn flush_table(blocks: &mut Vec<Block>, table: &mut Vec<Vec<String>>) {
            if !table.is_empty() {
                blocks.push(Block::Table {
                    rows: std::mem::take(table),
                });
            }
        }

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('|') {
                flush_paragraph(&mut blocks, &mut paragraph);
                if !is_separator_row(trimmed) {
                    table.push(parse_cells(trimmed));
                }
                continue;
            }
            flush_table(&mut blocks, &mut table);

            if trimmed.is_empty() {
                flush_paragraph(&mut blocks, &mut paragraph);
            } else if let Some((level, text)) = parse_heading(trimmed) {
                flush_paragraph(&mut blocks, &mut paragraph);
                blocks.push(Block::Heading { level, text });
            } else if let Some(caps) = IMAGE_LINE.captures(trimmed) {
                flush_paragraph(&mut blocks, &mut paragraph);
                blocks.push(Block::Image {
                    alt: caps.get(1).map_or("", |m| m.as_str()).to_string(),
                    path: caps.get(2).map_or("", |m| m.as_str()).to_string(),
                });
            } else {
                paragraph.push(line.trim_end());
            }
        }
        flush_paragraph(&mut blocks, &mut paragraph);
        flush_table(&mut blocks, &mut table);

        Self {
            path: None,
            document: Document { blocks },
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template: {}", path.display()))?;
        let mut template = Self::parse(&content);
        template.path = Some(path.to_path_buf());
        Ok(template)
    }

    /// Placeholder keys found in headings, paragraphs and table cells.
    pub fn placeholders(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for block in &self.document.blocks {
            let found = match block {
                Block::Heading { text, .. } | Block::Paragraph(text) => placeholder_keys(text),
                Block::Table { rows } => rows
                    .iter()
                    .flatten()
                    .flat_map(|cell| placeholder_keys(cell))
                    .collect(),
                Block::Image { .. } => Vec::new(),
            };
            for key in found {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Catalog sections that have a placeholder in this template.
    pub fn section_placeholders<'c>(&self, catalog: &'c SectionCatalog) -> Vec<&'c str> {
        let found = self.placeholders();
        catalog
            .keys()
            .filter(|key| found.iter().any(|f| f.eq_ignore_ascii_case(key)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct TemplateInfo {
    pub name: String,
    pub path: PathBuf,
    pub section_placeholders: usize,
}

impl TemplateInfo {
    /// A template is usable when it holds at least one section placeholder.
    pub fn is_valid(&self) -> bool {
        self.section_placeholders > 0
    }
}

/// Templates in `dir`, sorted by file name. A missing directory yields an
/// empty list.
pub fn list_templates(dir: &Path, catalog: &SectionCatalog) -> Result<Vec<TemplateInfo>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read templates directory: {}", dir.display()))?;

    let mut templates = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_template = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| TEMPLATE_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(e)));
        if !path.is_file() || !is_template {
            continue;
        }
        let template = match Template::load(&path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Skipping unreadable template {}: {:#}", path.display(), e);
                continue;
            }
        };
        templates.push(TemplateInfo {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            section_placeholders: template.section_placeholders(catalog).len(),
            path,
        });
    }
    templates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(templates)
}

/// Resolves a template selection: an existing path is used as is, anything
/// else is looked up in the templates directory.
pub fn resolve_template_path(templates_dir: &Path, selected: &str) -> PathBuf {
    let direct = PathBuf::from(selected);
    if direct.is_file() {
        direct
    } else {
        templates_dir.join(selected)
    }
}

//! Turns raw section text into plain document prose.

use regex::Regex;
use std::sync::LazyLock;

static MERMAID_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```\s*mermaid[\s\S]*?```").expect("valid regex"));
static DOT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```\s*dot[\s\S]*?```").expect("valid regex"));
static DIAGRAM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:mermaid\b|graph\s+(?:TD|TB|BT|RL|LR)\b|(?:strict\s+)?(?:di)?graph(?:\s+[\w\x22]+)?\s*\{)",
    )
    .expect("valid regex")
});
static HEADER_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+\s*").expect("valid regex"));
static BOLD_STARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static BOLD_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__(.+?)__").expect("valid regex"));
static ITALIC_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid regex"));
static ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w])_([^_\n]+)_([^\w]|$)").expect("valid regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]*)`").expect("valid regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("valid regex"));

/// Drops the first line when it repeats the title or starts with a number.
pub fn remove_section_heading(text: &str, title: &str) -> String {
    let trimmed = text.trim();
    let mut lines = trimmed.lines();
    let Some(first) = lines.next() else {
        return String::new();
    };
    let repeats_title = first.to_lowercase().contains(&title.to_lowercase());
    let numbered = first
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| ('1'..='9').contains(&c));
    if repeats_title || numbered {
        lines.collect::<Vec<_>>().join("\n").trim_start().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Removes mermaid and DOT fences plus stray graph-definition lines.
pub fn remove_diagram_code(text: &str) -> String {
    let without_mermaid = MERMAID_BLOCK.replace_all(text, "");
    let without_dot = DOT_BLOCK.replace_all(&without_mermaid, "");
    without_dot
        .lines()
        .filter(|line| !DIAGRAM_LINE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn strip_markdown(text: &str) -> String {
    let text = HEADER_MARK.replace_all(text, "");
    let text = BOLD_STARS.replace_all(&text, "${1}");
    let text = BOLD_UNDERSCORES.replace_all(&text, "${1}");
    let text = ITALIC_STAR.replace_all(&text, "${1}");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "${1}${2}${3}");
    let text = INLINE_CODE.replace_all(&text, "${1}");
    let text = BULLET.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Full cleaning pipeline. `None` means nothing usable remains and the
/// section placeholder should be used instead.
pub fn clean_section_text(text: &str, title: &str) -> Option<String> {
    let content = remove_section_heading(text, title);
    let content = remove_diagram_code(&content);
    let content = content.trim();
    if content.is_empty() || content.starts_with("Section") || content.starts_with("Error") {
        return None;
    }
    let cleaned = strip_markdown(content);
    (!cleaned.is_empty()).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_line_removed() {
        assert_eq!(
            remove_section_heading("CI/CD Pipelines\nWe build on push.", "CI/CD Pipelines"),
            "We build on push."
        );
        assert_eq!(
            remove_section_heading("4. Pipelines\n\nWe build.", "CI/CD Pipelines"),
            "We build."
        );
        assert_eq!(
            remove_section_heading("We build on push.", "CI/CD Pipelines"),
            "We build on push."
        );
    }

    #[test]
    fn test_diagram_code_removed() {
        let text = "Intro.\n```dot\ndigraph G { a -> b }\n```\n```mermaid\ngraph TD; A-->B\n```\ndigraph X {\nGraphQL serves the frontend.";
        assert_eq!(
            remove_diagram_code(text),
            "Intro.\n\n\nGraphQL serves the frontend."
        );
    }

    #[test]
    fn test_markdown_stripped() {
        let text = "## Overview\n**Bold** and *italic* and _emph_ with `code`.\n- first\n* second\n\n\n\nuser_id_field stays.";
        assert_eq!(
            strip_markdown(text),
            "Overview\nBold and italic and emph with code.\nfirst\nsecond\n\nuser_id_field stays."
        );
    }

    #[test]
    fn test_clean_rejects_error_and_empty_text() {
        assert_eq!(clean_section_text("```dot\ndigraph G {}\n```", "Scope"), None);
        assert_eq!(clean_section_text("Section 'Scope' not found", "Other"), None);
        assert_eq!(clean_section_text("Error extracting", "Other"), None);
    }

    #[test]
    fn test_clean_full_pipeline() {
        let raw = "System Scope\n**The system** manages orders.\n\n```dot\ndigraph G {}\n```";
        assert_eq!(
            clean_section_text(raw, "System Scope").as_deref(),
            Some("The system manages orders.")
        );
    }
}

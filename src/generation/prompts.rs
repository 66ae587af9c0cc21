//! Prompt text for concept generation.

use crate::config::{SectionCatalog, SectionSpec};
use crate::project::ProjectBrief;
use crate::prompt_format::PromptBuilder;

pub const SYSTEM_PROMPT: &str = "You are an expert software architect and technical writer. \
Your task is to write parts of a technical concept for a software project in clear, professional English. \
Address only the requested content points and strictly respect the requested length. \
Write continuous text without bullet points, summaries, introductions or conclusions. \
Do NOT use markdown formatting. Do NOT include any diagram code, DOT code, or visual elements.";

pub const DIAGRAM_SYSTEM_PROMPT: &str =
    "You are an expert software architect who draws clear architecture diagrams in Graphviz DOT.";

/// Everything a prompt needs to know about the project.
#[derive(Debug, Clone, Default)]
pub struct ConceptInput {
    pub brief: ProjectBrief,
    /// Existing proposal text the concept must stay consistent with.
    pub proposal_context: Option<String>,
}

impl ConceptInput {
    pub fn new(brief: ProjectBrief) -> Self {
        Self {
            brief,
            proposal_context: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.proposal_context = context.filter(|c| !c.trim().is_empty());
        self
    }

    fn context(&self) -> &str {
        self.proposal_context.as_deref().unwrap_or("")
    }
}

/// User prompt for one section attempt. `failures` are the distinct
/// rejection reasons of earlier attempts, oldest first.
pub fn section_prompt(input: &ConceptInput, section: &SectionSpec, failures: &[String]) -> String {
    let bounds = section.bounds();
    let word_count = format!(
        "Minimum: {} words\nMaximum: {} words\nTarget: {} words",
        bounds.min, bounds.max, bounds.target
    );
    PromptBuilder::new()
        .task("section")
        .instructions(
            "Write ONLY the following section of the technical concept. Do NOT add any other \
             sections, summaries, introductions, conclusions, bullet points, lists, or headings.",
        )
        .context(input.context())
        .input("section-title", &section.title)
        .input("project-description", &input.brief.description)
        .input("section-requirements", &section.description)
        .input("word-count", &word_count)
        .constraint("Output ONLY the content for this section")
        .constraint("Do NOT include the section header or any other text")
        .constraint("Do NOT include any diagram or code block")
        .feedback(failures)
        .build()
}

pub fn diagram_prompt(input: &ConceptInput, section: &SectionSpec, section_text: &str) -> String {
    let hint = section
        .diagram_hint
        .as_deref()
        .unwrap_or("Visualize the main elements described in the section and how they relate.");
    PromptBuilder::new()
        .task("diagram")
        .instructions(hint)
        .input("section-title", &section.title)
        .input("project-description", &input.brief.description)
        .input("section-text", section_text)
        .constraint("Use Graphviz DOT only. Do NOT use Mermaid or any other diagram language")
        .constraint("Produce a single digraph with short, readable node labels")
        .output_format("A single ```dot code block and nothing else.")
        .build()
}

/// Prompt for single-pass mode: every section in one response, under
/// numbered headers matching the catalog titles.
pub fn single_pass_prompt(input: &ConceptInput, catalog: &SectionCatalog) -> String {
    let outline = catalog
        .sections
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let bounds = s.bounds();
            format!(
                "{}. {}\n{} (between {} and {} words)",
                i + 1,
                s.title,
                s.description,
                bounds.min,
                bounds.max
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut builder = PromptBuilder::new()
        .task("concept")
        .instructions(&format!(
            "Create a technical concept for the project below. Provide ONLY the following {} \
             sections, with EXACTLY the headers and numbering shown. Do NOT add any other \
             sections such as project costs, payment plan, summary or conclusion.\n\n{}",
            catalog.sections.len(),
            outline
        ))
        .context(input.context())
        .input("project-description", &input.brief.description)
        .constraint("Use the exact section headers and numbering as shown")
        .constraint("Write in continuous text")
        .constraint("Do NOT use markdown formatting");
    if input.proposal_context.is_some() {
        builder = builder.constraint(
            "Stay consistent with the existing proposal context and avoid contradictions",
        );
    }
    builder.build()
}

pub fn project_name_prompt(description: &str) -> String {
    format!(
        "Generate a short, clear, and professional project name (max 7 words, no quotes, \
         no punctuation at the end) for the following software project. \
         Only output the name, nothing else.\n\nProject Description:\n{}",
        description
    )
}

/// First non-empty line of a name response with surrounding quotes removed.
pub fn parse_project_name(response: &str) -> Option<String> {
    let line = response.lines().map(str::trim).find(|l| !l.is_empty())?;
    let name = line
        .trim_end_matches(['.', '!', ';', ':'])
        .trim_matches(|c| c == '"' || c == '\'')
        .trim_end_matches(['.', '!', ';', ':'])
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ConceptInput {
        ConceptInput::new(ProjectBrief {
            name: "Shop".to_string(),
            link: None,
            description: "An online shop for bikes".to_string(),
        })
    }

    #[test]
    fn test_section_prompt_contains_bounds_and_feedback() {
        let catalog = SectionCatalog::default_catalog();
        let section = catalog.get("ci_cd").unwrap();
        let bounds = section.bounds();
        let prompt = section_prompt(&input(), section, &["too short".to_string()]);

        assert!(prompt.contains(&format!("<section-title>{}</section-title>", section.title)));
        assert!(prompt.contains("An online shop for bikes"));
        assert!(prompt.contains(&format!("Minimum: {} words", bounds.min)));
        assert!(prompt.contains(&format!("Maximum: {} words", bounds.max)));
        assert!(prompt.contains("- too short"));
        assert!(!prompt.contains("<context>"));
    }

    #[test]
    fn test_first_attempt_has_no_feedback_block() {
        let catalog = SectionCatalog::default_catalog();
        let prompt = section_prompt(&input(), &catalog.sections[0], &[]);
        assert!(!prompt.contains("<previous-issues>"));
    }

    #[test]
    fn test_context_included_when_present() {
        let catalog = SectionCatalog::default_catalog();
        let with = input().with_context(Some("We promised Kubernetes".to_string()));
        let blank = input().with_context(Some("  ".to_string()));
        assert!(section_prompt(&with, &catalog.sections[0], &[]).contains("We promised Kubernetes"));
        assert!(blank.proposal_context.is_none());
        assert!(single_pass_prompt(&with, &catalog).contains("Stay consistent"));
    }

    #[test]
    fn test_single_pass_prompt_numbers_every_section() {
        let catalog = SectionCatalog::default_catalog();
        let prompt = single_pass_prompt(&input(), &catalog);
        for (i, section) in catalog.sections.iter().enumerate() {
            assert!(prompt.contains(&format!("{}. {}", i + 1, section.title)));
        }
    }

    #[test]
    fn test_parse_project_name() {
        assert_eq!(
            parse_project_name("\n\"Bike Shop Platform\"\nExtra line").as_deref(),
            Some("Bike Shop Platform")
        );
        assert_eq!(parse_project_name("Rider Hub.").as_deref(), Some("Rider Hub"));
        assert_eq!(parse_project_name("'Rider Hub.'.").as_deref(), Some("Rider Hub"));
        assert_eq!(parse_project_name("  \n \"\" "), None);
    }
}

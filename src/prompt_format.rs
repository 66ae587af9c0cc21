//! XML-style prompt formatting helpers.
//!
//! Generation prompts are split into tagged blocks so the model can tell the
//! project brief apart from the instructions and from reviewer feedback.

/// Wraps content in an XML tag with the given name.
///
/// # Example
/// ```
/// use concept_forge::prompt_format::xml_tag;
/// assert_eq!(xml_tag("section-title", "Testing"), "<section-title>Testing</section-title>");
/// ```
pub fn xml_tag(name: &str, content: &str) -> String {
    format!("<{}>{}</{}>", name, content, name)
}

/// Wraps multi-line content in an XML tag, one tag per line.
pub fn xml_tag_raw(name: &str, content: &str) -> String {
    format!("<{}>\n{}\n</{}>", name, content.trim(), name)
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builder for generation prompts.
///
/// Block order is fixed: task, instructions, context, inputs, constraints,
/// feedback, output-format.
#[derive(Debug, Default)]
pub struct PromptBuilder {
    task: Option<String>,
    instructions: Option<String>,
    context: Option<String>,
    inputs: Vec<(String, String)>,
    constraints: Vec<String>,
    feedback: Vec<String>,
    output_format: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short label for the request, e.g. "section" or "diagram".
    pub fn task(mut self, task: &str) -> Self {
        self.task = Some(task.to_string());
        self
    }

    pub fn instructions(mut self, instructions: &str) -> Self {
        self.instructions = Some(instructions.to_string());
        self
    }

    /// Additional material such as a proposal draft. Blank context is skipped.
    pub fn context(mut self, context: &str) -> Self {
        if !context.trim().is_empty() {
            self.context = Some(context.to_string());
        }
        self
    }

    pub fn input(mut self, label: &str, value: &str) -> Self {
        self.inputs.push((label.to_string(), value.to_string()));
        self
    }

    pub fn constraint(mut self, constraint: &str) -> Self {
        self.constraints.push(constraint.to_string());
        self
    }

    /// Issues reported for earlier attempts.
    pub fn feedback<I, S>(mut self, issues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.feedback
            .extend(issues.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn output_format(mut self, format: &str) -> Self {
        self.output_format = Some(format.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut blocks = Vec::new();

        if let Some(task) = &self.task {
            blocks.push(xml_tag("task", task));
        }
        if let Some(instructions) = &self.instructions {
            blocks.push(xml_tag_raw("instructions", instructions));
        }
        if let Some(context) = &self.context {
            blocks.push(xml_tag_raw("context", context));
        }
        if !self.inputs.is_empty() {
            let inputs: Vec<String> = self
                .inputs
                .iter()
                .map(|(label, value)| xml_tag(label, value))
                .collect();
            blocks.push(xml_tag_raw("inputs", &inputs.join("\n")));
        }
        if !self.constraints.is_empty() {
            blocks.push(xml_tag_raw("constraints", &bullet_list(&self.constraints)));
        }
        if !self.feedback.is_empty() {
            let content = format!(
                "IMPORTANT: The previous attempt failed due to these issues. \
                 Please ensure you address ALL of these problems:\n{}",
                bullet_list(&self.feedback)
            );
            blocks.push(xml_tag_raw("previous-issues", &content));
        }
        if let Some(output_format) = &self.output_format {
            blocks.push(xml_tag_raw("output-format", output_format));
        }

        blocks.join("\n")
    }
}

#[cfg(test)]
#[path = "tests/prompt_format_tests.rs"]
mod tests;

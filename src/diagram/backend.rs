use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no Graphviz renderer found (tried: {0})")]
    NotFound(String),

    #[error("renderer '{command}' failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("renderer produced no image at {0}")]
    OutputMissing(PathBuf),

    #[error("I/O error while rendering: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns DOT source into a PNG file.
pub trait RenderBackend: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, dot: &str, output: &Path) -> Result<(), RenderError>;
}

/// Renders through Graphviz command-line tools, trying each configured
/// command in order: `<cmd> -Tpng -o <output> <source.dot>`.
pub struct GraphvizCommand {
    candidates: Vec<String>,
}

impl GraphvizCommand {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    fn resolved(&self) -> Vec<PathBuf> {
        self.candidates
            .iter()
            .filter_map(|c| which::which(c).ok())
            .collect()
    }

    pub fn is_available(&self) -> bool {
        !self.resolved().is_empty()
    }

    fn run(&self, exe: &Path, source: &Path, output: &Path) -> Result<(), RenderError> {
        let result = Command::new(exe)
            .arg("-Tpng")
            .arg("-o")
            .arg(output)
            .arg(source)
            .output()?;
        if !result.status.success() {
            return Err(RenderError::Failed {
                command: exe.display().to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        let written = std::fs::metadata(output).map(|m| m.len() > 0).unwrap_or(false);
        if !written {
            return Err(RenderError::OutputMissing(output.to_path_buf()));
        }
        Ok(())
    }
}

impl RenderBackend for GraphvizCommand {
    fn name(&self) -> &str {
        "graphviz"
    }

    fn render(&self, dot: &str, output: &Path) -> Result<(), RenderError> {
        let executables = self.resolved();
        if executables.is_empty() {
            return Err(RenderError::NotFound(self.candidates.join(", ")));
        }

        let mut source = tempfile::Builder::new()
            .prefix("concept-diagram-")
            .suffix(".dot")
            .tempfile()?;
        source.write_all(dot.as_bytes())?;
        source.flush()?;

        let mut last_error = None;
        for exe in &executables {
            match self.run(exe, source.path(), output) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!("Renderer {} failed: {}", exe.display(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RenderError::NotFound(self.candidates.join(", "))))
    }
}

//! concept-forge: turns a project description into a technical concept
//! document by prompting a text-generation provider section by section,
//! reviewing each section, rendering Graphviz diagrams and filling a
//! Markdown template.

pub mod app;
pub mod bundle;
pub mod cancel;
pub mod concept_paths;
pub mod config;
pub mod diagram;
pub mod document;
pub mod errors;
pub mod events;
pub mod generation;
pub mod journal;
pub mod pipeline;
pub mod project;
pub mod prompt_format;
pub mod providers;
pub mod review;
pub mod run_log;
pub mod settings;

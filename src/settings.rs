//! Persisted user settings.
//!
//! Settings are a flat JSON object. Missing keys fall back to defaults,
//! unknown keys are rejected, and a handful of environment variables override
//! the stored values at load time.

use crate::errors::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a generated section is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    /// Word count plus keyword alignment.
    #[default]
    Heuristic,
    /// Word count plus a grading request to the provider.
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// One reviewed generation loop per section.
    #[default]
    Sectioned,
    /// One request for the whole concept, split by headers afterwards.
    SinglePass,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Sectioned => "sectioned",
            GenerationMode::SinglePass => "single_pass",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
    /// Minimum alignment (0.0 to 1.0) for a section to be accepted.
    pub alignment_threshold: f64,
    /// Generation attempts per section before falling back to the best one.
    pub max_attempts: u32,
    pub review_mode: ReviewMode,
    pub generation_mode: GenerationMode,
    pub output_directory: PathBuf,
    pub json_output_directory: PathBuf,
    pub templates_directory: PathBuf,
    pub selected_template: Option<String>,
    pub sections_file: Option<PathBuf>,
    pub initiator: String,
    pub render_diagrams: bool,
    /// Diagram renderers tried in order.
    pub dot_commands: Vec<String>,
    pub request_timeout_secs: u64,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Openai,
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            alignment_threshold: 0.6,
            max_attempts: 10,
            review_mode: ReviewMode::Heuristic,
            generation_mode: GenerationMode::Sectioned,
            output_directory: PathBuf::from("output"),
            json_output_directory: PathBuf::from("output/json"),
            templates_directory: PathBuf::from("templates"),
            selected_template: None,
            sections_file: None,
            initiator: String::new(),
            render_diagrams: true,
            dot_commands: vec!["dot".to_string()],
            request_timeout_secs: 120,
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

/// Environment variables that override stored settings when set and non-empty.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "openai_api_key"),
    ("OPENAI_MODEL", "openai_model"),
    ("OLLAMA_URL", "ollama_url"),
    ("OLLAMA_MODEL", "ollama_model"),
];

impl Settings {
    /// Reads settings from `path`. Invalid files are an error, never silently replaced.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Reads settings from `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let defaults = Self::default();
            defaults.save_atomic(path)?;
            tracing::info!(path = %path.display(), "created default settings file");
            return Ok(defaults);
        }
        Self::load(path)
    }

    /// Writes settings via a temporary file and rename.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings directory: {}", parent.display())
                })?;
            }
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write settings file: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace settings file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alignment_threshold) {
            return Err(ConfigError::invalid(
                "alignment_threshold",
                format!("{} is outside 0.0..=1.0", self.alignment_threshold),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "max_attempts",
                "at least one attempt is required",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "request_timeout_secs",
                "timeout must be positive",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "temperature",
                format!("{} is outside 0.0..=2.0", self.temperature),
            ));
        }
        if self.render_diagrams && self.dot_commands.is_empty() {
            return Err(ConfigError::invalid(
                "dot_commands",
                "diagrams are enabled but no renderer is configured",
            ));
        }
        Ok(())
    }

    /// Fails when the selected provider cannot be called with these settings.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        match self.provider {
            ProviderKind::Openai => match self.openai_api_key.as_deref() {
                Some(key) if !key.trim().is_empty() => Ok(()),
                _ => Err(ConfigError::MissingCredential(
                    "OpenAI API key (set `openai_api_key` or OPENAI_API_KEY)".to_string(),
                )),
            },
            ProviderKind::Ollama => {
                if self.ollama_url.trim().is_empty() {
                    Err(ConfigError::invalid("ollama_url", "URL must not be empty"))
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn apply_env_overrides(&mut self) {
        for (var, field) in ENV_OVERRIDES {
            let Ok(value) = std::env::var(var) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            match *field {
                "openai_api_key" => self.openai_api_key = Some(value),
                "openai_model" => self.openai_model = value,
                "ollama_url" => self.ollama_url = value,
                "ollama_model" => self.ollama_model = value,
                _ => {}
            }
            tracing::debug!(var = *var, "settings value overridden from environment");
        }
    }

    /// Model name used by the selected provider.
    pub fn active_model(&self) -> &str {
        match self.provider {
            ProviderKind::Openai => &self.openai_model,
            ProviderKind::Ollama => &self.ollama_model,
        }
    }

    /// Sets one key from its command-line text form.
    ///
    /// The value is read as JSON when it parses (numbers, booleans, arrays,
    /// `null`), otherwise as a plain string. `none` and the empty string clear
    /// optional keys.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let mut object = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            _ => return Err(ConfigError::invalid(key, "settings are not an object")),
        };
        let current = object
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let parsed = parse_setting_value(current, raw);
        let cleared = parsed.is_null();
        object.insert(key.to_string(), parsed);

        let updated: Settings = match serde_json::from_value(Value::Object(object.clone())) {
            Ok(updated) => updated,
            // Required text keys cannot be null; clearing them means empty.
            Err(_) if cleared => {
                object.insert(key.to_string(), Value::String(String::new()));
                serde_json::from_value(Value::Object(object))
                    .map_err(|e| ConfigError::invalid(key, e.to_string()))?
            }
            Err(e) => return Err(ConfigError::invalid(key, e.to_string())),
        };
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Key/value pairs for display, with the API key masked.
    pub fn display_pairs(&self) -> Vec<(String, String)> {
        let Ok(Value::Object(map)) = serde_json::to_value(self) else {
            return Vec::new();
        };
        map.into_iter()
            .map(|(key, value)| {
                let shown = match (key.as_str(), &value) {
                    ("openai_api_key", Value::String(s)) => mask_secret(s),
                    (_, Value::String(s)) => s.clone(),
                    (_, other) => other.to_string(),
                };
                (key, shown)
            })
            .collect()
    }
}

fn parse_setting_value(current: &Value, raw: &str) -> Value {
    let trimmed = raw.trim();
    let textual = current.is_string() || current.is_null();
    if textual && (trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none")) {
        return Value::Null;
    }
    match serde_json::from_str::<Value>(trimmed) {
        // Text settings stay text even when they look like numbers.
        Ok(parsed) if !(textual && !parsed.is_string()) => parsed,
        _ if current.is_array() => Value::Array(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        _ => Value::String(raw.to_string()),
    }
}

fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let head: String = secret.chars().take(3).collect();
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;

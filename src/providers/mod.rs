//! Text-generation providers.
//!
//! A provider takes a system prompt and a user prompt and returns one text
//! blob. Calls are blocking; the pipeline runs them on its worker thread.

pub mod ollama;
pub mod openai;
#[cfg(test)]
pub mod scripted;

use crate::errors::ConfigError;
use crate::settings::{ProviderKind, Settings};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// Regex pattern for detecting network-related failures in transport errors.
pub const NETWORK_ERROR_PATTERN: &str =
    r"(?i)connect|network|ECONNREFUSED|ETIMEDOUT|connection\s+refused|name\s+resolution|DNS|socket";

static NETWORK_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NETWORK_ERROR_PATTERN).expect("valid regex"));

/// Longest provider error body kept in messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("provider returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout(_)
            | ProviderError::EmptyResponse
            | ProviderError::MalformedResponse(_) => true,
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Authentication { .. } => false,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderError::Network(_) => "Network",
            ProviderError::Timeout(_) => "Timeout",
            ProviderError::Authentication { .. } => "Authentication",
            ProviderError::Http { .. } => "HTTP",
            ProviderError::MalformedResponse(_) => "Malformed Response",
            ProviderError::EmptyResponse => "Empty Response",
        }
    }

    /// Maps a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message_from_body(body);
        if status == 401 || status == 403 {
            ProviderError::Authentication { status, message }
        } else {
            ProviderError::Http { status, message }
        }
    }

    /// Classifies a transport failure from its message.
    pub fn from_transport(message: &str, timeout_secs: u64) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") {
            ProviderError::Timeout(timeout_secs)
        } else if NETWORK_ERROR.is_match(message) {
            ProviderError::Network(message.to_string())
        } else {
            ProviderError::Network(format!("request failed: {}", message))
        }
    }

    pub fn from_ureq(err: ureq::Error, timeout_secs: u64) -> Self {
        match err {
            ureq::Error::Timeout(_) => ProviderError::Timeout(timeout_secs),
            ureq::Error::StatusCode(status) => ProviderError::from_status(status, ""),
            other => ProviderError::from_transport(&other.to_string(), timeout_secs),
        }
    }
}

/// Prefers `error.message` from a JSON error body, else the truncated body.
fn error_message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return message.to_string();
        }
        if let Some(message) = value["error"].as_str() {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let head: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

pub trait TextProvider: Send + Sync {
    /// Provider identifier used in logs and metadata.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Sends one request and returns the trimmed response text.
    fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Blocking JSON POST shared by the HTTP providers. Non-2xx statuses become errors.
pub(crate) fn post_json(
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into();
    let body_str = serde_json::to_string(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("request encoding: {}", e)))?;

    let mut request = agent.post(url).header("Content-Type", "application/json");
    if let Some(token) = bearer {
        request = request.header("Authorization", &format!("Bearer {}", token));
    }

    let timeout_secs = timeout.as_secs();
    let mut response = request
        .send(&body_str)
        .map_err(|e| ProviderError::from_ureq(e, timeout_secs))?;
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ProviderError::from_ureq(e, timeout_secs))?;

    if !(200..300).contains(&status) {
        return Err(ProviderError::from_status(status, &text));
    }
    Ok(text)
}

/// Non-empty trimmed text or `EmptyResponse`.
pub(crate) fn non_empty(text: &str) -> Result<String, ProviderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Builds the provider selected in `settings`.
pub fn build_provider(settings: &Settings) -> Result<Box<dyn TextProvider>, ConfigError> {
    settings.require_credentials()?;
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    match settings.provider {
        ProviderKind::Openai => {
            let api_key = settings.openai_api_key.clone().ok_or_else(|| {
                ConfigError::MissingCredential("OpenAI API key".to_string())
            })?;
            Ok(Box::new(openai::OpenAiProvider::new(openai::OpenAiConfig {
                api_key,
                model: settings.openai_model.clone(),
                base_url: settings.openai_base_url.clone(),
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
                timeout,
            })))
        }
        ProviderKind::Ollama => Ok(Box::new(ollama::OllamaProvider::new(
            ollama::OllamaConfig {
                base_url: settings.ollama_url.clone(),
                model: settings.ollama_model.clone(),
                temperature: settings.temperature,
                timeout,
            },
        ))),
    }
}

#[cfg(test)]
#[path = "tests/providers_tests.rs"]
mod tests;

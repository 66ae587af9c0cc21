//! Ollama `/api/chat` provider for locally hosted models.

use super::{non_empty, post_json, ProviderError, TextProvider};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

pub struct OllamaProvider {
    config: OllamaConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }
}

impl TextProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));
        let body = request_body(&self.config, system, prompt);
        tracing::debug!(model = %self.config.model, url = %url, "ollama request");
        let response = post_json(&url, None, &body, self.config.timeout)?;
        parse_response(&response)
    }
}

/// Non-streaming chat request.
pub fn request_body(config: &OllamaConfig, system: &str, prompt: &str) -> Value {
    let mut messages = Vec::new();
    if !system.trim().is_empty() {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": prompt}));
    json!({
        "model": config.model,
        "messages": messages,
        "stream": false,
        "options": { "temperature": config.temperature },
    })
}

/// Extracts `message.content`; an `error` field is reported as-is.
pub fn parse_response(body: &str) -> Result<String, ProviderError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    if let Some(error) = value["error"].as_str() {
        return Err(ProviderError::MalformedResponse(error.to_string()));
    }
    let content = value["message"]["content"].as_str().ok_or_else(|| {
        ProviderError::MalformedResponse("missing message.content".to_string())
    })?;
    non_empty(content)
}

//! OpenAI chat-completions provider.

use super::{non_empty, post_json, ProviderError, TextProvider};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

pub struct OpenAiProvider {
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl TextProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let body = request_body(&self.config, system, prompt);
        tracing::debug!(model = %self.config.model, prompt_len = prompt.len(), "openai request");
        let response = post_json(
            &self.endpoint(),
            Some(&self.config.api_key),
            &body,
            self.config.timeout,
        )?;
        parse_response(&response)
    }
}

pub fn request_body(config: &OpenAiConfig, system: &str, prompt: &str) -> Value {
    let mut messages = Vec::new();
    if !system.trim().is_empty() {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": prompt}));
    json!({
        "model": config.model,
        "messages": messages,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    })
}

/// Extracts `choices[0].message.content`.
pub fn parse_response(body: &str) -> Result<String, ProviderError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    let content = value["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| {
            ProviderError::MalformedResponse("missing choices[0].message.content".to_string())
        })?;
    non_empty(content)
}

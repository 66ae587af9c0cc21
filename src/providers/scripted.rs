//! Scripted provider for tests: replays queued responses in order.

use super::{ProviderError, TextProvider};
use std::collections::VecDeque;
use std::sync::Mutex;

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
    on_call: Option<CallHook>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
            on_call: None,
        }
    }

    /// Returns `text` for every call once the queue is drained.
    pub fn repeating(text: &str) -> Self {
        Self::new(Vec::new()).with_fallback(text)
    }

    pub fn with_fallback(mut self, text: &str) -> Self {
        self.fallback = Some(text.to_string());
        self
    }

    /// Runs `hook` with the 1-based call number before each response.
    pub fn on_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl TextProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn complete(&self, _system: &str, prompt: &str) -> Result<String, ProviderError> {
        let call = {
            let mut prompts = self.prompts.lock().expect("prompt log poisoned");
            prompts.push(prompt.to_string());
            prompts.len()
        };
        if let Some(hook) = &self.on_call {
            hook(call);
        }
        let next = self
            .responses
            .lock()
            .expect("response queue poisoned")
            .pop_front();
        match (next, &self.fallback) {
            (Some(response), _) => response,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(ProviderError::MalformedResponse(
                "script exhausted".to_string(),
            )),
        }
    }
}

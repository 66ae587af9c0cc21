use super::*;
use crate::settings::Settings;

fn openai_config() -> openai::OpenAiConfig {
    openai::OpenAiConfig {
        api_key: "sk-test".to_string(),
        model: "gpt-4o".to_string(),
        base_url: "https://api.openai.com/v1/".to_string(),
        temperature: 0.7,
        max_tokens: 4000,
        timeout: Duration::from_secs(120),
    }
}

#[test]
fn test_openai_request_body() {
    let body = openai::request_body(&openai_config(), "be terse", "write the scope");
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["max_tokens"], 4000);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "write the scope");
}

#[test]
fn test_openai_request_skips_empty_system_prompt() {
    let body = openai::request_body(&openai_config(), "  ", "hello");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["role"], "user");
}

#[test]
fn test_openai_parse_response_trims_content() {
    let body = r#"{"choices":[{"message":{"role":"assistant","content":"  The system...\n"}}]}"#;
    assert_eq!(openai::parse_response(body).unwrap(), "The system...");
}

#[test]
fn test_openai_parse_response_errors() {
    assert!(matches!(
        openai::parse_response("not json"),
        Err(ProviderError::MalformedResponse(_))
    ));
    assert!(matches!(
        openai::parse_response(r#"{"choices":[]}"#),
        Err(ProviderError::MalformedResponse(_))
    ));
    assert_eq!(
        openai::parse_response(r#"{"choices":[{"message":{"content":"   "}}]}"#),
        Err(ProviderError::EmptyResponse)
    );
}

#[test]
fn test_ollama_request_is_not_streaming() {
    let config = ollama::OllamaConfig {
        base_url: "http://localhost:11434".to_string(),
        model: "llama3".to_string(),
        temperature: 0.7,
        timeout: Duration::from_secs(120),
    };
    let body = ollama::request_body(&config, "", "hi");
    assert_eq!(body["stream"], false);
    assert_eq!(body["model"], "llama3");
    assert_eq!(body["messages"][0]["content"], "hi");
}

#[test]
fn test_ollama_parse_response() {
    let body = r#"{"model":"llama3","message":{"role":"assistant","content":"Answer"},"done":true}"#;
    assert_eq!(ollama::parse_response(body).unwrap(), "Answer");
    let err = ollama::parse_response(r#"{"error":"model 'x' not found"}"#).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_status_classification() {
    assert!(matches!(
        ProviderError::from_status(401, r#"{"error":{"message":"Incorrect API key"}}"#),
        ProviderError::Authentication { status: 401, ref message } if message == "Incorrect API key"
    ));
    assert!(matches!(
        ProviderError::from_status(403, ""),
        ProviderError::Authentication { .. }
    ));
    let err = ProviderError::from_status(503, "upstream busy");
    assert_eq!(err.to_string(), "HTTP 503: upstream busy");
    assert!(err.is_retryable());
    assert!(!ProviderError::from_status(400, "").is_retryable());
}

#[test]
fn test_long_error_bodies_are_truncated() {
    let body = "e".repeat(1000);
    let ProviderError::Http { message, .. } = ProviderError::from_status(500, &body) else {
        panic!("expected HTTP error");
    };
    assert_eq!(message.chars().count(), MAX_ERROR_BODY_CHARS + 3);
}

#[test]
fn test_transport_classification() {
    assert_eq!(
        ProviderError::from_transport("operation timed out", 30),
        ProviderError::Timeout(30)
    );
    assert!(matches!(
        ProviderError::from_transport("Connection refused (os error 111)", 30),
        ProviderError::Network(ref m) if m.contains("refused")
    ));
    assert!(matches!(
        ProviderError::from_transport("weird failure", 30),
        ProviderError::Network(ref m) if m.starts_with("request failed")
    ));
}

#[test]
fn test_authentication_is_not_retryable() {
    let err = ProviderError::Authentication {
        status: 401,
        message: "bad key".to_string(),
    };
    assert!(!err.is_retryable());
    assert_eq!(err.display_name(), "Authentication");
}

#[test]
fn test_build_provider_requires_openai_key() {
    let settings = Settings::default();
    assert!(matches!(
        build_provider(&settings),
        Err(ConfigError::MissingCredential(_))
    ));
}

#[test]
fn test_build_provider_selects_kind() {
    let settings = Settings {
        provider: ProviderKind::Ollama,
        ollama_model: "mistral".to_string(),
        ..Settings::default()
    };
    let provider = build_provider(&settings).unwrap();
    assert_eq!(provider.name(), "ollama");
    assert_eq!(provider.model(), "mistral");

    let settings = Settings {
        openai_api_key: Some("sk-test".to_string()),
        ..Settings::default()
    };
    assert_eq!(build_provider(&settings).unwrap().name(), "openai");
}

#[test]
fn test_scripted_provider_replays_then_falls_back() {
    let provider = scripted::ScriptedProvider::new(vec![
        Err(ProviderError::EmptyResponse),
        Ok("first".to_string()),
    ])
    .with_fallback("again");
    assert_eq!(provider.complete("", "a"), Err(ProviderError::EmptyResponse));
    assert_eq!(provider.complete("", "b").unwrap(), "first");
    assert_eq!(provider.complete("", "c").unwrap(), "again");
    assert_eq!(provider.calls(), 3);
    assert_eq!(provider.prompts()[1], "b");
}

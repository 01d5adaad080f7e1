use crate::config::Settings;
use crate::http_client::{HttpClient, HttpResponse};
use crate::provider_kind::ProviderKind;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 512;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You turn a person's free-form description of a goal into a clear, committed intention.

Respond with EXACTLY three lines and nothing else:
Intention: <one sentence, first person, present tense, stating what I will do>
Why: <one sentence on why this matters to me>
Done when: <one concrete, observable sign that it is achieved>

RULES:
- Keep the person's own meaning; do not invent new goals
- No preamble, no markdown, no blank lines, no closing remarks
- Each line must start with its label exactly as shown";

/// The system instruction for a run: the custom prompt if set, else the default.
pub fn system_prompt(settings: &Settings) -> &str {
    settings
        .system_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
}

/// One provider's capabilities as seen by the resolver.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Cheap availability check. Never fails; problems mean "not detected".
    async fn detect(&self, settings: &Settings) -> bool;

    /// Issues one generation request and returns the trimmed response text.
    async fn generate(&self, settings: &Settings, system_prompt: &str, input: &str)
    -> Result<String>;
}

/// Liveness/listing endpoint for a provider.
pub(crate) fn models_url(kind: ProviderKind, settings: &Settings) -> Option<String> {
    match kind {
        ProviderKind::Ollama => settings.host_for(kind).map(|h| format!("{}/api/tags", h)),
        ProviderKind::LmStudio => settings.host_for(kind).map(|h| format!("{}/v1/models", h)),
        _ => kind.api_base().map(|base| format!("{}/models", base)),
    }
}

/// Authentication headers for key-based providers.
pub(crate) fn auth_headers(kind: ProviderKind, api_key: &str) -> Vec<(&'static str, String)> {
    match kind {
        ProviderKind::Anthropic => vec![
            ("x-api-key", api_key.to_string()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ],
        ProviderKind::OpenAi | ProviderKind::Groq => {
            vec![("Authorization", format!("Bearer {}", api_key))]
        }
        ProviderKind::Ollama | ProviderKind::LmStudio => Vec::new(),
    }
}

/// Extracts a readable message from a provider error body.
pub(crate) fn compact_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<Value>(body) {
        match payload.get("error") {
            Some(Value::String(message)) => return message.clone(),
            Some(Value::Object(err)) => {
                if let Some(message) = err.get("message").and_then(Value::as_str) {
                    return match err.get("type").and_then(Value::as_str) {
                        Some(kind) => format!("{} (type={})", message, kind),
                        None => message.to_string(),
                    };
                }
            }
            _ => {}
        }
    }
    let body = body.trim();
    if body.is_empty() {
        "empty response body".to_string()
    } else {
        body.to_string()
    }
}

pub(crate) fn ensure_success(kind: ProviderKind, response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(anyhow!(
        "{} API error ({}): {}",
        kind.label(),
        response.status,
        compact_error(&response.body)
    ))
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

/// A provider reached over its HTTP API.
pub struct HttpBackend {
    kind: ProviderKind,
    http: Arc<dyn HttpClient>,
}

impl HttpBackend {
    pub fn new(kind: ProviderKind, http: Arc<dyn HttpClient>) -> Self {
        Self { kind, http }
    }

    /// One backend per provider, in auto-detection priority order.
    pub fn all(http: Arc<dyn HttpClient>) -> Vec<Box<dyn LlmBackend>> {
        ProviderKind::PRIORITY
            .iter()
            .map(|kind| Box::new(Self::new(*kind, http.clone())) as Box<dyn LlmBackend>)
            .collect()
    }

    fn chat_url(&self, settings: &Settings) -> Result<String> {
        let kind = self.kind;
        let url = match kind {
            ProviderKind::Ollama => settings.host_for(kind).map(|h| format!("{}/api/chat", h)),
            ProviderKind::LmStudio => settings
                .host_for(kind)
                .map(|h| format!("{}/v1/chat/completions", h)),
            ProviderKind::Anthropic => kind.api_base().map(|b| format!("{}/messages", b)),
            ProviderKind::OpenAi | ProviderKind::Groq => {
                kind.api_base().map(|b| format!("{}/chat/completions", b))
            }
        };
        url.ok_or_else(|| anyhow!("No host configured for {}", kind.label()))
    }

    fn request_body(&self, model: &str, system_prompt: &str, input: &str) -> Value {
        match self.kind {
            ProviderKind::Ollama => json!({
                "model": model,
                "stream": false,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": input }
                ]
            }),
            ProviderKind::Anthropic => json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "system": system_prompt,
                "messages": [
                    { "role": "user", "content": input }
                ]
            }),
            ProviderKind::LmStudio | ProviderKind::OpenAi | ProviderKind::Groq => json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": input }
                ]
            }),
        }
    }

    fn extract_text(&self, body: &str) -> Result<String> {
        let label = self.kind.label();
        let text = match self.kind {
            ProviderKind::Ollama => {
                serde_json::from_str::<OllamaChatResponse>(body)
                    .with_context(|| format!("Unexpected {} response: {}", label, body))?
                    .message
                    .content
            }
            ProviderKind::Anthropic => {
                let parsed = serde_json::from_str::<AnthropicResponse>(body)
                    .with_context(|| format!("Unexpected {} response: {}", label, body))?;
                parsed
                    .content
                    .into_iter()
                    .filter_map(|block| block.text)
                    .collect::<Vec<_>>()
                    .join("")
            }
            ProviderKind::LmStudio | ProviderKind::OpenAi | ProviderKind::Groq => {
                serde_json::from_str::<ChatCompletionResponse>(body)
                    .with_context(|| format!("Unexpected {} response: {}", label, body))?
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| anyhow!("{} returned no choices", label))?
            }
        };
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl LlmBackend for HttpBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn detect(&self, settings: &Settings) -> bool {
        if self.kind.requires_api_key() {
            return settings.api_key_for(self.kind).is_some();
        }

        let Some(url) = models_url(self.kind, settings) else {
            return false;
        };
        match self.http.get(&url, &[], Some(PROBE_TIMEOUT)).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                debug!("{} probe at {} returned {}", self.kind.label(), url, response.status);
                false
            }
            Err(e) => {
                debug!("{} probe at {} failed: {}", self.kind.label(), url, e);
                false
            }
        }
    }

    async fn generate(
        &self,
        settings: &Settings,
        system_prompt: &str,
        input: &str,
    ) -> Result<String> {
        let url = self.chat_url(settings)?;
        let model = settings.model_for(self.kind);

        let headers = match settings.api_key_for(self.kind) {
            Some(key) if self.kind.requires_api_key() => auth_headers(self.kind, key),
            None if self.kind.requires_api_key() => {
                return Err(anyhow!("No API key configured for {}", self.kind.label()));
            }
            _ => Vec::new(),
        };
        let headers: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

        info!("Requesting refinement from {} ({})", self.kind.label(), model);
        let body = self.request_body(model, system_prompt, input);
        let response = self
            .http
            .post_json(&url, &headers, &body, Some(GENERATION_TIMEOUT))
            .await?;
        ensure_success(self.kind, &response)?;

        self.extract_text(&response.body)
    }
}

/// Offline backend for `INTENTION_USE_MOCK`. Always detected.
pub struct MockBackend {
    kind: ProviderKind,
}

impl MockBackend {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }

    pub fn all() -> Vec<Box<dyn LlmBackend>> {
        ProviderKind::PRIORITY
            .iter()
            .map(|kind| Box::new(Self::new(*kind)) as Box<dyn LlmBackend>)
            .collect()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn detect(&self, _settings: &Settings) -> bool {
        true
    }

    async fn generate(
        &self,
        _settings: &Settings,
        _system_prompt: &str,
        input: &str,
    ) -> Result<String> {
        let goal = input.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(format!(
            "Intention: I will {}\nWhy: It matters to me\nDone when: I can point to it finished",
            goal
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::testing::ScriptedHttpClient;
    use crate::provider_kind::ProviderChoice;

    fn backend(kind: ProviderKind, http: &Arc<ScriptedHttpClient>) -> HttpBackend {
        HttpBackend::new(kind, http.clone() as Arc<dyn HttpClient>)
    }

    #[test]
    fn test_system_prompt_defaults_and_custom() {
        let mut settings = Settings::default();
        assert_eq!(system_prompt(&settings), DEFAULT_SYSTEM_PROMPT);
        settings.system_prompt = Some("   ".to_string());
        assert_eq!(system_prompt(&settings), DEFAULT_SYSTEM_PROMPT);
        settings.system_prompt = Some("Custom".to_string());
        assert_eq!(system_prompt(&settings), "Custom");
    }

    #[test]
    fn test_default_prompt_describes_three_lines() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("EXACTLY three lines"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Intention:"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Why:"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Done when:"));
    }

    #[test]
    fn test_compact_error_shapes() {
        assert_eq!(
            compact_error(r#"{"error":{"message":"bad key","type":"auth"}}"#),
            "bad key (type=auth)"
        );
        assert_eq!(compact_error(r#"{"error":"model not found"}"#), "model not found");
        assert_eq!(compact_error("plain failure"), "plain failure");
        assert_eq!(compact_error(""), "empty response body");
    }

    #[tokio::test]
    async fn test_host_detection_requires_success_status() {
        let http = Arc::new(
            ScriptedHttpClient::new()
                .route("http://localhost:11434/api/tags", 200, r#"{"models":[]}"#)
                .route("http://localhost:1234/v1/models", 503, "loading"),
        );
        let settings = Settings::default();

        assert!(backend(ProviderKind::Ollama, &http).detect(&settings).await);
        assert!(!backend(ProviderKind::LmStudio, &http).detect(&settings).await);

        let recorded = http.recorded();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|r| r.method == "GET" && r.timeout == Some(PROBE_TIMEOUT)));
    }

    #[tokio::test]
    async fn test_host_detection_treats_transport_error_as_absent() {
        let http = Arc::new(ScriptedHttpClient::new());
        let settings = Settings::default();
        assert!(!backend(ProviderKind::Ollama, &http).detect(&settings).await);
    }

    #[tokio::test]
    async fn test_key_detection_makes_no_network_call() {
        let http = Arc::new(ScriptedHttpClient::new());
        let mut settings = Settings::default();

        assert!(!backend(ProviderKind::OpenAi, &http).detect(&settings).await);
        settings.set_api_key(ProviderKind::OpenAi, "sk-test");
        assert!(backend(ProviderKind::OpenAi, &http).detect(&settings).await);
        assert!(http.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_ollama_generation_request_and_trim() {
        let http = Arc::new(ScriptedHttpClient::new().route(
            "http://localhost:11434/api/chat",
            200,
            r#"{"message":{"role":"assistant","content":"\n  Intention: A\nWhy: B\nDone when: C  \n"}}"#,
        ));
        let mut settings = Settings::default();
        settings.set_model(ProviderKind::Ollama, "mistral");

        let text = backend(ProviderKind::Ollama, &http)
            .generate(&settings, "SYS", "ship the thing")
            .await
            .unwrap();

        assert_eq!(text, "Intention: A\nWhy: B\nDone when: C");
        let request = &http.recorded()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.timeout, Some(GENERATION_TIMEOUT));
        let body = request.body.as_ref().unwrap();
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"], "SYS");
        assert_eq!(body["messages"][1]["content"], "ship the thing");
    }

    #[tokio::test]
    async fn test_openai_generation_sends_bearer_header() {
        let http = Arc::new(ScriptedHttpClient::new().route(
            "https://api.openai.com/v1/chat/completions",
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"three\nlines\nhere"}}]}"#,
        ));
        let mut settings = Settings::default();
        settings.provider = ProviderChoice::Fixed(ProviderKind::OpenAi);
        settings.set_api_key(ProviderKind::OpenAi, "sk-abc");

        let text = backend(ProviderKind::OpenAi, &http)
            .generate(&settings, "SYS", "input")
            .await
            .unwrap();

        assert_eq!(text, "three\nlines\nhere");
        let request = &http.recorded()[0];
        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "Bearer sk-abc".to_string())));
        assert_eq!(request.body.as_ref().unwrap()["model"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_anthropic_generation_uses_system_field() {
        let http = Arc::new(ScriptedHttpClient::new().route(
            "https://api.anthropic.com/v1/messages",
            200,
            r#"{"content":[{"type":"text","text":"Intention: X\nWhy: Y\nDone when: Z"}]}"#,
        ));
        let mut settings = Settings::default();
        settings.set_api_key(ProviderKind::Anthropic, "sk-ant");

        let text = backend(ProviderKind::Anthropic, &http)
            .generate(&settings, "SYS", "input")
            .await
            .unwrap();

        assert_eq!(text, "Intention: X\nWhy: Y\nDone when: Z");
        let request = &http.recorded()[0];
        assert!(request.headers.contains(&("x-api-key".to_string(), "sk-ant".to_string())));
        let body = request.body.as_ref().unwrap();
        assert_eq!(body["system"], "SYS");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lmstudio_uses_configured_host() {
        let http = Arc::new(ScriptedHttpClient::new().route(
            "http://studio:9000/v1/chat/completions",
            200,
            r#"{"choices":[{"message":{"content":"ok"}}]}"#,
        ));
        let mut settings = Settings::default();
        settings.set_host(ProviderKind::LmStudio, "http://studio:9000/");

        let text = backend(ProviderKind::LmStudio, &http)
            .generate(&settings, "SYS", "input")
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_error_status_surfaces_provider_message() {
        let http = Arc::new(ScriptedHttpClient::new().route(
            "https://api.groq.com/openai/v1/chat/completions",
            401,
            r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#,
        ));
        let mut settings = Settings::default();
        settings.set_api_key(ProviderKind::Groq, "bad");

        let err = backend(ProviderKind::Groq, &http)
            .generate(&settings, "SYS", "input")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Groq API error (401)"), "{message}");
        assert!(message.contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_before_request() {
        let http = Arc::new(ScriptedHttpClient::new());
        let settings = Settings::default();

        let result = backend(ProviderKind::Anthropic, &http)
            .generate(&settings, "SYS", "input")
            .await;

        assert!(result.is_err());
        assert!(http.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_body_is_an_error() {
        let http = Arc::new(ScriptedHttpClient::new().route(
            "http://localhost:11434/api/chat",
            200,
            "<html>proxy</html>",
        ));
        let result = backend(ProviderKind::Ollama, &http)
            .generate(&Settings::default(), "SYS", "input")
            .await;
        assert!(result.unwrap_err().to_string().contains("Unexpected Ollama response"));
    }

    #[tokio::test]
    async fn test_mock_backend_produces_three_lines() {
        let mock = MockBackend::new(ProviderKind::Groq);
        assert!(mock.detect(&Settings::default()).await);
        let text = mock
            .generate(&Settings::default(), "SYS", "  run a\nmarathon ")
            .await
            .unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("Intention: I will run a marathon"));
    }
}

//! LLM access: one structured chat completion per call.
//!
//! The generator and validator only see the [`LlmClient`] trait. Two
//! implementations ship with the crate:
//!
//! * [`OpenAiClient`] talks to any OpenAI-compatible `/chat/completions`
//!   endpoint over reqwest and sends the schema as a strict
//!   `response_format`, so the server itself enforces the shape.
//! * [`ProviderClient`] wraps an `edgequake_llm::LLMProvider` (Anthropic,
//!   Gemini, Ollama, …). Those providers have no uniform strict-schema
//!   switch, so the schema is appended to the system message instead.
//!
//! Either way the local decode step in [`crate::schema`] is the final
//! authority on the response shape.
//!
//! No retries: a failed call fails the run.

use crate::config::StoryboardConfig;
use crate::error::StoryboardError;
use crate::schema::ResponseSchema;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One system + user exchange whose answer must match `schema`.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub system: String,
    pub user: String,
    pub schema: ResponseSchema,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// Token accounting for one or more calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
    }
}

/// Raw answer of a structured completion, before schema decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredResponse {
    /// The JSON text returned by the model.
    pub content: String,
    pub usage: TokenUsage,
}

impl StructuredResponse {
    /// Response with no usage accounting, handy for stubs.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// A chat-completion backend able to answer a [`StructuredRequest`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Execute one completion. Each call is independent; nothing is cached.
    async fn complete(
        &self,
        request: &StructuredRequest,
    ) -> Result<StructuredResponse, StoryboardError>;

    /// Short backend name used in logs and error messages.
    fn name(&self) -> &str;
}

// ── OpenAI-compatible HTTP client ─────────────────────────────────────────

/// Client for OpenAI-compatible chat completions with strict JSON schemas.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, StoryboardError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoryboardError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    /// Request body for `request`. Unset sampling options are omitted.
    pub fn build_body(&self, request: &StructuredRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user}
            ],
            "response_format": request.schema.response_format()
        });
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = request.max_tokens {
            body["max_completion_tokens"] = json!(n);
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        request: &StructuredRequest,
    ) -> Result<StructuredResponse, StoryboardError> {
        let body = self.build_body(request);
        debug!(
            "POST {} schema={} ({} bytes of user text)",
            self.endpoint(),
            request.schema.name,
            request.user.len()
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoryboardError::Transport {
                service: self.name().to_string(),
                detail: if e.is_timeout() {
                    format!("timed out: {e}")
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let text = response.text().await.map_err(|e| StoryboardError::Transport {
            service: self.name().to_string(),
            detail: format!("reading response body: {e}"),
        })?;

        check_status(self.name(), status.as_u16(), retry_after, &text)?;
        parse_completion(request.schema.name, &text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Map a non-2xx status to the matching error.
pub(crate) fn check_status(
    service: &str,
    status: u16,
    retry_after_secs: Option<u64>,
    body: &str,
) -> Result<(), StoryboardError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(StoryboardError::AuthError {
            service: service.to_string(),
            detail: truncate(body, 300),
        }),
        429 => Err(StoryboardError::RateLimitExceeded {
            service: service.to_string(),
            retry_after_secs,
        }),
        _ => Err(StoryboardError::HttpStatus {
            service: service.to_string(),
            status,
            body: truncate(body, 300),
        }),
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Pull the first choice's content out of a chat-completion envelope.
fn parse_completion(schema: &str, body: &str) -> Result<StructuredResponse, StoryboardError> {
    let violation = |detail: String| StoryboardError::SchemaViolation {
        schema: schema.to_string(),
        detail,
    };

    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| violation(format!("malformed chat completion: {e}")))?;
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| violation("completion has no choices".into()))?;

    if let Some(refusal) = choice.message.refusal.filter(|r| !r.is_empty()) {
        return Err(StoryboardError::Refusal {
            schema: schema.to_string(),
            message: refusal,
        });
    }
    let content = choice
        .message
        .content
        .ok_or_else(|| violation("completion message has no content".into()))?;

    let usage = completion
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(StructuredResponse { content, usage })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}\u{2026}")
    }
}

// ── edgequake-llm provider adapter ────────────────────────────────────────

/// Adapter from an `edgequake_llm` provider to [`LlmClient`].
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    name: String,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
        }
    }

    /// System message with the schema appended as an output instruction.
    pub fn system_with_schema(request: &StructuredRequest) -> String {
        let schema = serde_json::to_string_pretty(&request.schema.schema)
            .unwrap_or_else(|_| request.schema.schema.to_string());
        format!(
            "{}\n\nRespond with exactly one JSON object that conforms to this JSON schema. \
Do not wrap it in markdown fences and do not add any other keys or text.\n\n{}",
            request.system, schema
        )
    }
}

#[async_trait]
impl LlmClient for ProviderClient {
    async fn complete(
        &self,
        request: &StructuredRequest,
    ) -> Result<StructuredResponse, StoryboardError> {
        let messages = vec![
            ChatMessage::system(Self::system_with_schema(request)),
            ChatMessage::user(request.user.clone()),
        ];
        let options = CompletionOptions {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| StoryboardError::Transport {
                service: self.name.clone(),
                detail: format!("{}", e),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );

        Ok(StructuredResponse {
            content: response.content,
            usage: TokenUsage {
                prompt_tokens: response.prompt_tokens as u64,
                completion_tokens: response.completion_tokens as u64,
            },
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ── Client resolution ────────────────────────────────────────────────────

/// Resolve the LLM client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`), used as-is. Tests inject stubs
///    this way.
/// 2. **Named edgequake-llm provider** (`config.provider_name`) with
///    `config.model`.
/// 3. **OpenAI-compatible endpoint** when an API key is configured or
///    `OPENAI_API_KEY` is set. This is the only path with server-side
///    strict schema enforcement.
/// 4. **Auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_client(config: &StoryboardConfig) -> Result<Arc<dyn LlmClient>, StoryboardError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    if let Some(ref name) = config.provider_name {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            StoryboardError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(Arc::new(ProviderClient::new(provider, name.clone())));
    }

    let api_key = config
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|k| !k.is_empty());
    if let Some(key) = api_key {
        let client = OpenAiClient::new(
            config.api_base.clone(),
            key,
            config.model.clone(),
            config.api_timeout_secs,
        )?;
        return Ok(Arc::new(client));
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| StoryboardError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, or choose a provider with --provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(Arc::new(ProviderClient::new(provider, "auto")))
}

/// Scripted in-memory client shared by the crate's unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers each call with the next scripted response, recording requests.
    #[derive(Default)]
    pub(crate) struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, StoryboardError>>>,
        pub(crate) requests: Mutex<Vec<StructuredRequest>>,
    }

    impl ScriptedClient {
        pub(crate) fn new(replies: Vec<Result<String, StoryboardError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn ok(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(
            &self,
            request: &StructuredRequest,
        ) -> Result<StructuredResponse, StoryboardError> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(StoryboardError::Internal("script exhausted".into())))?;
            Ok(StructuredResponse {
                content: next,
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                },
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptVariant;
    use crate::schema::slide_schema;

    fn request() -> StructuredRequest {
        StructuredRequest {
            system: "sys".into(),
            user: "usr".into(),
            schema: slide_schema(PromptVariant::Classic),
            temperature: None,
            max_tokens: None,
        }
    }

    fn client() -> OpenAiClient {
        OpenAiClient::new("https://api.openai.com/v1/", "sk-test", "gpt-4o", 30).unwrap()
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        assert_eq!(client().endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn body_carries_messages_and_strict_schema() {
        let body = client().build_body(&request());
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["response_format"]["json_schema"]["name"], "slide_content");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_completion_tokens").is_none());
    }

    #[test]
    fn body_includes_sampling_options_when_set() {
        let mut req = request();
        req.temperature = Some(0.2);
        req.max_tokens = Some(800);
        let body = client().build_body(&req);
        assert!(body["temperature"].as_f64().is_some());
        assert_eq!(body["max_completion_tokens"], 800);
    }

    #[test]
    fn parse_completion_reads_content_and_usage() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"content\":\"c\",\"dialogue\":\"d\"}"}}],
                      "usage":{"prompt_tokens":12,"completion_tokens":5}}"#;
        let r = parse_completion("slide_content", body).unwrap();
        assert_eq!(r.content, r#"{"content":"c","dialogue":"d"}"#);
        assert_eq!(r.usage.prompt_tokens, 12);
        assert_eq!(r.usage.completion_tokens, 5);
    }

    #[test]
    fn parse_completion_surfaces_refusal() {
        let body = r#"{"choices":[{"message":{"content":null,"refusal":"I can't help with that."}}]}"#;
        let r = parse_completion("slide_content", body);
        assert!(matches!(r, Err(StoryboardError::Refusal { .. })));
    }

    #[test]
    fn parse_completion_rejects_empty_choices() {
        let r = parse_completion("slide_content", r#"{"choices":[]}"#);
        assert!(matches!(r, Err(StoryboardError::SchemaViolation { .. })));
    }

    #[test]
    fn status_mapping() {
        assert!(check_status("openai", 200, None, "").is_ok());
        assert!(matches!(
            check_status("openai", 401, None, "bad key"),
            Err(StoryboardError::AuthError { .. })
        ));
        assert!(matches!(
            check_status("openai", 429, Some(7), ""),
            Err(StoryboardError::RateLimitExceeded {
                retry_after_secs: Some(7),
                ..
            })
        ));
        assert!(matches!(
            check_status("openai", 503, None, "down"),
            Err(StoryboardError::HttpStatus { status: 503, .. })
        ));
    }

    #[test]
    fn provider_system_message_embeds_schema() {
        let s = ProviderClient::system_with_schema(&request());
        assert!(s.starts_with("sys\n\n"));
        assert!(s.contains("\"additionalProperties\": false"));
    }

    #[test]
    fn resolve_prefers_prebuilt_client() {
        let prebuilt: Arc<dyn LlmClient> = Arc::new(client());
        let config = StoryboardConfig::builder()
            .client(Arc::clone(&prebuilt))
            .build()
            .unwrap();
        let resolved = resolve_client(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &prebuilt));
    }

    #[test]
    fn truncate_long_bodies() {
        let long = "x".repeat(500);
        let t = truncate(&long, 10);
        assert_eq!(t.chars().count(), 11);
    }
}

//! Slide generation: one source text in, one [`SlidePayload`] out.
//!
//! The request is a fixed system prompt plus the source text embedded
//! verbatim in the user template, with the slide schema attached. The
//! answer goes through [`crate::schema::decode_slide`]; nothing is repaired.

use crate::config::{PromptVariant, StoryboardConfig};
use crate::error::StoryboardError;
use crate::output::SlidePayload;
use crate::pipeline::llm::{LlmClient, StructuredRequest, TokenUsage};
use crate::prompts;
use crate::schema::{decode_slide, slide_schema};
use std::sync::Arc;
use tracing::debug;

/// Turns a unit of source text into a slide via one LLM call.
#[derive(Clone)]
pub struct SlideGenerator {
    client: Arc<dyn LlmClient>,
    variant: PromptVariant,
    system_prompt: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl SlideGenerator {
    pub fn new(client: Arc<dyn LlmClient>, config: &StoryboardConfig) -> Self {
        let system_prompt = config
            .generation_system_prompt
            .clone()
            .unwrap_or_else(|| prompts::generation_system_prompt(config.variant).to_string());
        Self {
            client,
            variant: config.variant,
            system_prompt,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn variant(&self) -> PromptVariant {
        self.variant
    }

    /// Build the request for `text` without sending it.
    pub fn request(&self, text: &str) -> StructuredRequest {
        StructuredRequest {
            system: self.system_prompt.clone(),
            user: prompts::generation_user_prompt(text),
            schema: slide_schema(self.variant),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Generate a slide for `text`.
    pub async fn generate(&self, text: &str) -> Result<SlidePayload, StoryboardError> {
        self.generate_counted(text).await.map(|(slide, _)| slide)
    }

    /// Like [`generate`](Self::generate), also returning token usage.
    pub async fn generate_counted(
        &self,
        text: &str,
    ) -> Result<(SlidePayload, TokenUsage), StoryboardError> {
        if text.trim().is_empty() {
            return Err(StoryboardError::EmptyInput {
                what: "source text",
            });
        }

        let response = self.client.complete(&self.request(text)).await?;
        let slide = decode_slide(&response.content, self.variant)?;
        debug!(
            "Generated slide: {} chars content, {} chars dialogue",
            slide.content.len(),
            slide.dialogue.len()
        );
        Ok((slide, response.usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::testing::ScriptedClient;

    fn generator(client: Arc<ScriptedClient>, variant: PromptVariant) -> SlideGenerator {
        let config = StoryboardConfig::builder().variant(variant).build().unwrap();
        SlideGenerator::new(client, &config)
    }

    #[tokio::test]
    async fn generates_classic_slide() {
        let client = Arc::new(ScriptedClient::ok(&[
            r#"{"content":"Photosynthesis Overview","dialogue":"Let's discuss photosynthesis."}"#,
        ]));
        let g = generator(Arc::clone(&client), PromptVariant::Classic);

        let slide = g
            .generate("Photosynthesis converts light into chemical energy.")
            .await
            .unwrap();
        assert_eq!(slide.content, "Photosynthesis Overview");
        assert_eq!(slide.dialogue, "Let's discuss photosynthesis.");

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .user
            .contains("Photosynthesis converts light into chemical energy."));
        assert_eq!(requests[0].schema.name, "slide_content");
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_a_call() {
        let client = Arc::new(ScriptedClient::ok(&[]));
        let g = generator(Arc::clone(&client), PromptVariant::Titled);
        let r = g.generate("   \n").await;
        assert!(matches!(r, Err(StoryboardError::EmptyInput { .. })));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn schema_violation_propagates() {
        let client = Arc::new(ScriptedClient::ok(&[r#"{"content":"only content"}"#]));
        let g = generator(client, PromptVariant::Classic);
        let r = g.generate("text").await;
        assert!(matches!(r, Err(StoryboardError::SchemaViolation { .. })));
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let client = Arc::new(ScriptedClient::new(vec![Err(StoryboardError::Transport {
            service: "scripted".into(),
            detail: "connection reset".into(),
        })]));
        let g = generator(client, PromptVariant::Classic);
        let r = g.generate("text").await;
        assert!(r.unwrap_err().is_transport());
    }

    #[test]
    fn custom_system_prompt_is_used() {
        let config = StoryboardConfig::builder()
            .generation_system_prompt("Be brief.")
            .build()
            .unwrap();
        let g = SlideGenerator::new(Arc::new(ScriptedClient::default()), &config);
        assert_eq!(g.request("x").system, "Be brief.");
    }

    #[test]
    fn counted_usage_is_reported() {
        let client = Arc::new(ScriptedClient::ok(&[
            r#"{"title":"T","content":"c","dialogue":"d"}"#,
        ]));
        let g = generator(client, PromptVariant::Titled);
        let (slide, usage) = tokio_test::block_on(g.generate_counted("text")).unwrap();
        assert_eq!(slide.title.as_deref(), Some("T"));
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
    }
}

//! Groundedness validation: score a generated slide against its source.
//!
//! A second LLM call sees the source text and the slide side by side and
//! returns a 0–10 score plus feedback. Scores outside the range are handled
//! by [`ScorePolicy`].

use crate::config::{PromptVariant, ScorePolicy, StoryboardConfig};
use crate::error::StoryboardError;
use crate::output::{SlidePayload, ValidationResult};
use crate::pipeline::llm::{LlmClient, StructuredRequest, TokenUsage};
use crate::prompts;
use crate::schema::{decode_validation, validation_schema};
use std::sync::Arc;
use tracing::{debug, warn};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

/// Scores slides for groundedness via one LLM call each.
#[derive(Clone)]
pub struct GroundednessValidator {
    client: Arc<dyn LlmClient>,
    variant: PromptVariant,
    system_prompt: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    score_policy: ScorePolicy,
}

impl GroundednessValidator {
    pub fn new(client: Arc<dyn LlmClient>, config: &StoryboardConfig) -> Self {
        let system_prompt = config
            .validation_system_prompt
            .clone()
            .unwrap_or_else(|| prompts::validation_system_prompt(config.variant));
        Self {
            client,
            variant: config.variant,
            system_prompt,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            score_policy: config.score_policy,
        }
    }

    pub fn request(&self, text: &str, slide: &SlidePayload) -> StructuredRequest {
        StructuredRequest {
            system: self.system_prompt.clone(),
            user: prompts::validation_user_prompt(self.variant, text, slide),
            schema: validation_schema(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub async fn validate(
        &self,
        text: &str,
        slide: &SlidePayload,
    ) -> Result<ValidationResult, StoryboardError> {
        self.validate_counted(text, slide).await.map(|(v, _)| v)
    }

    pub async fn validate_counted(
        &self,
        text: &str,
        slide: &SlidePayload,
    ) -> Result<(ValidationResult, TokenUsage), StoryboardError> {
        if text.trim().is_empty() {
            return Err(StoryboardError::EmptyInput {
                what: "source text",
            });
        }
        if slide.content.trim().is_empty() {
            return Err(StoryboardError::EmptyInput {
                what: "slide content",
            });
        }
        if slide.dialogue.trim().is_empty() {
            return Err(StoryboardError::EmptyInput {
                what: "slide dialogue",
            });
        }
        if self.variant.requires_title()
            && slide.title.as_deref().map_or(true, |t| t.trim().is_empty())
        {
            return Err(StoryboardError::EmptyInput {
                what: "slide title",
            });
        }

        let response = self.client.complete(&self.request(text, slide)).await?;
        let mut result = decode_validation(&response.content)?;
        result.score = apply_score_policy(result.score, self.score_policy)?;
        debug!("Validated slide: score {:.1}", result.score);
        Ok((result, response.usage))
    }
}

/// Bring `score` into `[0, 10]` according to `policy`.
///
/// NaN and infinities are rejected under every policy.
pub fn apply_score_policy(score: f64, policy: ScorePolicy) -> Result<f64, StoryboardError> {
    if !score.is_finite() {
        return Err(StoryboardError::ScoreOutOfRange { score });
    }
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Ok(score);
    }
    match policy {
        ScorePolicy::Clamp => {
            let clamped = score.clamp(MIN_SCORE, MAX_SCORE);
            warn!("Groundedness score {} out of range, clamped to {}", score, clamped);
            Ok(clamped)
        }
        ScorePolicy::Reject => Err(StoryboardError::ScoreOutOfRange { score }),
    }
}

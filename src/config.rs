//! Configuration types for storyboard generation, extraction and formatting.
//!
//! Every knob of a stage lives in one struct built via a builder, so a config
//! can be shared between the driver, the generator and the validator without
//! any ambient globals. The LLM client itself is part of the config (or is
//! resolved from it), never a process-wide singleton.

use crate::error::StoryboardError;
use crate::pipeline::llm::LlmClient;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model for both generation and validation.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Configuration for a storyboard run (generator + validator + driver).
///
/// # Example
/// ```rust
/// use edgequake_storyboard::{PromptVariant, ScorePolicy, StoryboardConfig};
///
/// let config = StoryboardConfig::builder()
///     .model("gpt-4o")
///     .variant(PromptVariant::Titled)
///     .score_policy(ScorePolicy::Reject)
///     .output_dir("data/output")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct StoryboardConfig {
    /// Model identifier sent with every chat completion. Default: `gpt-4o`.
    pub model: String,

    /// Base URL of the OpenAI-compatible endpoint used by
    /// [`crate::pipeline::llm::OpenAiClient`].
    pub api_base: String,

    /// API key for the OpenAI-compatible endpoint. Falls back to
    /// `OPENAI_API_KEY` when `None`.
    pub api_key: Option<String>,

    /// edgequake-llm provider name (e.g. "anthropic", "ollama"). When set,
    /// requests go through [`crate::pipeline::llm::ProviderClient`].
    pub provider_name: Option<String>,

    /// Pre-constructed client. Takes precedence over everything else.
    pub client: Option<Arc<dyn LlmClient>>,

    /// Sampling temperature. Unset by default (provider default applies).
    pub temperature: Option<f32>,

    /// Completion token cap per call. Unset by default.
    pub max_tokens: Option<usize>,

    /// HTTP timeout per LLM call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Which prompt/schema pair to use. Default: [`PromptVariant::Titled`].
    pub variant: PromptVariant,

    /// What to do with a score outside 0–10. Default: [`ScorePolicy::Clamp`].
    pub score_policy: ScorePolicy,

    /// Custom generation system prompt. If None, uses the built-in default.
    pub generation_system_prompt: Option<String>,

    /// Custom validation system prompt. If None, uses the built-in default.
    pub validation_system_prompt: Option<String>,

    /// Directory that receives `<stem>_results.json`. Default: `data/output`.
    pub output_dir: PathBuf,

    /// Optional per-element progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StoryboardConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            provider_name: None,
            client: None,
            temperature: None,
            max_tokens: None,
            api_timeout_secs: 120,
            variant: PromptVariant::default(),
            score_policy: ScorePolicy::default(),
            generation_system_prompt: None,
            validation_system_prompt: None,
            output_dir: PathBuf::from("data/output"),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StoryboardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoryboardConfig")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("variant", &self.variant)
            .field("score_policy", &self.score_policy)
            .field("output_dir", &self.output_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl StoryboardConfig {
    /// Create a new builder for `StoryboardConfig`.
    pub fn builder() -> StoryboardConfigBuilder {
        StoryboardConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StoryboardConfig`].
#[derive(Debug)]
pub struct StoryboardConfigBuilder {
    config: StoryboardConfig,
}

impl StoryboardConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.config.api_base = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn variant(mut self, variant: PromptVariant) -> Self {
        self.config.variant = variant;
        self
    }

    pub fn score_policy(mut self, policy: ScorePolicy) -> Self {
        self.config.score_policy = policy;
        self
    }

    pub fn generation_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.generation_system_prompt = Some(prompt.into());
        self
    }

    pub fn validation_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.validation_system_prompt = Some(prompt.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StoryboardConfig, StoryboardError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(StoryboardError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.api_base.starts_with("http://") || c.api_base.starts_with("https://")) {
            return Err(StoryboardError::InvalidConfig(format!(
                "api_base must be an http(s) URL, got '{}'",
                c.api_base
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(StoryboardError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Versioned prompt/schema pair.
///
/// | Variant | Generation schema | Validator sees title |
/// |---------|-------------------|----------------------|
/// | `Classic` | content, dialogue | no |
/// | `Titled` | title, content, dialogue | yes (default) |
///
/// `Classic` is kept for reproducing older result files and is superseded by
/// `Titled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PromptVariant {
    /// content + dialogue only.
    Classic,
    /// title + content + dialogue. (default)
    #[default]
    Titled,
}

impl PromptVariant {
    pub fn requires_title(self) -> bool {
        matches!(self, PromptVariant::Titled)
    }
}

/// Handling of a groundedness score outside the 0–10 rubric.
///
/// NaN and infinities are rejected under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScorePolicy {
    /// Clamp into [0, 10] and log a warning. (default)
    #[default]
    Clamp,
    /// Fail with [`StoryboardError::ScoreOutOfRange`].
    Reject,
}

// ── Document-intelligence extraction ─────────────────────────────────────

/// Chunking parameters for the partition API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingOptions {
    pub strategy: String,
    /// Hard chunk size limit.
    pub max_characters: usize,
    /// Soft limit: start a new chunk after this many characters.
    pub new_after_n_chars: usize,
    /// Merge sections smaller than this into their neighbour.
    pub combine_under_n_chars: usize,
}

impl Default for ChunkingOptions {
    /// Very large title-based chunks: roughly one chunk per document section.
    fn default() -> Self {
        Self {
            strategy: "by_title".to_string(),
            max_characters: 120_000,
            new_after_n_chars: 100_000,
            combine_under_n_chars: 500,
        }
    }
}

/// Configuration for the document-intelligence partition call.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Partition endpoint URL.
    pub api_url: String,
    /// Sent as the `unstructured-api-key` header.
    pub api_key: String,
    /// Resolution mode. Default: `hi_res` (needed for tables and images).
    pub strategy: String,
    /// Default: `application/json`.
    pub output_format: String,
    /// Element types whose images are extracted. Default: Image, Table.
    pub extract_image_block_types: Vec<String>,
    /// Ask for HTML table structure. Default: true.
    pub pdf_infer_table_structure: bool,
    /// `None` partitions without chunking.
    pub chunking: Option<ChunkingOptions>,
    /// HTTP timeout in seconds. Default: 600 (hi_res on long PDFs is slow).
    pub timeout_secs: u64,
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("strategy", &self.strategy)
            .field("output_format", &self.output_format)
            .field("extract_image_block_types", &self.extract_image_block_types)
            .field("pdf_infer_table_structure", &self.pdf_infer_table_structure)
            .field("chunking", &self.chunking)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder(api_url: impl Into<String>, api_key: impl Into<String>) -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self {
                api_url: api_url.into(),
                api_key: api_key.into(),
                strategy: "hi_res".to_string(),
                output_format: "application/json".to_string(),
                extract_image_block_types: vec!["Image".to_string(), "Table".to_string()],
                pdf_infer_table_structure: true,
                chunking: None,
                timeout_secs: 600,
            },
        }
    }

    /// Multipart form fields, in the order they are sent.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("strategy", self.strategy.clone()),
            ("output_format", self.output_format.clone()),
        ];
        if let Some(ref c) = self.chunking {
            fields.push(("chunking_strategy", c.strategy.clone()));
            fields.push(("max_characters", c.max_characters.to_string()));
            fields.push(("new_after_n_chars", c.new_after_n_chars.to_string()));
            fields.push(("combine_under_n_chars", c.combine_under_n_chars.to_string()));
        }
        // The API expects a JSON-encoded list in a plain form field.
        let block_types = serde_json::to_string(&self.extract_image_block_types)
            .unwrap_or_else(|_| "[]".to_string());
        fields.push(("extract_image_block_types", block_types));
        fields.push((
            "pdf_infer_table_structure",
            self.pdf_infer_table_structure.to_string(),
        ));
        fields
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn strategy(mut self, s: impl Into<String>) -> Self {
        self.config.strategy = s.into();
        self
    }

    pub fn output_format(mut self, f: impl Into<String>) -> Self {
        self.config.output_format = f.into();
        self
    }

    pub fn extract_image_block_types(mut self, types: Vec<String>) -> Self {
        self.config.extract_image_block_types = types;
        self
    }

    pub fn pdf_infer_table_structure(mut self, v: bool) -> Self {
        self.config.pdf_infer_table_structure = v;
        self
    }

    pub fn chunking(mut self, options: ChunkingOptions) -> Self {
        self.config.chunking = Some(options);
        self
    }

    pub fn no_chunking(mut self) -> Self {
        self.config.chunking = None;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<ExtractionConfig, StoryboardError> {
        let c = &self.config;
        if c.api_url.trim().is_empty() {
            return Err(StoryboardError::InvalidConfig(
                "document-intelligence api_url is empty (set UNSTRUCTURED_API_URL)".into(),
            ));
        }
        if c.api_key.trim().is_empty() {
            return Err(StoryboardError::InvalidConfig(
                "document-intelligence api_key is empty (set UNSTRUCTURED_API_KEY)".into(),
            ));
        }
        if let Some(ref ch) = c.chunking {
            if ch.new_after_n_chars > ch.max_characters {
                return Err(StoryboardError::InvalidConfig(format!(
                    "new_after_n_chars ({}) exceeds max_characters ({})",
                    ch.new_after_n_chars, ch.max_characters
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Formatter ────────────────────────────────────────────────────────────

/// Configuration for [`crate::format::MoocFormatter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Directory that receives the rendered PDF. Default: `data/pdf_presentation`.
    pub output_dir: PathBuf,
    /// Prefix each slide cell with "Slide N". Default: true.
    pub number_slides: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/pdf_presentation"),
            number_slides: true,
        }
    }
}

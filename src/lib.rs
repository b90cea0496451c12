//! # edgequake-storyboard
//!
//! Turn a PDF into a MOOC storyboard: one slide plus instructor dialogue per
//! document section, each scored for groundedness against its source, and a
//! two-column PDF for review.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract   document-intelligence API → element JSON
//!  ├─ 2. Clean     drop metadata.orig_elements / metadata.image_base64
//!  ├─ 3. Generate  LLM call per element → {title, content, dialogue}
//!  ├─ 4. Validate  LLM call per slide  → {score 0–10, feedback}
//!  ├─ 5. Persist   <stem>_results.json, written once on full success
//!  └─ 6. Format    two-column PDF (slide | dialogue)
//! ```
//!
//! Steps 3 and 4 run strictly in order, one element at a time, and the batch
//! is all-or-nothing: any failure aborts the run with nothing written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_storyboard::{run_to_file, MoocFormatter, FormatterConfig, StoryboardConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Uses OPENAI_API_KEY, or any provider edgequake-llm can detect.
//!     let config = StoryboardConfig::default();
//!     let (results, stats) =
//!         run_to_file("data/processed_input/chunking_big_cleaned.json", &config).await?;
//!     eprintln!("{} slides, mean score {:?}", stats.elements, stats.mean_score);
//!
//!     let pdf = MoocFormatter::new(FormatterConfig::default()).format_results(&results)?;
//!     println!("{}", pdf.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `storyboard` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-storyboard = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod storyboard;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ChunkingOptions, ExtractionConfig, ExtractionConfigBuilder, FormatterConfig, PromptVariant,
    ScorePolicy, StoryboardConfig, StoryboardConfigBuilder,
};
pub use error::StoryboardError;
pub use format::MoocFormatter;
pub use output::{
    ResultBatch, RunOutput, RunStats, SlidePayload, SlideRecord, SlideResult, SourceUnit,
    ValidationResult,
};
pub use pipeline::clean::clean_file;
pub use pipeline::extract::{partition, partition_to_file};
pub use pipeline::generate::SlideGenerator;
pub use pipeline::llm::{LlmClient, OpenAiClient, ProviderClient, StructuredRequest, StructuredResponse};
pub use pipeline::sanitize::sanitize;
pub use pipeline::validate::GroundednessValidator;
pub use progress::{ElementStage, NoopProgressCallback, ProgressCallback, StoryboardProgressCallback};
pub use storyboard::{results_path_for, run, run_sync, run_to_file};

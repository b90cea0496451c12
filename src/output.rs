//! Data model for a storyboard run.
//!
//! ```text
//! SourceUnit ──▶ SlidePayload ──▶ ValidationResult
//!      │               └──────┬──────────┘
//!      └──── element_id ──▶ SlideResult ──▶ ResultBatch (persisted once)
//! ```
//!
//! `SlidePayload` and `ValidationResult` live for a single iteration of the
//! driver; `SlideResult` is built once per element and never mutated;
//! `ResultBatch` is the only artefact written to disk.

use crate::error::StoryboardError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One chunk of extracted document text, turned into exactly one slide.
///
/// Deserialises from a document-intelligence element; every field other
/// than `element_id` and `text` (`type`, `metadata`, …) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Opaque identifier, unique within a batch and carried into the output.
    pub element_id: String,
    /// Source text. Must be non-empty for generation.
    #[serde(default)]
    pub text: String,
}

impl SourceUnit {
    pub fn new(element_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            text: text.into(),
        }
    }
}

/// Structured slide produced by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlidePayload {
    /// Slide title; required by [`crate::config::PromptVariant::Titled`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Text that appears on the slide.
    pub content: String,
    /// Instructor narration for the slide.
    pub dialogue: String,
}

/// Groundedness verdict produced by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationResult {
    /// 0–10; see [`crate::config::ScorePolicy`] for out-of-range handling.
    pub score: f64,
    pub feedback: String,
}

/// The `result` object of a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub dialogue: String,
    pub groundedness_score: f64,
    pub feedback: String,
}

impl SlideRecord {
    /// Combine a generated slide with its validation verdict.
    pub fn new(payload: SlidePayload, validation: ValidationResult) -> Self {
        Self {
            title: payload.title,
            content: payload.content,
            dialogue: payload.dialogue,
            groundedness_score: validation.score,
            feedback: validation.feedback,
        }
    }
}

/// A durable record keyed by the originating element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideResult {
    pub element_id: String,
    pub result: SlideRecord,
}

/// Ordered results of one run: `batch[i]` belongs to `source_units[i]`.
///
/// Serialises as a bare JSON array of [`SlideResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultBatch(pub Vec<SlideResult>);

impl ResultBatch {
    pub fn new(results: Vec<SlideResult>) -> Self {
        Self(results)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SlideResult> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<SlideResult> {
        self.0
    }

    /// Pretty-printed UTF-8 JSON; non-ASCII characters are kept literal.
    pub fn to_json_pretty(&self) -> Result<String, StoryboardError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoryboardError::Internal(format!("serialise results: {e}")))
    }

    /// Read a batch previously written by [`ResultBatch::write_to`].
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, StoryboardError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| StoryboardError::from_read(path, e))?;
        serde_json::from_str(&raw).map_err(|e| StoryboardError::MalformedInput {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Write the batch to `path` in a single step.
    ///
    /// The JSON goes to a temp file in the same directory which is then
    /// renamed over `path`, so readers never observe a half-written batch.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<PathBuf, StoryboardError> {
        let json = self.to_json_pretty()?;
        write_atomic(path.as_ref(), json.as_bytes())?;
        Ok(path.as_ref().to_path_buf())
    }
}

impl<'a> IntoIterator for &'a ResultBatch {
    type Item = &'a SlideResult;
    type IntoIter = std::slice::Iter<'a, SlideResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Aggregate statistics for one storyboard run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of elements turned into slides.
    pub elements: usize,
    /// Lowest groundedness score in the batch (`None` for an empty batch).
    pub min_score: Option<f64>,
    /// Mean groundedness score (`None` for an empty batch).
    pub mean_score: Option<f64>,
    /// Sum of prompt tokens across generation and validation calls.
    pub total_input_tokens: u64,
    /// Sum of completion tokens across generation and validation calls.
    pub total_output_tokens: u64,
    pub generation_duration_ms: u64,
    pub validation_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunStats {
    pub(crate) fn record_scores(&mut self, batch: &ResultBatch) {
        self.elements = batch.len();
        let scores: Vec<f64> = batch.iter().map(|r| r.result.groundedness_score).collect();
        if scores.is_empty() {
            return;
        }
        self.min_score = scores.iter().copied().reduce(f64::min);
        self.mean_score = Some(scores.iter().sum::<f64>() / scores.len() as f64);
    }
}

/// What [`crate::storyboard::run`] returns: the batch plus run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub batch: ResultBatch,
    pub stats: RunStats,
}

/// Write `bytes` to `path` via a sibling temp file + rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoryboardError> {
    let write_err = |e: std::io::Error| StoryboardError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

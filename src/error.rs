//! Error types for the edgequake-storyboard library.
//!
//! A single fatal error type, [`StoryboardError`], covers every stage. The
//! storyboard run is all-or-nothing: one element that fails generation or
//! validation aborts the whole batch, so no per-element error is ever
//! stored alongside results.
//!
//! Variants are grouped by where the failure originates:
//!
//! * **Input**: the local element/result JSON is missing or malformed.
//! * **Transport**: a remote collaborator (LLM or document-intelligence API)
//!   could not be reached or answered with a non-2xx status.
//! * **Contract**: the remote answered, but not in the declared JSON shape.
//! * **Output**: writing the results file or rendering the PDF failed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-storyboard library.
#[derive(Debug, Error)]
pub enum StoryboardError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but its JSON is invalid or has the wrong shape.
    #[error("Malformed JSON in '{path}': {detail}")]
    MalformedInput { path: PathBuf, detail: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// A source element carries no text to build a slide from.
    #[error("Element '{element_id}' has empty text")]
    EmptySourceText { element_id: String },

    /// A required input string (source text, slide field) is empty.
    #[error("{what} must not be empty")]
    EmptyInput { what: &'static str },

    /// Two source elements share the same identifier.
    #[error("Duplicate element_id '{element_id}' in input batch")]
    DuplicateElementId { element_id: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The request never produced an HTTP response (DNS, TLS, timeout, …).
    #[error("{service} request failed: {detail}")]
    Transport { service: String, detail: String },

    /// The remote answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    HttpStatus {
        service: String,
        status: u16,
        body: String,
    },

    /// 401/403 from the API: the credential is missing or wrong.
    #[error("Authentication error from '{service}': {detail}")]
    AuthError { service: String, detail: String },

    /// HTTP 429. Not retried: the batch aborts.
    #[error("Rate limit exceeded for '{service}'")]
    RateLimitExceeded {
        service: String,
        retry_after_secs: Option<u64>,
    },

    /// The configured LLM provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Contract errors ───────────────────────────────────────────────────
    /// The LLM response does not match the declared JSON schema.
    #[error("Response does not match schema '{schema}': {detail}")]
    SchemaViolation { schema: String, detail: String },

    /// The model declined to answer in the structured format.
    #[error("Model refused to produce '{schema}': {message}")]
    Refusal { schema: String, message: String },

    /// Groundedness score outside 0–10 under [`crate::config::ScorePolicy::Reject`].
    #[error("Groundedness score {score} is outside the range 0–10")]
    ScoreOutOfRange { score: f64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PDF assembly failed.
    #[error("Failed to render PDF: {detail}")]
    RenderFailed { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoryboardError {
    /// True for failures that happened before or during the network exchange
    /// (as opposed to a well-formed response with the wrong content).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StoryboardError::Transport { .. }
                | StoryboardError::HttpStatus { .. }
                | StoryboardError::AuthError { .. }
                | StoryboardError::RateLimitExceeded { .. }
        )
    }

    /// Map a `std::io::Error` raised while opening `path` to the matching variant.
    pub(crate) fn from_read(path: &std::path::Path, e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => StoryboardError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => StoryboardError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => StoryboardError::MalformedInput {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violation_display() {
        let e = StoryboardError::SchemaViolation {
            schema: "slide_content".into(),
            detail: "missing field `dialogue`".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("slide_content"), "got: {msg}");
        assert!(msg.contains("dialogue"), "got: {msg}");
    }

    #[test]
    fn http_status_display() {
        let e = StoryboardError::HttpStatus {
            service: "openai".into(),
            status: 500,
            body: "upstream".into(),
        };
        assert!(e.to_string().contains("HTTP 500"));
        assert!(e.is_transport());
    }

    #[test]
    fn score_out_of_range_display() {
        let e = StoryboardError::ScoreOutOfRange { score: 11.5 };
        assert!(e.to_string().contains("11.5"));
        assert!(!e.is_transport());
    }

    #[test]
    fn from_read_maps_not_found() {
        let e = StoryboardError::from_read(
            std::path::Path::new("missing.json"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(e, StoryboardError::FileNotFound { .. }));
    }

    #[test]
    fn rate_limit_display() {
        let e = StoryboardError::RateLimitExceeded {
            service: "openai".into(),
            retry_after_secs: Some(30),
        };
        assert!(e.to_string().contains("openai"));
    }
}

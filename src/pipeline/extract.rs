//! Document-intelligence client: PDF in, element JSON out.
//!
//! One multipart POST per document. The PDF goes in the `files` part; every
//! other option from [`ExtractionConfig::form_fields`] is a plain text field.
//! The response is kept as an untyped [`Value`] so that element fields this
//! crate never reads survive into the saved file unchanged.

use crate::config::ExtractionConfig;
use crate::error::StoryboardError;
use crate::output::write_atomic;
use crate::pipeline::input::resolve_pdf;
use crate::pipeline::llm::check_status;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const SERVICE: &str = "unstructured";
const API_KEY_HEADER: &str = "unstructured-api-key";

/// Send `pdf` to the partition endpoint and return the parsed element JSON.
pub async fn partition(
    pdf: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<Value, StoryboardError> {
    let pdf = resolve_pdf(pdf)?;
    let bytes = tokio::fs::read(&pdf)
        .await
        .map_err(|e| StoryboardError::from_read(&pdf, e))?;
    let file_name = pdf
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    let form = build_form(bytes, file_name, config)?;
    let transport = |detail: String| StoryboardError::Transport {
        service: SERVICE.to_string(),
        detail,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| StoryboardError::Internal(format!("HTTP client: {e}")))?;

    info!(
        "Partitioning {} (strategy={}, chunking={})",
        pdf.display(),
        config.strategy,
        config
            .chunking
            .as_ref()
            .map(|c| c.strategy.as_str())
            .unwrap_or("none")
    );
    let start = Instant::now();

    let response = client
        .post(&config.api_url)
        .header(API_KEY_HEADER, &config.api_key)
        .multipart(form)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                transport(format!("timed out after {}s", config.timeout_secs))
            } else {
                transport(e.to_string())
            }
        })?;

    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| transport(format!("reading response body: {e}")))?;
    check_status(SERVICE, status, None, &text)?;

    let value: Value = serde_json::from_str(&text).map_err(|e| StoryboardError::SchemaViolation {
        schema: "partition_response".to_string(),
        detail: e.to_string(),
    })?;

    debug!(
        "Partition returned {} elements in {}ms",
        value.as_array().map(Vec::len).unwrap_or(0),
        start.elapsed().as_millis()
    );
    Ok(value)
}

/// [`partition`] and save the result as 4-space-indented JSON at `output`.
pub async fn partition_to_file(
    pdf: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<PathBuf, StoryboardError> {
    let value = partition(pdf, config).await?;
    let output = output.as_ref();
    write_atomic(output, &to_json_indent4(&value, output)?)?;
    info!("Element JSON saved to {}", output.display());
    Ok(output.to_path_buf())
}

fn build_form(
    bytes: Vec<u8>,
    file_name: String,
    config: &ExtractionConfig,
) -> Result<Form, StoryboardError> {
    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("application/pdf")
        .map_err(|e| StoryboardError::Internal(format!("multipart part: {e}")))?;

    let mut form = Form::new().part("files", part);
    for (name, value) in config.form_fields() {
        form = form.text(name, value);
    }
    Ok(form)
}

/// Pretty-print with a 4-space indent, non-ASCII left as-is.
pub(crate) fn to_json_indent4<T: Serialize>(
    value: &T,
    path: &Path,
) -> Result<Vec<u8>, StoryboardError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| StoryboardError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indent4_keeps_non_ascii() {
        let bytes = to_json_indent4(&json!([{"text": "café"}]), Path::new("x.json")).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.contains("\n    {"), "got: {s}");
        assert!(s.contains("café"));
    }

    #[test]
    fn form_builds_for_default_config() {
        let config = ExtractionConfig::builder("http://localhost:8000/general/v0/general", "k")
            .build()
            .unwrap();
        assert!(build_form(b"%PDF-1.4".to_vec(), "a.pdf".into(), &config).is_ok());
    }

    #[tokio::test]
    async fn partition_rejects_non_pdf_before_sending() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"not a pdf").unwrap();
        let config = ExtractionConfig::builder("http://127.0.0.1:9/", "k")
            .build()
            .unwrap();
        let r = partition(f.path(), &config).await;
        assert!(matches!(r, Err(StoryboardError::NotAPdf { .. })));
    }
}

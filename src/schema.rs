//! Structured-output contracts for the two LLM calls.
//!
//! Each call declares a strict JSON schema (sent to providers that support
//! `response_format: json_schema`) and every response, whatever the backend,
//! goes through the matching `decode_*` function. Decoding never repairs a
//! response: missing fields, extra fields, wrong types or empty strings are
//! all [`StoryboardError::SchemaViolation`].

use crate::config::PromptVariant;
use crate::error::StoryboardError;
use crate::output::{SlidePayload, ValidationResult};
use serde_json::{json, Value};

/// Schema name for slide generation responses.
pub const SLIDE_SCHEMA_NAME: &str = "slide_content";

/// Schema name for validation responses.
pub const VALIDATION_SCHEMA_NAME: &str = "slide_validation";

/// A named JSON schema for a structured completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
}

impl ResponseSchema {
    /// The OpenAI `response_format` object for this schema.
    pub fn response_format(&self) -> Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.name,
                "schema": self.schema,
                "strict": true
            }
        })
    }
}

/// Schema for [`SlidePayload`] under `variant`.
pub fn slide_schema(variant: PromptVariant) -> ResponseSchema {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    if variant.requires_title() {
        properties.insert(
            "title".into(),
            json!({"type": "string", "description": "A short title for the slide"}),
        );
        required.push("title");
    }
    properties.insert(
        "content".into(),
        json!({"type": "string", "description": "The content that will appear on the slide"}),
    );
    properties.insert(
        "dialogue".into(),
        json!({"type": "string", "description": "The instructor's dialogue for this slide"}),
    );
    required.extend(["content", "dialogue"]);

    ResponseSchema {
        name: SLIDE_SCHEMA_NAME,
        schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        }),
    }
}

/// Schema for [`ValidationResult`].
pub fn validation_schema() -> ResponseSchema {
    ResponseSchema {
        name: VALIDATION_SCHEMA_NAME,
        schema: json!({
            "type": "object",
            "properties": {
                "score": {
                    "type": "number",
                    "description": "Groundedness score from 0 to 10"
                },
                "feedback": {
                    "type": "string",
                    "description": "Explanation of the score and any issues found"
                }
            },
            "required": ["score", "feedback"],
            "additionalProperties": false
        }),
    }
}

/// Decode a generation response into a [`SlidePayload`].
pub fn decode_slide(raw: &str, variant: PromptVariant) -> Result<SlidePayload, StoryboardError> {
    let violation = |detail: String| StoryboardError::SchemaViolation {
        schema: SLIDE_SCHEMA_NAME.to_string(),
        detail,
    };

    let value = parse_object(raw).map_err(violation)?;
    if !variant.requires_title() && value.get("title").is_some() {
        return Err(violation("unexpected field `title`".into()));
    }

    let payload: SlidePayload =
        serde_json::from_value(value).map_err(|e| violation(e.to_string()))?;

    if variant.requires_title() {
        match payload.title.as_deref() {
            None => return Err(violation("missing field `title`".into())),
            Some(t) if t.trim().is_empty() => return Err(violation("`title` is empty".into())),
            Some(_) => {}
        }
    }
    if payload.content.trim().is_empty() {
        return Err(violation("`content` is empty".into()));
    }
    if payload.dialogue.trim().is_empty() {
        return Err(violation("`dialogue` is empty".into()));
    }
    Ok(payload)
}

/// Decode a validation response into a [`ValidationResult`].
///
/// Only the shape is checked here; range handling of `score` belongs to
/// [`crate::pipeline::validate`].
pub fn decode_validation(raw: &str) -> Result<ValidationResult, StoryboardError> {
    let violation = |detail: String| StoryboardError::SchemaViolation {
        schema: VALIDATION_SCHEMA_NAME.to_string(),
        detail,
    };

    let value = parse_object(raw).map_err(violation)?;
    let result: ValidationResult =
        serde_json::from_value(value).map_err(|e| violation(e.to_string()))?;

    if result.feedback.trim().is_empty() {
        return Err(violation("`feedback` is empty".into()));
    }
    Ok(result)
}

fn parse_object(raw: &str) -> Result<Value, String> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| format!("invalid JSON: {e}"))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(format!("expected a JSON object, got {}", type_name(&value)))
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Strip bulky metadata from element JSON before generation.
//!
//! Chunked partitions repeat every source element under
//! `metadata.orig_elements`, and hi_res extraction embeds images as
//! `metadata.image_base64`. Neither is used downstream.

use crate::error::StoryboardError;
use crate::output::write_atomic;
use crate::pipeline::extract::to_json_indent4;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ORIG_ELEMENTS: &str = "orig_elements";
pub const IMAGE_BASE64: &str = "image_base64";

/// Remove `metadata.<field>` from every element of `elements`.
///
/// Returns how many elements had the field. Non-array input and elements
/// without an object `metadata` are left untouched.
pub fn strip_metadata_field(elements: &mut Value, field: &str) -> usize {
    let Some(items) = elements.as_array_mut() else {
        return 0;
    };
    items
        .iter_mut()
        .filter_map(|el| el.get_mut("metadata").and_then(Value::as_object_mut))
        .filter_map(|meta| meta.remove(field))
        .count()
}

/// Load `input`, strip each of `fields`, and write the result to `output`.
pub fn clean_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    fields: &[&str],
) -> Result<PathBuf, StoryboardError> {
    let input = input.as_ref();
    let output = output.as_ref();

    let raw = std::fs::read_to_string(input).map_err(|e| StoryboardError::from_read(input, e))?;
    let mut value: Value =
        serde_json::from_str(&raw).map_err(|e| StoryboardError::MalformedInput {
            path: input.to_path_buf(),
            detail: e.to_string(),
        })?;
    if !value.is_array() {
        return Err(StoryboardError::MalformedInput {
            path: input.to_path_buf(),
            detail: "expected a JSON array of elements".into(),
        });
    }

    for field in fields {
        let n = strip_metadata_field(&mut value, field);
        info!("Removed metadata.{} from {} elements", field, n);
    }

    write_atomic(output, &to_json_indent4(&value, output)?)?;
    info!("Cleaned JSON saved to {}", output.display());
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_only_named_field() {
        let mut v = json!([
            {"element_id": "a", "text": "x", "metadata": {"orig_elements": "zz", "page_number": 1}},
            {"element_id": "b", "text": "y", "metadata": {"page_number": 2}},
            {"element_id": "c", "text": "z"}
        ]);
        assert_eq!(strip_metadata_field(&mut v, ORIG_ELEMENTS), 1);
        assert_eq!(v[0]["metadata"], json!({"page_number": 1}));
        assert_eq!(v[1]["metadata"], json!({"page_number": 2}));
        assert_eq!(v[2]["text"], "z");
    }

    #[test]
    fn non_array_is_untouched() {
        let mut v = json!({"metadata": {"image_base64": "AAAA"}});
        assert_eq!(strip_metadata_field(&mut v, IMAGE_BASE64), 0);
        assert!(v["metadata"].get("image_base64").is_some());
    }

    #[test]
    fn clean_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("chunked.json");
        std::fs::write(
            &input,
            r#"[{"element_id":"a","text":"t","metadata":{"orig_elements":"..","image_base64":"AA"}}]"#,
        )
        .unwrap();
        let output = dir.path().join("out/cleaned.json");

        clean_file(&input, &output, &[ORIG_ELEMENTS, IMAGE_BASE64]).unwrap();

        let cleaned: Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(cleaned[0]["metadata"], json!({}));
        assert_eq!(cleaned[0]["text"], "t");
    }

    #[test]
    fn clean_file_rejects_object_root() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.json");
        std::fs::write(&input, "{}").unwrap();
        let r = clean_file(&input, dir.path().join("o.json"), &[ORIG_ELEMENTS]);
        assert!(matches!(r, Err(StoryboardError::MalformedInput { .. })));
    }
}

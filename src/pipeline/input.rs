//! Input resolution: load local files and check them before any API call.
//!
//! Two inputs exist: the PDF sent to the document-intelligence service, and
//! the element JSON it produces, from which [`SourceUnit`]s are read. Both
//! are checked up front so that an unreadable file or a malformed element
//! fails before the first billable request.

use crate::error::StoryboardError;
use crate::output::SourceUnit;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Validate that `path` is a readable PDF (checks the `%PDF` magic bytes).
pub fn resolve_pdf(path: impl AsRef<Path>) -> Result<PathBuf, StoryboardError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(StoryboardError::FileNotFound { path });
    }

    let mut f = std::fs::File::open(&path).map_err(|e| StoryboardError::from_read(&path, e))?;
    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(StoryboardError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Read the element JSON at `path` and return its source units in order.
pub fn load_source_units(path: impl AsRef<Path>) -> Result<Vec<SourceUnit>, StoryboardError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| StoryboardError::from_read(path, e))?;
    let units = parse_source_units(&raw).map_err(|detail| StoryboardError::MalformedInput {
        path: path.to_path_buf(),
        detail,
    })?;
    debug!("Loaded {} source units from {}", units.len(), path.display());
    Ok(units)
}

/// Parse a JSON array of elements into source units.
///
/// Each element must carry a string `element_id`; `text` may be absent and
/// is then treated as empty (rejected later by [`check_units`]).
pub fn parse_source_units(json: &str) -> Result<Vec<SourceUnit>, String> {
    serde_json::from_str::<Vec<SourceUnit>>(json).map_err(|e| e.to_string())
}

/// Enforce batch invariants: non-empty text, unique identifiers.
pub fn check_units(units: &[SourceUnit]) -> Result<(), StoryboardError> {
    if units.is_empty() {
        warn!("Input batch has no elements; the result file will be an empty array");
    }
    let mut seen = HashSet::with_capacity(units.len());
    for unit in units {
        if unit.text.trim().is_empty() {
            return Err(StoryboardError::EmptySourceText {
                element_id: unit.element_id.clone(),
            });
        }
        if !seen.insert(unit.element_id.as_str()) {
            return Err(StoryboardError::DuplicateElementId {
                element_id: unit.element_id.clone(),
            });
        }
    }
    Ok(())
}

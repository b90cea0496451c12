//! Pipeline stages for PDF-to-storyboard conversion.
//!
//! Each submodule implements one step.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ clean ──▶ input ──▶ generate ──▶ validate ──▶ (results JSON)
//! (PDF→JSON)  (strip)   (units)    (LLM)        (LLM)
//!
//! (results JSON) ──▶ sanitize ──▶ layout ──▶ render ──▶ PDF
//! ```
//!
//! 1. [`extract`]  : send the PDF to the document-intelligence API
//! 2. [`clean`]    : drop bulky `metadata` fields from the element JSON
//! 3. [`input`]    : load and check [`crate::output::SourceUnit`]s
//! 4. [`generate`] : one slide per unit; [`llm`] carries the call
//! 5. [`validate`] : groundedness score for each slide
//! 6. [`sanitize`] : reduce model text to the renderer's inline markup
//! 7. [`layout`]   : font metrics and line wrapping
//! 8. [`render`]   : paginated two-column table as PDF bytes

pub mod clean;
pub mod extract;
pub mod generate;
pub mod input;
pub mod layout;
pub mod llm;
pub mod render;
pub mod sanitize;
pub mod validate;


//! Progress-callback trait for per-element storyboard events.
//!
//! Inject an [`Arc<dyn StoryboardProgressCallback>`] via
//! [`crate::config::StoryboardConfigBuilder::progress_callback`] to observe a
//! run as each element goes through generation and validation.
//!
//! Elements are processed strictly in order on one task, so events for
//! element `n + 1` never start before element `n` has finished. The trait is
//! still `Send + Sync` so a callback can forward to another thread.
//!
//! # Example
//!
//! ```rust
//! use edgequake_storyboard::{StoryboardConfig, StoryboardProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl StoryboardProgressCallback for CountingCallback {
//!     fn on_element_complete(&self, index: usize, total: usize, element_id: &str, score: f64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} scored {:.1}", index, total, element_id, score);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = StoryboardConfig::builder()
//!     .progress_callback(counter as Arc<dyn StoryboardProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Which call an element is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementStage {
    Generating,
    Validating,
}

/// Called by the driver as it processes each element.
///
/// All methods default to no-ops. `index` is 1-based.
pub trait StoryboardProgressCallback: Send + Sync {
    /// Called once, after the input has been validated.
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before each LLM call for an element.
    fn on_element_stage(&self, index: usize, total: usize, element_id: &str, stage: ElementStage) {
        let _ = (index, total, element_id, stage);
    }

    /// Called when an element has been generated and validated.
    fn on_element_complete(&self, index: usize, total: usize, element_id: &str, score: f64) {
        let _ = (index, total, element_id, score);
    }

    /// Called when an element fails. The run aborts right after.
    fn on_element_error(&self, index: usize, total: usize, element_id: &str, error: &str) {
        let _ = (index, total, element_id, error);
    }

    /// Called once after the batch has been assembled (not called on abort).
    fn on_run_complete(&self, total: usize) {
        let _ = total;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl StoryboardProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StoryboardConfig`].
pub type ProgressCallback = Arc<dyn StoryboardProgressCallback>;

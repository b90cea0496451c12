//! Result formatter: a persisted [`ResultBatch`] rendered as a PDF table.
//!
//! One row per slide: the left cell shows the slide (title and content),
//! the right cell the instructor dialogue. All text is passed through
//! [`sanitize`] before layout.

use crate::config::FormatterConfig;
use crate::error::StoryboardError;
use crate::output::{write_atomic, ResultBatch, SlideResult};
use crate::pipeline::render::render_table;
use crate::pipeline::sanitize::sanitize;
use crate::storyboard::RESULTS_SUFFIX;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const SLIDE_HEADER: &str = "Slide Content";
pub const DIALOGUE_HEADER: &str = "Instructor Dialogue";

/// Renders result batches into `<output_dir>/<name>.pdf`.
#[derive(Debug, Clone, Default)]
pub struct MoocFormatter {
    config: FormatterConfig,
}

impl MoocFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Read the batch at `input_file` and render it.
    ///
    /// The PDF is named after the input stem with `_results` replaced by
    /// `_pdf`. Errors are logged and returned.
    pub fn format_results(&self, input_file: impl AsRef<Path>) -> Result<PathBuf, StoryboardError> {
        let input_file = input_file.as_ref();
        let result = ResultBatch::read_from(input_file).and_then(|batch| {
            let stem = input_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "storyboard".to_string());
            self.create_pdf(&batch, &pdf_name_for(&stem))
        });

        match result {
            Ok(path) => {
                info!("PDF successfully generated at: {}", path.display());
                Ok(path)
            }
            Err(e) => {
                error!("Error formatting results from {}: {}", input_file.display(), e);
                Err(e)
            }
        }
    }

    /// Render `batch` to `<output_dir>/<name>.pdf` and return the path.
    pub fn create_pdf(&self, batch: &ResultBatch, name: &str) -> Result<PathBuf, StoryboardError> {
        let rows: Vec<[String; 2]> = batch
            .iter()
            .enumerate()
            .map(|(i, r)| self.row(i + 1, r))
            .collect();
        let bytes = render_table([SLIDE_HEADER, DIALOGUE_HEADER], &rows)?;

        let path = self.config.output_dir.join(format!("{name}.pdf"));
        write_atomic(&path, &bytes)?;
        Ok(path)
    }

    fn row(&self, number: usize, item: &SlideResult) -> [String; 2] {
        let record = &item.result;
        let content = sanitize(&record.content);
        let heading = match (self.config.number_slides, record.title.as_deref()) {
            (true, Some(title)) => Some(format!("Slide {}: {}", number, sanitize(title))),
            (true, None) => Some(format!("Slide {}", number)),
            (false, Some(title)) => Some(sanitize(title)),
            (false, None) => None,
        };
        let left = match heading {
            Some(h) if content.is_empty() => format!("<b>{h}</b>"),
            Some(h) => format!("<b>{h}</b><br/>{content}"),
            None => content,
        };
        [left, sanitize(&record.dialogue)]
    }
}

/// PDF base name for a results stem: `x_results` → `x_pdf`.
pub fn pdf_name_for(stem: &str) -> String {
    stem.replace(RESULTS_SUFFIX, "_pdf")
}

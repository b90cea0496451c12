//! Storyboard driver: source units in, one persisted result batch out.
//!
//! Elements are processed strictly in input order, one at a time: generate,
//! then validate, then move on. The run is all-or-nothing. The first element
//! that fails aborts the batch, partial results are dropped, and no file is
//! written. A file at `<output_dir>/<stem>_results.json` therefore always
//! holds a complete batch.

use crate::config::StoryboardConfig;
use crate::error::StoryboardError;
use crate::output::{ResultBatch, RunOutput, RunStats, SlideRecord, SlideResult, SourceUnit};
use crate::pipeline::generate::SlideGenerator;
use crate::pipeline::input;
use crate::pipeline::llm::{resolve_client, TokenUsage};
use crate::pipeline::validate::GroundednessValidator;
use crate::progress::ElementStage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// Suffix appended to the input stem to name the results file.
pub const RESULTS_SUFFIX: &str = "_results";

/// Generate and validate one slide per unit, in order.
///
/// # Errors
/// Input checks (empty text, duplicate ids) fail before any LLM call. After
/// that, the first generation or validation error is returned as-is and the
/// results gathered so far are discarded.
pub async fn run(
    units: &[SourceUnit],
    config: &StoryboardConfig,
) -> Result<RunOutput, StoryboardError> {
    let total_start = Instant::now();
    input::check_units(units)?;

    let client = resolve_client(config)?;
    info!(
        "Starting storyboard run: {} elements via {} ({:?} prompts)",
        units.len(),
        client.name(),
        config.variant
    );
    let generator = SlideGenerator::new(client.clone(), config);
    let validator = GroundednessValidator::new(client, config);

    let total = units.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut results = Vec::with_capacity(total);
    let mut usage = TokenUsage::default();
    let mut stats = RunStats::default();

    for (i, unit) in units.iter().enumerate() {
        let index = i + 1;
        match process_element(index, total, unit, &generator, &validator, config, &mut stats).await
        {
            Ok((result, element_usage)) => {
                info!(
                    "Element {}/{} '{}' done: groundedness {:.1}",
                    index, total, unit.element_id, result.result.groundedness_score
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_element_complete(
                        index,
                        total,
                        &unit.element_id,
                        result.result.groundedness_score,
                    );
                }
                usage += element_usage;
                results.push(result);
            }
            Err(e) => {
                error!(
                    "Element {}/{} '{}' failed, aborting run: {}",
                    index, total, unit.element_id, e
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_element_error(index, total, &unit.element_id, &e.to_string());
                }
                return Err(e);
            }
        }
    }

    let batch = ResultBatch::new(results);
    stats.record_scores(&batch);
    stats.total_input_tokens = usage.prompt_tokens;
    stats.total_output_tokens = usage.completion_tokens;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Storyboard run complete: {} slides, {}ms total",
        batch.len(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total);
    }

    Ok(RunOutput { batch, stats })
}

async fn process_element(
    index: usize,
    total: usize,
    unit: &SourceUnit,
    generator: &SlideGenerator,
    validator: &GroundednessValidator,
    config: &StoryboardConfig,
    stats: &mut RunStats,
) -> Result<(SlideResult, TokenUsage), StoryboardError> {
    info!("Generating slide for element '{}' ({}/{})", unit.element_id, index, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_element_stage(index, total, &unit.element_id, ElementStage::Generating);
    }
    let start = Instant::now();
    let (slide, mut usage) = generator.generate_counted(&unit.text).await?;
    stats.generation_duration_ms += start.elapsed().as_millis() as u64;

    info!("Validating slide for element '{}' ({}/{})", unit.element_id, index, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_element_stage(index, total, &unit.element_id, ElementStage::Validating);
    }
    let start = Instant::now();
    let (validation, validation_usage) = validator.validate_counted(&unit.text, &slide).await?;
    stats.validation_duration_ms += start.elapsed().as_millis() as u64;
    usage += validation_usage;

    Ok((
        SlideResult {
            element_id: unit.element_id.clone(),
            result: SlideRecord::new(slide, validation),
        },
        usage,
    ))
}

/// Load units from `input_path`, [`run`] them, and persist the batch.
///
/// The file is written once, after every element has succeeded, to
/// [`results_path_for`]`(input_path, config.output_dir)`.
pub async fn run_to_file(
    input_path: impl AsRef<Path>,
    config: &StoryboardConfig,
) -> Result<(PathBuf, RunStats), StoryboardError> {
    let input_path = input_path.as_ref();
    let units = input::load_source_units(input_path)?;
    let output = run(&units, config).await?;

    let path = results_path_for(input_path, &config.output_dir);
    output.batch.write_to(&path)?;
    info!("Results saved to {}", path.display());
    Ok((path, output.stats))
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    units: &[SourceUnit],
    config: &StoryboardConfig,
) -> Result<RunOutput, StoryboardError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| StoryboardError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(units, config))
}

/// `<output_dir>/<input stem>_results.json`.
pub fn results_path_for(input_path: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> PathBuf {
    let stem = input_path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "storyboard".to_string());
    output_dir
        .as_ref()
        .join(format!("{stem}{RESULTS_SUFFIX}.json"))
}

//! CLI binary for edgequake-storyboard.
//!
//! A thin shim over the library crate: each subcommand maps its flags to a
//! config struct, calls one library entry point and prints a summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_storyboard::pipeline::clean::{IMAGE_BASE64, ORIG_ELEMENTS};
use edgequake_storyboard::{
    clean_file, partition_to_file, run_to_file, ChunkingOptions, ElementStage, ExtractionConfig,
    FormatterConfig, MoocFormatter, ProgressCallback, PromptVariant, RunStats, ScorePolicy,
    StoryboardConfig, StoryboardProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished element.
struct CliProgressCallback {
    bar: ProgressBar,
    element_start: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading elements…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            element_start: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.element_start
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl StoryboardProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Generating");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Building {total} slides…"))
        ));
    }

    fn on_element_stage(&self, _index: usize, _total: usize, element_id: &str, stage: ElementStage) {
        if stage == ElementStage::Generating {
            if let Ok(mut s) = self.element_start.lock() {
                *s = Some(Instant::now());
            }
        }
        let verb = match stage {
            ElementStage::Generating => "generating",
            ElementStage::Validating => "validating",
        };
        self.bar.set_message(format!("{verb} {element_id}"));
    }

    fn on_element_complete(&self, index: usize, total: usize, element_id: &str, score: f64) {
        let score_str = format!("{score:>4.1}/10");
        let score_str = if score >= 8.0 {
            green(&score_str)
        } else if score >= 6.0 {
            cyan(&score_str)
        } else {
            red(&score_str)
        };
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            index,
            total,
            score_str,
            dim(element_id),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_element_error(&self, index: usize, total: usize, element_id: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            dim(element_id),
            red(&msg),
        ));
        self.bar.finish_and_clear();
    }

    fn on_run_complete(&self, total: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!("{} {} slides generated", green("✔"), bold(&total.to_string()));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full pipeline: PDF → elements → cleaned → slides → storyboard PDF
  storyboard all data/input/markdown_manual.pdf

  # Extraction only, with large title-based chunks
  storyboard extract --chunking data/input/manual.pdf -o data/processed_input/chunking_big.json

  # Drop bulky metadata
  storyboard clean data/processed_input/chunking_big.json

  # Generate and validate slides (writes data/output/<stem>_results.json)
  storyboard generate data/processed_input/chunking_big_cleaned.json

  # Render an existing result file
  storyboard format data/output/chunking_big_cleaned_results.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (strict JSON-schema output)
  OPENAI_API_BASE         OpenAI-compatible endpoint base URL
  EDGEQUAKE_PROVIDER      edgequake-llm provider (anthropic, gemini, ollama, …)
  EDGEQUAKE_MODEL         Model ID
  UNSTRUCTURED_API_KEY    Document-intelligence API key
  UNSTRUCTURED_API_URL    Document-intelligence partition endpoint
  RUST_LOG                Log filter override

A .env file in the working directory is loaded automatically.
"#;

/// Turn PDF documents into MOOC slide/dialogue storyboards.
#[derive(Parser, Debug)]
#[command(
    name = "storyboard",
    version,
    about = "Turn PDF documents into MOOC slide/dialogue storyboards",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "STORYBOARD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "STORYBOARD_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "STORYBOARD_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Partition a PDF into element JSON via the document-intelligence API.
    Extract {
        /// Local PDF file.
        pdf: PathBuf,
        /// Where to write the element JSON. Default: data/processed_input/<stem>.json
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        extract: ExtractArgs,
    },
    /// Strip metadata.orig_elements and metadata.image_base64 from element JSON.
    Clean {
        input: PathBuf,
        /// Default: <input stem>_cleaned.json next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Metadata field to remove (repeatable).
        #[arg(long = "field", default_values_t = [ORIG_ELEMENTS.to_string(), IMAGE_BASE64.to_string()])]
        fields: Vec<String>,
    },
    /// Generate and validate one slide per element.
    Generate {
        /// Element JSON (array of {element_id, text, …}).
        input: PathBuf,
        #[command(flatten)]
        generate: GenerateArgs,
    },
    /// Render a result file as a two-column PDF.
    Format {
        /// A `<stem>_results.json` file.
        input: PathBuf,
        #[command(flatten)]
        format: FormatArgs,
    },
    /// extract → clean → generate → format.
    All {
        pdf: PathBuf,
        /// Directory for intermediate element JSON.
        #[arg(long, env = "STORYBOARD_PROCESSED_DIR", default_value = "data/processed_input")]
        processed_dir: PathBuf,
        #[command(flatten)]
        extract: ExtractArgs,
        #[command(flatten)]
        generate: GenerateArgs,
        #[command(flatten)]
        format: FormatArgs,
    },
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Partition endpoint URL.
    #[arg(long, env = "UNSTRUCTURED_API_URL")]
    api_url: Option<String>,

    /// Partition API key.
    #[arg(long, env = "UNSTRUCTURED_API_KEY", hide_env_values = true)]
    unstructured_key: Option<String>,

    /// Partition strategy.
    #[arg(long, default_value = "hi_res")]
    strategy: String,

    /// Chunk by title into very large sections (one slide per section).
    #[arg(long)]
    chunking: bool,

    /// Hard chunk size limit (with --chunking).
    #[arg(long, default_value_t = 120_000)]
    max_characters: usize,

    /// Soft chunk size limit (with --chunking).
    #[arg(long, default_value_t = 100_000)]
    new_after_n_chars: usize,

    /// Merge sections shorter than this (with --chunking).
    #[arg(long, default_value_t = 500)]
    combine_under_n_chars: usize,

    /// HTTP timeout for the partition call, in seconds.
    #[arg(long, default_value_t = 600)]
    extract_timeout: u64,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Directory for `<stem>_results.json`.
    #[arg(long, env = "STORYBOARD_OUTPUT_DIR", default_value = "data/output")]
    output_dir: PathBuf,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = "gpt-4o")]
    model: String,

    /// edgequake-llm provider: anthropic, gemini, ollama, openai, …
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "Route requests through an edgequake-llm provider instead of the\n\
          OpenAI-compatible endpoint. The schema is then enforced locally only."
    )]
    provider: Option<String>,

    /// OpenAI-compatible base URL.
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Prompt/schema variant.
    #[arg(long, value_enum, default_value = "titled")]
    variant: VariantArg,

    /// What to do with a groundedness score outside 0–10.
    #[arg(long, value_enum, default_value = "clamp")]
    score_policy: ScorePolicyArg,

    /// Sampling temperature (0.0–2.0). Provider default if unset.
    #[arg(long, env = "STORYBOARD_TEMPERATURE")]
    temperature: Option<f32>,

    /// Completion token cap per call.
    #[arg(long, env = "STORYBOARD_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "STORYBOARD_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Print run statistics as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Directory for the rendered PDF.
    #[arg(long, env = "STORYBOARD_PDF_DIR", default_value = "data/pdf_presentation")]
    pdf_dir: PathBuf,

    /// Omit the "Slide N" prefix in the slide column.
    #[arg(long)]
    no_slide_numbers: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VariantArg {
    Titled,
    Classic,
}

impl From<VariantArg> for PromptVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Titled => PromptVariant::Titled,
            VariantArg::Classic => PromptVariant::Classic,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScorePolicyArg {
    Clamp,
    Reject,
}

impl From<ScorePolicyArg> for ScorePolicy {
    fn from(v: ScorePolicyArg) -> Self {
        match v {
            ScorePolicyArg::Clamp => ScorePolicy::Clamp,
            ScorePolicyArg::Reject => ScorePolicy::Reject,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With the progress bar active, INFO logs would interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Extract {
            pdf,
            output,
            extract,
        } => {
            let output = output
                .clone()
                .unwrap_or_else(|| Path::new("data/processed_input").join(stem_json(pdf, "")));
            let path = run_extract(pdf, &output, extract).await?;
            if !cli.quiet {
                eprintln!("{} Elements saved to {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        Command::Clean {
            input,
            output,
            fields,
        } => {
            let output = output.clone().unwrap_or_else(|| cleaned_path_for(input));
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let path = clean_file(input, &output, &fields).context("Cleaning failed")?;
            if !cli.quiet {
                eprintln!("{} Cleaned JSON saved to {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        Command::Generate { input, generate } => {
            run_generate(&cli, input, generate, show_progress).await?;
        }
        Command::Format { input, format } => {
            let path = formatter(format)
                .format_results(input)
                .context("Formatting failed")?;
            if !cli.quiet {
                eprintln!("{} PDF saved to {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        Command::All {
            pdf,
            processed_dir,
            extract,
            generate,
            format,
        } => {
            let elements = processed_dir.join(stem_json(pdf, ""));
            let cleaned = processed_dir.join(stem_json(pdf, "_cleaned"));

            // Extraction and cleanup failures are reported and skipped: a
            // previous run may already have left usable files behind.
            if let Err(e) = run_extract(pdf, &elements, extract).await {
                warn!("Extraction failed: {:#}", e);
                eprintln!("{} Extraction failed: {:#}", red("✘"), e);
            }
            let fields = [ORIG_ELEMENTS, IMAGE_BASE64];
            if let Err(e) = clean_file(&elements, &cleaned, &fields) {
                warn!("Cleaning failed: {}", e);
                eprintln!("{} Cleaning failed: {}", red("✘"), e);
            }

            let results = run_generate(&cli, &cleaned, generate, show_progress).await?;
            let path = formatter(format)
                .format_results(&results)
                .context("Formatting failed")?;
            if !cli.quiet {
                eprintln!("{} PDF saved to {}", green("✔"), bold(&path.display().to_string()));
            }
        }
    }

    Ok(())
}

async fn run_extract(pdf: &Path, output: &Path, args: &ExtractArgs) -> Result<PathBuf> {
    let api_url = args
        .api_url
        .clone()
        .context("UNSTRUCTURED_API_URL is not set (or pass --api-url)")?;
    let api_key = args
        .unstructured_key
        .clone()
        .context("UNSTRUCTURED_API_KEY is not set (or pass --unstructured-key)")?;

    let mut builder = ExtractionConfig::builder(api_url, api_key)
        .strategy(args.strategy.clone())
        .timeout_secs(args.extract_timeout);
    if args.chunking {
        builder = builder.chunking(ChunkingOptions {
            max_characters: args.max_characters,
            new_after_n_chars: args.new_after_n_chars,
            combine_under_n_chars: args.combine_under_n_chars,
            ..Default::default()
        });
    }
    let config = builder.build().context("Invalid extraction configuration")?;

    partition_to_file(pdf, output, &config)
        .await
        .context("Extraction failed")
}

/// Run generation and return the path of the results file.
async fn run_generate(
    cli: &Cli,
    input: &Path,
    args: &GenerateArgs,
    show_progress: bool,
) -> Result<PathBuf> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn StoryboardProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress)?;

    let (path, stats) = run_to_file(input, &config)
        .await
        .context("Storyboard generation failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        print_summary(&path, &stats);
    }
    Ok(path)
}

/// Map CLI args to `StoryboardConfig`.
fn build_config(args: &GenerateArgs, progress: Option<ProgressCallback>) -> Result<StoryboardConfig> {
    let mut builder = StoryboardConfig::builder()
        .model(args.model.clone())
        .variant(args.variant.into())
        .score_policy(args.score_policy.into())
        .api_timeout_secs(args.api_timeout)
        .output_dir(args.output_dir.clone());

    if let Some(ref base) = args.api_base {
        builder = builder.api_base(base.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(t) = args.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = args.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn formatter(args: &FormatArgs) -> MoocFormatter {
    MoocFormatter::new(FormatterConfig {
        output_dir: args.pdf_dir.clone(),
        number_slides: !args.no_slide_numbers,
    })
}

fn print_summary(path: &Path, stats: &RunStats) {
    let score = match (stats.mean_score, stats.min_score) {
        (Some(mean), Some(min)) => format!("mean {mean:.1}  min {min:.1}"),
        _ => "no slides".to_string(),
    };
    eprintln!(
        "{}  {} slides  {}  {}ms  →  {}",
        green("✔"),
        stats.elements,
        score,
        stats.total_duration_ms,
        bold(&path.display().to_string()),
    );
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
    );
}

/// `<stem><suffix>.json` for `path`.
fn stem_json(path: &Path, suffix: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}{suffix}.json")
}

fn cleaned_path_for(input: &Path) -> PathBuf {
    input.with_file_name(stem_json(input, "_cleaned"))
}

//! CLI binary for edgequake-img2csv.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints CSV. Only CSV (or `--json`) goes to stdout;
//! logs, the spinner and the summary all go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2csv::{
    extract, extract_to_file, ExtractionConfig, ExtractionProgressCallback, ProgressCallback,
    ReplayOcrEngine, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner on stderr naming the running stage, with one log line per
/// finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }
}

fn unit_for(stage: Stage) -> &'static str {
    match stage {
        Stage::Load | Stage::Preprocess => "px long side",
        Stage::Ocr => "detections",
        Stage::Group => "text rows",
        Stage::Assemble | Stage::MergeSections => "CSV rows",
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut started) = self.stage_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(stage.label());
    }

    fn on_stage_complete(&self, stage: Stage, items: usize) {
        let elapsed_ms = self
            .stage_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} {:<15} {:<22} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{items:>6} {}", unit_for(stage))),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_extraction_complete(&self, csv_rows: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} CSV rows extracted", green("✔"), bold(&csv_rows.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan to CSV on stdout
  img2csv -i spec-sheet.jpg > sheet.csv

  # Write to a file
  img2csv -i spec-sheet.jpg -o sheet.csv

  # Download the image first
  img2csv -i https://example.com/scans/order-17.png

  # Replay recorded OCR output instead of calling a model
  img2csv -i spec-sheet.jpg --detections spec-sheet.ocr.json

  # Drop shaky detections
  img2csv -i spec-sheet.jpg --min-confidence 0.4

DETECTION DUMP FORMAT (--detections):
  A JSON array of [quad, text, confidence] tuples or
  {"quad": ..., "text": ..., "confidence": ...} objects, where quad is
  [[x,y],[x,y],[x,y],[x,y]] clockwise from the top-left corner.

ENVIRONMENT VARIABLES:
  IMG2CSV_INPUT           Default for --input
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (logs go to stderr)
"#;

/// Recover tables and key/value pairs from scanned images as CSV.
#[derive(Parser, Debug)]
#[command(
    name = "img2csv",
    version,
    about = "Recover tables and key/value pairs from scanned images as CSV",
    long_about = "Run OCR over a scanned or photographed document and rebuild its rows from \
the geometry of the recognised text. Short aligned cells become table rows, labels become \
key/value pairs and standalone headings are attached to the table below them.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file path or HTTP/HTTPS URL.
    #[arg(short, long, env = "IMG2CSV_INPUT")]
    input: String,

    /// Write CSV to this file instead of stdout.
    #[arg(short, long, env = "IMG2CSV_OUTPUT")]
    output: Option<PathBuf>,

    /// Replay a recorded detection dump (JSON) instead of calling a model.
    #[arg(long, env = "IMG2CSV_DETECTIONS")]
    detections: Option<PathBuf>,

    /// Vision LLM model ID used for OCR (e.g. gpt-4.1-nano, gpt-4.1).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Discard detections with confidence below this value (0.0–1.0).
    #[arg(long, env = "IMG2CSV_MIN_CONFIDENCE")]
    min_confidence: Option<f32>,

    /// OCR call timeout in seconds; 0 disables the bound.
    #[arg(long, env = "IMG2CSV_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// Retries on OCR failure.
    #[arg(long, env = "IMG2CSV_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "IMG2CSV_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "IMG2CSV_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Path to a text file containing a custom OCR system prompt.
    #[arg(long, env = "IMG2CSV_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IMG2CSV_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Send the decoded image to OCR without denoising or thresholding.
    #[arg(long, env = "IMG2CSV_NO_PREPROCESS")]
    no_preprocess: bool,

    /// Keep standalone headings as their own rows.
    #[arg(long, env = "IMG2CSV_NO_SECTIONS")]
    no_sections: bool,

    /// Output structured JSON (rows + stats) instead of CSV. Stdout only.
    #[arg(long, env = "IMG2CSV_JSON", conflicts_with = "output")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "IMG2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2CSV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = extract_to_file(&cli.input, output_path, &config)
            .await
            .context("Extraction failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {} rows  {}ms  →  {}",
                green("✔"),
                stats.csv_rows,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let output = extract(&cli.input, &config)
            .await
            .context("Extraction failed")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        if cli.json {
            serde_json::to_writer_pretty(&mut handle, &output)
                .context("Failed to serialise output")?;
            handle.write_all(b"\n").context("Failed to write to stdout")?;
        } else {
            output
                .write_csv(&mut handle)
                .context("Failed to write CSV to stdout")?;
        }
        handle.flush().context("Failed to write to stdout")?;

        if !cli.quiet && !show_progress {
            eprintln!(
                "Extracted {} rows ({} detections) in {}ms",
                output.stats.csv_rows, output.stats.detections, output.stats.total_duration_ms
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .preprocess(!cli.no_preprocess)
        .merge_sections(!cli.no_sections)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout);

    builder = if cli.ocr_timeout == 0 {
        builder.no_ocr_timeout()
    } else {
        builder.ocr_timeout_secs(cli.ocr_timeout)
    };
    if let Some(threshold) = cli.min_confidence {
        builder = builder.min_confidence(threshold);
    }
    if let Some(ref path) = cli.detections {
        let engine = ReplayOcrEngine::from_path(path)
            .with_context(|| format!("Failed to load detections from {:?}", path))?;
        builder = builder.engine(Arc::new(engine));
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

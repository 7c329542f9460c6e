//! CLI binary for pdf2sop.
//!
//! A thin shim over the library crate that maps CLI flags to `SopConfig`,
//! dispatches single-PDF vs batch-zip inputs, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2sop::pipeline::input::{resolve_input, InputKind};
use pdf2sop::{
    convert_archive, convert_to_file, BatchProgress, BatchProgressCallback, SopConfig,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

/// Terminal progress callback: renders a live progress bar and per-entry
/// log lines using [indicatif] while a batch runs.
struct CliBatchProgress {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliBatchProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading archive…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliBatchProgress {
    fn on_batch_start(&self, total_units: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_units as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_units} PDFs…"))
        ));
    }

    fn on_unit_start(&self, _unit: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_unit_complete(&self, unit: usize, total: usize, docx_len: usize) {
        self.bar.println(format!(
            "  {} PDF {:>3}/{:<3}  {}",
            green("✓"),
            unit,
            total,
            dim(&format!("{docx_len:>6} bytes")),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, unit: usize, total: usize, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error
        };

        self.bar.println(format!(
            "  {} PDF {:>3}/{:<3}  {}",
            red("✗"),
            unit,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} SOPs generated successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} SOPs generated  ({} failed)",
                if failed == total_units {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_units,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One process-flow PDF → one SOP document
  pdf2sop process_flow.pdf

  # Choose the output path
  pdf2sop process_flow.pdf -o sop/order_intake.docx

  # A zip of PDFs → a zip of SOP documents
  pdf2sop flows.zip -o generated_sops.zip

  # Use a specific model
  pdf2sop --model gpt-4o --provider openai process_flow.pdf

  # Convert from URL
  pdf2sop https://example.com/flows/intake.pdf

  # Few-shot the model with reference material
  pdf2sop --reference-image ref.png --reference-text ref_output.txt flow.pdf

  # Print the recovered analysis record as JSON alongside the document
  pdf2sop --json process_flow.pdf

SUPPORTED PROVIDERS & MODELS:
  Provider     Model                        Vision
  ─────────    ───────────────────────────  ──────
  openai       gpt-4o-mini (default)        ✓
  openai       gpt-4o                       ✓
  anthropic    claude-sonnet-4-20250514     ✓
  gemini       gemini-2.0-flash             ✓
  ollama       llava, llama3.2-vision       ✓

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  PDF2SOP_LLM_PROVIDER    Override provider (openai, anthropic, gemini, ollama)
  PDF2SOP_MODEL           Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Convert:         pdf2sop process_flow.pdf
"#;

/// Convert process-flow PDFs into SOP documents using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2sop",
    version,
    about = "Convert process-flow PDFs into Standard Operating Procedure documents using Vision LLMs",
    long_about = "Convert PDFs containing process-flow diagrams (local files, URLs, or zip \
batches) into formatted Standard Operating Procedure documents. Supports OpenAI, Anthropic, \
Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file, zip archive of PDFs, or HTTP/HTTPS URL.
    input: String,

    /// Write the document (or output archive) to this path.
    #[arg(short, long, env = "PDF2SOP_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4o-mini, gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "PDF2SOP_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "PDF2SOP_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Reference diagram image attached to the request as a worked example.
    #[arg(long, env = "PDF2SOP_REFERENCE_IMAGE")]
    reference_image: Option<PathBuf>,

    /// Reference output sample attached to the request as the expected format.
    #[arg(long, env = "PDF2SOP_REFERENCE_TEXT")]
    reference_text: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2SOP_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per diagram.
    #[arg(long, env = "PDF2SOP_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2SOP_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per diagram on transient LLM failure.
    #[arg(long, env = "PDF2SOP_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Display width of the embedded diagram, in inches.
    #[arg(long, env = "PDF2SOP_IMAGE_WIDTH", default_value_t = 6.0)]
    image_width: f32,

    /// Print the recovered analysis record as JSON to stdout.
    #[arg(long, env = "PDF2SOP_JSON")]
    json: bool,

    /// Disable the batch progress bar.
    #[arg(long, env = "PDF2SOP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2SOP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2SOP_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2SOP_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-diagram LLM call timeout in seconds.
    #[arg(long, env = "PDF2SOP_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    // ── Resolve the input and dispatch on its kind ───────────────────────
    let resolved = resolve_input(&cli.input, cli.download_timeout)
        .await
        .context("Failed to resolve input")?;

    match resolved.kind() {
        InputKind::Pdf => run_single(&cli, resolved.path()).await,
        InputKind::Archive => run_batch(&cli, resolved.path(), show_progress).await,
    }
}

/// Convert one PDF into one SOP document.
async fn run_single(cli: &Cli, pdf_path: &Path) -> Result<()> {
    let config = build_config(cli, None).await?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_name(&cli.input, ".docx"));

    if cli.json {
        let output = pdf2sop::convert(pdf_path.to_string_lossy(), &config)
            .await
            .context("Conversion failed")?;
        tokio::fs::write(&output_path, &output.docx)
            .await
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    let stats = convert_to_file(pdf_path.to_string_lossy(), &output_path, &config)
        .await
        .context("Conversion failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {}ms  →  {}",
            green("✔"),
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
        );
    }

    Ok(())
}

/// Convert a zip of PDFs into a zip of SOP documents.
async fn run_batch(cli: &Cli, zip_path: &Path, show_progress: bool) -> Result<()> {
    let progress: Option<BatchProgress> = if show_progress {
        Some(CliBatchProgress::new() as BatchProgress)
    } else {
        None
    };

    let config = build_config(cli, progress).await?;

    let archive_bytes = tokio::fs::read(zip_path)
        .await
        .with_context(|| format!("Failed to read {}", zip_path.display()))?;

    let batch = convert_archive(&archive_bytes, &config)
        .await
        .context("Batch conversion produced no output")?;

    // `<stem>_sops.zip`, never `<stem>.zip` — that would clobber the input.
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_name(&cli.input, "_sops.zip"));
    tokio::fs::write(&output_path, &batch.archive)
        .await
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&batch.entries)
                .context("Failed to serialise batch results")?
        );
    }

    if !cli.quiet {
        eprintln!(
            "{}  {}/{} entries  {}ms  →  {}",
            if batch.stats.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            batch.stats.succeeded,
            batch.stats.qualifying_entries,
            batch.stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        for entry in batch.entries.iter().filter(|e| !e.succeeded()) {
            eprintln!(
                "   {} {} — {}",
                red("✗"),
                entry.name,
                entry
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Map CLI args to `SopConfig`.
async fn build_config(cli: &Cli, progress: Option<BatchProgress>) -> Result<SopConfig> {
    let system_prompt = if let Some(path) = &cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = SopConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .image_width_inches(cli.image_width)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(model) = &cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(provider) = &cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(path) = &cli.reference_image {
        builder = builder.reference_image(path.clone());
    }
    if let Some(path) = &cli.reference_text {
        builder = builder.reference_text(path.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Default output path: the input's base name plus `suffix`, in the
/// current directory.
fn default_output_name(input: &str, suffix: &str) -> PathBuf {
    let stem = Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{stem}{suffix}"))
}

//! CLI binary for edgequake-pdf2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and reports results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2docx::config::{DEFAULT_SIMPLETEX_ENDPOINT, DEFAULT_TEXTIN_ENDPOINT};
use edgequake_pdf2docx::convert::write_atomic;
use edgequake_pdf2docx::{
    convert, convert_batch, convert_blocks, extract_blocks, ConversionConfig,
    ConversionProgressCallback, Device, DocOp, ImageMode, LocalModelConfig, OpRecorder,
    PageBreakMode, ProgressCallback, Resolvers, SimpleTexConfig, TextInConfig, VisionConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Batch progress: one bar for the whole directory, one log line per document.
/// Documents finish out of order, so start times are keyed by name.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing input directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, name: &str) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(name)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, name: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(name.to_string(), Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, name: &str, blocks: usize) {
        let secs = self.elapsed_secs(name);
        self.bar.println(format!(
            "  {} {:<40}  {:<12}  {}",
            green("✓"),
            name,
            dim(&format!("{blocks:>5} blocks")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, name: &str, error: &str) {
        let secs = self.elapsed_secs(name);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents converted  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one PDF (writes paper.docx next to the current directory)
  pdf2docx paper.pdf

  # Choose the output file
  pdf2docx paper.pdf -o out/paper.docx

  # Convert from URL
  pdf2docx https://example.org/report.pdf -o report.docx

  # Convert a whole directory, two documents at a time
  pdf2docx --batch --input-dir scans --output-dir word -c 2

  # Look at what the OCR service returned
  pdf2docx --blocks-only paper.pdf > blocks.json

  # Show the document operations without writing a file
  pdf2docx --dry-run --json paper.pdf

  # Formulas only, through a local model on the CPU
  pdf2docx --image-mode local-batch --local-model nougat-latex --device cpu paper.pdf

ENVIRONMENT VARIABLES:
  TEXTIN_API_ID / TEXTIN_API_CODE          TextIn layout OCR credentials
  SIMPLETEX_APP_ID / SIMPLETEX_APP_SECRET  SimpleTex formula OCR credentials
  INPUT_DIRECTORY / OUTPUT_DIRECTORY       Batch directories
  EDGEQUAKE_PROVIDER / EDGEQUAKE_MODEL     Vision model for figure descriptions
  OPENAI_API_KEY, ANTHROPIC_API_KEY, ...   Provider API keys (auto-detected)
  PDF2DOCX_DEVICE                          cpu or gpu for the local model
  RUST_LOG                                 Override the log filter
"#;

/// Convert scanned PDF files to structured Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2docx",
    version,
    about = "Convert scanned PDF files and URLs to structured Word documents",
    long_about = "Convert scanned PDF documents (local files or URLs) to .docx. A layout OCR \
service splits the PDF into paragraphs, tables and images; pdf2docx rebuilds headings, \
merged tables and page breaks, recognises formulas as LaTeX and explains captioned figures \
with a Vision Language Model.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "batch")]
    input: Option<String>,

    /// Write the .docx to this file. Default: `<input stem>.docx`.
    #[arg(short, long, env = "PDF2DOCX_OUTPUT")]
    output: Option<PathBuf>,

    /// Convert every file in --input-dir into --output-dir.
    #[arg(long, conflicts_with_all = ["input", "blocks_only", "dry_run"])]
    batch: bool,

    /// Batch input directory.
    #[arg(long, env = "INPUT_DIRECTORY")]
    input_dir: Option<PathBuf>,

    /// Batch output directory.
    #[arg(long, env = "OUTPUT_DIRECTORY")]
    output_dir: Option<PathBuf>,

    /// Print the extracted block list as JSON and stop.
    #[arg(long)]
    blocks_only: bool,

    /// Print the document operations instead of writing a .docx.
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run: print operations as JSON.
    #[arg(long, requires = "dry_run")]
    json: bool,

    // ── Routing ─────────────────────────────────────────────────────────

    /// Page breaks: every-page, once-per-block, none.
    #[arg(long, env = "PDF2DOCX_PAGE_BREAKS", value_enum, default_value = "every-page")]
    page_breaks: PageBreakArg,

    /// Use document default styles for body text and tables.
    #[arg(long, env = "PDF2DOCX_NO_CUSTOM_STYLES")]
    no_custom_styles: bool,

    /// Use the document default style for footers.
    #[arg(long, env = "PDF2DOCX_NO_COMPACT_FOOTERS")]
    no_compact_footers: bool,

    /// Image handling: describe-or-formula, formula, local-batch.
    #[arg(long, env = "PDF2DOCX_IMAGE_MODE", value_enum, default_value = "describe-or-formula")]
    image_mode: ImageModeArg,

    /// Caption prefix that sends the preceding image to the vision model.
    #[arg(long, env = "PDF2DOCX_CAPTION_PREFIX", default_value = "图")]
    caption_prefix: String,

    /// Footer-like paragraphs shorter than this are dropped.
    #[arg(long, env = "PDF2DOCX_MIN_FOOTER_CHARS", default_value_t = 3)]
    min_footer_chars: usize,

    // ── Resolvers ───────────────────────────────────────────────────────

    /// TextIn application id.
    #[arg(long, env = "TEXTIN_API_ID")]
    textin_app_id: Option<String>,

    /// TextIn secret code.
    #[arg(long, env = "TEXTIN_API_CODE", hide_env_values = true)]
    textin_secret: Option<String>,

    /// TextIn endpoint.
    #[arg(long, env = "TEXTIN_ENDPOINT", default_value = DEFAULT_TEXTIN_ENDPOINT)]
    textin_endpoint: String,

    /// SimpleTex application id.
    #[arg(long, env = "SIMPLETEX_APP_ID")]
    simpletex_app_id: Option<String>,

    /// SimpleTex application secret.
    #[arg(long, env = "SIMPLETEX_APP_SECRET", hide_env_values = true)]
    simpletex_secret: Option<String>,

    /// SimpleTex endpoint.
    #[arg(long, env = "SIMPLETEX_ENDPOINT", default_value = DEFAULT_SIMPLETEX_ENDPOINT)]
    simpletex_endpoint: String,

    /// Vision LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Vision LLM model ID (e.g. gpt-4.1-nano, gpt-4.1).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2DOCX_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens per figure description.
    #[arg(long, env = "PDF2DOCX_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Local formula model program (used by --image-mode local-batch).
    #[arg(long, env = "PDF2DOCX_LOCAL_MODEL")]
    local_model: Option<String>,

    /// Extra argument for the local model program (repeatable).
    #[arg(long = "local-model-arg", allow_hyphen_values = true)]
    local_model_args: Vec<String>,

    /// Inference device for the local model.
    #[arg(long, env = "PDF2DOCX_DEVICE", value_enum, default_value = "gpu")]
    device: DeviceArg,

    // ── Runtime ─────────────────────────────────────────────────────────

    /// Documents converted at once in --batch mode.
    #[arg(short, long, env = "PDF2DOCX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// HTTP download timeout in seconds (PDF and image URLs).
    #[arg(long, env = "PDF2DOCX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call timeout for OCR, formula and vision services in seconds.
    #[arg(long, env = "PDF2DOCX_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "PDF2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2DOCX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PageBreakArg {
    EveryPage,
    OncePerBlock,
    None,
}

impl From<PageBreakArg> for PageBreakMode {
    fn from(v: PageBreakArg) -> Self {
        match v {
            PageBreakArg::EveryPage => PageBreakMode::EveryPage,
            PageBreakArg::OncePerBlock => PageBreakMode::OncePerBlock,
            PageBreakArg::None => PageBreakMode::Disabled,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ImageModeArg {
    DescribeOrFormula,
    Formula,
    LocalBatch,
}

impl From<ImageModeArg> for ImageMode {
    fn from(v: ImageModeArg) -> Self {
        match v {
            ImageModeArg::DescribeOrFormula => ImageMode::DescriptionOrFormula,
            ImageModeArg::Formula => ImageMode::Formula,
            ImageModeArg::LocalBatch => ImageMode::LocalBatch,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum DeviceArg {
    Cpu,
    Gpu,
}

impl From<DeviceArg> for Device {
    fn from(v: DeviceArg) -> Self {
        match v {
            DeviceArg::Cpu => Device::Cpu,
            DeviceArg::Gpu => Device::Gpu,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports each document, so library INFO logs
    // are hidden while it is shown.
    let prints_to_stdout = cli.blocks_only || cli.dry_run;
    let show_progress = cli.batch && !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || prints_to_stdout {
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let resolvers = Resolvers::from_config(&config)
        .await
        .context("Failed to set up OCR and model clients")?;

    if cli.batch {
        return run_batch(&cli, &config, &resolvers).await;
    }

    let input = cli
        .input
        .as_deref()
        .context("An INPUT path or URL is required unless --batch is given")?;

    // ── Inspection modes ─────────────────────────────────────────────────
    if cli.blocks_only || cli.dry_run {
        let blocks = extract_blocks(input, &config, &resolvers)
            .await
            .context("Extraction failed")?;

        if cli.blocks_only {
            println!(
                "{}",
                serde_json::to_string_pretty(&blocks).context("Failed to serialise blocks")?
            );
            return Ok(());
        }

        let mut recorder = OpRecorder::new();
        let outcome = convert_blocks(&blocks, &config, &resolvers, &mut recorder)
            .await
            .context("Routing failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(recorder.ops())
                    .context("Failed to serialise operations")?
            );
        } else {
            for op in recorder.ops() {
                println!("{}", describe_op(op));
            }
        }
        for e in &outcome.errors {
            eprintln!("  {} {}", cyan("⚠"), e);
        }
        return Ok(());
    }

    // ── Single document ──────────────────────────────────────────────────
    let spinner = (!cli.quiet && !cli.no_progress).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Converting");
        bar.set_message(input.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let result = convert(input, &config, &resolvers).await;
    if let Some(ref bar) = spinner {
        bar.finish_and_clear();
    }
    let output = result.context("Conversion failed")?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.docx", output.name)));
    write_atomic(&output_path, &output.docx)
        .await
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} blocks  {}ms  →  {}",
            if output.errors.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.total_blocks,
            stats.duration_ms,
            bold(&output_path.display().to_string()),
        );
        eprintln!(
            "   {}",
            dim(&format!(
                "{} headings, {} paragraphs, {} tables, {} formulas, {} figures, {} page breaks",
                stats.headings,
                stats.body_paragraphs + stats.footers,
                stats.tables,
                stats.formulas,
                stats.descriptions,
                stats.page_breaks
            ))
        );
        for e in &output.errors {
            eprintln!("  {} {}", cyan("⚠"), e);
        }
    }

    Ok(())
}

async fn run_batch(cli: &Cli, config: &ConversionConfig, resolvers: &Resolvers) -> Result<()> {
    let input_dir = require_dir(cli.input_dir.as_deref(), "--input-dir / INPUT_DIRECTORY")?;
    let output_dir = require_dir(cli.output_dir.as_deref(), "--output-dir / OUTPUT_DIRECTORY")?;

    let report = convert_batch(input_dir, output_dir, config, resolvers)
        .await
        .context("Batch conversion failed")?;

    if !cli.quiet && cli.no_progress {
        eprintln!(
            "Converted {}/{} documents in {}ms",
            report.succeeded,
            report.documents.len(),
            report.duration_ms
        );
    }
    if !cli.quiet {
        for doc in report.failures() {
            eprintln!(
                "  {} {}: {}",
                red("✗"),
                doc.input.display(),
                doc.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if !report.all_succeeded() {
        anyhow::bail!(
            "{} of {} documents failed",
            report.failed,
            report.documents.len()
        );
    }
    Ok(())
}

fn require_dir<'a>(dir: Option<&'a Path>, what: &str) -> Result<&'a Path> {
    dir.with_context(|| format!("--batch needs {what}"))
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .page_breaks(cli.page_breaks.clone().into())
        .apply_custom_styles(!cli.no_custom_styles)
        .compact_footers(!cli.no_compact_footers)
        .image_mode(cli.image_mode.clone().into())
        .figure_caption_prefix(cli.caption_prefix.clone())
        .min_footer_chars(cli.min_footer_chars)
        .vision(VisionConfig {
            provider_name: cli.provider.clone(),
            model: cli.model.clone(),
            temperature: cli.temperature,
            max_tokens: cli.max_tokens,
            ..VisionConfig::default()
        })
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let (Some(id), Some(secret)) = (&cli.textin_app_id, &cli.textin_secret) {
        let mut textin = TextInConfig::new(id, secret);
        textin.endpoint = cli.textin_endpoint.clone();
        builder = builder.textin(textin);
    }

    if let (Some(id), Some(secret)) = (&cli.simpletex_app_id, &cli.simpletex_secret) {
        let mut simpletex = SimpleTexConfig::new(id, secret);
        simpletex.endpoint = cli.simpletex_endpoint.clone();
        builder = builder.simpletex(simpletex);
    }

    if let Some(ref program) = cli.local_model {
        let mut local = LocalModelConfig::new(program);
        local.args = cli.local_model_args.clone();
        local.device = cli.device.clone().into();
        builder = builder.local_model(local);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// One human-readable line per operation for `--dry-run`.
fn describe_op(op: &DocOp) -> String {
    match op {
        DocOp::Heading { text, level } => format!("heading   h{level}  {text}"),
        DocOp::Paragraph { text, kind, style } => format!(
            "paragraph {:?}{}  {}",
            kind,
            style.as_deref().map(|s| format!(" [{s}]")).unwrap_or_default(),
            text.replace('\n', " ⏎ ")
        ),
        DocOp::PageBreak => "page-break".to_string(),
        DocOp::CreateTable { table, rows, cols } => {
            format!("table     #{}  {rows}x{cols}", table.0)
        }
        DocOp::SetTableStyle { table, style } => format!("  style   #{}  {style}", table.0),
        DocOp::SetCellText {
            table,
            row,
            col,
            text,
        } => format!("  cell    #{}  ({row},{col})  {text}", table.0),
        DocOp::MergeCells { table, from, to } => format!(
            "  merge   #{}  ({},{})-({},{})",
            table.0, from.0, from.1, to.0, to.1
        ),
    }
}

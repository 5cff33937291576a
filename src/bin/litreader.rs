//! CLI binary for litreader.
//!
//! `serve` runs the HTTP API; `parse`, `translate` and `reconstruct` drive a
//! running server from the terminal the way the reader frontend does.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use litreader::config::ModelVersion;
use litreader::model::{JobId, JobStatus, TextBlock, TranslationCounts};
use litreader::pipeline::translate::DEFAULT_BATCH_SIZE;
use litreader::{
    poll_job, reconstruct, translate_layout, PollPolicy, PollProgressCallback, ReaderApiClient, ReaderConfig,
    Strategy, TranslateOptions, TranslationProgressCallback,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(prefix: &str, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);
    bar.set_style(style);
    bar.set_prefix(prefix.to_string());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── Poll spinner ─────────────────────────────────────────────────────────────

/// Spinner shown while the parse job runs on the server.
struct PollSpinner {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl PollSpinner {
    fn new() -> Self {
        Self {
            bar: spinner("Parsing", "Submitting PDF…"),
            errors: AtomicUsize::new(0),
        }
    }
}

impl PollProgressCallback for PollSpinner {
    fn on_poll_start(&self, job: &JobId, max_attempts: u32) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("Waiting for {job}")),
            dim(&format!("(up to {max_attempts} checks)"))
        ));
    }

    fn on_poll_attempt(&self, _job: &JobId, attempt: u32, max_attempts: u32, status: &JobStatus) {
        let pages = status
            .extract_progress
            .as_ref()
            .filter(|p| p.total_pages > 0)
            .map(|p| format!("  {}/{} pages", p.extracted_pages, p.total_pages))
            .unwrap_or_default();
        self.bar
            .set_message(format!("{}{pages}  {}", status.state, dim(&format!("check {attempt}/{max_attempts}"))));
    }

    fn on_poll_error(&self, _job: &JobId, attempt: u32, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} check {:>3}  {}",
            red("✗"),
            attempt,
            red(&truncate(error, 80))
        ));
    }

    fn on_poll_complete(&self, _job: &JobId, block_count: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} text blocks parsed", green("✔"), bold(&block_count.to_string()));
    }
}

// ── Translation bar ──────────────────────────────────────────────────────────

/// Progress bar over blocks, advanced after every batch.
struct TranslateBar {
    bar: ProgressBar,
}

impl TranslateBar {
    fn new() -> Self {
        Self {
            bar: spinner("Preparing", "Selecting blocks…"),
        }
    }
}

impl TranslationProgressCallback for TranslateBar {
    fn on_translation_start(&self, counts: &TranslationCounts, batches: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} blocks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(counts.total as u64);
        self.bar.set_position(counts.processed() as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Translating");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("{} blocks in {batches} batches", counts.total - counts.skipped)),
            dim(&format!("({} already translated)", counts.skipped))
        ));
    }

    fn on_batch_complete(&self, batch: usize, batches: usize, counts: &TranslationCounts) {
        self.bar.set_message(format!("batch {batch}/{batches}"));
        self.bar.set_position(counts.processed() as u64);
    }

    fn on_batch_error(&self, batch: usize, batches: usize, error: &str) {
        self.bar.println(format!(
            "  {} Batch {:>3}/{:<3}  {}",
            red("✗"),
            batch,
            batches,
            red(&truncate(error, 80))
        ));
    }

    fn on_translation_complete(&self, counts: &TranslationCounts) {
        self.bar.finish_and_clear();
        if counts.failed == 0 {
            eprintln!(
                "{} {} blocks translated  {}",
                green("✔"),
                bold(&counts.translated.to_string()),
                dim(&format!("({} skipped)", counts.skipped))
            );
        } else {
            eprintln!(
                "{} {}/{} blocks translated  ({} failed)",
                if counts.translated == 0 { red("✘") } else { cyan("⚠") },
                bold(&counts.translated.to_string()),
                counts.total,
                red(&counts.failed.to_string()),
            );
        }
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the API server (reads .env)
  litreader serve

  # Parse a PDF through a running server
  litreader parse paper.pdf -o paper_layout.json

  # Translate the parsed blocks to Chinese
  litreader translate paper_layout.json --target-lang zh -o paper_zh.json

  # Rebuild the translated full text
  litreader reconstruct full.md paper_zh.json -o full_zh.md

ENVIRONMENT VARIABLES:
  QWEN_API_KEY            Qwen (DashScope) API key, preferred when set
  QWEN_BASE_URL           Qwen endpoint (OpenAI-compatible)
  QWEN_MODEL              Qwen model (default: qwen-turbo)
  OPENAI_API_KEY          Fallback OpenAI-compatible API key
  OPENAI_BASE_URL         Fallback endpoint
  DEFAULT_MODEL           Fallback model
  MINERU_TOKEN            MinerU API token
  MINERU_MODEL_VERSION    vlm (default) or pipeline
  MINERU_TIMEOUT          Server-side wait budget in seconds (default: 300)
  UPLOAD_FOLDER           Uploaded files (default: data/files)
  MINERU_FOLDER           Extracted parser results (default: data/mineru)
  BIND_ADDR               Server address (default: 0.0.0.0:5000)
  LOG_LEVEL               Server log level when RUST_LOG is unset (default: INFO)
  LITREADER_SERVER        Server URL used by parse/translate

SETUP:
  1. Set tokens:   export MINERU_TOKEN=... QWEN_API_KEY=...
  2. Start:        litreader serve
  3. Parse:        litreader parse paper.pdf
"#;

/// Parse research papers with MinerU and translate them block by block.
#[derive(Parser, Debug)]
#[command(
    name = "litreader",
    version,
    about = "Parse PDF papers with MinerU and translate them block by block with an LLM",
    long_about = "Literature reader backend. `serve` exposes the HTTP API used by the reader \
frontend; `parse`, `translate` and `reconstruct` drive a running server from the terminal: \
upload a PDF, poll the parse job, translate its text blocks in batches of 10 and rebuild a \
translated full-text document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "LITREADER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "LITREADER_QUIET")]
    quiet: bool,

    /// Disable progress bars.
    #[arg(long, global = true, env = "LITREADER_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server.
    Serve {
        /// Listen address, overrides BIND_ADDR.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Upload a PDF to the server, wait for parsing and save the layout.
    Parse(ParseArgs),
    /// Translate a layout JSON file through the server.
    Translate(TranslateArgs),
    /// Rebuild a translated full-text document from translated blocks.
    Reconstruct(ReconstructArgs),
}

#[derive(Args, Debug)]
struct ServerArg {
    /// Base URL of a running litreader server.
    #[arg(long, env = "LITREADER_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Local PDF file.
    pdf: PathBuf,

    /// Layout JSON output. Default: <pdf stem>_layout.json.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Where to write full.md. Default: next to the layout JSON.
    #[arg(long)]
    full_text: Option<PathBuf>,

    /// MinerU model: vlm or pipeline.
    #[arg(long, value_enum)]
    model_version: Option<ModelVersionArg>,

    /// Seconds between status checks.
    #[arg(long, default_value_t = 3)]
    interval: u64,

    /// Maximum number of status checks.
    #[arg(long, default_value_t = 120)]
    max_attempts: u32,

    #[command(flatten)]
    server: ServerArg,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Layout JSON (a block array, or an object with a `layout` field).
    layout: PathBuf,

    /// Output file. Default: <layout stem>_<lang>.json.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target language code.
    #[arg(short = 'l', long, default_value = "zh")]
    target_lang: String,

    /// LLM model override passed to the server.
    #[arg(long)]
    model: Option<String>,

    /// Translate blocks that already carry a translation.
    #[arg(long)]
    force: bool,

    /// Blocks per server call.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    #[command(flatten)]
    server: ServerArg,
}

#[derive(Args, Debug)]
struct ReconstructArgs {
    /// Original full-text markdown (full.md).
    full_text: PathBuf,

    /// Translated layout JSON.
    layout: PathBuf,

    /// Write the document here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModelVersionArg {
    Vlm,
    Pipeline,
}

impl From<ModelVersionArg> for ModelVersion {
    fn from(v: ModelVersionArg) -> Self {
        match v {
            ModelVersionArg::Vlm => ModelVersion::Vlm,
            ModelVersionArg::Pipeline => ModelVersion::Pipeline,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bars replace INFO logs for interactive commands.
    let serving = matches!(cli.command, Command::Serve { .. });
    let show_progress = !serving && !cli.quiet && !cli.no_progress;
    let level = if cli.verbose {
        "debug".to_string()
    } else if cli.quiet || show_progress {
        "error".to_string()
    } else if serving {
        std::env::var("LOG_LEVEL")
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|_| "info".to_string())
    } else {
        "info".to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve { bind } => {
            let mut config = ReaderConfig::from_env().context("Invalid configuration")?;
            if let Some(addr) = bind {
                config.bind_addr = addr;
            }
            litreader::server::serve(config).await.context("Server failed")?;
        }
        Command::Parse(args) => parse(args, cli.quiet, show_progress).await?,
        Command::Translate(args) => translate(args, cli.quiet, show_progress).await?,
        Command::Reconstruct(args) => reconstruct_cmd(args, cli.quiet).await?,
    }
    Ok(())
}

async fn parse(args: ParseArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let api = ReaderApiClient::new(&args.server.server).context("Failed to build HTTP client")?;
    let bytes = tokio::fs::read(&args.pdf)
        .await
        .with_context(|| format!("Failed to read {}", args.pdf.display()))?;
    let filename = args
        .pdf
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    let submission = api
        .parse_pdf(&filename, bytes, args.model_version.map(Into::into))
        .await
        .context("Failed to submit PDF")?;
    let job = submission
        .job_id()
        .context("Server accepted the upload but returned no task or batch id")?;

    let policy = PollPolicy {
        interval: Duration::from_secs(args.interval.max(1)),
        max_attempts: args.max_attempts.max(1),
    };
    let outcome = if show_progress {
        poll_job(&api, &job, policy, &PollSpinner::new(), None).await
    } else {
        poll_job(&api, &job, policy, &litreader::NoopProgressCallback, None).await
    }
    .context("Parsing failed")?;

    let output = args.output.unwrap_or_else(|| sibling(&args.pdf, "layout", "json"));
    write_json(&output, &outcome.blocks).await?;

    let full_text_path = args
        .full_text
        .unwrap_or_else(|| output.with_file_name(format!("{}_full.md", stem(&args.pdf))));
    let wrote_full = match api.full_text(job.as_str()).await {
        Ok(content) => {
            write_text(&full_text_path, &content).await?;
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "full.md not available");
            false
        }
    };

    if !quiet {
        eprintln!(
            "{}  {} blocks  {} checks  →  {}",
            green("✔"),
            outcome.blocks.len(),
            outcome.attempts,
            bold(&output.display().to_string()),
        );
        if wrote_full {
            eprintln!("   full text  →  {}", dim(&full_text_path.display().to_string()));
        }
    }
    Ok(())
}

async fn translate(args: TranslateArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let api = ReaderApiClient::new(&args.server.server).context("Failed to build HTTP client")?;
    let layout = read_layout(&args.layout).await?;
    anyhow::ensure!(!layout.is_empty(), "{} contains no text blocks", args.layout.display());

    let options = TranslateOptions {
        target_lang: args.target_lang.clone(),
        model: args.model,
        force_retranslate: args.force,
        batch_size: args.batch_size.max(1),
    };
    let summary = if show_progress {
        translate_layout(&api, layout, &options, &TranslateBar::new()).await
    } else {
        translate_layout(&api, layout, &options, &litreader::NoopProgressCallback).await
    };

    let output = args
        .output
        .unwrap_or_else(|| sibling(&args.layout, &args.target_lang, "json"));
    write_json(&output, &summary.layout).await?;

    if !quiet {
        let c = summary.counts;
        eprintln!(
            "{}  {} translated  {} skipped  {} failed  →  {}",
            if c.failed == 0 { green("✔") } else { cyan("⚠") },
            c.translated,
            c.skipped,
            c.failed,
            bold(&output.display().to_string()),
        );
        if let Some(first) = summary.first_error.as_deref() {
            eprintln!("   first error: {}", red(&truncate(first, 120)));
            if let Some(hint) = litreader::error::failure_hint(first) {
                eprintln!("   {}", dim(hint));
            }
        }
    }
    Ok(())
}

async fn reconstruct_cmd(args: ReconstructArgs, quiet: bool) -> Result<()> {
    let original = tokio::fs::read_to_string(&args.full_text)
        .await
        .with_context(|| format!("Failed to read {}", args.full_text.display()))?;
    let layout = read_layout(&args.layout).await?;

    let result = reconstruct(&original, &layout);
    let strategy = match result.strategy {
        Strategy::LayoutConcat => "layout concatenation".to_string(),
        Strategy::Substitution => format!("substitution ({} spans)", result.substitutions),
        Strategy::ConcatFallback => "layout concatenation (no substitution matched)".to_string(),
    };

    match args.output {
        Some(ref path) => {
            write_text(path, &result.markdown).await?;
            if !quiet {
                eprintln!("{}  {}  →  {}", green("✔"), strategy, bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(result.markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !result.markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            if !quiet {
                eprintln!("{}", dim(&format!("strategy: {strategy}")));
            }
        }
    }
    Ok(())
}

// ── File helpers ─────────────────────────────────────────────────────────────

/// Accepts a bare block array or any object carrying a `layout` array.
async fn read_layout(path: &Path) -> Result<Vec<TextBlock>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_slice(&raw).with_context(|| format!("{} is not valid JSON", path.display()))?;
    let blocks = match value {
        serde_json::Value::Object(mut map) => map.remove("layout").unwrap_or(serde_json::Value::Array(Vec::new())),
        other => other,
    };
    serde_json::from_value(blocks).with_context(|| format!("{} does not hold a block list", path.display()))
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    write_text(path, &json).await
}

async fn write_text(path: &Path, content: &str) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

fn sibling(path: &Path, suffix: &str, ext: &str) -> PathBuf {
    path.with_file_name(format!("{}_{suffix}.{ext}", stem(path)))
}

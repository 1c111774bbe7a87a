//! CLI binary for exhibit-renamer.
//!
//! A thin shim over the library crate that maps flags (each backed by an
//! environment variable, `.env` included) to `Settings` and `RenameConfig`,
//! runs one batch and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use exhibit_renamer::report::render;
use exhibit_renamer::{
    connect, run, BatchSummary, CredentialsSource, FileRecord, ProgressCallback, RenameConfig,
    RenameProgressCallback, Settings, TaskStage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Live progress bar plus one log line per finished file. Files finish out
/// of order and names repeat, so start times are keyed by file id.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner only until `on_batch_start` tells us how many files there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing folder…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Renaming");
        self.bar.reset_eta();
    }

    fn elapsed(&self, file: &FileRecord) -> String {
        let ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&file.id)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl RenameProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} files…"))
        ));
    }

    fn on_file_stage(&self, file: &FileRecord, stage: TaskStage) {
        if stage == TaskStage::Listed {
            self.start_times
                .lock()
                .unwrap()
                .insert(file.id.clone(), Instant::now());
        }
        self.bar.set_message(format!("{}: {stage}", file.name));
    }

    fn on_fallback(&self, file: &FileRecord, reason: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} {}  {}", yellow("⚠"), file.name, dim(reason)));
    }

    fn on_file_renamed(&self, file: &FileRecord, new_name: &str) {
        self.bar.println(format!(
            "  {} {} → {}  {}",
            green("✓"),
            file.name,
            bold(new_name),
            self.elapsed(file),
        ));
        self.bar.inc(1);
    }

    fn on_file_skipped(&self, file: &FileRecord) {
        self.bar.println(format!(
            "  {} {}  {}",
            dim("–"),
            file.name,
            dim(&format!("skipped ({})", file.mime_type)),
        ));
        self.elapsed(file);
        self.bar.inc(1);
    }

    fn on_file_error(&self, file: &FileRecord, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            file.name,
            red(&msg),
            self.elapsed(file),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.bar.finish_and_clear();
        let mark = if summary.failed == 0 {
            green("✔")
        } else if summary.failed == summary.total {
            red("✘")
        } else {
            cyan("⚠")
        };
        let fallbacks = self.fallbacks.load(Ordering::SeqCst);
        if fallbacks > 0 {
            eprintln!(
                "{} {} files need review (NEEDS_REVIEW_ prefix)",
                mark,
                bold(&fallbacks.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Everything from the environment (or .env)
  DRIVE_FOLDER_ID=1AbC... exhibit-renamer

  # Service account key file, Gemini key from Secret Manager
  exhibit-renamer --folder-id 1AbC... \
      --credentials file:/secrets/drive-sa.json \
      --secret-project my-gcp-project

  # Any edgequake-llm provider instead of Gemini
  exhibit-renamer --folder-id 1AbC... --provider openai --model gpt-4.1-mini

  # Machine-readable report
  exhibit-renamer --json > report.json

CREDENTIAL SOURCES (--credentials / DRIVE_CREDENTIALS_SOURCE):
  env[:VAR]      Service account JSON in VAR (default DRIVE_SERVICE_ACCOUNT)
  file:PATH      Service account JSON key file
  metadata       GCE / Cloud Run metadata server
  token[:VAR]    Pre-issued OAuth2 bearer token in VAR
                 (default GOOGLE_OAUTH_ACCESS_TOKEN)

MODEL KEY RESOLUTION:
  1. --secret-project set  ->  Secret Manager secret --secret-id
  2. GEMINI_API_KEY set    ->  Gemini generateContent
  3. otherwise             ->  edgequake-llm provider from env
                               (OPENAI_API_KEY, ANTHROPIC_API_KEY, ...)

OUTCOMES:
  renamed   new DATE_TYPE_SUMMARY name, or NEEDS_REVIEW_<date>_<original>
            when the model answer was unusable
  skipped   not an image; left untouched
  failed    download or rename error; original name kept

  The exit code is 0 whenever the batch ran, even if files failed.
"#;

/// Rename scanned exhibit images in a Drive folder using a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "exhibit-renamer",
    version,
    about = "Rename scanned exhibit images in a Google Drive folder using a vision model",
    long_about = "Lists a Google Drive folder, asks a vision model to read each image and \
name it DATE_TYPE_SUMMARY, and renames it in place. Unreadable images get a \
NEEDS_REVIEW_ prefix instead; non-images are left alone.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Drive folder ID whose direct children are renamed.
    #[arg(long, env = "DRIVE_FOLDER_ID")]
    folder_id: Option<String>,

    /// Where the Drive credential comes from: env[:VAR], file:PATH, metadata, token[:VAR].
    #[arg(long, env = "DRIVE_CREDENTIALS_SOURCE", default_value = "env")]
    credentials: CredentialsSource,

    /// GCP project holding the Gemini API key in Secret Manager.
    #[arg(long, env = "GCP_PROJECT_ID")]
    secret_project: Option<String>,

    /// Secret Manager secret holding the Gemini API key.
    #[arg(long, env = "GEMINI_SECRET_ID", default_value = "GEMINI_API_KEY")]
    secret_id: String,

    /// Vision model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of files processed at once.
    #[arg(short, long, env = "RENAMER_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Files requested from the folder listing (one page, max 1000).
    #[arg(long, env = "RENAMER_PAGE_SIZE", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..=1000))]
    page_size: u32,

    /// Time limit in seconds for one file's download and analysis. A slow
    /// analysis falls back to NEEDS_REVIEW_; the rename is never cut short.
    #[arg(long, env = "RENAMER_TASK_TIMEOUT")]
    task_timeout: Option<u64>,

    /// HTTP timeout in seconds: whole request for model and auth calls,
    /// stall between reads for Drive.
    #[arg(long, env = "RENAMER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file replacing the built-in analysis prompt.
    #[arg(long, env = "RENAMER_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Output the full batch report as JSON.
    #[arg(long, env = "RENAMER_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "RENAMER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RENAMER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RENAMER_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; everything can come from the real environment.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    // ── Build settings and config ────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RenameProgressCallback>)
    } else {
        None
    };

    let settings = build_settings(&cli);
    let config = build_config(&cli, progress_cb).await?;

    // ── Connect and run ──────────────────────────────────────────────────
    let clients = connect(&settings, &config)
        .await
        .context("Setup failed")?;

    let report = run(clients.storage, clients.model, &settings.folder_id, &config)
        .await
        .context("Batch could not start")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print!("{}", render(&report));
        eprintln!("   {}", dim(&format!("{}ms total", report.duration_ms)));
    }

    Ok(())
}

/// Map CLI args to `Settings`.
fn build_settings(cli: &Cli) -> Settings {
    let mut settings = Settings::new(cli.folder_id.clone().unwrap_or_default());
    settings.credentials_source = cli.credentials.clone();
    settings.secret_project_id = cli
        .secret_project
        .clone()
        .filter(|p| !p.trim().is_empty());
    settings.secret_id = cli.secret_id.clone();
    settings
}

/// Map CLI args to `RenameConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RenameConfig> {
    let mut builder = RenameConfig::builder()
        .concurrency(cli.concurrency)
        .page_size(cli.page_size)
        .api_timeout_secs(cli.api_timeout)
        .task_timeout_secs(cli.task_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

//! CLI binary for pdf2gslides.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2gslides::{
    run_until, shutdown_channel, Pdf2SlidesError, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, RunOutput,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: one bar over the whole run, with the current
/// file's stage and upload percentage in the message.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
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
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed(&self, file: &str) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(file))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} PDFs to Google Slides…"))
        ));
    }

    fn on_file_start(&self, file: &str, _index: usize, _total: usize) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(file.to_string(), Instant::now());
        }
        self.bar.set_message(format!("{file}: converting"));
    }

    fn on_converted(&self, file: &str) {
        self.bar.set_message(format!("{file}: uploading"));
    }

    fn on_upload_progress(&self, file: &str, fraction: f64) {
        self.bar
            .set_message(format!("{file}: uploading {:.0}%", fraction * 100.0));
    }

    fn on_retry(&self, file: &str, attempt: u32, delay: Duration) {
        self.bar.println(format!(
            "  {} {}  {}",
            cyan("↻"),
            file,
            dim(&format!("retry {attempt} in {:.1}s", delay.as_secs_f64())),
        ));
    }

    fn on_file_complete(&self, file: &str, presentation_id: &str, corrections: usize) {
        self.bar.println(format!(
            "  {} {:<32}  {}  {}  {}",
            green("✓"),
            file,
            presentation_id,
            dim(&format!("{corrections:>3} text boxes")),
            dim(&self.elapsed(file)),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, file: &str, error: &str) {
        // Keep output tidy; the full error is in the JSON / log output.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            file,
            red(&msg),
            dim(&self.elapsed(file)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_files: usize, succeeded: usize) {
        let failed = total_files.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} presentations created",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} presentations created  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&succeeded.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every PDF in ./in
  pdf2gslides

  # Different folders, keep the intermediate ODP files
  pdf2gslides --input-dir decks --work-dir /tmp/odp --keep-work-dir

  # Use a pre-obtained access token (skips the browser consent flow)
  pdf2gslides --access-token "$(gcloud auth print-access-token)"

  # Machine-readable results
  pdf2gslides --json > results.json

SETUP:
  1. Install LibreOffice (soffice must be on PATH, or pass --soffice).
  2. Create an OAuth client ID (desktop app) in the Google Cloud console
     with the Drive and Slides APIs enabled; save it as credentials.json.
  3. Put PDFs in ./in and run pdf2gslides. The first run opens a consent
     URL; the token is cached in token.json.

ENVIRONMENT VARIABLES:
  PDF2GSLIDES_SOFFICE     Path to the soffice executable
  SOFFICE_PATH            Fallback path to the soffice executable
  PDF2GSLIDES_ACCESS_TOKEN  Bearer token; bypasses OAuth
  RUST_LOG                Overrides the log filter
"#;

/// Convert a folder of PDFs into Google Slides presentations.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2gslides",
    version,
    about = "Convert a folder of PDFs into Google Slides presentations",
    long_about = "Convert every PDF in the input folder to ODP with LibreOffice, upload it to \
Google Drive as a Google Slides presentation (resumable, with backoff on transient errors), and \
widen every text box by 10% so the text wraps as it did in the PDF.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder scanned for *.pdf.
    #[arg(long, env = "PDF2GSLIDES_INPUT_DIR", default_value = "in")]
    input_dir: PathBuf,

    /// Folder for intermediate *.odp files; removed after a clean run.
    #[arg(long, env = "PDF2GSLIDES_WORK_DIR", default_value = "temp")]
    work_dir: PathBuf,

    /// Keep the working folder even when every file succeeded.
    #[arg(long, env = "PDF2GSLIDES_KEEP_WORK_DIR")]
    keep_work_dir: bool,

    /// Upload chunk size in KiB (multiple of 256).
    #[arg(long, env = "PDF2GSLIDES_CHUNK_SIZE_KIB", default_value_t = 256)]
    chunk_size_kib: usize,

    /// Upload attempts per file before giving up.
    #[arg(long, env = "PDF2GSLIDES_MAX_TRIES", default_value_t = 8,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_tries: u32,

    /// Width factor applied to every text box.
    #[arg(long, env = "PDF2GSLIDES_SCALE_X", default_value_t = 1.1)]
    scale_x: f64,

    /// Path to the soffice executable (searched for if unset).
    #[arg(long, env = "PDF2GSLIDES_SOFFICE")]
    soffice: Option<PathBuf>,

    /// Per-file LibreOffice timeout in seconds.
    #[arg(long, env = "PDF2GSLIDES_CONVERSION_TIMEOUT", default_value_t = 300)]
    conversion_timeout: u64,

    /// OAuth client secrets JSON.
    #[arg(long, env = "PDF2GSLIDES_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// OAuth token cache.
    #[arg(long, env = "PDF2GSLIDES_TOKEN", default_value = "token.json")]
    token: PathBuf,

    /// Bearer token to use instead of the OAuth flow.
    #[arg(long, env = "PDF2GSLIDES_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Output structured JSON (RunOutput) on stdout.
    #[arg(long, env = "PDF2GSLIDES_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2GSLIDES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2GSLIDES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2GSLIDES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Shutdown ─────────────────────────────────────────────────────────
    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} finishing current file, skipping the rest…", cyan("⏹"));
            trigger.trigger();
        }
    });

    // ── Run ──────────────────────────────────────────────────────────────
    let output = match run_until(&config, &shutdown).await {
        Ok(output) => output,
        Err(Pdf2SlidesError::Cancelled) => {
            eprintln!("{}", dim("Cancelled before any file was processed."));
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Run failed"),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(if output.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let chunk_size = cli
        .chunk_size_kib
        .checked_mul(1024)
        .context("Chunk size is too large")?;

    let mut builder = PipelineConfig::builder()
        .input_dir(&cli.input_dir)
        .work_dir(&cli.work_dir)
        .keep_work_dir(cli.keep_work_dir)
        .chunk_size(chunk_size)
        .max_tries(cli.max_tries)
        .text_box_scale_x(cli.scale_x)
        .conversion_timeout_secs(cli.conversion_timeout)
        .credentials_path(&cli.credentials)
        .token_path(&cli.token);

    if let Some(ref path) = cli.soffice {
        builder = builder.soffice_path(path);
    }
    if let Some(ref token) = cli.access_token {
        builder = builder.access_token(token);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &RunOutput, show_progress: bool) {
    let stats = &output.stats;

    // The progress callback already printed one line per file.
    if !show_progress {
        for file in &output.files {
            let name = file.source.display().to_string();
            match (&file.error, &file.presentation_id) {
                (None, Some(id)) => {
                    println!("{}  {}  {}", green("✓"), name, id);
                }
                (Some(e), _) => println!("{}  {}", red("✗"), e),
                (None, None) => println!("{}  {}", cyan("?"), name),
            }
        }
    }

    if stats.total_files == 0 {
        eprintln!("{}", dim("No PDFs found."));
        return;
    }
    eprintln!(
        "   {} text boxes widened  —  {}ms total{}",
        dim(&stats.total_corrections.to_string()),
        stats.total_duration_ms,
        if stats.work_dir_removed {
            String::new()
        } else {
            dim("  (working folder kept)")
        },
    );
}

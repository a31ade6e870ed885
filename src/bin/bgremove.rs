//! CLI binary for edgequake-bgremove.
//!
//! A thin shim over the library crate: one `Session` per invocation, each
//! input file selected in turn, results saved next to the input (or into
//! `--output`) as `{stem}_no_bg.png`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use edgequake_bgremove::media::output_dir_for;
use edgequake_bgremove::{
    save_image, ErrorKind, ImageFile, ImageInfo, JobId, JobSnapshot, JobState, RemovalConfig,
    Session, SessionObserver, DEFAULT_ENDPOINT,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner whose message follows the job state, plus
/// a log line for every history eviction.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn set_file(&self, name: &str) {
        self.bar.reset_elapsed();
        self.bar.set_prefix(name.to_string());
    }

    fn println(&self, line: String) {
        self.bar.println(line);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SessionObserver for CliObserver {
    fn on_transition(&self, _job: JobId, _from: JobState, to: JobState) {
        let msg = match to {
            JobState::Idle => "",
            JobState::Validating => "Validating…",
            JobState::Uploading => "Uploading…",
            JobState::Processing => "Removing background…",
            JobState::Succeeded => "Done",
            JobState::Failed => "Failed",
        };
        self.bar.set_message(msg);
    }

    fn on_history_evicted(&self, filename: &str) {
        self.bar
            .println(dim(&format!("  history full, dropped {filename}")));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Remove the background, writing vacation_no_bg.png next to the input
  bgremove vacation.jpg

  # Several files into one directory
  bgremove a.jpg b.png c.webp -o cutouts/

  # Retry transient failures twice
  bgremove --retries 2 product.jpg

  # Print the result as a data URL instead of saving
  bgremove --data-url logo.png > logo.txt

  # JSON summary of the session history
  bgremove --json *.jpg

ENVIRONMENT VARIABLES:
  REMOVEBG_API_KEY        remove.bg API key (required)
  REMOVEBG_ENDPOINT       Override the API endpoint
  BGREMOVE_OUTPUT         Output directory
  BGREMOVE_MAX_SIZE       Maximum upload size in MiB
  RUST_LOG                Log filter (overrides -v / -q)

LIMITS:
  Only image/* files up to 10 MiB are uploaded (change with --max-size).
  Results are always PNG with a transparent background.
"#;

/// Remove image backgrounds with the remove.bg API.
#[derive(Parser, Debug)]
#[command(
    name = "bgremove",
    version,
    about = "Remove image backgrounds with the remove.bg API",
    long_about = "Remove the background of one or more images using the remove.bg API. \
Each result is saved as a transparent PNG named {stem}_no_bg.png.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files to process.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for results. Default: next to each input.
    #[arg(short, long, env = "BGREMOVE_OUTPUT")]
    output: Option<PathBuf>,

    /// remove.bg API key.
    #[arg(long, env = "REMOVEBG_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API endpoint.
    #[arg(long, env = "REMOVEBG_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Maximum upload size in MiB.
    #[arg(long, env = "BGREMOVE_MAX_SIZE", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_size: u64,

    /// remove.bg output size (auto, preview, full, …).
    #[arg(long, env = "BGREMOVE_SIZE", default_value = "auto")]
    size: String,

    /// Retries per file after a network or server error.
    #[arg(long, env = "BGREMOVE_RETRIES", default_value_t = 0)]
    retries: u32,

    /// Initial delay between retries in milliseconds (doubles each time).
    #[arg(long, env = "BGREMOVE_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "BGREMOVE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Number of results kept in the session history.
    #[arg(long, env = "BGREMOVE_HISTORY", default_value_t = 10)]
    history: usize,

    /// Print each result as a data URL on stdout instead of saving it.
    #[arg(long)]
    data_url: bool,

    /// Print the session history as JSON on stdout when done.
    #[arg(long, env = "BGREMOVE_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "BGREMOVE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BGREMOVE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BGREMOVE_QUIET")]
    quiet: bool,
}

/// One history record as printed by `--json`.
#[derive(Serialize)]
struct HistoryJson {
    filename: String,
    download_name: String,
    timestamp: DateTime<Utc>,
    original: ImageInfo,
    processed: ImageInfo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports job states; keep library logs quiet
    // unless asked for.
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

    // ── Build session ────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let observer = show_progress.then(CliObserver::new);
    let mut session = Session::with_client(config).context("Failed to start session")?;
    if let Some(ref obs) = observer {
        session = session.with_observer(Arc::clone(obs) as Arc<dyn SessionObserver>);
    }

    let log = |line: String| match &observer {
        Some(obs) => obs.println(line),
        None if !cli.quiet => eprintln!("{line}"),
        None => {}
    };

    // ── Process files ────────────────────────────────────────────────────
    let mut failed = 0usize;
    let mut saved = 0usize;

    for path in &cli.inputs {
        let file = match ImageFile::from_path(path).await {
            Ok(f) => f,
            Err(e) => {
                log(format!("  {} {}", red("✗"), red(&e.to_string())));
                failed += 1;
                continue;
            }
        };
        if let Some(ref obs) = observer {
            obs.set_file(&file.name);
        }

        let job = process_with_retries(&session, &cli, file).await?;

        match job.state {
            JobState::Succeeded => {
                let (Some(result), Some(name)) = (&job.result, job.download_name()) else {
                    continue;
                };
                if cli.data_url {
                    println!("{}", result.to_data_url());
                    saved += 1;
                    continue;
                }
                let dir = output_dir_for(path, cli.output.as_deref());
                let out = save_image(result, &dir, &name)
                    .await
                    .context("Failed to save result")?;
                log(format!(
                    "  {} {}  →  {}  {}",
                    green("✓"),
                    path.display(),
                    bold(&out.display().to_string()),
                    dim(&format!("{} bytes", result.len())),
                ));
                saved += 1;
            }
            _ => {
                failed += 1;
                let Some(detail) = job.error else { continue };
                let mut line = format!("  {} {}  {}", red("✗"), path.display(), red(&detail.message));
                if let Some(cause) = detail.cause.filter(|_| cli.verbose) {
                    line.push_str(&format!("  {}", dim(&cause)));
                }
                log(line);

                // Without a key no later file can succeed either.
                if detail.kind == ErrorKind::ConfigurationError {
                    if let Some(ref obs) = observer {
                        obs.finish();
                    }
                    anyhow::bail!(
                        "No remove.bg API key configured.\n\
                         Set REMOVEBG_API_KEY or pass --api-key."
                    );
                }
            }
        }
        session.reset();
    }

    if let Some(ref obs) = observer {
        obs.finish();
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if cli.json {
        let history: Vec<HistoryJson> = session
            .history()
            .iter()
            .map(|e| HistoryJson {
                filename: e.filename.clone(),
                download_name: e.download_name(),
                timestamp: e.timestamp,
                original: ImageInfo::from(&e.original),
                processed: ImageInfo::from(&e.processed),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&history).context("Failed to serialise history")?
        );
    }

    if !cli.quiet {
        let total = cli.inputs.len();
        eprintln!(
            "{} {}/{} images processed{}",
            if failed == 0 { green("✔") } else if saved == 0 { red("✘") } else { cyan("⚠") },
            bold(&saved.to_string()),
            total,
            if failed > 0 {
                format!("  ({} failed)", red(&failed.to_string()))
            } else {
                String::new()
            }
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} images failed", cli.inputs.len());
    }
    Ok(())
}

/// Select `file`, then retry retryable failures up to `--retries` times
/// with exponential backoff (`retry_backoff_ms * 2^attempt`).
async fn process_with_retries(session: &Session, cli: &Cli, file: ImageFile) -> Result<JobSnapshot> {
    let mut job = session
        .select_file(file)
        .await
        .context("Session refused the file")?;

    let mut attempt = 0u32;
    while job.state == JobState::Failed && job.can_retry() && attempt < cli.retries {
        let backoff = cli.retry_backoff_ms.saturating_mul(2u64.saturating_pow(attempt));
        attempt += 1;
        tracing::warn!(
            "{}: retry {}/{} after {}ms",
            job.filename.as_deref().unwrap_or("?"),
            attempt,
            cli.retries,
            backoff
        );
        tokio::time::sleep(Duration::from_millis(backoff)).await;
        job = session.retry().await.context("Retry refused")?;
    }
    Ok(job)
}

/// Map CLI args to `RemovalConfig`.
fn build_config(cli: &Cli) -> Result<RemovalConfig> {
    let mut builder = RemovalConfig::builder()
        .endpoint(cli.endpoint.clone())
        .max_upload_mib(cli.max_size)
        .output_size(cli.size.clone())
        .api_timeout_secs(cli.api_timeout)
        .history_capacity(cli.history);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }

    builder.build().context("Invalid configuration")
}

//! CLI binary for bodycomp-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use bodycomp_ocr::correlate::{CorrelationMatrix, DEFAULT_THRESHOLD};
use bodycomp_ocr::{
    extract_directory, ExtractionConfig, ExtractionOutput, ExtractionProgressCallback,
    ProgressCallback,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the run, one log line per
/// screenshot printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the screenshot currently being processed.
    current: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Listing screenshots…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} screenshots  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
    }

    fn elapsed_secs(&self) -> f64 {
        self.current
            .lock()
            .ok()
            .and_then(|mut start| start.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize, skipped: usize) {
        self.activate_bar(total);
        let note = if skipped > 0 {
            format!(" ({skipped} other files ignored)")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "{} {}{}",
            cyan("◆"),
            bold(&format!("Processing {total} screenshots…")),
            dim(&note)
        ));
    }

    fn on_screenshot_start(&self, _index: usize, _total: usize, file_name: &str) {
        if let Ok(mut start) = self.current.lock() {
            *start = Some(Instant::now());
        }
        self.bar.set_message(file_name.to_string());
    }

    fn on_screenshot_complete(&self, index: usize, total: usize, acquisition_date: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            acquisition_date,
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_screenshot_error(&self, index: usize, total: usize, error: &str) {
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} screenshots stored",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} screenshots stored  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every screenshot into a table
  bodycomp --dir-path ~/scale-screenshots --table body.csv

  # Custom tesseract location
  bodycomp --dir-path shots --table body.csv --tesseract /opt/homebrew/bin/tesseract

  # Stop on the first screenshot whose text does not fit the layout
  bodycomp --dir-path shots --table body.csv --strict

  # Report strongly correlated measurements afterwards
  bodycomp --dir-path shots --table body.csv --correlations --threshold 0.7

  # Machine-readable output
  bodycomp --dir-path shots --table body.csv --json > run.json

FILE NAMES:
  Screenshots must be named MM_DD_YYYY.jpg (or .jpeg, any case). The name
  becomes the Reading_Date key: 03_14_2024.jpg → 03/14/2024. Re-processing a
  date replaces its row. Screenshots are conditioned in place.

ENVIRONMENT VARIABLES:
  BODYCOMP_DIR         Screenshot directory (--dir-path)
  BODYCOMP_TABLE       Output CSV table (--table)
  TESSERACT_CMD        Path to the tesseract executable
  BODYCOMP_OCR_LANG    Tesseract language (default: eng)
  BODYCOMP_STRICT      Abort on the first unmappable screenshot
  BODYCOMP_NO_PROGRESS Disable the progress bar
  RUST_LOG             Override log filtering (e.g. bodycomp_ocr=debug)
"#;

/// Extract body-composition measurements from app screenshots.
#[derive(Parser, Debug)]
#[command(
    name = "bodycomp",
    version,
    about = "Extract body-composition measurements from app screenshots into a CSV table",
    long_about = "OCR a directory of smart-scale result screenshots with tesseract and \
upsert one row per measurement date into a CSV table.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing the MM_DD_YYYY.jpg screenshots.
    #[arg(long = "dir-path", env = "BODYCOMP_DIR")]
    dir_path: PathBuf,

    /// CSV table to create or update.
    #[arg(long, env = "BODYCOMP_TABLE")]
    table: PathBuf,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_CMD")]
    tesseract: Option<PathBuf>,

    /// Tesseract language code.
    #[arg(long, env = "BODYCOMP_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Brightness offset added after scaling.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    brightness: f32,

    /// Contrast multiplier for every channel sample.
    #[arg(long, default_value_t = 0.5)]
    contrast: f32,

    /// Abort on the first screenshot that cannot be mapped to a record.
    #[arg(long, env = "BODYCOMP_STRICT")]
    strict: bool,

    /// Print strongly correlated measurement pairs after extraction.
    #[arg(long)]
    correlations: bool,

    /// Minimum |r| reported by --correlations.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Output structured JSON (ExtractionOutput) instead of a summary.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "BODYCOMP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs (includes raw OCR text).
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar already reports each screenshot, so INFO logs would only
    // interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
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
    let config = build_config(&cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract_directory(&cli.dir_path, &cli.table, &config)
        .await
        .context("Extraction failed")?;

    let pairs = if cli.correlations {
        Some(
            strong_pairs(&cli.table, cli.threshold, &config)
                .context("Correlation analysis failed")?,
        )
    } else {
        None
    };

    if cli.json {
        let value = serde_json::json!({
            "output": output,
            "correlations": pairs,
        });
        let json = serde_json::to_string_pretty(&value).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        print_summary(&output, show_progress);
    }
    if let Some(pairs) = pairs {
        if pairs.is_empty() {
            println!("No measurement pairs with |r| ≥ {}", cli.threshold);
        } else {
            println!("{}", bold(&format!("Correlations with |r| ≥ {}:", cli.threshold)));
            for pair in &pairs {
                println!("  {pair}");
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .brightness(cli.brightness)
        .contrast(cli.contrast)
        .ocr_language(cli.lang.clone())
        .strict(cli.strict);

    if let Some(ref path) = cli.tesseract {
        builder = builder.tesseract_cmd(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn strong_pairs(
    table: &Path,
    threshold: f64,
    config: &ExtractionConfig,
) -> Result<Vec<bodycomp_ocr::CorrelatedPair>> {
    if !table.exists() {
        return Ok(Vec::new());
    }
    let matrix = CorrelationMatrix::load(table)?;
    Ok(matrix.strong_pairs(threshold, &config.schema))
}

fn print_summary(output: &ExtractionOutput, show_progress: bool) {
    let stats = &output.stats;

    // Without the bar nothing has reported the failures yet.
    if !show_progress {
        for failure in output.failures() {
            if let Some(ref e) = failure.error {
                eprintln!("  {} {}", red("✗"), e);
            }
        }
    }

    eprintln!(
        "{}  {}/{} screenshots  {}ms  →  {}",
        if stats.failed == 0 { green("✔") } else { cyan("⚠") },
        stats.processed,
        stats.total_screenshots,
        stats.total_duration_ms,
        bold(&output.table_path.display().to_string()),
    );
    eprintln!(
        "   {} ms in OCR  /  {} other files ignored",
        dim(&stats.ocr_duration_ms.to_string()),
        dim(&stats.skipped_files.to_string()),
    );
}

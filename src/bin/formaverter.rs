//! CLI binary for formaverter.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DispatcherConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formaverter::{
    capability, convert_dir, split_gif, BatchProgressCallback, BatchReport, BatchRequest,
    CancelFlag, ConversionRequest, Dispatcher, DispatcherConfig, Format, LogSink,
    ProgressCallback, Route,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback for batch runs. Files finish out of order, so
/// start times are keyed by source path.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<PathBuf, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` reports the number of eligible files.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Listing directory…");
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
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, source: &Path) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(source))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} files…"))
        ));
    }

    fn on_file_start(&self, source: &Path) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(source.to_path_buf(), Instant::now());
        }
        self.bar.set_message(display_name(source));
    }

    fn on_file_complete(&self, source: &Path, target: &Path, bytes_written: u64) {
        let secs = self.elapsed_secs(source);
        self.bar.println(format!(
            "  {} {} → {}  {}  {}",
            green("✓"),
            display_name(source),
            display_name(target),
            dim(&format!("{bytes_written:>8} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, source: &Path, error: &str) {
        let secs = self.elapsed_secs(source);

        // First line only; capability listings are printed in the summary.
        let first = error.lines().next().unwrap_or_default();
        let msg = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            display_name(source),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    /// The totals are printed by `print_batch_summary`, which also covers
    /// `--no-progress` runs.
    fn on_batch_complete(&self, _total_files: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Single file; the format is taken from each file extension
  formaverter convert photo.bmp photo.jpg
  formaverter convert people.json people.csv
  formaverter convert notes.odt notes.txt
  formaverter convert report.pdf report.txt
  formaverter convert prices.html prices.csv     # first <table> of the page

  # Every PNG in a directory to JPG, written beside the originals
  formaverter batch ./shots --to jpg --from png

  # Everything that can become JSON, mirrored into another tree
  formaverter batch ./data --to json --recursive --out-dir ./converted

  # One PNG per frame of an animated GIF
  formaverter split-gif spinner.gif ./frames

  # Machine-readable results
  formaverter --json batch ./shots --to webp > report.json

  # Show the capability table
  formaverter formats

ENVIRONMENT VARIABLES:
  FORMAVERTER_TEMP_DIR      Directory for in-progress output files
  FORMAVERTER_WORKERS       Batch worker count
  FORMAVERTER_JPEG_QUALITY  JPEG quality, 1-100
  FORMAVERTER_BACKGROUND    Alpha flattening colour, RRGGBB hex
  FORMAVERTER_LOG_FILE      Append logs to this file instead of stderr
  RUST_LOG                  Overrides the log filter (e.g. formaverter=debug)

EXIT CODES:
  0  every requested conversion succeeded
  1  a conversion failed (batch: at least one file failed)
  2  invalid command line
"#;

fn after_long_help() -> String {
    format!("{AFTER_HELP}\n{}", capability::listing())
}

/// Convert files between image, data and document formats.
#[derive(Parser, Debug)]
#[command(
    name = "formaverter",
    version,
    about = "Convert files between image, data and document formats",
    long_about = "Convert files between raster image formats (PNG, JPG, BMP, WebP, GIF), \
record formats (JSON, CSV, XML) and documents (HTML, PDF, OpenDocument text). Formats are \
identified by file extension; run `formaverter formats` for the supported conversions.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = after_long_help()
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory for in-progress output files (default: beside each target).
    #[arg(long, global = true, env = "FORMAVERTER_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Number of files converted concurrently in batch mode.
    #[arg(short, long, global = true, env = "FORMAVERTER_WORKERS")]
    workers: Option<usize>,

    /// JPEG encoder quality (1–100).
    #[arg(long, global = true, env = "FORMAVERTER_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Colour that transparent pixels are flattened onto, as RRGGBB hex.
    #[arg(long, global = true, env = "FORMAVERTER_BACKGROUND", default_value = "ffffff",
          value_parser = parse_hex_colour)]
    background: [u8; 3],

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true, env = "FORMAVERTER_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "FORMAVERTER_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "FORMAVERTER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FORMAVERTER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FORMAVERTER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one file; formats come from the two extensions.
    Convert {
        /// Existing source file.
        input: PathBuf,
        /// Output file; replaced if it exists.
        output: PathBuf,
    },

    /// Convert every eligible file in a directory, continuing past failures.
    Batch {
        /// Directory to scan.
        dir: PathBuf,

        /// Target format (e.g. jpg, csv, json).
        #[arg(long, value_parser = parse_format)]
        to: Format,

        /// Only convert files of this format.
        #[arg(long, value_parser = parse_format)]
        from: Option<Format>,

        /// Write outputs here instead of beside the inputs.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Descend into sub-directories.
        #[arg(short, long)]
        recursive: bool,
    },

    /// Print the supported formats and conversions.
    Formats,

    /// Write every frame of an animated GIF as a PNG.
    SplitGif {
        /// Source GIF.
        gif: PathBuf,
        /// Directory for the frames (created if missing).
        out_dir: PathBuf,
    },
}

fn parse_format(s: &str) -> std::result::Result<Format, String> {
    Format::from_tag(s).ok_or_else(|| {
        let known: Vec<&str> = Format::ALL.iter().map(|f| f.tag()).collect();
        format!("unknown format '{s}' (expected one of: {})", known.join(", "))
    })
}

fn parse_hex_colour(s: &str) -> std::result::Result<[u8; 3], String> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("expected RRGGBB hex, got '{s}'"));
    }
    let mut rgb = [0u8; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| format!("expected RRGGBB hex, got '{s}'"))?;
    }
    Ok(rgb)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let progress_cb: Option<ProgressCallback> = if show_progress(&cli) {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = match build_config(&cli, progress_cb) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", red("✘"), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&cli, &config.log_sink) {
        eprintln!("{} {:#}", red("✘"), e);
        return ExitCode::FAILURE;
    }

    match run(cli, Dispatcher::new(config)).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", red("✘"), e);
            ExitCode::FAILURE
        }
    }
}

// ── Logging setup ────────────────────────────────────────────────────────────

fn init_logging(cli: &Cli, sink: &LogSink) -> Result<()> {
    // The progress bar replaces INFO-level batch logs on the terminal.
    let show_progress = show_progress(cli);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || (show_progress && *sink == LogSink::Stderr) {
        "error"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match sink {
        LogSink::Stderr => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init(),
        LogSink::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
    }
    Ok(())
}

fn log_sink(cli: &Cli) -> LogSink {
    match cli.log_file {
        Some(ref path) => LogSink::File(path.clone()),
        None => LogSink::Stderr,
    }
}

fn show_progress(cli: &Cli) -> bool {
    !cli.quiet && !cli.no_progress && !cli.json && matches!(cli.command, Command::Batch { .. })
}

// ── Commands ─────────────────────────────────────────────────────────────────

async fn run(cli: Cli, dispatcher: Dispatcher) -> Result<ExitCode> {
    match cli.command {
        Command::Formats => {
            println!("{}", capability::listing());
            Ok(ExitCode::SUCCESS)
        }

        Command::Convert {
            ref input,
            ref output,
        } => {
            let request = ConversionRequest::new(input, output);
            match dispatcher.convert_async(request).await {
                Ok(artifact) => {
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&artifact)
                                .context("Failed to serialise result")?
                        );
                    } else if !cli.quiet {
                        let how = match artifact.route {
                            Route::IdentityCopy => "copied",
                            Route::Transcoded => "converted",
                        };
                        eprintln!(
                            "{}  {} → {}  {}  {}",
                            green("✔"),
                            artifact.source_format,
                            artifact.target_format,
                            dim(&format!("{} bytes {how}", artifact.bytes_written)),
                            bold(&artifact.path.display().to_string()),
                        );
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{} {}", red("✘"), e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Command::Batch {
            ref dir,
            to,
            from,
            ref out_dir,
            recursive,
        } => {
            let mut request = BatchRequest::new(dir, to).recursive(recursive);
            if let Some(f) = from {
                request = request.from_format(f);
            }
            if let Some(ref d) = out_dir {
                request = request.target_dir(d);
            }

            let cancel = CancelFlag::new();
            let flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    flag.cancel();
                }
            });

            let report = match convert_dir(&dispatcher, &request, &cancel).await {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("{} {}", red("✘"), e);
                    return Ok(ExitCode::FAILURE);
                }
            };

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            } else {
                print_batch_summary(&report, cli.quiet);
            }

            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::SplitGif {
            ref gif,
            ref out_dir,
        } => {
            let (gif, out_dir) = (gif.clone(), out_dir.clone());
            let splitter = dispatcher.clone();
            let result = tokio::task::spawn_blocking(move || split_gif(&splitter, &gif, &out_dir))
                .await
                .context("Frame splitting task panicked")?;
            match result {
                Ok(frames) => {
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&frames)
                                .context("Failed to serialise frame list")?
                        );
                    } else if !cli.quiet {
                        for f in &frames {
                            eprintln!("  {} {}", green("✓"), dim(&f.display().to_string()));
                        }
                        eprintln!("{} {} frames written", green("✔"), bold(&frames.len().to_string()));
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{} {}", red("✘"), e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Failures are always printed in full; everything else respects `--quiet`.
fn print_batch_summary(report: &BatchReport, quiet: bool) {
    for failure in &report.failed {
        eprintln!("{} {}", red("✗"), failure);
    }
    if quiet {
        return;
    }
    if !report.skipped.is_empty() {
        eprintln!("{}", dim(&format!("   {} files skipped", report.skipped.len())));
    }
    if !report.cancelled.is_empty() {
        eprintln!(
            "{} {} files not converted (cancelled)",
            cyan("⚠"),
            report.cancelled.len()
        );
    }
    eprintln!(
        "{}  {}/{} converted  {} failed  {}ms",
        if report.is_success() {
            green("✔")
        } else {
            cyan("⚠")
        },
        report.converted.len(),
        report.eligible(),
        report.failed.len(),
        report.duration_ms,
    );
}

/// Map CLI args to `DispatcherConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DispatcherConfig> {
    let mut builder = DispatcherConfig::builder()
        .jpeg_quality(cli.jpeg_quality)
        .background(cli.background)
        .log_sink(log_sink(cli));

    if let Some(n) = cli.workers {
        builder = builder.workers(n);
    }
    if let Some(ref dir) = cli.temp_dir {
        builder = builder.temp_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

//! CLI binary for officepdf.
//!
//! A thin shim over the library crate: every input becomes one
//! `OperationPipeline` against the process-wide LibreOffice engine.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use officepdf::convert::{resolve_format, write_atomic};
use officepdf::pipeline::input::resolve_input;
use officepdf::{
    engine, ConversionMetadata, DocumentFormat, ErrorCode, OperationPipeline, OperationResult,
    PipelineConfig, ProgressCallback, SofficeConfig, SofficeEngine,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
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

// ── Per-file progress bar ────────────────────────────────────────────────────

/// One indicatif bar per input, driven by the pipeline's 0–100 progress.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(multi: &MultiProgress, label: &str) -> Self {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = multi.add(ProgressBar::new(100));
        bar.set_style(style);
        bar.set_prefix(label.to_string());
        bar.set_message("Queued");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// A bar that is never drawn, for `--no-progress`, `--quiet` and `--json`.
    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, percent: u8, message: &str) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(message.to_string());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a presentation next to the current directory
  office2pdf Quarterly.pptx

  # Several documents at once, into one directory
  office2pdf Report.docx notes.odt memo.rtf -o pdf/

  # Force the format when the extension is unusual
  office2pdf --format word contract.DOCX

  # Convert from URL
  office2pdf https://example.com/slides.pptx -o out/

  # Machine-readable results
  office2pdf --json *.docx > results.json

SUPPORTED FORMATS:
  presentation   ppt, pptx, pps, ppsx, odp
  word           doc, docx, odt
  rtf            rtf

ENVIRONMENT VARIABLES:
  SOFFICE_PATH             Path to the soffice binary (skips the PATH search)
  OFFICE2PDF_PROFILE_DIR   LibreOffice user profile used by the converter
  RUST_LOG                 Overrides the log filter (e.g. officepdf=debug)

SETUP:
  LibreOffice must be installed. It is located through SOFFICE_PATH, then
  PATH, then the platform's default install locations. The converter keeps
  a private profile so it never interferes with a running desktop session.
"#;

/// Convert office documents to PDF with a headless LibreOffice.
#[derive(Parser, Debug)]
#[command(
    name = "office2pdf",
    version,
    about = "Convert presentations, word-processing documents and RTF files to PDF",
    long_about = "Convert office documents (local files or URLs) to PDF. One headless \
LibreOffice instance is started on first use and shared by every conversion.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local document paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Directory for the generated PDFs.
    #[arg(short, long, env = "OFFICE2PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Document format; detected from the extension when omitted.
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Path to the soffice binary.
    #[arg(long, env = "SOFFICE_PATH")]
    soffice: Option<PathBuf>,

    /// LibreOffice user-profile directory.
    #[arg(long, env = "OFFICE2PDF_PROFILE_DIR")]
    profile_dir: Option<PathBuf>,

    /// Number of inputs processed at once.
    #[arg(short = 'j', long, env = "OFFICE2PDF_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    concurrency: u16,

    /// Share of the progress bar given to engine start-up (0–100).
    #[arg(long, env = "OFFICE2PDF_LOAD_SHARE", default_value_t = 80)]
    load_share: u8,

    /// Per-document timeout in seconds (0 disables it).
    #[arg(long, env = "OFFICE2PDF_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "OFFICE2PDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print a JSON report instead of the human summary.
    #[arg(long, env = "OFFICE2PDF_JSON")]
    json: bool,

    /// Disable progress bars.
    #[arg(long, env = "OFFICE2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OFFICE2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OFFICE2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Presentation,
    Word,
    Rtf,
}

impl From<FormatArg> for DocumentFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Presentation => DocumentFormat::Presentation,
            FormatArg::Word => DocumentFormat::WordProcessing,
            FormatArg::Rtf => DocumentFormat::RichText,
        }
    }
}

/// What happened to one input, as printed or serialised.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Report {
    Converted {
        input: String,
        output: PathBuf,
        metadata: ConversionMetadata,
    },
    Failed {
        input: String,
        code: Option<ErrorCode>,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl Report {
    fn failed(input: &str, code: Option<ErrorCode>, message: impl Into<String>) -> Self {
        Report::Failed {
            input: input.to_string(),
            code,
            message: message.into(),
            detail: None,
        }
    }

    fn is_failure(&self) -> bool {
        matches!(self, Report::Failed { .. })
    }
}

enum Interrupt {
    Shutdown,
    Deadline,
}

/// Shared, read-only settings for every input.
struct Job {
    config: PipelineConfig,
    format: Option<DocumentFormat>,
    output_dir: PathBuf,
    timeout: Option<Duration>,
    download_timeout: u64,
    shutdown: CancellationToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bars provide all the feedback that matters while they are shown.
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

    // ── Shared engine ────────────────────────────────────────────────────
    let mut soffice = SofficeConfig::default();
    if let Some(ref path) = cli.soffice {
        soffice = soffice.binary(path);
    }
    if let Some(ref dir) = cli.profile_dir {
        soffice = soffice.profile_dir(dir);
    }
    let handle = engine::shared_with(|| Arc::new(SofficeEngine::new(soffice)));

    let config = PipelineConfig::builder()
        .load_share(cli.load_share)
        .build()
        .context("Invalid configuration")?;

    // ── Ctrl-C cancels every operation at its next checkpoint ────────────
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling conversions");
                shutdown.cancel();
            }
        });
    }

    let job = Arc::new(Job {
        config,
        format: cli.format.map(Into::into),
        output_dir: cli.output_dir.clone(),
        timeout: (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)),
        download_timeout: cli.download_timeout,
        shutdown: shutdown.clone(),
    });

    let multi = MultiProgress::new();
    let mut reports: Vec<(usize, Report)> = futures::stream::iter(cli.inputs.iter().enumerate())
        .map(|(index, input)| {
            let progress = if show_progress {
                BarProgress::new(&multi, &short_label(input))
            } else {
                BarProgress::hidden()
            };
            let handle = handle.clone();
            let job = Arc::clone(&job);
            async move {
                let report = convert_one(&job, handle, input, &progress).await;
                progress.bar.finish_and_clear();
                (index, report)
            }
        })
        .buffer_unordered(usize::from(cli.concurrency))
        .collect()
        .await;
    reports.sort_by_key(|(index, _)| *index);
    let reports: Vec<Report> = reports.into_iter().map(|(_, r)| r).collect();

    // ── Summary ──────────────────────────────────────────────────────────
    let failed = reports.iter().filter(|r| r.is_failure()).count();
    if cli.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&reports);
    }

    if shutdown.is_cancelled() {
        anyhow::bail!("Interrupted");
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} conversions failed", reports.len());
    }
    Ok(())
}

/// Resolve, convert and write one input; every failure becomes a report.
async fn convert_one(
    job: &Job,
    handle: officepdf::EngineHandle,
    input: &str,
    progress: &BarProgress,
) -> Report {
    progress.on_progress(0, "Reading input…");
    let file = match resolve_input(input, job.download_timeout).await {
        Ok(file) => file,
        Err(e) => return Report::failed(input, None, e.to_string()),
    };
    let format = match resolve_format(&file, job.format) {
        Ok(format) => format,
        Err(e) => return Report::failed(input, Some(ErrorCode::FileTypeInvalid), e.to_string()),
    };

    let pipeline = OperationPipeline::with_config(format.adapter(), handle, job.config);
    let run = pipeline.run(file.into(), Some(progress));
    tokio::pin!(run);

    let deadline = async {
        match job.timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    let interrupted = tokio::select! {
        result = &mut run => Ok(result),
        _ = job.shutdown.cancelled() => Err(Interrupt::Shutdown),
        _ = deadline => Err(Interrupt::Deadline),
    };

    let result = match interrupted {
        Ok(result) => result,
        Err(Interrupt::Shutdown) => {
            pipeline.cancel();
            run.await
        }
        Err(Interrupt::Deadline) => {
            // Conversion itself cannot be interrupted; abandoning the future
            // kills the soffice child.
            pipeline.cancel();
            let secs = job.timeout.map(|t| t.as_secs()).unwrap_or_default();
            debug!(input, secs, "Abandoning conversion after timeout");
            return Report::failed(
                input,
                Some(ErrorCode::ProcessingCancelled),
                format!("Timed out after {secs}s"),
            );
        }
    };

    match result {
        OperationResult::Success(done) => {
            let path = job.output_dir.join(&done.suggested_file_name);
            match write_atomic(&path, &done.blob).await {
                Ok(()) => Report::Converted {
                    input: input.to_string(),
                    output: path,
                    metadata: done.metadata,
                },
                Err(e) => Report::failed(input, None, e.to_string()),
            }
        }
        OperationResult::Error(e) => Report::Failed {
            input: input.to_string(),
            code: Some(e.code),
            message: e.message,
            detail: e.detail,
        },
    }
}

fn print_summary(reports: &[Report]) {
    let mut converted = 0usize;
    for report in reports {
        match report {
            Report::Converted {
                input,
                output,
                metadata,
            } => {
                converted += 1;
                eprintln!(
                    "  {} {}  →  {}  {}",
                    green("✓"),
                    input,
                    bold(&output.display().to_string()),
                    dim(&format!(
                        "{} bytes  {:.1}s",
                        metadata.output_bytes,
                        metadata.duration_ms as f64 / 1000.0
                    )),
                );
            }
            Report::Failed {
                input,
                code,
                message,
                detail,
            } => {
                let code = code.as_ref().map(ErrorCode::to_string).unwrap_or_else(|| "INPUT".into());
                eprintln!("  {} {}  {}  {}", red("✗"), input, dim(&code), red(message));
                if let Some(detail) = detail {
                    eprintln!("      {}", dim(&truncate(detail, 160)));
                }
            }
        }
    }

    let total = reports.len();
    if converted == total {
        eprintln!(
            "{} {} document(s) converted",
            green("✔"),
            bold(&converted.to_string())
        );
    } else {
        eprintln!(
            "{} {}/{} document(s) converted  ({} failed)",
            if converted == 0 { red("✘") } else { cyan("⚠") },
            bold(&converted.to_string()),
            total,
            red(&(total - converted).to_string()),
        );
    }
}

/// Bar label: the file name for paths, the last URL segment for URLs.
fn short_label(input: &str) -> String {
    let trimmed = input.trim_end_matches('/');
    let tail = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let name = Path::new(tail)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| tail.to_string());
    truncate(&name, 28)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_file_name() {
        assert_eq!(short_label("/tmp/decks/Quarterly.pptx"), "Quarterly.pptx");
        assert_eq!(short_label("https://example.com/a/memo.rtf"), "memo.rtf");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd\u{2026}");
    }

    #[test]
    fn cli_parses_multiple_inputs() {
        let cli = Cli::try_parse_from(["office2pdf", "a.docx", "b.pptx", "--format", "word"])
            .unwrap();
        assert_eq!(cli.inputs, vec!["a.docx", "b.pptx"]);
        assert!(matches!(cli.format, Some(FormatArg::Word)));
        assert_eq!(cli.concurrency, 4);
    }

    #[test]
    fn failed_report_serialises_code() {
        let report = Report::failed("x.txt", Some(ErrorCode::FileTypeInvalid), "nope");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["code"], "FILE_TYPE_INVALID");
        assert!(json.get("detail").is_none());
    }
}

//! CLI binary for edgequake-pdf2json.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints progress and the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2json::{
    inspect, run, ExtractionConfig, ExtractionProgressCallback, ProgressCallback, ProviderKind,
    RunSummary,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one line per provider start, a spinner while pages
/// are analysed, and a line per failed page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Spinner animation is off when only the plain lines are wanted.
    animate: bool,
}

impl CliProgressCallback {
    fn new(animate: bool) -> Arc<Self> {
        let bar = if animate {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS);
            bar.set_style(style);
            bar.set_prefix("Preparing");
            bar.set_message("Opening PDF…");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        } else {
            ProgressBar::hidden()
        };

        Arc::new(Self {
            bar,
            animate,
        })
    }

    fn line(&self, msg: String) {
        if self.animate {
            self.bar.println(msg);
        } else {
            eprintln!("{msg}");
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_rasterized(&self, page_count: usize) {
        self.line(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rasterised {page_count} pages"))
        ));
    }

    fn on_provider_start(&self, kind: ProviderKind, position: usize, enabled: usize) {
        self.line(format!(
            "{} Running {}... {}",
            cyan("▸"),
            bold(kind.display_name()),
            dim(&format!("({position}/{enabled})"))
        ));
        self.bar.set_prefix(kind.display_name());
        self.bar.set_message("loading model…");
    }

    fn on_page_complete(&self, _kind: ProviderKind, page_idx: usize, total_pages: usize) {
        self.bar
            .set_message(format!("page {}/{}", page_idx + 1, total_pages));
    }

    fn on_page_error(&self, _kind: ProviderKind, page_idx: usize, total_pages: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.line(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_idx + 1,
            total_pages,
            red(&msg),
        ));
    }

    fn on_provider_complete(&self, kind: ProviderKind, error: Option<&str>) {
        match error {
            None => self.line(format!("  {} {}", green("✓"), kind.display_name())),
            Some(e) => self.line(format!(
                "  {} {} failed: {}",
                red("✗"),
                kind.display_name(),
                red(e)
            )),
        }
    }

    fn on_run_complete(&self, output_path: &Path) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Extraction complete. Results saved to {}",
            green("✔"),
            bold(&output_path.display().to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR only
  pdf2json --pdf invoice.pdf --output out/invoice.json --doctr

  # All three engines
  pdf2json --pdf paper.pdf --output paper.json --doctr --layoutparser --deepdoctection

  # Layout with a stricter threshold and a different model
  pdf2json --pdf scan.pdf --output scan.json --layoutparser \
    --layout-threshold 0.8 --layout-model "lp://PrimaLayout/mask_rcnn_R_50_FPN_3x/config"

  # No engine enabled: writes {}
  pdf2json --pdf doc.pdf --output empty.json

  # Inspect PDF metadata (no engine needed)
  pdf2json --pdf doc.pdf --output unused.json --inspect-only

OUTPUT:
  A single JSON object. Keys appear only for enabled engines, in this order:
    doctr           array, one docTR page export per page
    layoutparser    array, one layout page per page
    deepdoctection  one document object
  A failed page is {"page_idx", "error": "ProviderRuntimeError", "message"}.
  A failed engine is {"error": "ProviderInitError", "message"}.

EXIT STATUS:
  0 when the JSON file was written, even if engines recorded errors in it.
  Non-zero when the PDF cannot be read or rasterised, or the output cannot
  be written.

ENVIRONMENT VARIABLES:
  PDF2JSON_*          Every flag can be set through its env var (see --help)
  PDFIUM_LIB_PATH     Path to an existing libpdfium
  RUST_LOG            Override the log filter (e.g. edgequake_pdf2json=debug)
"#;

/// Run PDFs through OCR, layout and full-document engines into one JSON file.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2json",
    version,
    about = "Run PDFs through OCR, layout and full-document engines into one JSON file",
    long_about = "Rasterise a PDF once, run it through any subset of three document-analysis \
engines (docTR OCR, LayoutParser, deepdoctection) and write their native results, side by side, \
into a single JSON artifact.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file.
    #[arg(long, env = "PDF2JSON_PDF")]
    pdf: PathBuf,

    /// Output JSON file. Parent directories are created.
    #[arg(short, long, env = "PDF2JSON_OUTPUT")]
    output: PathBuf,

    /// Run the docTR OCR engine.
    #[arg(long, env = "PDF2JSON_DOCTR")]
    doctr: bool,

    /// Run the LayoutParser layout engine.
    #[arg(long, env = "PDF2JSON_LAYOUTPARSER")]
    layoutparser: bool,

    /// Run the deepdoctection full-document pipeline.
    #[arg(long, env = "PDF2JSON_DEEPDOCTECTION")]
    deepdoctection: bool,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2JSON_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2JSON_PASSWORD")]
    password: Option<String>,

    /// Base URL of the docTR engine service.
    #[arg(long, env = "PDF2JSON_DOCTR_URL")]
    doctr_url: Option<String>,

    /// Base URL of the LayoutParser engine service.
    #[arg(long, env = "PDF2JSON_LAYOUTPARSER_URL")]
    layoutparser_url: Option<String>,

    /// Base URL of the deepdoctection engine service.
    #[arg(long, env = "PDF2JSON_DEEPDOCTECTION_URL")]
    deepdoctection_url: Option<String>,

    /// LayoutParser model identifier.
    #[arg(long, env = "PDF2JSON_LAYOUT_MODEL")]
    layout_model: Option<String>,

    /// LayoutParser detection threshold (0.0–1.0).
    #[arg(long, env = "PDF2JSON_LAYOUT_THRESHOLD")]
    layout_threshold: Option<f32>,

    /// Named deepdoctection pipeline configuration.
    #[arg(long, env = "PDF2JSON_DEEPDOCTECTION_CONFIG")]
    deepdoctection_config: Option<String>,

    /// Per engine call timeout in seconds.
    #[arg(long, env = "PDF2JSON_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Retries on a transient engine failure.
    #[arg(long, env = "PDF2JSON_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, run no engine.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2JSON_QUIET")]
    quiet: bool,
}

/// Default log level. The animated spinner replaces INFO logs; with
/// `--no-progress` they are printed alongside the progress lines.
fn log_filter(verbose: bool, quiet: bool, animate: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet || animate {
        "error"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet;
    let animate = show_progress && !cli.no_progress && !cli.verbose;
    let filter = log_filter(cli.verbose, cli.quiet, animate);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.pdf, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;
        println!("File:         {}", cli.pdf.display());
        if let Some(ref t) = info.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = info.author {
            println!("Author:       {}", a);
        }
        println!("Pages:        {}", info.page_count);
        println!("PDF Version:  {}", info.pdf_version);
        if let Some(ref p) = info.producer {
            println!("Producer:     {}", p);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new(animate);
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let summary = run(&cli.pdf, &cli.output, &config)
        .await
        .context("Extraction failed")?;

    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .request_timeout_secs(cli.timeout)
        .max_retries(cli.max_retries);

    for (enabled, kind) in [
        (cli.doctr, ProviderKind::Doctr),
        (cli.layoutparser, ProviderKind::LayoutParser),
        (cli.deepdoctection, ProviderKind::DeepDoctection),
    ] {
        if enabled {
            builder = builder.enable(kind);
        }
    }

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref url) = cli.doctr_url {
        builder = builder.ocr_endpoint(url);
    }
    if let Some(ref url) = cli.layoutparser_url {
        builder = builder.layout_endpoint(url);
    }
    if let Some(ref url) = cli.deepdoctection_url {
        builder = builder.full_pipeline_endpoint(url);
    }
    if let Some(ref model) = cli.layout_model {
        builder = builder.layout_model(model);
    }
    if let Some(threshold) = cli.layout_threshold {
        builder = builder.layout_threshold(threshold);
    }
    if let Some(ref name) = cli.deepdoctection_config {
        builder = builder.full_pipeline_config(name);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &RunSummary) {
    let failed = summary.failed_providers();
    let pages = summary
        .page_count
        .map(|n| format!("{n} pages  "))
        .unwrap_or_default();
    eprintln!(
        "{}  {}/{} engines  {}{}ms",
        if failed == 0 { green("✔") } else { cyan("⚠") },
        summary.providers.len() - failed,
        summary.providers.len(),
        pages,
        summary.total_duration_ms,
    );

    for report in &summary.providers {
        if !report.failed_pages.is_empty() {
            eprintln!(
                "   {} {} page(s) failed in {}",
                red("✗"),
                report.failed_pages.len(),
                report.provider.display_name()
            );
        }
        if !report.normalization_issues.is_empty() {
            eprintln!(
                "   {} {} field(s) replaced with null in {}",
                cyan("⚠"),
                report.normalization_issues.len(),
                report.provider.display_name()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_follows_flags() {
        assert_eq!(log_filter(true, false, false), "debug");
        assert_eq!(log_filter(false, true, false), "error");
        assert_eq!(log_filter(false, false, true), "error");
        assert_eq!(log_filter(false, false, false), "info");
    }

    #[test]
    fn no_progress_flag_parses() {
        let cli = Cli::try_parse_from(["pdf2json", "--pdf", "a.pdf", "-o", "a.json", "--no-progress"])
            .unwrap();
        assert!(cli.no_progress);
        assert!(!cli.quiet);
    }
}

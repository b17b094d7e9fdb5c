//! # edgequake-pdf2json
//!
//! Run a PDF through up to three document-analysis engines and merge their
//! results into one JSON artifact.
//!
//! | Key | Engine | Input |
//! |-----|--------|-------|
//! | `doctr` | OCR (words, lines, blocks) | page images |
//! | `layoutparser` | layout region detection | page images |
//! | `deepdoctection` | full-document analysis | the PDF itself |
//!
//! Each engine keeps its own native result shape. Nothing is merged across
//! engines: the artifact is a mapping from engine key to that engine's
//! normalized result, so consumers can pick whichever view they need.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      check path, permissions and the %PDF magic bytes
//!  ├─ 2. Render     rasterise pages once via pdfium (spawn_blocking)
//!  ├─ 3. Analyse    each enabled engine in fixed order, model loaded lazily
//!  ├─ 4. Normalize  native result → JSON value, fields untouched
//!  └─ 5. Output     one pretty-printed JSON object, written atomically
//! ```
//!
//! Rendering is skipped when only the full-document engine is enabled.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2json::{run, ExtractionConfig, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .enable(ProviderKind::Doctr)
//!         .enable(ProviderKind::LayoutParser)
//!         .build()?;
//!     let summary = run("document.pdf", "out/results.json", &config).await?;
//!     eprintln!("{} providers failed", summary.failed_providers());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2json` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdf2json = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, FullPipelineSettings, LayoutSettings, OcrSettings,
};
pub use error::{EngineError, NormalizationIssue, Pdf2JsonError, ProviderError};
pub use extract::{extract, extract_from_bytes, inspect, run, run_sync, Extraction, RunState};
pub use output::{DocumentInfo, ProviderOutcome, ProviderReport, ResultAggregate, RunSummary};
pub use pipeline::render::{PageImage, Rasterizer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{
    DocumentModel, EngineLoader, LayoutModel, OcrModel, ProviderKind, ProviderSet,
};

//! Extraction entry points and the run orchestrator.
//!
//! A run moves through
//! `Idle → Rasterizing → Analyzing(provider) … → Serializing → Done`,
//! with `Error` reachable from any state. Providers run one at a time in
//! the fixed [`ProviderKind::ALL`] order:
//!
//! ```text
//! validate ──▶ rasterise (once) ──▶ doctr ──▶ layoutparser ──▶ deepdoctection ──▶ write
//!                  │                  ▲           ▲                  ▲
//!                  └── page images ───┴───────────┘                  └── PDF path
//! ```
//!
//! Each provider's model is loaded right before it runs and dropped as soon
//! as it finishes, so at most one model is resident at a time. Page images
//! are released after the last provider that reads them.

use crate::config::ExtractionConfig;
use crate::error::{Pdf2JsonError, ProviderError};
use crate::output::{DocumentInfo, ProviderOutcome, ProviderReport, ResultAggregate, RunSummary};
use crate::pipeline::normalize::normalize;
use crate::pipeline::input;
use crate::pipeline::render::{self, PageImage, PdfiumRasterizer, Rasterizer};
use crate::progress::ProgressCallback;
use crate::provider::http::{HttpEngineLoader, UnavailableEngineLoader};
use crate::provider::{AnalysisRequest, EngineLoader, Provider, ProviderKind};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Orchestrator state, reported through
/// [`crate::progress::ExtractionProgressCallback::on_state_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Rasterizing,
    Analyzing(ProviderKind),
    Serializing,
    Done,
    Error,
}

/// The in-memory result of [`extract`].
#[derive(Debug, Clone)]
pub struct Extraction {
    pub results: ResultAggregate,
    pub summary: RunSummary,
}

/// Run every enabled provider over `pdf_path` and return the aggregate
/// without writing it anywhere.
///
/// # Errors
/// Returns `Err(Pdf2JsonError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - Rasterisation failed while an image-consuming provider is enabled
///
/// A provider that fails to load, or a page that fails inside a provider,
/// is recorded in the aggregate and does not fail the run.
pub async fn extract(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<Extraction, Pdf2JsonError> {
    let progress = config.progress_callback.as_ref();
    let extraction = analyze_document(pdf_path.as_ref(), config)
        .await
        .inspect_err(|_| set_state(progress, RunState::Error))?;
    set_state(progress, RunState::Done);
    Ok(extraction)
}

/// Run every enabled provider over `pdf_path` and write the aggregate as
/// JSON to `output_path`.
///
/// The file is written atomically (temp file + rename) and parent
/// directories are created. On a fatal error no file is written.
pub async fn run(
    pdf_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunSummary, Pdf2JsonError> {
    let progress = config.progress_callback.as_ref();
    let output_path = output_path.as_ref();

    let result = async {
        let extraction = analyze_document(pdf_path.as_ref(), config).await?;

        set_state(progress, RunState::Serializing);
        let json = extraction.results.to_json_pretty()?;
        write_atomic(output_path, json.as_bytes()).await?;
        info!("Results saved to {}", output_path.display());

        let mut summary = extraction.summary;
        summary.output_path = Some(output_path.to_path_buf());
        Ok::<_, Pdf2JsonError>(summary)
    }
    .await;

    match result {
        Ok(summary) => {
            if let Some(cb) = progress {
                cb.on_run_complete(output_path);
            }
            set_state(progress, RunState::Done);
            Ok(summary)
        }
        Err(e) => {
            set_state(progress, RunState::Error);
            Err(e)
        }
    }
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    pdf_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunSummary, Pdf2JsonError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2JsonError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(pdf_path, output_path, config))
}

/// Extract from PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed when the
/// call returns.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<Extraction, Pdf2JsonError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("pdf2json-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2JsonError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2JsonError::Internal(format!("tempfile write: {e}")))?;
    extract(tmp.path(), config).await
}

/// Read document information without running any provider.
pub async fn inspect(
    pdf_path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<DocumentInfo, Pdf2JsonError> {
    let pdf_path = input::validate_pdf(pdf_path.as_ref())?;
    render::extract_info(&pdf_path, password).await
}

// ── Orchestrator ─────────────────────────────────────────────────────────

async fn analyze_document(
    pdf_path: &Path,
    config: &ExtractionConfig,
) -> Result<Extraction, Pdf2JsonError> {
    let total_start = Instant::now();
    let progress = config.progress_callback.as_ref();
    set_state(progress, RunState::Idle);
    info!("Starting extraction: {}", pdf_path.display());

    // ── Step 1: Validate input ───────────────────────────────────────────
    let pdf_path = input::validate_pdf(pdf_path)?;

    let mut results = ResultAggregate::new();
    let mut reports = Vec::new();

    if config.providers.is_empty() {
        info!("No providers enabled; nothing to analyse");
        return Ok(Extraction {
            results,
            summary: build_summary(None, reports, 0, total_start),
        });
    }

    // ── Step 2: Rasterise, only when some provider reads page images ─────
    let render_start = Instant::now();
    let mut pages: Option<Vec<PageImage>> = if config.providers.needs_pages() {
        set_state(progress, RunState::Rasterizing);
        let rendered = resolve_rasterizer(config).rasterize(&pdf_path).await?;
        info!(
            "Rasterised {} pages in {}ms",
            rendered.len(),
            render_start.elapsed().as_millis()
        );
        if let Some(cb) = progress {
            cb.on_rasterized(rendered.len());
        }
        Some(rendered)
    } else {
        debug!("No image-consuming provider enabled; skipping rasterisation");
        None
    };
    let rasterize_duration_ms = match pages {
        Some(_) => render_start.elapsed().as_millis() as u64,
        None => 0,
    };
    let page_count = pages.as_ref().map(Vec::len);

    // ── Step 3: Run providers in order ───────────────────────────────────
    let engines = resolve_engines(config);
    let enabled = config.providers.len();
    let last_page_consumer = config.providers.last_page_consumer();

    for (position, kind) in config.providers.iter().enumerate() {
        set_state(progress, RunState::Analyzing(kind));
        if let Some(cb) = progress {
            cb.on_provider_start(kind, position + 1, enabled);
        }
        info!("Running {}...", kind.display_name());

        let request = if kind.consumes_pages() {
            let images = pages.as_deref().ok_or_else(|| {
                Pdf2JsonError::Internal(format!("page images released before {kind} ran"))
            })?;
            AnalysisRequest::Pages(images)
        } else {
            AnalysisRequest::Document(&pdf_path)
        };

        let (outcome, report) = run_provider(kind, request, engines.as_ref(), config).await;
        results.record(kind, outcome);
        reports.push(report);

        if last_page_consumer == Some(kind) {
            pages = None;
            debug!("Released page images after {}", kind);
        }
    }

    let summary = build_summary(page_count, reports, rasterize_duration_ms, total_start);
    info!(
        "Extraction complete: {}/{} providers succeeded, {}ms total",
        enabled - summary.failed_providers(),
        enabled,
        summary.total_duration_ms
    );
    Ok(Extraction { results, summary })
}

/// Load, run and normalize one provider. The model is dropped on return.
///
/// Every failure, including a result that cannot be normalized, becomes a
/// [`ProviderOutcome::Failed`] for this provider alone.
async fn run_provider(
    kind: ProviderKind,
    request: AnalysisRequest<'_>,
    engines: &dyn EngineLoader,
    config: &ExtractionConfig,
) -> (ProviderOutcome, ProviderReport) {
    let start = Instant::now();
    let progress = config.progress_callback.as_ref();

    let analysed = match Provider::load(kind, engines, config).await {
        Ok(provider) => provider.analyze(request, progress).await,
        Err(e) => Err(e),
    };

    let mut report = ProviderReport {
        provider: kind,
        error: None,
        failed_pages: Vec::new(),
        normalization_issues: Vec::new(),
        duration_ms: 0,
    };

    let normalized = analysed.and_then(|result| {
        let failed_pages: Vec<usize> = result
            .page_failures()
            .into_iter()
            .filter_map(|e| match e {
                ProviderError::Runtime { page_idx, .. } => Some(*page_idx),
                _ => None,
            })
            .collect();
        normalize(&result)
            .map(|n| (n, failed_pages))
            .map_err(|e| normalization_failed(kind, e))
    });

    let outcome = match normalized {
        Ok((normalized, failed_pages)) => {
            for issue in &normalized.issues {
                warn!("{}: {}", kind, issue);
            }
            report.failed_pages = failed_pages;
            report.normalization_issues = normalized.issues;
            ProviderOutcome::Completed(normalized.value)
        }
        Err(e) => {
            warn!("{} failed: {}", kind.display_name(), e);
            report.error = Some(e.detail());
            ProviderOutcome::Failed(e)
        }
    };

    report.duration_ms = start.elapsed().as_millis() as u64;
    if report.succeeded() {
        info!(
            "{} finished in {}ms ({} failed pages)",
            kind.display_name(),
            report.duration_ms,
            report.failed_pages.len()
        );
    }
    if let Some(cb) = progress {
        cb.on_provider_complete(kind, report.error.as_deref());
    }
    (outcome, report)
}

fn normalization_failed(kind: ProviderKind, e: serde_json::Error) -> ProviderError {
    ProviderError::Normalization {
        provider: kind.key().to_string(),
        detail: e.to_string(),
    }
}

/// The injected engines, or the HTTP backend. A backend that cannot be
/// built fails each provider's load instead of the run.
fn resolve_engines(config: &ExtractionConfig) -> Arc<dyn EngineLoader> {
    match &config.engines {
        Some(loader) => Arc::clone(loader),
        None => match HttpEngineLoader::new(config) {
            Ok(loader) => Arc::new(loader),
            Err(e) => {
                warn!("Engine backend unavailable: {}", e);
                Arc::new(UnavailableEngineLoader::new(e.to_string()))
            }
        },
    }
}

fn resolve_rasterizer(config: &ExtractionConfig) -> Arc<dyn Rasterizer> {
    match &config.rasterizer {
        Some(r) => Arc::clone(r),
        None => Arc::new(PdfiumRasterizer::new(
            config.dpi,
            config.max_rendered_pixels,
            config.password.clone(),
        )),
    }
}

fn set_state(progress: Option<&ProgressCallback>, state: RunState) {
    debug!("State → {:?}", state);
    if let Some(cb) = progress {
        cb.on_state_change(state);
    }
}

fn build_summary(
    page_count: Option<usize>,
    providers: Vec<ProviderReport>,
    rasterize_duration_ms: u64,
    total_start: Instant,
) -> RunSummary {
    RunSummary {
        output_path: None,
        page_count,
        providers,
        rasterize_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    }
}

/// Write `contents` to `path` via a sibling temp file and a rename.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Pdf2JsonError> {
    let write_err = |source: std::io::Error| Pdf2JsonError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = tmp_path_for(path);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PROVIDER_INIT_ERROR;

    #[test]
    fn tmp_path_is_sibling() {
        assert_eq!(
            tmp_path_for(Path::new("out/results.json")),
            PathBuf::from("out/results.json.tmp")
        );
        assert_eq!(tmp_path_for(Path::new("results")), PathBuf::from("results.tmp"));
    }

    #[tokio::test]
    async fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/out.json");
        write_atomic(&target, b"{}").await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{}");
        assert!(!tmp_path_for(&target).exists());
    }

    #[tokio::test]
    async fn write_atomic_into_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = write_atomic(&blocker.join("out.json"), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2JsonError::OutputWriteFailed { .. }));
    }

    #[tokio::test]
    async fn unbuildable_backend_fails_each_provider_load() {
        let config = ExtractionConfig::default();
        let engines = UnavailableEngineLoader::new("HTTP client: no TLS backend");

        for kind in ProviderKind::ALL {
            let (outcome, report) =
                run_provider(kind, AnalysisRequest::Pages(&[]), &engines, &config).await;
            match outcome {
                ProviderOutcome::Failed(e) => {
                    assert_eq!(e.label(), PROVIDER_INIT_ERROR);
                    assert!(e.detail().contains("no TLS backend"), "got: {e}");
                }
                other => panic!("{kind}: expected a failure, got {other:?}"),
            }
            assert!(!report.succeeded());
        }
    }

    #[test]
    fn normalization_failure_is_recorded_for_its_provider() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e = normalization_failed(ProviderKind::DeepDoctection, source);

        let mut results = ResultAggregate::new();
        results.record(ProviderKind::DeepDoctection, ProviderOutcome::Failed(e));
        let v: serde_json::Value =
            serde_json::from_str(&results.to_json_pretty().unwrap()).unwrap();
        assert_eq!(v["deepdoctection"]["error"], "NormalizationError");
        assert!(v["deepdoctection"]["message"].as_str().unwrap().contains("EOF"));
    }
}

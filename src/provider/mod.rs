//! Analysis providers: the fixed naming table, the engine capability traits
//! and the tagged dispatch that hands each provider its request shape.
//!
//! Three provider kinds exist and no others:
//!
//! | Kind | Output key | Consumes | Result |
//! |------|------------|----------|--------|
//! | OCR | `doctr` | page images | one [`OcrPage`] per page |
//! | Layout | `layoutparser` | page images | one [`LayoutPage`] per page |
//! | Full pipeline | `deepdoctection` | the PDF itself | one [`DocumentAnalysis`] |
//!
//! The full pipeline rasterises internally, so it is handed the document
//! path rather than page images. [`Provider::analyze`] matches provider and
//! request together so each variant only ever sees its own request shape.

pub mod document;
pub mod http;
pub mod layout;
pub mod ocr;
pub mod values;

use crate::config::{FullPipelineSettings, LayoutSettings, OcrSettings};
use crate::error::{EngineError, ProviderError};
use crate::pipeline::render::PageImage;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

pub use document::DocumentAnalysis;
pub use layout::LayoutPage;
pub use ocr::OcrPage;

// ── Naming table ─────────────────────────────────────────────────────────

/// The fixed set of providers. Declaration order is invocation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OCR over page images.
    Doctr,
    /// Layout detection over page images.
    LayoutParser,
    /// Full-document pipeline over the PDF.
    DeepDoctection,
}

impl ProviderKind {
    /// Every provider, in the order they are invoked.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Doctr,
        ProviderKind::LayoutParser,
        ProviderKind::DeepDoctection,
    ];

    /// Key of this provider in the output artifact.
    pub fn key(self) -> &'static str {
        match self {
            ProviderKind::Doctr => "doctr",
            ProviderKind::LayoutParser => "layoutparser",
            ProviderKind::DeepDoctection => "deepdoctection",
        }
    }

    /// Human-readable name used in progress lines.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Doctr => "DocTR OCR",
            ProviderKind::LayoutParser => "LayoutParser",
            ProviderKind::DeepDoctection => "Deepdoctection",
        }
    }

    /// Whether the provider needs the shared page images.
    pub fn consumes_pages(self) -> bool {
        !matches!(self, ProviderKind::DeepDoctection)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown provider '{s}' (expected doctr, layoutparser or deepdoctection)")
            })
    }
}

/// The enabled subset of providers. Iteration always follows
/// [`ProviderKind::ALL`], whatever order providers were enabled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSet {
    doctr: bool,
    layoutparser: bool,
    deepdoctection: bool,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every provider enabled.
    pub fn all() -> Self {
        ProviderKind::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, kind: ProviderKind) {
        *self.slot(kind) = true;
    }

    pub fn with(mut self, kind: ProviderKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Doctr => self.doctr,
            ProviderKind::LayoutParser => self.layoutparser,
            ProviderKind::DeepDoctection => self.deepdoctection,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Enabled providers in invocation order.
    pub fn iter(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        ProviderKind::ALL.into_iter().filter(|k| self.contains(*k))
    }

    /// True when at least one enabled provider needs page images.
    pub fn needs_pages(&self) -> bool {
        self.iter().any(ProviderKind::consumes_pages)
    }

    /// The last enabled provider that consumes page images, after which the
    /// images can be released.
    pub fn last_page_consumer(&self) -> Option<ProviderKind> {
        self.iter().filter(|k| k.consumes_pages()).last()
    }

    fn slot(&mut self, kind: ProviderKind) -> &mut bool {
        match kind {
            ProviderKind::Doctr => &mut self.doctr,
            ProviderKind::LayoutParser => &mut self.layoutparser,
            ProviderKind::DeepDoctection => &mut self.deepdoctection,
        }
    }
}

impl FromIterator<ProviderKind> for ProviderSet {
    fn from_iter<I: IntoIterator<Item = ProviderKind>>(iter: I) -> Self {
        let mut set = ProviderSet::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

// ── Engine capabilities ──────────────────────────────────────────────────

/// A loaded OCR model.
#[async_trait]
pub trait OcrModel: Send + Sync {
    /// Recognise the text on one page.
    async fn recognize(&self, page: &PageImage) -> Result<OcrPage, EngineError>;
}

/// A loaded layout detection model.
#[async_trait]
pub trait LayoutModel: Send + Sync {
    /// Detect layout regions on one page.
    async fn detect(&self, page: &PageImage) -> Result<LayoutPage, EngineError>;
}

/// A loaded full-document pipeline.
#[async_trait]
pub trait DocumentModel: Send + Sync {
    /// Analyse the whole PDF at `pdf_path`. The pipeline rasterises on its own.
    async fn analyze(&self, pdf_path: &Path) -> Result<DocumentAnalysis, EngineError>;
}

/// Constructs engine models on demand.
///
/// Loading is where heavy model state is acquired, so the orchestrator
/// calls these lazily, right before the provider runs, and drops the
/// returned model as soon as the provider finishes.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load_ocr(&self, settings: &OcrSettings) -> Result<Box<dyn OcrModel>, EngineError>;

    async fn load_layout(
        &self,
        settings: &LayoutSettings,
    ) -> Result<Box<dyn LayoutModel>, EngineError>;

    async fn load_full_pipeline(
        &self,
        settings: &FullPipelineSettings,
    ) -> Result<Box<dyn DocumentModel>, EngineError>;
}

// ── Requests, results, dispatch ──────────────────────────────────────────

/// What a provider is handed.
#[derive(Debug, Clone, Copy)]
pub enum AnalysisRequest<'a> {
    /// The shared, read-only page images (OCR and layout).
    Pages(&'a [PageImage]),
    /// The PDF itself (full pipeline).
    Document(&'a Path),
}

impl AnalysisRequest<'_> {
    fn describe(&self) -> &'static str {
        match self {
            AnalysisRequest::Pages(_) => "page-image",
            AnalysisRequest::Document(_) => "document",
        }
    }
}

/// Result of one page inside a page-indexed provider.
pub type PageOutcome<T> = Result<T, ProviderError>;

/// A provider's native result. Variants never exchange fields.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Ocr(Vec<PageOutcome<OcrPage>>),
    Layout(Vec<PageOutcome<LayoutPage>>),
    FullPipeline(DocumentAnalysis),
}

impl AnalysisResult {
    pub fn kind(&self) -> ProviderKind {
        match self {
            AnalysisResult::Ocr(_) => ProviderKind::Doctr,
            AnalysisResult::Layout(_) => ProviderKind::LayoutParser,
            AnalysisResult::FullPipeline(_) => ProviderKind::DeepDoctection,
        }
    }

    /// Per-page failures recorded inside the result.
    pub fn page_failures(&self) -> Vec<&ProviderError> {
        match self {
            AnalysisResult::Ocr(pages) => pages.iter().filter_map(|p| p.as_ref().err()).collect(),
            AnalysisResult::Layout(pages) => {
                pages.iter().filter_map(|p| p.as_ref().err()).collect()
            }
            AnalysisResult::FullPipeline(_) => Vec::new(),
        }
    }
}

/// A loaded provider, tagged by kind.
pub enum Provider {
    Ocr(Box<dyn OcrModel>),
    Layout(Box<dyn LayoutModel>),
    FullPipeline(Box<dyn DocumentModel>),
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider::{:?}", self.kind())
    }
}

impl Provider {
    /// Load the engine behind `kind` through `loader`.
    ///
    /// A load failure is the provider-level `ProviderInitError`.
    pub async fn load(
        kind: ProviderKind,
        loader: &dyn EngineLoader,
        config: &crate::config::ExtractionConfig,
    ) -> Result<Provider, ProviderError> {
        let loaded = match kind {
            ProviderKind::Doctr => loader.load_ocr(&config.ocr).await.map(Provider::Ocr),
            ProviderKind::LayoutParser => {
                loader.load_layout(&config.layout).await.map(Provider::Layout)
            }
            ProviderKind::DeepDoctection => loader
                .load_full_pipeline(&config.full_pipeline)
                .await
                .map(Provider::FullPipeline),
        };
        loaded.map_err(|e| ProviderError::Init {
            provider: kind.key().to_string(),
            detail: e.to_string(),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Ocr(_) => ProviderKind::Doctr,
            Provider::Layout(_) => ProviderKind::LayoutParser,
            Provider::FullPipeline(_) => ProviderKind::DeepDoctection,
        }
    }

    /// Run the provider over its request.
    ///
    /// Page-indexed providers never abort on a page failure: the page is
    /// recorded as a [`ProviderError::Runtime`] and the next page runs.
    /// Only a whole-document failure of the full pipeline (or a mismatched
    /// request) is returned as `Err`.
    pub async fn analyze(
        &self,
        request: AnalysisRequest<'_>,
        progress: Option<&ProgressCallback>,
    ) -> Result<AnalysisResult, ProviderError> {
        let kind = self.kind();
        match (self, request) {
            (Provider::Ocr(model), AnalysisRequest::Pages(pages)) => {
                let mut results = Vec::with_capacity(pages.len());
                for page in pages {
                    let outcome = model.recognize(page).await;
                    results.push(record_page(kind, page, pages.len(), outcome, progress));
                }
                Ok(AnalysisResult::Ocr(results))
            }
            (Provider::Layout(model), AnalysisRequest::Pages(pages)) => {
                let mut results = Vec::with_capacity(pages.len());
                for page in pages {
                    let outcome = model.detect(page).await;
                    results.push(record_page(kind, page, pages.len(), outcome, progress));
                }
                Ok(AnalysisResult::Layout(results))
            }
            (Provider::FullPipeline(model), AnalysisRequest::Document(path)) => model
                .analyze(path)
                .await
                .map(AnalysisResult::FullPipeline)
                .map_err(|e| ProviderError::Init {
                    provider: kind.key().to_string(),
                    detail: e.to_string(),
                }),
            (_, request) => Err(ProviderError::RequestMismatch {
                provider: kind.key().to_string(),
                request: request.describe().to_string(),
            }),
        }
    }
}

/// Turn one engine call into a page outcome and report it.
fn record_page<T>(
    kind: ProviderKind,
    page: &PageImage,
    total: usize,
    outcome: Result<T, EngineError>,
    progress: Option<&ProgressCallback>,
) -> PageOutcome<T> {
    match outcome {
        Ok(result) => {
            debug!("{}: page {} done", kind, page.index());
            if let Some(cb) = progress {
                cb.on_page_complete(kind, page.index(), total);
            }
            Ok(result)
        }
        Err(e) => {
            warn!("{}: page {} failed: {}", kind, page.index(), e);
            let err = ProviderError::Runtime {
                provider: kind.key().to_string(),
                page_idx: page.index(),
                detail: e.to_string(),
            };
            if let Some(cb) = progress {
                cb.on_page_error(kind, page.index(), total, &err.detail());
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    struct EchoOcr;

    #[async_trait]
    impl OcrModel for EchoOcr {
        async fn recognize(&self, page: &PageImage) -> Result<OcrPage, EngineError> {
            if page.index() == 1 {
                return Err(EngineError::Decode("garbled".into()));
            }
            Ok(OcrPage::empty(page.index(), page.width(), page.height()))
        }
    }

    fn pages(n: usize) -> Vec<PageImage> {
        (0..n)
            .map(|i| PageImage::new(i, DynamicImage::ImageRgb8(RgbImage::new(4, 6))))
            .collect()
    }

    #[test]
    fn keys_follow_naming_table() {
        let keys: Vec<&str> = ProviderKind::ALL.iter().map(|k| k.key()).collect();
        assert_eq!(keys, vec!["doctr", "layoutparser", "deepdoctection"]);
        assert_eq!("LayoutParser".parse::<ProviderKind>(), Ok(ProviderKind::LayoutParser));
        assert!("tesseract".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn set_iterates_in_invocation_order() {
        let set: ProviderSet = [ProviderKind::DeepDoctection, ProviderKind::Doctr]
            .into_iter()
            .collect();
        let order: Vec<ProviderKind> = set.iter().collect();
        assert_eq!(order, vec![ProviderKind::Doctr, ProviderKind::DeepDoctection]);
        assert!(set.needs_pages());
        assert_eq!(set.last_page_consumer(), Some(ProviderKind::Doctr));
    }

    #[test]
    fn full_pipeline_alone_needs_no_pages() {
        let set = ProviderSet::new().with(ProviderKind::DeepDoctection);
        assert!(!set.needs_pages());
        assert_eq!(set.last_page_consumer(), None);
    }

    #[tokio::test]
    async fn page_failure_does_not_abort_remaining_pages() {
        let provider = Provider::Ocr(Box::new(EchoOcr));
        let pages = pages(3);
        let result = provider
            .analyze(AnalysisRequest::Pages(&pages), None)
            .await
            .unwrap();
        let AnalysisResult::Ocr(outcomes) = &result else {
            panic!("expected OCR result");
        };
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(matches!(
            outcomes[1],
            Err(ProviderError::Runtime { page_idx: 1, .. })
        ));
        assert!(outcomes[2].is_ok());
        assert_eq!(result.page_failures().len(), 1);
    }

    #[tokio::test]
    async fn mismatched_request_is_rejected() {
        let provider = Provider::Ocr(Box::new(EchoOcr));
        let err = provider
            .analyze(AnalysisRequest::Document(Path::new("doc.pdf")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RequestMismatch { .. }));
        assert_eq!(err.label(), "ProviderInitError");
    }
}

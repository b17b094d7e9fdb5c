//! Configuration types for PDF-to-JSON extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Engine-specific knobs live in one
//! settings struct per provider so a provider can be enabled or disabled
//! without touching the others.

use crate::error::Pdf2JsonError;
use crate::pipeline::render::Rasterizer;
use crate::progress::ProgressCallback;
use crate::provider::{EngineLoader, ProviderKind, ProviderSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default LayoutParser model: Faster R-CNN trained on PubLayNet.
pub const DEFAULT_LAYOUT_MODEL: &str = "lp://PubLayNet/faster_rcnn_R_50_FPN_3x/config";

/// Default detection-confidence threshold for the layout provider.
pub const DEFAULT_LAYOUT_THRESHOLD: f32 = 0.5;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`], which enables no provider.
///
/// # Example
/// ```rust
/// use edgequake_pdf2json::{ExtractionConfig, ProviderKind};
///
/// let config = ExtractionConfig::builder()
///     .enable(ProviderKind::Doctr)
///     .layout_threshold(0.7)
///     .build()
///     .unwrap();
/// assert!(config.providers.contains(ProviderKind::Doctr));
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Which providers run. Default: none.
    pub providers: ProviderSet,

    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps either dimension independently of DPI so an oversized page
    /// cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// OCR provider settings.
    pub ocr: OcrSettings,

    /// Layout provider settings.
    pub layout: LayoutSettings,

    /// Full-pipeline provider settings.
    pub full_pipeline: FullPipelineSettings,

    /// Per engine call timeout in seconds. Default: 300.
    ///
    /// Full-document analysis of a long PDF is slow; the default is generous.
    pub request_timeout_secs: u64,

    /// Maximum retry attempts on a transient engine failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Pre-constructed engine loader. Default: HTTP engine services.
    pub engines: Option<Arc<dyn EngineLoader>>,

    /// Pre-constructed rasteriser. Default: pdfium.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Optional progress events receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            providers: ProviderSet::default(),
            dpi: 150,
            max_rendered_pixels: 2000,
            password: None,
            ocr: OcrSettings::default(),
            layout: LayoutSettings::default(),
            full_pipeline: FullPipelineSettings::default(),
            request_timeout_secs: 300,
            max_retries: 2,
            retry_backoff_ms: 500,
            engines: None,
            rasterizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("providers", &self.providers)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("ocr", &self.ocr)
            .field("layout", &self.layout)
            .field("full_pipeline", &self.full_pipeline)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("engines", &self.engines.as_ref().map(|_| "<dyn EngineLoader>"))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    /// Enable one provider. Order of calls does not matter.
    pub fn enable(mut self, kind: ProviderKind) -> Self {
        self.config.providers.insert(kind);
        self
    }

    pub fn providers(mut self, providers: ProviderSet) -> Self {
        self.config.providers = providers;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr.endpoint = url.into();
        self
    }

    pub fn layout_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.layout.endpoint = url.into();
        self
    }

    pub fn full_pipeline_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.full_pipeline.endpoint = url.into();
        self
    }

    pub fn layout_model(mut self, model: impl Into<String>) -> Self {
        self.config.layout.model = model.into();
        self
    }

    pub fn layout_threshold(mut self, threshold: f32) -> Self {
        self.config.layout.score_threshold = threshold;
        self
    }

    pub fn full_pipeline_config(mut self, name: impl Into<String>) -> Self {
        self.config.full_pipeline.config = name.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn engines(mut self, loader: Arc<dyn EngineLoader>) -> Self {
        self.config.engines = Some(loader);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2JsonError> {
        let c = &self.config;
        let threshold = c.layout.score_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Pdf2JsonError::InvalidConfig(format!(
                "Layout score threshold must be within 0–1, got {threshold}"
            )));
        }
        if c.layout.model.trim().is_empty() {
            return Err(Pdf2JsonError::InvalidConfig(
                "Layout model identifier must not be empty".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(Pdf2JsonError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        for (kind, endpoint) in [
            (ProviderKind::Doctr, &c.ocr.endpoint),
            (ProviderKind::LayoutParser, &c.layout.endpoint),
            (ProviderKind::DeepDoctection, &c.full_pipeline.endpoint),
        ] {
            if c.providers.contains(kind)
                && c.engines.is_none()
                && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
            {
                return Err(Pdf2JsonError::InvalidConfig(format!(
                    "{kind} endpoint must be an HTTP/HTTPS URL, got '{endpoint}'"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Per-provider settings ────────────────────────────────────────────────

/// Settings for the OCR provider (`"doctr"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Base URL of the OCR engine service.
    pub endpoint: String,
    /// Text detection architecture.
    pub detection_model: String,
    /// Text recognition architecture.
    pub recognition_model: String,
    /// Load pretrained weights.
    pub pretrained: bool,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8701".to_string(),
            detection_model: "db_resnet50".to_string(),
            recognition_model: "crnn_vgg16_bn".to_string(),
            pretrained: true,
        }
    }
}

/// Settings for the layout provider (`"layoutparser"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    /// Base URL of the layout engine service.
    pub endpoint: String,
    /// Model identifier understood by the engine.
    pub model: String,
    /// Regions scoring below this are discarded by the detector. Default: 0.5.
    pub score_threshold: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8702".to_string(),
            model: DEFAULT_LAYOUT_MODEL.to_string(),
            score_threshold: DEFAULT_LAYOUT_THRESHOLD,
        }
    }
}

/// Settings for the full-pipeline provider (`"deepdoctection"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullPipelineSettings {
    /// Base URL of the document pipeline service.
    pub endpoint: String,
    /// Named pipeline configuration.
    pub config: String,
}

impl Default for FullPipelineSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8703".to_string(),
            config: "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_nothing() {
        let c = ExtractionConfig::default();
        assert!(c.providers.is_empty());
        assert_eq!(c.layout.score_threshold, 0.5);
        assert_eq!(c.layout.model, DEFAULT_LAYOUT_MODEL);
        assert_eq!(c.full_pipeline.config, "default");
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let err = ExtractionConfig::builder()
            .layout_threshold(1.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("threshold"), "got: {err}");
    }

    #[test]
    fn non_http_endpoint_rejected_only_when_enabled() {
        assert!(ExtractionConfig::builder()
            .ocr_endpoint("localhost:8701")
            .build()
            .is_ok());
        assert!(ExtractionConfig::builder()
            .enable(ProviderKind::Doctr)
            .ocr_endpoint("localhost:8701")
            .build()
            .is_err());
    }

    #[test]
    fn dpi_is_clamped() {
        let c = ExtractionConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(c.dpi, 400);
    }
}

//! HTTP engine backend: the default [`EngineLoader`].
//!
//! Each provider kind is served by its own engine service. Loading a model
//! opens a session on the service; every later call names that session.
//!
//! ```text
//! POST {endpoint}/v1/models/load   → {"session": "..."}
//! POST {endpoint}/v1/ocr           page image  → docTR page export
//! POST {endpoint}/v1/layout        page image  → layout page dict
//! POST {endpoint}/v1/analyze       PDF bytes   → document object
//! ```
//!
//! ## Retry Strategy
//!
//! Transport errors, HTTP 429 and 5xx are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). Anything else fails immediately: a 4xx
//! or a malformed body will not get better on a second try.

use super::{DocumentModel, EngineLoader, LayoutModel, OcrModel};
use crate::config::{ExtractionConfig, FullPipelineSettings, LayoutSettings, OcrSettings};
use crate::error::EngineError;
use crate::pipeline::encode::{encode_document, encode_page};
use crate::pipeline::render::PageImage;
use crate::provider::{DocumentAnalysis, LayoutPage, OcrPage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Longest error body kept from an engine response.
const MAX_ERROR_BODY: usize = 512;

/// Backoff schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Loads models from engine services over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEngineLoader {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpEngineLoader {
    /// Build a loader using the timeout and retry settings of `config`.
    pub fn new(config: &ExtractionConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::ModelUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff_ms: config.retry_backoff_ms,
            },
        })
    }

    async fn open_session(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<Session, EngineError> {
        let engine = Engine {
            client: self.client.clone(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            retry: self.retry,
        };
        let loaded: LoadResponse = engine.post("models/load", &body).await.map_err(|e| {
            match e {
                EngineError::Status { status, body } if status < 500 && status != 429 => {
                    EngineError::ModelUnavailable(body)
                }
                other => other,
            }
        })?;
        info!("Engine session {} opened at {}", loaded.session, engine.endpoint);
        Ok(Session {
            engine,
            id: loaded.session,
        })
    }
}

#[async_trait]
impl EngineLoader for HttpEngineLoader {
    async fn load_ocr(&self, settings: &OcrSettings) -> Result<Box<dyn OcrModel>, EngineError> {
        let body = json!({
            "engine": "doctr",
            "det_arch": settings.detection_model,
            "reco_arch": settings.recognition_model,
            "pretrained": settings.pretrained,
        });
        let session = self.open_session(&settings.endpoint, body).await?;
        Ok(Box::new(HttpOcrModel { session }))
    }

    async fn load_layout(
        &self,
        settings: &LayoutSettings,
    ) -> Result<Box<dyn LayoutModel>, EngineError> {
        let body = json!({
            "engine": "layoutparser",
            "model": settings.model,
            "score_threshold": settings.score_threshold,
        });
        let session = self.open_session(&settings.endpoint, body).await?;
        Ok(Box::new(HttpLayoutModel {
            session,
            model: settings.model.clone(),
            score_threshold: settings.score_threshold,
        }))
    }

    async fn load_full_pipeline(
        &self,
        settings: &FullPipelineSettings,
    ) -> Result<Box<dyn DocumentModel>, EngineError> {
        let body = json!({
            "engine": "deepdoctection",
            "config": settings.config,
        });
        let session = self.open_session(&settings.endpoint, body).await?;
        Ok(Box::new(HttpDocumentModel {
            session,
            config: settings.config.clone(),
        }))
    }
}

/// Stands in for the HTTP backend when its client cannot be built: every
/// load fails with the same reason, so each enabled provider records its
/// own init failure.
#[derive(Debug, Clone)]
pub struct UnavailableEngineLoader {
    reason: String,
}

impl UnavailableEngineLoader {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> EngineError {
        EngineError::ModelUnavailable(self.reason.clone())
    }
}

#[async_trait]
impl EngineLoader for UnavailableEngineLoader {
    async fn load_ocr(&self, _: &OcrSettings) -> Result<Box<dyn OcrModel>, EngineError> {
        Err(self.error())
    }

    async fn load_layout(&self, _: &LayoutSettings) -> Result<Box<dyn LayoutModel>, EngineError> {
        Err(self.error())
    }

    async fn load_full_pipeline(
        &self,
        _: &FullPipelineSettings,
    ) -> Result<Box<dyn DocumentModel>, EngineError> {
        Err(self.error())
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LoadResponse {
    session: String,
}

#[derive(Debug, Serialize)]
struct PageRequest<'a> {
    session: &'a str,
    page_idx: usize,
    width: u32,
    height: u32,
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_threshold: Option<f32>,
}

impl<'a> PageRequest<'a> {
    fn new(session: &'a str, page: &PageImage) -> Result<Self, EngineError> {
        let image = encode_page(page).map_err(|e| EngineError::Input(e.to_string()))?;
        Ok(Self {
            session,
            page_idx: page.index(),
            width: page.width(),
            height: page.height(),
            image,
            model: None,
            score_threshold: None,
        })
    }
}

#[derive(Debug, Serialize)]
struct DocumentRequest<'a> {
    session: &'a str,
    config: &'a str,
    file_name: String,
    document: String,
}

// ── Sessions and models ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Engine {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl Engine {
    fn url(&self, route: &str) -> String {
        format!("{}/v1/{}", self.endpoint, route)
    }

    /// POST `body` to `route`, retrying transient failures.
    async fn post<B, R>(&self, route: &str, body: &B) -> Result<R, EngineError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(route);
        let mut last_err: Option<EngineError> = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let backoff = self.retry.delay(attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    url,
                    attempt,
                    self.retry.max_retries,
                    backoff.as_millis()
                );
                sleep(backoff).await;
            }

            match self.post_once(&url, body).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() => {
                    warn!("{}: attempt {} failed: {}", url, attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| EngineError::Request(format!("{url}: no attempt made"))))
    }

    async fn post_once<B, R>(&self, url: &str, body: &B) -> Result<R, EngineError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let mut text = resp.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| text.is_char_boundary(*i))
                    .unwrap_or(0);
                text.truncate(cut);
            }
            return Err(EngineError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;
        debug!("{}: {} byte response", url, bytes.len());
        serde_json::from_slice(&bytes).map_err(|e| EngineError::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone)]
struct Session {
    engine: Engine,
    id: String,
}

struct HttpOcrModel {
    session: Session,
}

#[async_trait]
impl OcrModel for HttpOcrModel {
    async fn recognize(&self, page: &PageImage) -> Result<OcrPage, EngineError> {
        let request = PageRequest::new(&self.session.id, page)?;
        self.session.engine.post("ocr", &request).await
    }
}

struct HttpLayoutModel {
    session: Session,
    model: String,
    score_threshold: f32,
}

#[async_trait]
impl LayoutModel for HttpLayoutModel {
    async fn detect(&self, page: &PageImage) -> Result<LayoutPage, EngineError> {
        let mut request = PageRequest::new(&self.session.id, page)?;
        request.model = Some(&self.model);
        request.score_threshold = Some(self.score_threshold);
        self.session.engine.post("layout", &request).await
    }
}

struct HttpDocumentModel {
    session: Session,
    config: String,
}

#[async_trait]
impl DocumentModel for HttpDocumentModel {
    async fn analyze(&self, pdf_path: &Path) -> Result<DocumentAnalysis, EngineError> {
        let bytes = tokio::fs::read(pdf_path)
            .await
            .map_err(|e| EngineError::Input(format!("{}: {e}", pdf_path.display())))?;
        let request = DocumentRequest {
            session: &self.session.id,
            config: &self.config,
            file_name: pdf_path.to_string_lossy().into_owned(),
            document: encode_document(&bytes),
        };
        info!(
            "Sending {} ({} bytes) to document pipeline",
            pdf_path.display(),
            bytes.len()
        );
        self.session.engine.post("analyze", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_ms: 500,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        assert_eq!(policy.delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn page_request_body_shape() {
        let page = PageImage::new(2, DynamicImage::ImageRgb8(RgbImage::new(8, 5)));
        let mut request = PageRequest::new("s-1", &page).unwrap();
        let ocr = serde_json::to_value(&request).unwrap();
        assert_eq!(ocr["session"], "s-1");
        assert_eq!(ocr["page_idx"], 2);
        assert_eq!((ocr["width"].as_u64(), ocr["height"].as_u64()), (Some(8), Some(5)));
        assert!(ocr.get("model").is_none());
        assert!(ocr["image"].as_str().is_some_and(|s| !s.is_empty()));

        request.model = Some("lp://PubLayNet");
        request.score_threshold = Some(0.5);
        let layout = serde_json::to_value(&request).unwrap();
        assert_eq!(layout["model"], "lp://PubLayNet");
        assert_eq!(layout["score_threshold"], 0.5);
    }

    #[test]
    fn endpoint_trailing_slash_is_ignored() {
        let engine = Engine {
            client: reqwest::Client::new(),
            endpoint: "http://127.0.0.1:8701/".trim_end_matches('/').to_string(),
            retry: RetryPolicy {
                max_retries: 0,
                backoff_ms: 0,
            },
        };
        assert_eq!(engine.url("ocr"), "http://127.0.0.1:8701/v1/ocr");
    }

    #[tokio::test]
    async fn unreachable_engine_fails_to_load() {
        let config = ExtractionConfig::builder()
            .max_retries(0)
            .request_timeout_secs(2)
            .build()
            .unwrap();
        let loader = HttpEngineLoader::new(&config).unwrap();
        let settings = OcrSettings {
            endpoint: "http://127.0.0.1:1".into(),
            ..OcrSettings::default()
        };
        let err = match loader.load_ocr(&settings).await {
            Ok(_) => panic!("load should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, EngineError::Request(_)), "got: {err}");
    }
}

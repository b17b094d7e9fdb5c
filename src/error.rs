//! Error types for the edgequake-pdf2json library.
//!
//! Failures fall into two groups:
//!
//! * [`Pdf2JsonError`] are **fatal**: the run cannot proceed at all (missing
//!   or corrupt PDF, rasterisation failure, unwritable output). Returned as
//!   `Err(Pdf2JsonError)` from [`crate::extract::run`] and friends, and no
//!   output file is written.
//!
//! * [`ProviderError`] and [`NormalizationIssue`] are **non-fatal**: one engine
//!   failed to load, one page failed inside an engine, or one field had no
//!   JSON representation. These are captured as structured data inside the
//!   output artifact so consumers can tell "provider disabled" apart from
//!   "provider attempted and failed".

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Taxonomy label written to the artifact for a provider that failed to load.
pub const PROVIDER_INIT_ERROR: &str = "ProviderInitError";
/// Taxonomy label written to the artifact for a page that failed inside a provider.
pub const PROVIDER_RUNTIME_ERROR: &str = "ProviderRuntimeError";
/// Taxonomy label for a field that was replaced during normalization, or a
/// provider result that could not be normalized.
pub const NORMALIZATION_ERROR: &str = "NormalizationError";

/// All fatal errors returned by the edgequake-pdf2json library.
///
/// Provider and page failures use [`ProviderError`] and are recorded in
/// [`crate::output::ResultAggregate`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2JsonError {
    // ── Document read errors ─────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The aggregate could not be encoded as JSON.
    #[error("Failed to serialise results: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy,\n\
or place the library next to the binary.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2JsonError {
    /// True for every failure that means the input document could not be read
    /// or rasterised. These abort the run before any output is written.
    pub fn is_document_read_error(&self) -> bool {
        matches!(
            self,
            Pdf2JsonError::FileNotFound { .. }
                | Pdf2JsonError::PermissionDenied { .. }
                | Pdf2JsonError::NotAPdf { .. }
                | Pdf2JsonError::CorruptPdf { .. }
                | Pdf2JsonError::PasswordRequired { .. }
                | Pdf2JsonError::WrongPassword { .. }
                | Pdf2JsonError::RasterisationFailed { .. }
        )
    }
}

/// A non-fatal failure inside one analysis provider.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProviderError {
    /// The engine or its model could not be loaded. The whole provider is
    /// recorded as failed; other providers still run.
    #[error("{provider}: engine failed to initialise: {detail}")]
    Init { provider: String, detail: String },

    /// Recognition or detection failed for a single page. Remaining pages
    /// are still processed.
    #[error("{provider}: page {page_idx} failed: {detail}")]
    Runtime {
        provider: String,
        page_idx: usize,
        detail: String,
    },

    /// A provider was handed a request shape it does not consume.
    #[error("{provider}: cannot analyse a {request} request")]
    RequestMismatch { provider: String, request: String },

    /// The provider's result could not be converted to JSON at all.
    #[error("{provider}: result could not be normalized: {detail}")]
    Normalization { provider: String, detail: String },
}

impl ProviderError {
    /// The taxonomy label written under `"error"` in the artifact.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderError::Init { .. } | ProviderError::RequestMismatch { .. } => {
                PROVIDER_INIT_ERROR
            }
            ProviderError::Runtime { .. } => PROVIDER_RUNTIME_ERROR,
            ProviderError::Normalization { .. } => NORMALIZATION_ERROR,
        }
    }

    /// Human-readable message without the provider prefix.
    pub fn detail(&self) -> String {
        match self {
            ProviderError::Init { detail, .. }
            | ProviderError::Runtime { detail, .. }
            | ProviderError::Normalization { detail, .. } => detail.clone(),
            ProviderError::RequestMismatch { request, .. } => {
                format!("cannot analyse a {request} request")
            }
        }
    }
}

/// Failure reported by an engine implementation (model load or one call).
///
/// The orchestrator wraps these into [`ProviderError`] with the provider
/// name and page index attached.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Weights, config or the engine process itself are missing.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The engine could not be reached or the call timed out.
    #[error("engine request failed: {0}")]
    Request(String),

    /// The engine answered with a non-success status.
    #[error("engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The engine answered, but not with the expected schema.
    #[error("malformed engine response: {0}")]
    Decode(String),

    /// Page image or document could not be prepared for the engine.
    #[error("could not prepare engine input: {0}")]
    Input(String),
}

impl EngineError {
    /// Transport failures, rate limits and server errors are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Request(_) => true,
            EngineError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A field that had no JSON representation and was replaced by `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationIssue {
    /// JSON pointer (RFC 6901) of the replaced value inside the provider result.
    pub pointer: String,
    /// Why the value could not be encoded.
    pub reason: String,
}

impl std::fmt::Display for NormalizationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} at {}", NORMALIZATION_ERROR, self.reason, self.pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_read_errors_are_classified() {
        let e = Pdf2JsonError::NotAPdf {
            path: "x.pdf".into(),
            magic: *b"GIF8",
        };
        assert!(e.is_document_read_error());
        assert!(!Pdf2JsonError::InvalidConfig("x".into()).is_document_read_error());
    }

    #[test]
    fn provider_error_labels() {
        let init = ProviderError::Init {
            provider: "doctr".into(),
            detail: "missing weights".into(),
        };
        assert_eq!(init.label(), "ProviderInitError");
        assert_eq!(init.detail(), "missing weights");

        let runtime = ProviderError::Runtime {
            provider: "layoutparser".into(),
            page_idx: 3,
            detail: "timeout".into(),
        };
        assert_eq!(runtime.label(), "ProviderRuntimeError");
        assert!(runtime.to_string().contains("page 3"));

        let normalization = ProviderError::Normalization {
            provider: "deepdoctection".into(),
            detail: "key must be a string".into(),
        };
        assert_eq!(normalization.label(), "NormalizationError");
        assert_eq!(normalization.detail(), "key must be a string");
    }

    #[test]
    fn transient_engine_errors() {
        assert!(EngineError::Request("connection reset".into()).is_transient());
        assert!(EngineError::Status { status: 503, body: String::new() }.is_transient());
        assert!(EngineError::Status { status: 429, body: String::new() }.is_transient());
        assert!(!EngineError::Status { status: 400, body: String::new() }.is_transient());
        assert!(!EngineError::Decode("missing field".into()).is_transient());
    }

    #[test]
    fn normalization_issue_display() {
        let issue = NormalizationIssue {
            pointer: "/0/blocks/1/score".into(),
            reason: "non-finite float".into(),
        };
        let msg = issue.to_string();
        assert!(msg.contains("NormalizationError"), "got: {msg}");
        assert!(msg.contains("/0/blocks/1/score"));
    }
}

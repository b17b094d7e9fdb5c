//! Progress-callback trait for run, provider and page events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator moves through a run. The CLI uses this to
//! print a line before each enabled provider starts and a completion line
//! naming the output path.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2json::{ExtractionProgressCallback, ExtractionConfig, ProviderKind};
//! use std::sync::Arc;
//!
//! struct Announce;
//!
//! impl ExtractionProgressCallback for Announce {
//!     fn on_provider_start(&self, kind: ProviderKind, _position: usize, _enabled: usize) {
//!         eprintln!("Running {}...", kind.display_name());
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Announce))
//!     .build()
//!     .unwrap();
//! ```

use crate::extract::RunState;
use crate::provider::ProviderKind;
use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as a run progresses.
///
/// Runs are sequential, so events arrive in order from one task at a time.
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called on every state transition of the orchestrator.
    fn on_state_change(&self, state: RunState) {
        let _ = state;
    }

    /// Called once the page images exist.
    fn on_rasterized(&self, page_count: usize) {
        let _ = page_count;
    }

    /// Called just before an enabled provider starts.
    ///
    /// # Arguments
    /// * `position`: 1-based position among enabled providers
    /// * `enabled`: number of enabled providers
    fn on_provider_start(&self, kind: ProviderKind, position: usize, enabled: usize) {
        let _ = (kind, position, enabled);
    }

    /// Called when a page-indexed provider finishes one page.
    fn on_page_complete(&self, kind: ProviderKind, page_idx: usize, total_pages: usize) {
        let _ = (kind, page_idx, total_pages);
    }

    /// Called when a page-indexed provider fails one page.
    fn on_page_error(&self, kind: ProviderKind, page_idx: usize, total_pages: usize, error: &str) {
        let _ = (kind, page_idx, total_pages, error);
    }

    /// Called when a provider finishes; `error` is set when it failed as a whole.
    fn on_provider_complete(&self, kind: ProviderKind, error: Option<&str>) {
        let _ = (kind, error);
    }

    /// Called after the artifact has been written.
    fn on_run_complete(&self, output_path: &Path) {
        let _ = output_path;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

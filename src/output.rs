//! Output types: the aggregate written to disk and the run summary.
//!
//! The artifact is a single JSON object whose keys come from the fixed
//! provider naming table. A key is present only when its provider was
//! enabled; its value is the normalized provider result or, when the
//! provider failed as a whole, `{"error": "ProviderInitError", "message": ...}`.

use crate::error::{NormalizationIssue, ProviderError};
use crate::provider::ProviderKind;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use std::path::PathBuf;

/// What ended up under one provider key.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    /// The normalized provider result.
    Completed(Value),
    /// The provider failed as a whole; other providers were unaffected.
    Failed(ProviderError),
}

impl ProviderOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ProviderOutcome::Failed(_))
    }

    /// The JSON written under the provider key.
    pub fn to_value(&self) -> Value {
        match self {
            ProviderOutcome::Completed(v) => v.clone(),
            ProviderOutcome::Failed(e) => json!({
                "error": e.label(),
                "message": e.detail(),
            }),
        }
    }
}

impl Serialize for ProviderOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProviderOutcome::Completed(v) => v.serialize(serializer),
            ProviderOutcome::Failed(e) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("error", e.label())?;
                map.serialize_entry("message", &e.detail())?;
                map.end()
            }
        }
    }
}

/// Mapping from provider to its outcome, in invocation order.
///
/// Filled incrementally while providers run and serialized once at the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultAggregate {
    entries: Vec<(ProviderKind, ProviderOutcome)>,
}

impl ResultAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of `kind`. A provider is recorded at most once;
    /// recording it again replaces the earlier outcome in place.
    pub fn record(&mut self, kind: ProviderKind, outcome: ProviderOutcome) {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => *existing = outcome,
            None => self.entries.push((kind, outcome)),
        }
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderOutcome> {
        self.entries.iter().find(|(k, _)| *k == kind).map(|(_, o)| o)
    }

    /// Providers present, in insertion order.
    pub fn kinds(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The aggregate as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, o)| (k.key().to_string(), o.to_value()))
                .collect(),
        )
    }

    /// Serialize as indented UTF-8 JSON. Non-ASCII text is written as-is.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for ResultAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (kind, outcome) in &self.entries {
            map.serialize_entry(kind.key(), outcome)?;
        }
        map.end()
    }
}

/// Per-provider line of a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReport {
    pub provider: ProviderKind,
    /// Set when the provider failed as a whole.
    pub error: Option<String>,
    /// Pages recorded with a `ProviderRuntimeError`.
    pub failed_pages: Vec<usize>,
    /// Fields replaced with `null` during normalization.
    pub normalization_issues: Vec<NormalizationIssue>,
    pub duration_ms: u64,
}

impl ProviderReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Statistics of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Where the artifact was written; `None` for in-memory extraction.
    pub output_path: Option<PathBuf>,
    /// Pages rasterised, or `None` when no image-consuming provider ran.
    pub page_count: Option<usize>,
    pub providers: Vec<ProviderReport>,
    pub rasterize_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunSummary {
    pub fn failed_providers(&self) -> usize {
        self.providers.iter().filter(|p| !p.succeeded()).count()
    }

    pub fn failed_pages(&self) -> usize {
        self.providers.iter().map(|p| p.failed_pages.len()).sum()
    }
}

/// Document information read without running any provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub file_name: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

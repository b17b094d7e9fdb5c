//! Result normalization: native provider result → JSON value.
//!
//! Every field of the native result is kept under its native name and no
//! field is added; numbers keep their integer or float form. Page-indexed
//! results become an array with one entry per page, where a failed page is
//! the object
//! `{"page_idx": n, "error": "ProviderRuntimeError", "message": ...}`.
//!
//! Values JSON cannot encode arrive here as marker maps (see
//! [`crate::provider::values`]). Each one is replaced by `null` and the
//! enclosing object gains `"_unrepresentable": true`; the replacement is
//! reported as a [`NormalizationIssue`] and the run continues.

use crate::error::NormalizationIssue;
use crate::provider::values::UNREPRESENTABLE_MARKER;
use crate::provider::{AnalysisResult, PageOutcome};
use serde::Serialize;
use serde_json::{json, Value};

/// Sibling flag added to an object that had a value replaced.
pub const UNREPRESENTABLE_FLAG: &str = "_unrepresentable";

/// A normalized provider result and the fields that had to be replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub value: Value,
    pub issues: Vec<NormalizationIssue>,
}

/// Normalize one provider result.
pub fn normalize(result: &AnalysisResult) -> Result<Normalized, serde_json::Error> {
    let mut value = match result {
        AnalysisResult::Ocr(pages) => pages_to_value(pages)?,
        AnalysisResult::Layout(pages) => pages_to_value(pages)?,
        AnalysisResult::FullPipeline(doc) => serde_json::to_value(doc)?,
    };

    let mut issues = Vec::new();
    if let Some(reason) = marker_reason(&value) {
        issues.push(NormalizationIssue {
            pointer: String::new(),
            reason,
        });
        value = Value::Null;
    } else {
        sanitize(&mut value, "", &mut issues);
    }

    Ok(Normalized { value, issues })
}

fn pages_to_value<T: Serialize>(pages: &[PageOutcome<T>]) -> Result<Value, serde_json::Error> {
    pages
        .iter()
        .map(|outcome| match outcome {
            Ok(page) => serde_json::to_value(page),
            Err(e) => Ok(json!({
                "page_idx": page_index(e),
                "error": e.label(),
                "message": e.detail(),
            })),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn page_index(e: &crate::error::ProviderError) -> Option<usize> {
    match e {
        crate::error::ProviderError::Runtime { page_idx, .. } => Some(*page_idx),
        _ => None,
    }
}

fn marker_reason(v: &Value) -> Option<String> {
    match v {
        Value::Object(map) if map.len() == 1 => map
            .get(UNREPRESENTABLE_MARKER)
            .map(|r| r.as_str().unwrap_or("unrepresentable value").to_string()),
        _ => None,
    }
}

/// Replace markers below `value`. Returns true when an array element was
/// replaced and the flag must go on the nearest enclosing object.
fn sanitize(value: &mut Value, pointer: &str, issues: &mut Vec<NormalizationIssue>) -> bool {
    match value {
        Value::Object(map) => {
            let mut degraded = false;
            for (key, child) in map.iter_mut() {
                let child_pointer = format!("{pointer}/{}", escape_pointer(key));
                if let Some(reason) = marker_reason(child) {
                    *child = Value::Null;
                    issues.push(NormalizationIssue {
                        pointer: child_pointer,
                        reason,
                    });
                    degraded = true;
                } else if sanitize(child, &child_pointer, issues) {
                    degraded = true;
                }
            }
            if degraded {
                map.insert(UNREPRESENTABLE_FLAG.to_string(), Value::Bool(true));
            }
            false
        }
        Value::Array(items) => {
            let mut degraded = false;
            for (i, child) in items.iter_mut().enumerate() {
                let child_pointer = format!("{pointer}/{i}");
                if let Some(reason) = marker_reason(child) {
                    *child = Value::Null;
                    issues.push(NormalizationIssue {
                        pointer: child_pointer,
                        reason,
                    });
                    degraded = true;
                } else if sanitize(child, &child_pointer, issues) {
                    degraded = true;
                }
            }
            degraded
        }
        _ => false,
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::document::{AnalyzedPage, Annotation, DocumentAnalysis};
    use crate::provider::layout::{LayoutPage, LayoutRegion};
    use crate::provider::ocr::OcrPage;
    use crate::provider::values::{AttributeValue, Attributes, Coord, Score};

    #[test]
    fn ocr_pages_keep_native_shape_and_floats() {
        let raw = json!({
            "page_idx": 0,
            "dimensions": [100, 80],
            "blocks": [{
                "geometry": [[0.1, 0.2], [0.3, 0.4]],
                "lines": [{"geometry": [[0.1, 0.2], [0.3, 0.4]],
                           "words": [{"value": "total", "confidence": 0.123456789, "geometry": [[0.1, 0.2], [0.3, 0.4]]}]}],
                "artefacts": []
            }]
        });
        let page: OcrPage = serde_json::from_value(raw.clone()).unwrap();
        let out = normalize(&AnalysisResult::Ocr(vec![Ok(page)])).unwrap();
        assert!(out.issues.is_empty());
        assert_eq!(out.value, json!([raw]));
        let conf = &out.value[0]["blocks"][0]["lines"][0]["words"][0]["confidence"];
        assert_eq!(conf.as_f64(), Some(0.123456789));
    }

    #[test]
    fn unknown_ocr_fields_survive_at_every_level() {
        let raw = json!({
            "page_idx": 0,
            "dimensions": [10, 20],
            "page_extra": "keep-me-too",
            "blocks": [{
                "geometry": [[0, 0], [1, 1]],
                "extra_block_field": "keep-me",
                "lines": [{
                    "geometry": [[0, 0], [1, 1]],
                    "line_extra": {"nested": [1, 2.5, null]},
                    "words": [{
                        "value": "x",
                        "confidence": 1,
                        "geometry": [[0, 0], [1, 1]],
                        "word_extra": true
                    }]
                }]
            }]
        });
        let page: OcrPage = serde_json::from_value(raw.clone()).unwrap();
        let out = normalize(&AnalysisResult::Ocr(vec![Ok(page)])).unwrap();
        assert!(out.issues.is_empty());
        assert_eq!(out.value, json!([raw]));
    }

    #[test]
    fn failed_page_becomes_error_marker_in_place() {
        let result = AnalysisResult::Layout(vec![
            Ok(LayoutPage::default()),
            Err(ProviderError::Runtime {
                provider: "layoutparser".into(),
                page_idx: 1,
                detail: "CUDA out of memory".into(),
            }),
            Ok(LayoutPage::default()),
        ]);
        let out = normalize(&result).unwrap();
        let pages = out.value.as_array().unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages[1],
            json!({"page_idx": 1, "error": "ProviderRuntimeError", "message": "CUDA out of memory"})
        );
        assert_eq!(pages[0], json!({}));
    }

    #[test]
    fn nan_score_is_replaced_with_null_and_flagged() {
        let page = LayoutPage::with_regions(vec![LayoutRegion::rectangle(
            "Text",
            [0.0, 0.0, 10.0, 10.0],
            f64::NAN,
        )]);
        let out = normalize(&AnalysisResult::Layout(vec![Ok(page)])).unwrap();

        let block = &out.value[0]["blocks"][0];
        assert_eq!(block["score"], Value::Null);
        assert_eq!(block[UNREPRESENTABLE_FLAG], Value::Bool(true));
        assert_eq!(block["type"], "Text");
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].pointer, "/0/blocks/0/score");
    }

    #[test]
    fn binary_blob_inside_list_flags_enclosing_object() {
        let mut extra = Attributes::new();
        extra.insert(
            "crops",
            AttributeValue::List(vec![
                AttributeValue::Text("ok".into()),
                AttributeValue::Bytes(vec![0xff; 16]),
            ]),
        );
        let doc = DocumentAnalysis {
            file_name: "a/b.pdf".into(),
            document_id: None,
            location: None,
            pages: Some(vec![AnalyzedPage {
                page_number: 1,
                width: Some(Coord::from(10_i64)),
                height: Some(Coord::from(20_i64)),
                annotations: Some(vec![Annotation {
                    category_name: "figure".into(),
                    annotation_id: None,
                    score: Some(Score::from(0.4)),
                    bounding_box: None,
                    sub_categories: None,
                    relationships: None,
                    extra,
                }]),
                extra: Attributes::new(),
            }]),
            extra: Attributes::new(),
        };
        let out = normalize(&AnalysisResult::FullPipeline(doc)).unwrap();
        let ann = &out.value["pages"][0]["annotations"][0];
        assert_eq!(ann["crops"], json!(["ok", null]));
        assert_eq!(ann[UNREPRESENTABLE_FLAG], json!(true));
        assert_eq!(ann["score"].as_f64(), Some(0.4));
        assert_eq!(out.value["pages"][0]["width"], json!(10));
        assert_eq!(out.issues[0].pointer, "/pages/0/annotations/0/crops/1");
        assert!(out.issues[0].reason.contains("16 bytes"));
        assert!(out.value.get(UNREPRESENTABLE_FLAG).is_none());
    }

    #[test]
    fn pointer_segments_are_escaped() {
        assert_eq!(escape_pointer("a/b~c"), "a~1b~0c");
    }

    #[test]
    fn empty_page_list_is_empty_array() {
        let out = normalize(&AnalysisResult::Ocr(Vec::new())).unwrap();
        assert_eq!(out.value, json!([]));
    }
}

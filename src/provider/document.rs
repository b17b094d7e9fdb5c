//! Native result schema of the full-pipeline provider (`"deepdoctection"`).
//!
//! The full pipeline rasterises the document itself and returns a single
//! document object, not a flat page list. Page entries follow deepdoctection's
//! page dictionaries: annotations with a category, a score, an optional
//! bounding box and nested sub-categories / relationships.

use super::values::{Attributes, Coord, Score};
use serde::{Deserialize, Serialize};

/// Document-level result of the full pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<AnalyzedPage>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl DocumentAnalysis {
    /// The result for a document without pages.
    pub fn empty(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            document_id: None,
            location: None,
            pages: Some(Vec::new()),
            extra: Attributes::new(),
        }
    }

    pub fn pages(&self) -> &[AnalyzedPage] {
        self.pages.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPage {
    /// 1-based page number as reported by the pipeline.
    pub page_number: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub category_name: String,
    #[serde(
        rename = "_annotation_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub annotation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_categories: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Attributes>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl AnalyzedPage {
    pub fn annotations(&self) -> &[Annotation] {
        self.annotations.as_deref().unwrap_or_default()
    }
}

/// Upper-left / lower-right box; `absolute_coords` tells pixels from relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub absolute_coords: bool,
    pub ulx: Coord,
    pub uly: Coord,
    pub lrx: Coord,
    pub lry: Coord,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_document_with_nested_annotations() {
        let raw = json!({
            "file_name": "report.pdf",
            "document_id": "c0ffee",
            "pages": [{
                "page_number": 1,
                "width": 1654.0,
                "height": 2339.0,
                "annotations": [{
                    "category_name": "table",
                    "_annotation_id": "a1",
                    "score": 0.88,
                    "bounding_box": {"absolute_coords": true, "ulx": 100.0, "uly": 200.0, "lrx": 900.0, "lry": 700.0},
                    "sub_categories": {"number_of_rows": 4},
                    "html": "<table></table>"
                }]
            }],
            "language": "eng"
        });
        let doc: DocumentAnalysis = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.pages().len(), 1);
        let ann = &doc.pages()[0].annotations()[0];
        assert_eq!(ann.annotation_id.as_deref(), Some("a1"));
        assert!(ann.extra.get("html").is_some());
        assert!(doc.extra.get("language").is_some());

        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn empty_document_has_no_pages() {
        let v = serde_json::to_value(DocumentAnalysis::empty("blank.pdf")).unwrap();
        assert_eq!(v, json!({"file_name": "blank.pdf", "pages": []}));
    }

    #[test]
    fn omitted_page_list_is_not_invented() {
        let raw = json!({"file_name": "a.pdf"});
        let doc: DocumentAnalysis = serde_json::from_value(raw.clone()).unwrap();
        assert!(doc.pages().is_empty());
        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);

        let page: AnalyzedPage = serde_json::from_value(json!({"page_number": 2, "width": 1654})).unwrap();
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({"page_number": 2, "width": 1654})
        );
    }
}

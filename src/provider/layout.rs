//! Native result schema of the layout provider (`"layoutparser"`).
//!
//! Mirrors LayoutParser's `Layout.to_dict()`: per page, free-form
//! `page_data` plus a list of detected blocks. Rectangle blocks carry pixel
//! corners `x_1, y_1, x_2, y_2`; any field this schema does not name
//! (`text`, `id`, `points`, ...) is kept verbatim in `extra`.

use super::values::{Attributes, Coord, Score};
use serde::{Deserialize, Serialize};

/// Detected layout regions for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_data: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<LayoutRegion>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl LayoutPage {
    /// A page with the given regions and empty `page_data`, as
    /// `Layout.to_dict()` writes it.
    pub fn with_regions(blocks: Vec<LayoutRegion>) -> Self {
        Self {
            page_data: Some(Attributes::new()),
            blocks: Some(blocks),
            extra: Attributes::new(),
        }
    }

    pub fn regions(&self) -> &[LayoutRegion] {
        self.blocks.as_deref().unwrap_or_default()
    }
}

/// One detected region with its class label and detection score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRegion {
    /// Shape of the region: `rectangle`, `interval` or `quadrilateral`.
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_1: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_1: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_2: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_2: Option<Coord>,
    /// Class label, e.g. `Text`, `Title`, `List`, `Table`, `Figure`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl LayoutRegion {
    /// A labelled rectangle, the shape detectron-backed models emit.
    pub fn rectangle(label: impl Into<String>, corners: [f64; 4], score: f64) -> Self {
        let [x1, y1, x2, y2] = corners;
        Self {
            block_type: "rectangle".to_string(),
            x_1: Some(x1.into()),
            y_1: Some(y1.into()),
            x_2: Some(x2.into()),
            y_2: Some(y2.into()),
            label: Some(label.into()),
            score: Some(score.into()),
            extra: Attributes::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_layoutparser_dict_and_keeps_unknown_fields() {
        let raw = json!({
            "page_data": {"width": 1700, "height": 2200},
            "blocks": [
                {"block_type": "rectangle", "x_1": 10.5, "y_1": 20.0, "x_2": 300.25, "y_2": 80.0,
                 "type": "Title", "score": 0.93, "text": null, "id": 0},
                {"block_type": "quadrilateral", "points": [[0, 0], [1, 0], [1, 1], [0, 1]],
                 "height": 1, "width": 1, "type": "Figure", "score": 0.61}
            ]
        });
        let page: LayoutPage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(page.regions().len(), 2);
        assert_eq!(page.regions()[0].label.as_deref(), Some("Title"));
        assert!(page.regions()[1].extra.get("points").is_some());

        let back = serde_json::to_value(&page).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn integer_corners_and_scores_stay_integers() {
        let raw = json!({
            "blocks": [{"block_type": "rectangle", "x_1": 10, "y_1": 20, "x_2": 30, "y_2": 40,
                        "type": "Text", "score": 1}]
        });
        let page: LayoutPage = serde_json::from_value(raw.clone()).unwrap();
        let back = serde_json::to_string(&page).unwrap();
        assert!(back.contains(r#""x_1":10,"#), "got: {back}");
        assert!(back.contains(r#""score":1"#), "got: {back}");
        assert_eq!(serde_json::to_value(&page).unwrap(), raw);
    }

    #[test]
    fn omitted_keys_are_not_invented() {
        let page: LayoutPage = serde_json::from_value(json!({})).unwrap();
        assert_eq!(serde_json::to_value(&page).unwrap(), json!({}));
        assert!(page.regions().is_empty());
    }

    #[test]
    fn rectangle_constructor_serializes_layoutparser_keys() {
        let r = LayoutRegion::rectangle("Table", [1.0, 2.0, 3.0, 4.0], 0.75);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["block_type"], "rectangle");
        assert_eq!(v["type"], "Table");
        assert_eq!(v["x_2"], json!(3.0));
        assert!(v.get("text").is_none());
    }
}

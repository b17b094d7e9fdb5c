//! Native result schema of the OCR provider (`"doctr"`).
//!
//! Mirrors a docTR page export: blocks of lines of words, each with a
//! relative geometry and a confidence. Straight pages give two-point boxes
//! `[[xmin, ymin], [xmax, ymax]]`, rotated pages four-point polygons.
//! Fields docTR sends that are not named here are kept verbatim in `extra`,
//! and fields it leaves out stay absent.

use super::values::{present, AttributeValue, Attributes, Coord, Score};
use serde::{Deserialize, Serialize};

/// Relative box or polygon, one `[x, y]` pair per point, coordinates in `0..1`.
pub type Geometry = Vec<[Coord; 2]>;

/// OCR output for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    /// 0-based page index within the document.
    pub page_idx: usize,
    /// `[height, width]` of the page image the engine saw.
    pub dimensions: [u32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Prediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Prediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<TextBlock>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

/// A value predicted by the engine with its confidence. docTR writes
/// `null` for both when the predictor is disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<AttributeValue>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<Option<Score>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectness_score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<TextLine>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artefacts: Option<Vec<Artefact>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectness_score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub value: String,
    pub confidence: Score,
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectness_score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_orientation: Option<Prediction>,
    #[serde(flatten)]
    pub extra: Attributes,
}

/// Non-text element found inside a block (logo, QR code, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artefact {
    #[serde(rename = "type")]
    pub artefact_type: String,
    pub confidence: Score,
    pub geometry: Geometry,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl OcrPage {
    /// A page on which the engine found nothing.
    pub fn empty(page_idx: usize, width: u32, height: u32) -> Self {
        Self {
            page_idx,
            dimensions: [height, width],
            orientation: None,
            language: None,
            blocks: Some(Vec::new()),
            extra: Attributes::new(),
        }
    }

    /// Every recognised word on the page in reading order.
    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.blocks
            .iter()
            .flatten()
            .flat_map(|b| b.lines.iter().flatten())
            .flat_map(|l| l.words.iter().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_doctr_page_export() {
        let raw = json!({
            "page_idx": 0,
            "dimensions": [1100, 850],
            "orientation": {"value": null, "confidence": null},
            "language": {"value": "en", "confidence": 0.91},
            "blocks": [{
                "geometry": [[0.1, 0.1], [0.6, 0.2]],
                "lines": [{
                    "geometry": [[0.1, 0.1], [0.6, 0.2]],
                    "words": [
                        {"value": "Invoice", "confidence": 0.99, "geometry": [[0.1, 0.1], [0.3, 0.2]]},
                        {"value": "Nº42", "confidence": 0.87, "geometry": [[0.32, 0.1], [0.6, 0.2]]}
                    ]
                }],
                "artefacts": []
            }]
        });
        let page: OcrPage = serde_json::from_value(raw.clone()).unwrap();
        let words: Vec<&str> = page.words().map(|w| w.value.as_str()).collect();
        assert_eq!(words, vec!["Invoice", "Nº42"]);
        assert_eq!(page.dimensions, [1100, 850]);
        assert_eq!(serde_json::to_value(&page).unwrap(), raw);
    }

    #[test]
    fn rotated_page_polygons_pass_through() {
        let raw = json!({
            "page_idx": 1,
            "dimensions": [1100, 850],
            "blocks": [{
                "geometry": [[0.1, 0.1], [0.6, 0.12], [0.59, 0.2], [0.09, 0.18]],
                "lines": [{
                    "geometry": [[0.1, 0.1], [0.6, 0.12], [0.59, 0.2], [0.09, 0.18]],
                    "words": [{
                        "value": "Skewed",
                        "confidence": 0.8,
                        "geometry": [[0.1, 0.1], [0.3, 0.11], [0.29, 0.2], [0.09, 0.19]]
                    }]
                }],
                "artefacts": []
            }]
        });
        let page: OcrPage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(page.words().next().unwrap().geometry.len(), 4);
        assert_eq!(serde_json::to_value(&page).unwrap(), raw);
    }

    #[test]
    fn absent_fields_stay_absent() {
        let raw = json!({"page_idx": 3, "dimensions": [10, 20]});
        let page: OcrPage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&page).unwrap(), raw);

        let v = serde_json::to_value(OcrPage::empty(2, 800, 600)).unwrap();
        assert_eq!(v, json!({"page_idx": 2, "dimensions": [600, 800], "blocks": []}));
    }

    #[test]
    fn prediction_keeps_explicit_nulls_only() {
        let explicit: Prediction =
            serde_json::from_value(json!({"value": null, "confidence": null})).unwrap();
        assert_eq!(
            serde_json::to_value(&explicit).unwrap(),
            json!({"value": null, "confidence": null})
        );

        let partial: Prediction = serde_json::from_value(json!({"value": 90})).unwrap();
        assert_eq!(serde_json::to_value(&partial).unwrap(), json!({"value": 90}));
    }

    #[test]
    fn artefact_type_keeps_engine_key() {
        let a = Artefact {
            artefact_type: "qr_code".into(),
            confidence: Score::from(0.5),
            geometry: vec![[Coord::from(0.0), Coord::from(0.0)], [Coord::from(1.0), Coord::from(1.0)]],
            extra: Attributes::new(),
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["type"], "qr_code");
    }
}

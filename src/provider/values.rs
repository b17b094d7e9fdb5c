//! Leaf value types shared by the native engine schemas.
//!
//! Engines produce a few kinds of values JSON cannot carry: non-finite
//! floats (a model emitting `NaN` confidence) and raw binary attachments
//! (image crops). These types serialize such values as an in-band marker
//! map keyed by [`UNREPRESENTABLE_MARKER`]; [`crate::pipeline::normalize`]
//! then swaps every marker for `null` plus a sibling `"_unrepresentable": true`.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key of the one-entry map emitted in place of an unencodable value.
pub const UNREPRESENTABLE_MARKER: &str = "\u{0}edgequake:unrepresentable";

pub(crate) fn serialize_unrepresentable<S: Serializer>(
    serializer: S,
    reason: &str,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(UNREPRESENTABLE_MARKER, reason)?;
    map.end()
}

fn serialize_finite<S: Serializer>(value: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(value)
    } else {
        serialize_unrepresentable(serializer, &format!("non-finite float ({value})"))
    }
}

/// A JSON number in the form the engine sent it: integers stay integers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "serde_json::Number")]
pub enum Numeric {
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Unsigned(u) => u as f64,
            Numeric::Float(f) => f,
        }
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Numeric::Integer(i) => serializer.serialize_i64(i),
            Numeric::Unsigned(u) => serializer.serialize_u64(u),
            Numeric::Float(f) => serialize_finite(f, serializer),
        }
    }
}

impl From<serde_json::Number> for Numeric {
    fn from(n: serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            Numeric::Integer(i)
        } else if let Some(u) = n.as_u64() {
            Numeric::Unsigned(u)
        } else {
            Numeric::Float(n.as_f64().unwrap_or(f64::NAN))
        }
    }
}

impl From<f64> for Numeric {
    fn from(v: f64) -> Self {
        Numeric::Float(v)
    }
}

impl From<i64> for Numeric {
    fn from(v: i64) -> Self {
        Numeric::Integer(v)
    }
}

/// A model confidence or detection score, nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(pub Numeric);

impl Score {
    pub fn value(self) -> f64 {
        self.0.as_f64()
    }

    /// True when the score is a finite number inside `[0, 1]`.
    pub fn is_well_formed(&self) -> bool {
        let v = self.value();
        v.is_finite() && (0.0..=1.0).contains(&v)
    }
}

impl From<f64> for Score {
    fn from(v: f64) -> Self {
        Score(Numeric::Float(v))
    }
}

impl From<i64> for Score {
    fn from(v: i64) -> Self {
        Score(Numeric::Integer(v))
    }
}

/// A geometric coordinate (relative `0..1` for OCR, pixels for layout).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coord(pub Numeric);

impl Coord {
    pub fn value(self) -> f64 {
        self.0.as_f64()
    }
}

impl From<f64> for Coord {
    fn from(v: f64) -> Self {
        Coord(Numeric::Float(v))
    }
}

impl From<i64> for Coord {
    fn from(v: i64) -> Self {
        Coord(Numeric::Integer(v))
    }
}

/// Deserialize a field that is present in the input, even as `null`.
///
/// Used with `Option<Option<T>>` and `#[serde(default)]`: an absent key
/// stays `None` and is not written back, an explicit `null` becomes
/// `Some(None)` and is.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// An open-ended value inside an engine result (attributes, page data,
/// sub-categories) whose shape the engine alone defines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
    /// Raw bytes attached by an in-process engine. Never produced by JSON input.
    Bytes(Vec<u8>),
    List(Vec<AttributeValue>),
    Map(Attributes),
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttributeValue::Null => serializer.serialize_unit(),
            AttributeValue::Bool(b) => serializer.serialize_bool(*b),
            AttributeValue::Integer(i) => serializer.serialize_i64(*i),
            AttributeValue::Unsigned(u) => serializer.serialize_u64(*u),
            AttributeValue::Float(f) => serialize_finite(*f, serializer),
            AttributeValue::Text(s) => serializer.serialize_str(s),
            AttributeValue::Bytes(b) => {
                serialize_unrepresentable(serializer, &format!("binary blob ({} bytes)", b.len()))
            }
            AttributeValue::List(items) => serializer.collect_seq(items),
            AttributeValue::Map(map) => map.serialize(serializer),
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttributeValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    AttributeValue::Unsigned(u)
                } else {
                    AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => AttributeValue::Text(s),
            Value::Array(items) => {
                AttributeValue::List(items.into_iter().map(AttributeValue::from).collect())
            }
            Value::Object(map) => AttributeValue::Map(Attributes::from(map)),
        }
    }
}

/// Insertion-ordered string-keyed attributes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Attributes(Vec<(String, AttributeValue)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Attributes(
            map.into_iter()
                .map(|(k, v)| (k, AttributeValue::from(v)))
                .collect(),
        )
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finite_score_serializes_as_float() {
        let v = serde_json::to_value(Score::from(0.875)).unwrap();
        assert_eq!(v, json!(0.875));
        assert!(v.is_f64());
    }

    #[test]
    fn nan_score_serializes_as_marker() {
        let v = serde_json::to_value(Score::from(f64::NAN)).unwrap();
        let obj = v.as_object().expect("marker map");
        assert!(obj.contains_key(UNREPRESENTABLE_MARKER));
    }

    #[test]
    fn score_well_formed_range() {
        assert!(Score::from(0.0).is_well_formed());
        assert!(Score::from(1_i64).is_well_formed());
        assert!(!Score::from(1.2).is_well_formed());
        assert!(!Score::from(f64::INFINITY).is_well_formed());
    }

    #[test]
    fn integer_numbers_are_not_coerced_to_floats() {
        let coord: Coord = serde_json::from_value(json!(10)).unwrap();
        assert_eq!(coord, Coord(Numeric::Integer(10)));
        assert_eq!(serde_json::to_string(&coord).unwrap(), "10");

        let score: Score = serde_json::from_value(json!(1)).unwrap();
        assert_eq!(serde_json::to_string(&score).unwrap(), "1");

        let float: Score = serde_json::from_value(json!(1.0)).unwrap();
        assert_eq!(serde_json::to_string(&float).unwrap(), "1.0");
    }

    #[test]
    fn attributes_keep_insertion_order() {
        let attrs: Attributes = serde_json::from_value(json!({"z": 1, "a": "x", "m": [true]})).unwrap();
        let keys: Vec<&str> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        let back = serde_json::to_string(&attrs).unwrap();
        assert_eq!(back, r#"{"z":1,"a":"x","m":[true]}"#);
    }

    #[test]
    fn bytes_attribute_serializes_as_marker() {
        let mut attrs = Attributes::new();
        attrs.insert("crop", AttributeValue::Bytes(vec![0, 1, 2]));
        let v = serde_json::to_value(&attrs).unwrap();
        let reason = &v["crop"][UNREPRESENTABLE_MARKER];
        assert_eq!(reason, "binary blob (3 bytes)");
    }

    #[test]
    fn large_unsigned_is_not_coerced() {
        let v: AttributeValue = serde_json::from_value(json!(u64::MAX)).unwrap();
        assert_eq!(v, AttributeValue::Unsigned(u64::MAX));
    }
}

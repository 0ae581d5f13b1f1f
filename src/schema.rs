use std::fmt;

use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(deserialize_with = "lenient_frames")]
    pub frames: Vec<Frame>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub full_code_block: Option<String>,
}

impl Storyboard {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Animation Storyboard"
        } else {
            &self.title
        }
    }

    /// Pretty JSON in the `{"storyboard": {...}}` shape models return, so a
    /// saved file decodes the same way as a live response.
    pub fn to_json_document(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            storyboard: &'a Storyboard,
        }
        serde_json::to_string_pretty(&Document { storyboard: self })
    }

    /// The code listing shown next to `frame`: the shared block, or the
    /// frame's legacy snippet when the storyboard has none.
    pub fn code_for<'a>(&'a self, frame: &'a Frame) -> Option<&'a str> {
        self.full_code_block
            .as_deref()
            .filter(|code| !code.is_empty())
            .or(frame.code_snippet.as_deref())
            .filter(|code| !code.is_empty())
    }
}

// Frame validation is advisory: a missing or mistyped field decodes to its
// default and the frame is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(
        rename = "frame_id",
        default,
        deserialize_with = "lenient_frame_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub narration: String,
    #[serde(default, deserialize_with = "lenient_elements")]
    pub visual_elements: Vec<VisualElement>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub highlight_code_lines: Vec<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub code_snippet: Option<String>,
}

impl Frame {
    pub fn highlights_line(&self, line_number: u32) -> bool {
        self.highlight_code_lines.contains(&line_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualElement {
    Array(ArrayElement),
    Variables(VariablesElement),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayElement {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub values: Vec<Primitive>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub highlight_indices: Vec<usize>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub changed_indices: Vec<usize>,
}

impl ArrayElement {
    pub fn is_highlighted(&self, index: usize) -> bool {
        self.highlight_indices.contains(&index)
    }

    pub fn is_changed(&self, index: usize) -> bool {
        self.changed_indices.contains(&index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariablesElement {
    #[serde(
        default,
        deserialize_with = "ordered_entries",
        serialize_with = "entries_as_map"
    )]
    pub data: Vec<(String, Primitive)>,
}

/// A scalar snapshot value. `Nested` keeps anything the model sent that is
/// not a flat primitive so best-effort rendering can still show it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Nested(Value),
}

impl Primitive {
    pub fn is_array_cell(&self) -> bool {
        matches!(self, Self::Number(_) | Self::Text(_))
    }

    pub fn is_flat(&self) -> bool {
        !matches!(self, Self::Nested(_))
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Nested(value) => write!(f, "{value}"),
        }
    }
}

impl From<Value> for Primitive {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(number),
            Value::String(text) => Self::Text(text),
            nested => Self::Nested(nested),
        }
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_text(deserializer)?.unwrap_or_default())
}

/// Strings pass through, numbers and booleans become their text, anything
/// else is absent.
fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

/// Keeps the entries that decode as `T` and drops the rest. A non-array
/// decodes as an empty list.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(array_entries(Value::deserialize(deserializer)?)
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

fn lenient_elements<'de, D>(deserializer: D) -> Result<Vec<VisualElement>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(array_entries(Value::deserialize(deserializer)?)
        .map(|entry| serde_json::from_value(entry).unwrap_or(VisualElement::Unknown))
        .collect())
}

fn lenient_frames<'de, D>(deserializer: D) -> Result<Vec<Frame>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(array_entries(Value::deserialize(deserializer)?)
        .map(|entry| serde_json::from_value(entry).unwrap_or_default())
        .collect())
}

fn array_entries(value: Value) -> impl Iterator<Item = Value> {
    match value {
        Value::Array(entries) => entries.into_iter(),
        _ => Vec::new().into_iter(),
    }
}

fn lenient_frame_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }))
}

fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, Primitive)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| (key, Primitive::from(value)))
        .collect())
}

fn entries_as_map<S>(entries: &[(String, Primitive)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn visual_elements_decode_by_type_tag() {
        let frame: Frame = serde_json::from_value(json!({
            "frame_id": 2,
            "narration": "Compare",
            "visual_elements": [
                {"type": "array", "name": "nums", "values": [3, "x"], "highlight_indices": [0, 1]},
                {"type": "variables", "data": {"n": 3, "done": false, "tmp": null}},
                {"type": "tree", "root": 1}
            ],
            "highlight_code_lines": [4]
        }))
        .expect("frame should decode");

        assert_eq!(frame.id, Some(2));
        assert!(frame.highlights_line(4));
        let VisualElement::Array(array) = &frame.visual_elements[0] else {
            panic!("expected array element");
        };
        assert_eq!(array.values, vec![Primitive::from(3_i64), Primitive::from("x")]);
        assert!(array.is_highlighted(1));
        assert!(!array.is_changed(0));
        assert_eq!(frame.visual_elements[2], VisualElement::Unknown);
    }

    #[test]
    fn variables_keep_insertion_order() {
        let element: VariablesElement =
            serde_json::from_value(json!({"data": {"zeta": 1, "alpha": "a", "mid": true}}))
                .expect("variables should decode");
        let keys: Vec<&str> = element.data.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        let back = serde_json::to_value(&element).expect("serialize");
        assert_eq!(back, json!({"data": {"zeta": 1, "alpha": "a", "mid": true}}));
    }

    #[test]
    fn frame_without_required_fields_still_decodes() {
        let frame: Frame = serde_json::from_value(json!({})).expect("empty frame");
        assert_eq!(frame.id, None);
        assert!(frame.narration.is_empty());
        assert!(frame.visual_elements.is_empty());
    }

    #[test]
    fn null_lists_decode_as_empty() {
        let frame: Frame = serde_json::from_value(json!({
            "frame_id": 1,
            "narration": null,
            "visual_elements": [{"type": "array", "name": "a", "values": [1], "changed_indices": null}],
            "highlight_code_lines": null
        }))
        .expect("nulls tolerated");
        assert!(frame.narration.is_empty());
        assert!(frame.highlight_code_lines.is_empty());
    }

    #[test]
    fn primitive_display_matches_snapshot_text() {
        assert_eq!(Primitive::Null.to_string(), "null");
        assert_eq!(Primitive::from(true).to_string(), "true");
        assert_eq!(Primitive::from(-4_i64).to_string(), "-4");
        assert_eq!(Primitive::from("abc").to_string(), "abc");
    }

    #[test]
    fn legacy_snippet_used_only_without_shared_code() {
        let frame = Frame {
            code_snippet: Some("x = 1".to_owned()),
            ..Frame::default()
        };
        let mut storyboard = Storyboard {
            title: String::new(),
            frames: vec![frame.clone()],
            full_code_block: None,
        };
        assert_eq!(storyboard.code_for(&frame), Some("x = 1"));
        assert_eq!(storyboard.display_title(), "Animation Storyboard");

        storyboard.full_code_block = Some("y = 2".to_owned());
        assert_eq!(storyboard.code_for(&frame), Some("y = 2"));
    }
}

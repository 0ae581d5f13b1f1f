//! Decoding of raw model output into a [`Storyboard`].
//!
//! The model is asked for `{"storyboard": {...}}` but is not trusted: the
//! text may be fenced, may not be JSON at all, and individual frames may be
//! missing fields. Structural problems are errors; frame-level problems are
//! governed by [`ValidationPolicy`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{StoryResult, StoryboardError};
use crate::schema::{Primitive, Storyboard};

const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Log malformed frames and keep them.
    #[default]
    BestEffort,
    /// Reject the whole response on the first malformed frame.
    Strict,
}

/// Removes one optional wrapping code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fence(raw: &str) -> &str {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?\s*```$").ok()
    });

    let trimmed = raw.trim();
    let body = fence
        .as_ref()
        .and_then(|fence| fence.captures(trimmed))
        .and_then(|captures| captures.get(1));
    match body {
        Some(body) if !body.as_str().trim().is_empty() => body.as_str().trim(),
        _ => trimmed,
    }
}

pub fn decode_storyboard(raw: &str, policy: ValidationPolicy) -> StoryResult<Storyboard> {
    let text = strip_code_fence(raw);
    let parsed: Value = serde_json::from_str(text).map_err(|parse_error| {
        error!(%parse_error, "failed to parse model response as JSON");
        debug!(raw, "raw model response");
        if !text.starts_with('{') && !text.starts_with('[') {
            StoryboardError::response_format(format!(
                "The AI returned a non-JSON response. This might indicate an issue with the prompt or the AI model. Response starts with: {}...",
                preview(raw)
            ))
        } else {
            StoryboardError::response_format(format!(
                "Failed to parse the AI's response as valid JSON. Error: {parse_error}"
            ))
        }
    })?;

    decode_storyboard_value(parsed, policy)
}

/// Accepts both the `{"storyboard": {...}}` envelope and a bare storyboard object.
pub fn decode_storyboard_value(parsed: Value, policy: ValidationPolicy) -> StoryResult<Storyboard> {
    let mut root = match parsed {
        Value::Object(root) => root,
        other => {
            error!(kind = json_kind(&other), "model response is not a JSON object");
            return Err(shape_error());
        }
    };

    let storyboard = match root.remove("storyboard") {
        Some(Value::Object(storyboard)) => storyboard,
        Some(_) => return Err(shape_error()),
        None => root,
    };

    let Some(frames) = storyboard.get("frames").and_then(Value::as_array) else {
        error!("model response has no `frames` array");
        return Err(shape_error());
    };

    for (index, frame) in frames.iter().enumerate() {
        for problem in frame_problems(index + 1, frame) {
            match policy {
                ValidationPolicy::BestEffort => {
                    warn!(frame = index + 1, %problem, "keeping malformed frame");
                }
                ValidationPolicy::Strict => return Err(StoryboardError::response_format(problem)),
            }
        }
    }

    serde_json::from_value(Value::Object(storyboard)).map_err(|error| {
        StoryboardError::response_format(format!(
            "The AI response was not in the expected storyboard format: {error}"
        ))
    })
}

/// Every shape problem in one frame, as user-facing messages. `number` is
/// the 1-based frame position.
fn frame_problems(number: usize, frame: &Value) -> Vec<String> {
    let Some(frame) = frame.as_object() else {
        return vec![format!("Frame {number} is not an object.")];
    };

    let mut problems = Vec::new();
    let mut missing = Vec::new();
    if !frame.get("frame_id").is_some_and(Value::is_number) {
        missing.push("frame_id");
    }
    if !frame.get("narration").is_some_and(Value::is_string) {
        missing.push("narration");
    }
    if !frame.get("visual_elements").is_some_and(Value::is_array) {
        missing.push("visual_elements");
    }
    if !missing.is_empty() {
        problems.push(format!(
            "Frame {number} is missing essential properties: {}.",
            missing.join(", ")
        ));
    }

    if !holds_indices(frame.get("highlight_code_lines")) {
        problems.push(format!(
            "Frame {number}: highlight_code_lines must be a list of line numbers."
        ));
    }

    let elements = frame
        .get("visual_elements")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (position, element) in elements.iter().enumerate() {
        if let Some(reason) = element_problem(element) {
            problems.push(format!(
                "Frame {number} visual element {}: {reason}.",
                position + 1
            ));
        }
    }
    problems
}

fn element_problem(element: &Value) -> Option<String> {
    match element.get("type").and_then(Value::as_str) {
        Some("array") => {
            if !element.get("name").is_some_and(Value::is_string) {
                return Some("array element requires a `name`".to_owned());
            }
            let Some(values) = element.get("values").and_then(Value::as_array) else {
                return Some("array element requires `values`".to_owned());
            };
            if !values
                .iter()
                .all(|value| Primitive::from(value.clone()).is_array_cell())
            {
                return Some("array values must be strings or numbers".to_owned());
            }
            for field in ["highlight_indices", "changed_indices"] {
                if !holds_indices(element.get(field)) {
                    return Some(format!("`{field}` must be a list of non-negative integers"));
                }
            }
            None
        }
        Some("variables") => {
            let Some(data) = element.get("data").and_then(Value::as_object) else {
                return Some("variables element requires a `data` object".to_owned());
            };
            if !data
                .values()
                .all(|value| Primitive::from(value.clone()).is_flat())
            {
                return Some("variables must map names to flat primitives".to_owned());
            }
            None
        }
        Some(other) => Some(format!("unknown element type '{other}'")),
        None => Some("element has no `type`".to_owned()),
    }
}

/// Absent and `null` count as an empty list.
fn holds_indices(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(entries)) => entries.iter().all(|entry| entry.as_u64().is_some()),
        Some(_) => false,
    }
}

fn shape_error() -> StoryboardError {
    StoryboardError::response_format(
        "The AI response was not in the expected storyboard format. It might be missing 'storyboard' or 'frames', or the structure is incorrect.",
    )
}

fn preview(raw: &str) -> String {
    raw.trim().chars().take(PREVIEW_CHARS).collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

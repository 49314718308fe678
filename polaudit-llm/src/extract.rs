//! Response extractor - locates and validates a JSON object in model output.
//!
//! Providers are told to answer with JSON only, but models routinely wrap the
//! object in prose, reasoning preambles, or markdown fences. Extraction runs:
//!
//! 1. Direct parse of the whole trimmed text.
//! 2. Balanced-brace scan: each `{` in order is matched to its closing `}`
//!    (ignoring braces inside JSON strings) and the span is parsed.
//! 3. Otherwise [`LlmError::MalformedResponse`] with a snippet of the raw text.
//!
//! A parsed object must then carry every field of the expected
//! [`ResponseShape`] with the right type. Extra fields are ignored.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::LlmError;

/// Type a required field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// JSON string.
    String,
    /// JSON array whose items are all strings.
    StringList,
    /// JSON number.
    Number,
    /// JSON boolean.
    Bool,
    /// Present, any type.
    Any,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Any => true,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::StringList => "a list of strings",
            Self::Number => "a number",
            Self::Bool => "a boolean",
            Self::Any => "present",
        }
    }
}

/// The fields a call site requires in the model's JSON answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseShape {
    fields: Vec<(String, FieldKind)>,
}

impl ResponseShape {
    /// A shape with no required fields (any JSON object).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `name` to be present with type `kind`.
    #[must_use]
    pub fn require(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    /// Shape of the compliance analysis answer.
    #[must_use]
    pub fn analysis() -> Self {
        Self::new()
            .require("match", FieldKind::String)
            .require("if_yes_reason", FieldKind::String)
            .require("suggestions", FieldKind::String)
    }

    /// Shape of the suggestion rewrite answer.
    #[must_use]
    pub fn rewrite() -> Self {
        Self::new().require("rewritten_suggestions", FieldKind::StringList)
    }

    /// Check `object` against this shape, returning the first violation.
    fn violation(&self, object: &Map<String, Value>) -> Option<String> {
        self.fields.iter().find_map(|(name, kind)| match object.get(name) {
            None => Some(format!("missing required field `{name}`")),
            Some(v) if !kind.accepts(v) => Some(format!("field `{name}` is not {}", kind.describe())),
            Some(_) => None,
        })
    }
}

/// Extract the JSON object matching `shape` from raw model output.
pub fn extract(raw: &str, shape: &ResponseShape) -> Result<Value, LlmError> {
    let trimmed = raw.trim();
    let mut first_violation: Option<String> = None;

    let direct = serde_json::from_str::<Value>(trimmed).ok();
    let candidates = direct.into_iter().chain(
        brace_spans(trimmed).filter_map(|span| serde_json::from_str::<Value>(span).ok()),
    );

    for value in candidates {
        let Value::Object(object) = &value else {
            continue;
        };
        match shape.violation(object) {
            None => return Ok(value),
            Some(v) => {
                first_violation.get_or_insert(v);
            }
        }
    }

    Err(LlmError::malformed(
        first_violation.unwrap_or_else(|| "no JSON object found".to_string()),
        raw,
    ))
}

/// Extract and deserialize into a typed answer.
pub fn extract_as<T: DeserializeOwned>(raw: &str, shape: &ResponseShape) -> Result<T, LlmError> {
    let value = extract(raw, shape)?;
    serde_json::from_value(value).map_err(|e| LlmError::malformed(e.to_string(), raw))
}

/// Iterate over balanced `{ ... }` spans, one per opening brace that closes.
fn brace_spans(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('{')
        .filter_map(move |(start, _)| matching_close(&text[start..]).map(|end| &text[start..=start + end]))
}

/// Byte offset of the `}` closing the `{` at the start of `text`.
fn matching_close(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

//! Embedded application-state extraction
//!
//! CONTENTdm pages ship the whole item record as a serialized state object:
//!
//! ```text
//! window.__INITIAL_STATE__ = JSON.parse("{\"item\":{\"item\":{\"parent\":{\"fields\":[...]}}}}");
//! ```
//!
//! When that blob is present and well-formed it is the most reliable source of
//! metadata. A missing or malformed blob simply yields no fields.

use crate::extract::document::DetailPage;
use crate::extract::recognizer::FieldRecognizer;
use crate::extract::ExtractionStrategy;
use crate::state::FieldMap;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn initial_state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)window\.__INITIAL_STATE__\s*=\s*JSON\.parse\("(.+?)"\);"#)
            .expect("initial state pattern is valid")
    })
}

/// Reads fields from the serialized application state
#[derive(Debug, Default)]
pub struct StructuredStateExtractor;

impl ExtractionStrategy for StructuredStateExtractor {
    fn name(&self) -> &'static str {
        "structured-state"
    }

    fn extract(&self, page: &DetailPage, recognizer: &dyn FieldRecognizer) -> FieldMap {
        let Some(state) = parse_initial_state(page.source()) else {
            return FieldMap::new();
        };
        fields_from_state(&state, recognizer)
    }
}

/// Locates and decodes the embedded state object
///
/// Returns None when the blob is absent or does not parse.
pub fn parse_initial_state(source: &str) -> Option<Value> {
    let literal = initial_state_pattern().captures(source)?.get(1)?.as_str();

    let json = match serde_json::from_str::<String>(&format!("\"{}\"", literal)) {
        Ok(decoded) => decoded,
        Err(_) => literal.replace("\\\"", "\"").replace("\\\\", "\\"),
    };

    match serde_json::from_str::<Value>(&json) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::debug!("Embedded state is not valid JSON: {}", e);
            None
        }
    }
}

/// Walks item -> parent -> fields (or item -> fields for simple items)
pub fn fields_from_state(state: &Value, recognizer: &dyn FieldRecognizer) -> FieldMap {
    let item = &state["item"]["item"];
    let fields = match &item["parent"]["fields"] {
        Value::Array(fields) => fields,
        _ => match &item["fields"] {
            Value::Array(fields) => fields,
            _ => return FieldMap::new(),
        },
    };

    let mut record = FieldMap::new();
    for field in fields {
        let Some(key) = field.get("key").and_then(Value::as_str) else {
            continue;
        };
        let Some(value) = field.get("value").and_then(value_to_string) else {
            continue;
        };
        record.entry(recognizer.canonical_key(key)).or_insert(value);
    }
    record
}

fn value_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

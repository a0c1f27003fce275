use crate::model::Finding;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// How much of an unusable payload is kept in the debug log.
pub const RAW_PREVIEW_CHARS: usize = 2000;

/// The shapes an analyzer has been seen to return.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutput {
    /// `{"errors": [...]}`, the shape the prompt asks for.
    ErrorsWrapper(Vec<Value>),
    /// A bare `[...]`.
    BareList(Vec<Value>),
    /// Anything else; kept for diagnostics only.
    Other(Value),
}

impl AnalysisOutput {
    pub fn classify(payload: Value) -> Self {
        match payload {
            Value::Array(items) => AnalysisOutput::BareList(items),
            Value::Object(mut map) => match map.remove("errors") {
                Some(Value::Array(items)) => AnalysisOutput::ErrorsWrapper(items),
                Some(other) => {
                    map.insert("errors".into(), other);
                    AnalysisOutput::Other(Value::Object(map))
                }
                None => AnalysisOutput::Other(Value::Object(map)),
            },
            other => AnalysisOutput::Other(other),
        }
    }

    pub fn into_findings(self) -> Vec<Finding> {
        let items = match self {
            AnalysisOutput::ErrorsWrapper(items) | AnalysisOutput::BareList(items) => items,
            AnalysisOutput::Other(raw) => {
                warn!("analysis output has an unexpected shape; no findings: {}", shape_of(&raw));
                debug!("raw analysis output: {}", raw_preview(&raw, RAW_PREVIEW_CHARS));
                return Vec::new();
            }
        };

        items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Value::Object(map) => Some(finding_from_map(map)),
                other => {
                    debug!("skipping finding {i}: expected object, got {}", shape_of(&other));
                    None
                }
            })
            .collect()
    }
}

/// Coerce a loosely-typed analyzer payload into canonical findings.
/// Unusable shapes yield an empty list, never an error.
pub fn normalize(payload: Value) -> Vec<Finding> {
    AnalysisOutput::classify(payload).into_findings()
}

fn finding_from_map(mut map: Map<String, Value>) -> Finding {
    let mut take = |key: &str| map.remove(key).map(text_of).unwrap_or_default();
    let location = take("location");
    let error = take("error");
    let suggestion = take("suggestion");
    let exact_quote = take("exact_quote");
    // Only the locator writes geometry.
    map.remove("boundingBoxes");

    Finding {
        location,
        error,
        suggestion,
        exact_quote,
        bounding_boxes: None,
        extra: map,
    }
}

/// Compact JSON of `raw`, cut to `max_chars` characters with an ellipsis.
pub fn raw_preview(raw: &Value, max_chars: usize) -> String {
    let text = raw.to_string();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\u{2026}", &text[..cut]),
        None => text,
    }
}

fn text_of(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn shape_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn errors_key_with_non_list_is_other() {
        let out = AnalysisOutput::classify(json!({"errors": "none"}));
        assert!(matches!(out, AnalysisOutput::Other(_)));
        assert!(out.into_findings().is_empty());
    }

    #[test]
    fn raw_preview_keeps_short_payloads_whole() {
        let raw = json!({"summary": "looks fine"});
        assert_eq!(raw_preview(&raw, 100), r#"{"summary":"looks fine"}"#);
    }

    #[test]
    fn raw_preview_truncates_on_char_boundaries() {
        let raw = json!("é".repeat(50));
        let preview = raw_preview(&raw, 10);
        assert_eq!(preview.chars().count(), 11);
        assert!(preview.starts_with("\"éééé"));
        assert!(preview.ends_with('\u{2026}'));
    }

    #[test]
    fn non_string_fields_are_stringified() {
        let f = normalize(json!([{"location": 3, "error": null, "suggestion": "x"}]));
        assert_eq!(f[0].location, "3");
        assert_eq!(f[0].error, "");
    }
}

// Model response normalization.
//
// The completions API promises an envelope, not a payload contract. Across
// model versions the assistant content has shown up as a bare JSON array,
// as an object wrapping the array under a spare key, as a single object,
// wrapped in markdown code fences, or JSON-encoded inside a JSON string.
// This module turns whatever came back into a flat candidate list, or
// reports a `ParseError` carrying a short preview of the raw response so
// prompt drift can be debugged without logging whole payloads.

use super::models::ExpenseRecord;
use serde_json::Value;
use thiserror::Error;

/// How many times a string-typed JSON root is re-parsed before giving up.
const MAX_UNWRAP_DEPTH: usize = 3;

/// Alternate key names under which models wrap the result array.
const WRAPPER_KEYS: [&str; 3] = ["entries", "results", "data"];

/// Field names a bare object is recognized as a single expense by.
const EXPENSE_FIELDS: [&str; 4] = ["date", "amount", "category", "description"];

/// Upper bound on the raw-response preview embedded in errors.
const PREVIEW_LEN: usize = 200;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("model returned an empty response")]
    EmptyContent,

    #[error("model response envelope is not usable: {detail} (preview: {preview})")]
    InvalidEnvelope { detail: String, preview: String },

    #[error("model content is not valid JSON: {detail} (preview: {preview})")]
    InvalidContentJson { detail: String, preview: String },

    #[error("model content is a JSON string nested past the unwrap limit (preview: {preview})")]
    UnwrapDepthExceeded { preview: String },

    #[error("model content has no recognizable expense shape (preview: {preview})")]
    UnrecognizedShape { preview: String },

    #[error("candidate {index} could not be decoded: {detail}")]
    MalformedCandidate { index: usize, detail: String },
}

// ============================================================================
// SHAPE CLASSIFICATION
// ============================================================================

/// Shape of the final parsed payload. Decided once, then branched on, so
/// the shape checks don't end up scattered through the parsing code.
#[derive(Debug)]
enum PayloadShape {
    /// A bare array of candidate objects.
    List(Vec<Value>),
    /// An object wrapping the candidate array under a known key.
    Wrapped(&'static str, Vec<Value>),
    /// An object that is itself a single expense.
    Single(Value),
    /// Anything else.
    Unrecognized,
}

fn classify_payload(value: Value) -> PayloadShape {
    match value {
        Value::Array(items) => PayloadShape::List(items),
        Value::Object(mut map) => {
            for key in WRAPPER_KEYS {
                if matches!(map.get(key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = map.remove(key) {
                        return PayloadShape::Wrapped(key, items);
                    }
                }
            }
            if EXPENSE_FIELDS.iter().any(|field| map.contains_key(*field)) {
                return PayloadShape::Single(Value::Object(map));
            }
            PayloadShape::Unrecognized
        }
        _ => PayloadShape::Unrecognized,
    }
}

// ============================================================================
// NORMALIZATION PIPELINE
// ============================================================================

/// Extracts the candidate expense list from a raw completions response body.
///
/// The steps, in order: pull the assistant content out of the envelope,
/// strip markdown code fences, unwrap string-encoded JSON (bounded), then
/// classify the shape and decode each candidate with lenient scalar
/// handling. The returned list is NOT length-aligned to the source batch;
/// that happens in [`super::align`].
pub fn extract_candidates(raw_body: &str) -> Result<Vec<ExpenseRecord>, ParseError> {
    let content = extract_message_content(raw_body)?;
    let cleaned = strip_code_fences(&content);

    let payload = match unwrap_nested_json(&cleaned, raw_body)? {
        Some(value) => value,
        // The model answered with an (eventually) empty string. Nothing to
        // decode, but nothing malformed either - the aligner fills the gaps.
        None => return Ok(Vec::new()),
    };

    let candidates = match classify_payload(payload) {
        PayloadShape::List(items) => items,
        PayloadShape::Wrapped(key, items) => {
            tracing::debug!(wrapper = key, "model wrapped the result array");
            items
        }
        PayloadShape::Single(object) => vec![object],
        PayloadShape::Unrecognized => {
            return Err(ParseError::UnrecognizedShape {
                preview: preview(raw_body),
            })
        }
    };

    candidates
        .iter()
        .enumerate()
        .map(|(index, value)| decode_candidate(index, value))
        .collect()
}

/// Pulls the assistant message text out of the provider envelope.
///
/// `content` is usually a plain string, but some model versions answer
/// with an array of typed parts; only `{"type": "text"}` parts carry prose
/// and they are joined with newlines. Any other content shape is kept as
/// its raw JSON text.
fn extract_message_content(raw_body: &str) -> Result<String, ParseError> {
    let envelope: Value =
        serde_json::from_str(raw_body).map_err(|err| ParseError::InvalidEnvelope {
            detail: err.to_string(),
            preview: preview(raw_body),
        })?;

    let content = envelope
        .pointer("/choices/0/message/content")
        .ok_or_else(|| ParseError::InvalidEnvelope {
            detail: "choices[0].message.content is missing".to_string(),
            preview: preview(raw_body),
        })?;

    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    };

    if text.trim().is_empty() {
        return Err(ParseError::EmptyContent);
    }
    Ok(text)
}

/// Strips a leading markdown code fence (with optional language tag) and
/// its closing fence. Text without a leading fence is returned unchanged;
/// a fence that never closes loses all its backticks instead.
fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    let Some(after_fence) = trimmed.strip_prefix("```") else {
        return content.to_string();
    };

    // The rest of the opening line is a language tag ("json"); the payload
    // starts on the next line.
    let body = match after_fence.find('\n') {
        Some(line_end) => &after_fence[line_end + 1..],
        None => after_fence,
    };

    match body.rfind("```") {
        Some(closing) => body[..closing].trim().to_string(),
        None => trimmed.replace('`', "").trim().to_string(),
    }
}

/// Parses the cleaned content, unwrapping string-encoded JSON as needed.
///
/// Models occasionally double-encode: the JSON value is itself a string
/// holding the real JSON. Each string root is trimmed and re-parsed, at
/// most [`MAX_UNWRAP_DEPTH`] times. An empty unwrapped string yields
/// `None` - an empty candidate list, not an error.
fn unwrap_nested_json(cleaned: &str, raw_body: &str) -> Result<Option<Value>, ParseError> {
    let mut value = parse_content(cleaned, raw_body)?;
    let mut depth = 0;

    loop {
        match value {
            Value::String(inner) => {
                if depth == MAX_UNWRAP_DEPTH {
                    return Err(ParseError::UnwrapDepthExceeded {
                        preview: preview(raw_body),
                    });
                }
                depth += 1;

                let inner = inner.trim().to_string();
                if inner.is_empty() {
                    return Ok(None);
                }
                value = parse_content(&inner, raw_body)?;
            }
            other => return Ok(Some(other)),
        }
    }
}

fn parse_content(text: &str, raw_body: &str) -> Result<Value, ParseError> {
    serde_json::from_str(text).map_err(|err| ParseError::InvalidContentJson {
        detail: err.to_string(),
        preview: preview(raw_body),
    })
}

fn decode_candidate(index: usize, value: &Value) -> Result<ExpenseRecord, ParseError> {
    serde_json::from_value(value.clone()).map_err(|err| ParseError::MalformedCandidate {
        index,
        detail: err.to_string(),
    })
}

/// First [`PREVIEW_LEN`] characters of the raw response, for diagnostics.
fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= PREVIEW_LEN {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(PREVIEW_LEN).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Wraps assistant text in a minimal completions envelope.
    fn envelope(content: &str) -> String {
        json!({"choices": [{"message": {"content": content}}]}).to_string()
    }

    fn envelope_with(content: Value) -> String {
        json!({"choices": [{"message": {"content": content}}]}).to_string()
    }

    #[test]
    fn bare_array_content_decodes() {
        let body = envelope(r#"[{"date": "2024-05-01", "amount": "$5", "category": "Food", "description": "coffee"}]"#);
        let candidates = extract_candidates(&body).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].amount, "$5");
        assert_eq!(candidates[0].category, "Food");
    }

    #[test]
    fn wrapped_arrays_are_unwrapped_for_each_known_key() {
        for key in ["entries", "results", "data"] {
            let body = envelope(&format!(r#"{{"{}": [{{"amount": "$1"}}]}}"#, key));
            let candidates = extract_candidates(&body).unwrap();
            assert_eq!(candidates.len(), 1, "wrapper key {}", key);
            assert_eq!(candidates[0].amount, "$1");
        }
    }

    #[test]
    fn single_expense_object_becomes_a_one_element_list() {
        let body = envelope(r#"{"amount": "$9.99", "description": "lunch"}"#);
        let candidates = extract_candidates(&body).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].description, "lunch");
    }

    #[test]
    fn object_without_expense_fields_is_unrecognized() {
        let body = envelope(r#"{"note": "nothing to see"}"#);
        assert!(matches!(
            extract_candidates(&body),
            Err(ParseError::UnrecognizedShape { .. })
        ));
    }

    #[test]
    fn scalar_root_is_unrecognized() {
        let body = envelope("42");
        assert!(matches!(
            extract_candidates(&body),
            Err(ParseError::UnrecognizedShape { .. })
        ));
    }

    #[test]
    fn typed_parts_are_joined_and_non_text_parts_ignored() {
        let content = json!([
            {"type": "text", "text": r#"[{"amount":"#},
            {"type": "image", "url": "ignored"},
            {"type": "text", "text": r#""$2"}]"#},
        ]);
        let candidates = extract_candidates(&envelope_with(content)).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].amount, "$2");
    }

    #[test]
    fn empty_content_fails_before_shape_classification() {
        assert!(matches!(
            extract_candidates(&envelope("")),
            Err(ParseError::EmptyContent)
        ));
        assert!(matches!(
            extract_candidates(&envelope("   \n  ")),
            Err(ParseError::EmptyContent)
        ));
    }

    #[test]
    fn missing_content_is_an_envelope_error() {
        let body = json!({"choices": []}).to_string();
        assert!(matches!(
            extract_candidates(&body),
            Err(ParseError::InvalidEnvelope { .. })
        ));
    }

    #[test]
    fn non_json_body_is_an_envelope_error() {
        assert!(matches!(
            extract_candidates("upstream text error"),
            Err(ParseError::InvalidEnvelope { .. })
        ));
    }

    #[test]
    fn fenced_content_is_stripped() {
        let body = envelope("```json\n[{\"amount\": \"$7\"}]\n```");
        let candidates = extract_candidates(&body).unwrap();
        assert_eq!(candidates[0].amount, "$7");
    }

    #[test]
    fn fence_stripping_leaves_unfenced_text_unchanged() {
        assert_eq!(strip_code_fences(r#"[{"a": 1}]"#), r#"[{"a": 1}]"#);
    }

    #[test]
    fn unclosed_fence_loses_its_backticks() {
        assert_eq!(strip_code_fences("```json\n[1, 2]"), "json\n[1, 2]");
    }

    #[test]
    fn double_encoded_content_unwraps_to_the_inner_array() {
        let inner = r#"[{"amount": "$3"}]"#;
        let once = serde_json::to_string(inner).unwrap();
        let twice = serde_json::to_string(&once).unwrap();

        let candidates = extract_candidates(&envelope_with(json!(twice))).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].amount, "$3");
    }

    #[test]
    fn unwrapping_is_bounded() {
        // Encode a string so deep that unwrapping it would take more than
        // MAX_UNWRAP_DEPTH re-parses.
        let mut nested = String::from("\"deep\"");
        for _ in 0..(MAX_UNWRAP_DEPTH + 1) {
            nested = serde_json::to_string(&nested).unwrap();
        }

        let body = envelope_with(serde_json::from_str(&nested).unwrap());
        assert!(matches!(
            extract_candidates(&body),
            Err(ParseError::UnwrapDepthExceeded { .. })
        ));
    }

    #[test]
    fn unwrapped_empty_string_is_an_empty_candidate_list() {
        let body = envelope_with(json!("\"  \""));
        assert_eq!(extract_candidates(&body).unwrap(), Vec::new());
    }

    #[test]
    fn plain_prose_content_is_a_content_error() {
        let body = envelope("Sorry, I could not find any expenses.");
        assert!(matches!(
            extract_candidates(&body),
            Err(ParseError::InvalidContentJson { .. })
        ));
    }

    #[test]
    fn candidate_with_nested_field_is_malformed() {
        let body = envelope(r#"[{"amount": {"value": 3}}]"#);
        assert!(matches!(
            extract_candidates(&body),
            Err(ParseError::MalformedCandidate { index: 0, .. })
        ));
    }

    #[test]
    fn scalar_tolerance_applies_to_candidates() {
        let body = envelope(r#"[{"date": null, "amount": 42, "category": true}]"#);
        let candidates = extract_candidates(&body).unwrap();

        assert_eq!(candidates[0].date, "");
        assert_eq!(candidates[0].amount, "42");
        assert_eq!(candidates[0].category, "true");
    }

    #[test]
    fn error_previews_are_truncated() {
        let long_note = "x".repeat(600);
        let body = envelope_with(json!({ "note": long_note }));

        match extract_candidates(&body) {
            Err(ParseError::UnrecognizedShape { preview }) => {
                assert!(preview.len() <= PREVIEW_LEN + 3);
                assert!(preview.ends_with("..."));
            }
            other => panic!("expected UnrecognizedShape, got {:?}", other),
        }
    }
}

//! Response extractor: free model text → structured assessment.
//!
//! Never fails. Anything that does not yield a JSON object becomes an
//! `ExtractionOutcome::Degraded` carrying an excerpt of the raw text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::types::{AssessmentResult, DegradedResult, ExtractionOutcome};

/// Maximum characters of raw model text kept in a degraded result.
pub const RAW_EXCERPT_CHARS: usize = 500;

/// First fenced block, optionally tagged `json`.
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?```").expect("static regex"));

/// Classify a raw model response.
pub fn extract_assessment(raw: &str) -> ExtractionOutcome {
    let body = fenced_body(raw).unwrap_or(raw);

    let Some(candidate) = balanced_object(body) else {
        return degrade(raw, "no JSON object in response".to_string());
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => ExtractionOutcome::Structured(AssessmentResult::from_object(object)),
        Ok(other) => degrade(raw, format!("expected a JSON object, found {}", json_kind(&other))),
        Err(e) => degrade(raw, format!("invalid JSON: {e}")),
    }
}

/// Content of the first fenced block, if any.
fn fenced_body(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Slice from the first `{` to the point where brace depth returns to zero.
///
/// Braces inside JSON string values are counted too, so a value such as
/// `"use {name}"` with unbalanced braces shifts the boundary. An object that
/// never closes yields the rest of the text, which then fails to parse.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    Some(&text[start..])
}

fn degrade(raw: &str, reason: String) -> ExtractionOutcome {
    let raw_excerpt: String = raw.chars().take(RAW_EXCERPT_CHARS).collect();
    tracing::warn!(
        reason = %reason,
        raw_len = raw.len(),
        "Model response could not be parsed, returning degraded result"
    );
    ExtractionOutcome::Degraded(DegradedResult { reason, raw_excerpt })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(raw: &str) -> AssessmentResult {
        match extract_assessment(raw) {
            ExtractionOutcome::Structured(result) => result,
            ExtractionOutcome::Degraded(d) => panic!("unexpected degraded result: {}", d.reason),
        }
    }

    fn assert_degraded(raw: &str) -> DegradedResult {
        match extract_assessment(raw) {
            ExtractionOutcome::Degraded(d) => d,
            ExtractionOutcome::Structured(r) => panic!("expected degraded, got {r:?}"),
        }
    }

    #[test]
    fn fenced_json_with_surrounding_prose() {
        let raw = "Here you go:\n```json\n{\"accessibility_rating\":\"Partially Accessible\",\"assessments\":{},\"inferred_metadata\":{}}\n```\nThanks!";
        let result = structured(raw);
        assert_eq!(result.accessibility_rating.as_deref(), Some("Partially Accessible"));
        assert!(result.assessments.is_empty());
    }

    #[test]
    fn untagged_fence_is_accepted() {
        let raw = "```\n{\"overall_notes\": \"Lobby screen\"}\n```";
        assert_eq!(structured(raw).overall_notes.as_deref(), Some("Lobby screen"));
    }

    #[test]
    fn bare_json_with_trailing_prose() {
        let raw = r#"{"assessments": {"contrast": "Strong contrast."}} I hope this helps! }"#;
        let result = structured(raw);
        assert_eq!(result.assessment_text("contrast"), "Strong contrast.");
    }

    #[test]
    fn leading_prose_before_bare_object() {
        let raw = r#"Sure. {"final_comments": "None", "inferred_metadata": {"building": "Library"}}"#;
        let result = structured(raw);
        assert_eq!(result.final_comments.as_deref(), Some("None"));
        assert_eq!(result.inferred_text("building"), "Library");
    }

    #[test]
    fn only_first_fenced_block_is_used() {
        let raw = "```json\n{\"overall_notes\": \"first\"}\n```\nand\n```json\n{\"overall_notes\": \"second\"}\n```";
        assert_eq!(structured(raw).overall_notes.as_deref(), Some("first"));
    }

    #[test]
    fn nested_objects_keep_depth() {
        let raw = r#"{"inferred_metadata": {"a": {"b": "c"}}, "overall_notes": "x"} tail"#;
        let result = structured(raw);
        assert_eq!(result.overall_notes.as_deref(), Some("x"));
        assert!(result.inferred_metadata["a"].is_object());
    }

    #[test]
    fn missing_and_unknown_keys_are_tolerated() {
        let result = structured(r#"{"sign_quality": "good"}"#);
        assert!(result.assessments.is_empty());
        assert!(result.accessibility_rating.is_none());
        assert_eq!(result.extra["sign_quality"], "good");
    }

    #[test]
    fn empty_string_degrades() {
        let degraded = assert_degraded("");
        assert_eq!(degraded.raw_excerpt, "");
        assert!(degraded.reason.contains("no JSON object"));
    }

    #[test]
    fn text_without_brace_degrades() {
        let degraded = assert_degraded("I'm sorry, I can't assess this image.");
        assert_eq!(degraded.raw_excerpt, "I'm sorry, I can't assess this image.");
    }

    #[test]
    fn truncated_json_degrades_with_empty_maps() {
        let outcome = extract_assessment(r#"{"assessments": {"contrast": "Good"#);
        assert!(outcome.is_degraded());
        let result = outcome.into_result();
        assert!(result.assessments.is_empty());
        assert!(result.inferred_metadata.is_empty());
        assert!(result
            .overall_notes
            .unwrap()
            .starts_with("Failed to parse AI response. Raw response: {\"assessments\""));
    }

    #[test]
    fn invalid_json_inside_fence_degrades() {
        let degraded = assert_degraded("```json\n{invalid json}\n```");
        assert!(degraded.reason.starts_with("invalid JSON"));
    }

    #[test]
    fn excerpt_is_capped_at_500_characters() {
        let raw = "é".repeat(800);
        let degraded = assert_degraded(&raw);
        assert_eq!(degraded.raw_excerpt.chars().count(), RAW_EXCERPT_CHARS);
    }

    #[test]
    fn excerpt_comes_from_raw_text_not_fence_body() {
        let raw = "Preface\n```json\nnot json at all {\n```";
        let degraded = assert_degraded(raw);
        assert!(degraded.raw_excerpt.starts_with("Preface"));
    }

    // Known limitation: braces inside string values are not skipped.
    #[test]
    fn brace_inside_string_value_shifts_boundary() {
        // Balanced braces inside a string are harmless.
        let balanced = r#"{"overall_notes": "Shows {room} numbers"} trailing"#;
        assert_eq!(structured(balanced).overall_notes.as_deref(), Some("Shows {room} numbers"));

        // A lone closing brace ends the candidate early and the parse fails.
        let unbalanced = r#"{"overall_notes": "Smiley :} on screen", "final_comments": "ok"}"#;
        assert!(extract_assessment(unbalanced).is_degraded());
    }
}

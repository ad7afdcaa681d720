use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::voice::RubricVoice;

/// Sentinel option that enables the paired `<id>_other` free-text value.
pub const OTHER_SENTINEL: &str = "Other";

/// Render a loosely-typed JSON value as a spreadsheet/prompt cell.
/// `null` is empty, strings are verbatim, anything else is its JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ──────────────────────────────────────────────
// User metadata
// ──────────────────────────────────────────────

/// Assessor-entered metadata keyed by metadata field id, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserMetadata(Map<String, Value>);

impl UserMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text of a field, empty when absent.
    pub fn text(&self, key: &str) -> String {
        self.0.get(key).map(value_text).unwrap_or_default()
    }

    /// Non-empty `(key, value)` pairs in insertion order.
    pub fn non_empty(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), value_text(v)))
            .filter(|(_, v)| !v.is_empty())
    }

    /// Cell value for a metadata field, substituting `"Other: <text>"` when
    /// the sentinel was picked and the paired `<id>_other` text is present.
    pub fn resolved(&self, field_id: &str) -> String {
        let value = self.text(field_id);
        if value == OTHER_SENTINEL {
            let other = self.text(&format!("{field_id}_other"));
            if !other.is_empty() {
                return format!("{OTHER_SENTINEL}: {other}");
            }
        }
        value
    }
}

impl From<Map<String, Value>> for UserMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ──────────────────────────────────────────────
// Model output
// ──────────────────────────────────────────────

/// Structured assessment as returned by the model (or edited by the assessor
/// before submission). Known keys are typed; unknown top-level keys are kept
/// in `extra` so nothing the model said is silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    #[serde(default)]
    pub inferred_metadata: Map<String, Value>,
    #[serde(default)]
    pub assessments: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility_rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssessmentResult {
    /// Build a result from any JSON object without failing: wrongly typed
    /// known keys are coerced to text or replaced by an empty map.
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        let inferred_metadata = take_object(&mut object, "inferred_metadata");
        let assessments = take_object(&mut object, "assessments");
        let accessibility_rating = take_text(&mut object, "accessibility_rating");
        let final_comments = take_text(&mut object, "final_comments");
        let overall_notes = take_text(&mut object, "overall_notes");

        Self {
            inferred_metadata,
            assessments,
            accessibility_rating,
            final_comments,
            overall_notes,
            extra: object,
        }
    }

    pub fn inferred_text(&self, key: &str) -> String {
        self.inferred_metadata.get(key).map(value_text).unwrap_or_default()
    }

    pub fn assessment_text(&self, category_id: &str) -> String {
        self.assessments.get(category_id).map(value_text).unwrap_or_default()
    }
}

fn take_object(object: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match object.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn take_text(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    object
        .remove(key)
        .map(|v| value_text(&v))
        .filter(|s| !s.is_empty())
}

/// Fallback produced when the model's text holds no parseable object.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradedResult {
    /// Why extraction gave up (for logs).
    pub reason: String,
    /// First characters of the raw model text, for the assessor to inspect.
    pub raw_excerpt: String,
}

impl DegradedResult {
    pub fn diagnostic(&self) -> String {
        format!("Failed to parse AI response. Raw response: {}", self.raw_excerpt)
    }
}

/// Total classification of a model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Structured(AssessmentResult),
    Degraded(DegradedResult),
}

impl ExtractionOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// Always yields a well-formed result; a degraded outcome carries empty
    /// maps and the diagnostic in `overall_notes`.
    pub fn into_result(self) -> AssessmentResult {
        match self {
            Self::Structured(result) => result,
            Self::Degraded(degraded) => AssessmentResult {
                overall_notes: Some(degraded.diagnostic()),
                ..AssessmentResult::default()
            },
        }
    }
}

// ──────────────────────────────────────────────
// Submission
// ──────────────────────────────────────────────

/// Per-submission values that do not come from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionContext {
    pub submitted_at: DateTime<Utc>,
    /// Upload URL, empty when no image was uploaded.
    pub image_link: String,
    /// Rating chosen by the assessor; wins over the model's suggestion.
    pub rating_override: Option<String>,
    pub assessor_comments: String,
}

impl SubmissionContext {
    pub fn at(submitted_at: DateTime<Utc>) -> Self {
        Self {
            submitted_at,
            image_link: String::new(),
            rating_override: None,
            assessor_comments: String::new(),
        }
    }
}

/// Which optional comment columns exist. Header and rows are both derived
/// from the same layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub voice: RubricVoice,
    pub assessor_comments: bool,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            voice: RubricVoice::default(),
            assessor_comments: true,
        }
    }
}

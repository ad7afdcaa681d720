//! Evaluation schema: the operator-defined fields, categories and rating
//! options that drive both prompt compilation and row projection.
//!
//! The JSON layout matches `questions.json`:
//!
//! ```json
//! {
//!   "metadata_fields": [{"id": "building", "label": "Building", "type": "select",
//!                        "options": ["Library", "Other"], "allow_other": true}],
//!   "ai_inferred_fields": [{"id": "sign_type", "label": "Sign type",
//!                           "options": ["Static", "Digital"]}],
//!   "categories": [{"id": "contrast", "name": "Contrast", "guidance": "..."}],
//!   "overall_rating": {"options": ["Fully Accessible", "Not Accessible"]}
//! }
//! ```

pub mod source;

pub use source::*;

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read schema file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed schema JSON: {0}")]
    Parse(String),

    #[error("Invalid schema: {0}")]
    Invalid(String),
}

/// A field the assessor fills in by hand (building, floor, reviewer...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataField {
    pub id: String,
    pub label: String,
    /// Input widget hint for front ends ("text", "select", "date"...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    /// Front end offers a free-text `<id>_other` box when "Other" is picked.
    #[serde(default)]
    pub allow_other: bool,
}

/// A value the model infers from the photo, constrained to `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInferredField {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// One evaluation dimension the model writes a prose assessment for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSpec {
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub metadata_fields: Vec<MetadataField>,
    #[serde(default)]
    pub ai_inferred_fields: Vec<AiInferredField>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub overall_rating: RatingSpec,
}

impl Schema {
    /// Parse and validate a schema document.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: Schema =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Ids must be non-empty and unique within their own list; they are
    /// used as JSON keys in the prompt and as lookup keys during projection.
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_list(
            "metadata_fields",
            self.metadata_fields.iter().map(|f| (f.id.as_str(), f.label.as_str())),
        )?;
        check_list(
            "ai_inferred_fields",
            self.ai_inferred_fields.iter().map(|f| (f.id.as_str(), f.label.as_str())),
        )?;
        check_list(
            "categories",
            self.categories.iter().map(|c| (c.id.as_str(), c.name.as_str())),
        )?;
        Ok(())
    }

    pub fn is_ai_inferred(&self, id: &str) -> bool {
        self.ai_inferred_fields.iter().any(|f| f.id == id)
    }

    pub fn category_ids(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.id.as_str()).collect()
    }
}

fn check_list<'a>(
    list: &str,
    entries: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for (index, (id, label)) in entries.enumerate() {
        if id.trim().is_empty() {
            return Err(SchemaError::Invalid(format!(
                "{list}[{index}] has an empty id"
            )));
        }
        if label.trim().is_empty() {
            return Err(SchemaError::Invalid(format!(
                "{list}[{index}] ('{id}') has an empty label"
            )));
        }
        if !seen.insert(id) {
            return Err(SchemaError::Invalid(format!(
                "duplicate id '{id}' in {list}"
            )));
        }
    }
    Ok(())
}

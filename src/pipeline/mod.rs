//! Assessment pipeline: schema → prompt → model → structured result, and
//! schema → row → spreadsheet.
//!
//! `prompt`, `parser` and `projector` are pure; all I/O goes through the
//! collaborator traits and is sequenced by [`orchestrator::AssessmentPipeline`].

pub mod orchestrator;
pub mod parser;
pub mod projector;
pub mod prompt;
pub mod types;
pub mod voice;

pub use orchestrator::*;
pub use parser::extract_assessment;
pub use projector::{format_timestamp, header_row, project_row, TIMESTAMP_HEADER};
pub use prompt::compile_prompt;
pub use types::*;
pub use voice::RubricVoice;

use thiserror::Error;

use crate::ai::ModelError;
use crate::archive::{SheetError, StorageError};
use crate::config::SettingsError;
use crate::schema::SchemaError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Schema missing or malformed, or a required setting absent.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Input(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("AI analysis failed: {0}")]
    Model(#[from] ModelError),

    #[error("Image upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Spreadsheet update failed: {0}")]
    Sheet(#[from] SheetError),
}

impl From<SchemaError> for PipelineError {
    fn from(err: SchemaError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<SettingsError> for PipelineError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn schema_errors_are_configuration_errors() {
        let err: PipelineError = SchemaError::NotFound(PathBuf::from("config/questions.json")).into();
        assert!(matches!(err, PipelineError::Config(ref msg) if msg.contains("questions.json")));
    }

    #[test]
    fn upstream_errors_keep_their_detail() {
        let err: PipelineError = ModelError::Upstream {
            status: 529,
            body: "overloaded".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "AI analysis failed: Model provider returned error (status 529): overloaded"
        );
    }
}

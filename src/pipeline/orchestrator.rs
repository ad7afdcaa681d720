//! Sequences the pure pipeline stages around the external collaborators.
//!
//! Assessment: input check → credential check → load schema → compile
//! prompt → model call → extract.
//! Submission: sheet target check → load schema → optional image upload →
//! header reconciliation → project row → append.
//!
//! Every collaborator is called at most once per request; there is no retry.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::parser::extract_assessment;
use super::projector::{header_row, project_row, TIMESTAMP_HEADER};
use super::prompt::compile_prompt;
use super::types::{
    AssessmentResult, ColumnLayout, ExtractionOutcome, SubmissionContext, UserMetadata,
};
use super::PipelineError;
use crate::ai::{ModelError, VisionModel};
use crate::archive::{BlobStorage, SheetStore};
use crate::schema::{Schema, SchemaSource};

const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

// ──────────────────────────────────────────────
// Requests and results
// ──────────────────────────────────────────────

/// Photo bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, media_type: &str) -> Self {
        let media_type = if media_type.trim().is_empty() {
            DEFAULT_MEDIA_TYPE
        } else {
            media_type.trim()
        };
        Self {
            bytes,
            media_type: media_type.to_string(),
        }
    }

    /// Read a photo from disk, guessing the media type from its extension.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::Input(format!("Cannot read image {}: {e}", path.display())))?;
        let media_type = mime_guess::from_path(path)
            .first()
            .filter(|m| m.type_() == mime_guess::mime::IMAGE)
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());
        Ok(Self::new(bytes, &media_type))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssessmentRequest {
    pub image: Option<ImagePayload>,
    pub metadata: UserMetadata,
}

/// What the model said about one photo.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub result: AssessmentResult,
    /// True when the model text could not be parsed; `result` then holds the
    /// diagnostic in `overall_notes`.
    pub degraded: bool,
    pub model: String,
}

/// An assessment as confirmed (and possibly edited) by the assessor.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    pub metadata: UserMetadata,
    pub result: AssessmentResult,
    pub rating_override: Option<String>,
    pub assessor_comments: String,
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    /// Empty when no upload was attempted.
    pub image_link: String,
    /// Row 1 was (re)written before the append.
    pub header_rewritten: bool,
    pub row: Vec<String>,
}

// ──────────────────────────────────────────────
// Orchestrator
// ──────────────────────────────────────────────

/// Runs assessments and submissions against one schema source and column
/// layout. The schema is reloaded on every request.
pub struct AssessmentPipeline {
    schema_source: Box<dyn SchemaSource + Send + Sync>,
    layout: ColumnLayout,
}

impl AssessmentPipeline {
    pub fn new(schema_source: Box<dyn SchemaSource + Send + Sync>, layout: ColumnLayout) -> Self {
        Self {
            schema_source,
            layout,
        }
    }

    pub fn layout(&self) -> ColumnLayout {
        self.layout
    }

    pub fn schema(&self) -> Result<Schema, PipelineError> {
        Ok(self.schema_source.load()?)
    }

    /// Prompt that `assess` would send for this metadata.
    pub fn prompt_for(&self, metadata: &UserMetadata) -> Result<String, PipelineError> {
        let schema = self.schema()?;
        Ok(compile_prompt(&schema, metadata, self.layout.voice))
    }

    /// Header row for the current schema.
    pub fn header(&self) -> Result<Vec<String>, PipelineError> {
        let schema = self.schema()?;
        Ok(header_row(&schema, self.layout))
    }

    /// Ask the model to assess one photo.
    ///
    /// An unparseable model answer is not an error: the report comes back
    /// with `degraded` set and the diagnostic in `overall_notes`.
    pub fn assess(
        &self,
        model: &dyn VisionModel,
        request: &AssessmentRequest,
    ) -> Result<AssessmentReport, PipelineError> {
        let outcome = self.assess_outcome(model, request)?;
        Ok(AssessmentReport {
            degraded: outcome.is_degraded(),
            result: outcome.into_result(),
            model: model.name().to_string(),
        })
    }

    /// Same as [`Self::assess`] but hands back the extraction outcome
    /// untouched, for callers that treat degraded answers differently.
    pub fn assess_outcome(
        &self,
        model: &dyn VisionModel,
        request: &AssessmentRequest,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let image = request
            .image
            .as_ref()
            .filter(|image| !image.bytes.is_empty())
            .ok_or_else(|| PipelineError::Input("No image provided".into()))?;

        model.check_credentials().map_err(|e| match e {
            ModelError::Auth(msg) => PipelineError::Credential(msg),
            other => PipelineError::Model(other),
        })?;

        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("assess", %run_id, model = model.name()).entered();
        let start = Instant::now();

        let schema = self.schema()?;
        let prompt = compile_prompt(&schema, &request.metadata, self.layout.voice);
        tracing::debug!(
            prompt_chars = prompt.len(),
            image_bytes = image.bytes.len(),
            media_type = %image.media_type,
            "Prompt compiled"
        );

        let raw = model.evaluate(&image.bytes, &image.media_type, &prompt)?;
        let outcome = extract_assessment(&raw);

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_chars = raw.len(),
            degraded = outcome.is_degraded(),
            "Assessment complete"
        );
        Ok(outcome)
    }

    /// Archive a confirmed assessment, timestamped now.
    pub fn submit(
        &self,
        sheet: Option<&dyn SheetStore>,
        storage: Option<&dyn BlobStorage>,
        request: SubmissionRequest,
    ) -> Result<SubmissionReceipt, PipelineError> {
        self.submit_at(sheet, storage, request, Utc::now())
    }

    /// Archive a confirmed assessment with an explicit timestamp.
    ///
    /// An image uploaded before a failing append stays uploaded.
    pub fn submit_at(
        &self,
        sheet: Option<&dyn SheetStore>,
        storage: Option<&dyn BlobStorage>,
        request: SubmissionRequest,
        submitted_at: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, PipelineError> {
        let sheet = sheet.ok_or_else(|| {
            PipelineError::Config("No spreadsheet target is configured".into())
        })?;

        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("submit", %run_id).entered();
        let start = Instant::now();

        let schema = self.schema()?;

        let image_link = match (&request.image, storage) {
            (Some(image), Some(storage)) if !image.bytes.is_empty() => {
                let name = image_file_name(&request.metadata, &image.media_type, submitted_at);
                let link = storage.upload(&image.bytes, &image.media_type, &name)?;
                tracing::info!(file = %name, "Image uploaded");
                link
            }
            _ => String::new(),
        };

        let header = header_row(&schema, self.layout);
        let header_rewritten = reconcile_header(sheet, &header)?;

        let context = SubmissionContext {
            submitted_at,
            image_link: image_link.clone(),
            rating_override: request.rating_override,
            assessor_comments: request.assessor_comments,
        };
        let row = project_row(&schema, self.layout, &request.metadata, &request.result, &context);
        sheet.append_row(&row)?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            columns = row.len(),
            header_rewritten,
            uploaded = !image_link.is_empty(),
            "Submission appended"
        );

        Ok(SubmissionReceipt {
            image_link,
            header_rewritten,
            row,
        })
    }
}

/// Rewrite row 1 when its first cell is not `Timestamp` (absent, unreadable,
/// or some other value). Returns whether the row was written.
///
/// Only a missing or foreign header is detected; a stale header that still
/// starts with `Timestamp` is left as is.
pub fn reconcile_header(sheet: &dyn SheetStore, header: &[String]) -> Result<bool, PipelineError> {
    let first_cell = match sheet.read_cell(1, 1) {
        Ok(cell) => cell,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read header cell, rewriting header");
            None
        }
    };

    if first_cell.as_deref() == Some(TIMESTAMP_HEADER) {
        return Ok(false);
    }

    tracing::info!(
        found = first_cell.as_deref().unwrap_or(""),
        columns = header.len(),
        "Header missing or replaced, writing row 1"
    );
    sheet.write_row(1, header)?;
    Ok(true)
}

/// `<building>_<screen_location>_<YYYYmmdd_HHMMSS>.<ext>` with spaces
/// replaced by underscores. A missing building becomes `unknown`.
pub fn image_file_name(metadata: &UserMetadata, media_type: &str, at: DateTime<Utc>) -> String {
    let building = metadata.text("building");
    let building = if building.trim().is_empty() {
        "unknown".to_string()
    } else {
        building.replace(' ', "_")
    };
    let location = metadata.text("screen_location").replace(' ', "_");
    format!(
        "{building}_{location}_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        image_extension(media_type)
    )
}

fn image_extension(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" | "image/jpg" => "jpg",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first())
            .copied()
            .unwrap_or("jpg"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockVisionModel;
    use crate::archive::{MemorySheet, MemoryStorage, SheetError};
    use crate::pipeline::RubricVoice;
    use crate::schema::StaticSchemaSource;
    use chrono::TimeZone;

    const SCHEMA: &str = r#"{
        "metadata_fields": [
            {"id": "building", "label": "Which building?"},
            {"id": "screen_location", "label": "Where?"},
            {"id": "building_floor", "label": "Floor", "allow_other": true}
        ],
        "ai_inferred_fields": [
            {"id": "sign_type", "label": "Sign Type", "options": ["Static", "Digital"]}
        ],
        "categories": [
            {"id": "contrast", "name": "Contrast and Color Blindness"},
            {"id": "readability", "name": "Text Readability"}
        ],
        "overall_rating": {"options": ["Fully Accessible", "Partially Accessible", "Not Accessible"]}
    }"#;

    const MODEL_ANSWER: &str = "Here you go:\n```json\n{\"inferred_metadata\": {\"sign_type\": \"Digital\", \"building\": \"Library\"}, \"assessments\": {\"contrast\": \"A\", \"readability\": \"B\"}, \"accessibility_rating\": \"Partially Accessible\", \"final_comments\": \"Mostly fine.\", \"overall_notes\": \"Glare.\"}\n```\nThanks!";

    fn pipeline() -> AssessmentPipeline {
        let schema = Schema::from_json(SCHEMA).unwrap();
        AssessmentPipeline::new(Box::new(StaticSchemaSource::new(schema)), ColumnLayout::default())
    }

    fn photo() -> ImagePayload {
        ImagePayload::new(b"\xff\xd8\xff".to_vec(), "image/jpeg")
    }

    fn metadata() -> UserMetadata {
        UserMetadata::new()
            .with("building", "Main Library")
            .with("screen_location", "Front Lobby")
            .with("building_floor", "Other")
            .with("building_floor_other", "Mezzanine")
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    /// Sheet whose reads always fail.
    struct UnreadableSheet(MemorySheet);

    impl SheetStore for UnreadableSheet {
        fn read_cell(&self, _row: usize, _col: usize) -> Result<Option<String>, SheetError> {
            Err(SheetError::Transport("offline".into()))
        }
        fn write_row(&self, row: usize, values: &[String]) -> Result<(), SheetError> {
            self.0.write_row(row, values)
        }
        fn append_row(&self, values: &[String]) -> Result<(), SheetError> {
            self.0.append_row(values)
        }
    }

    // ── assess ──

    #[test]
    fn assess_returns_structured_result() {
        let model = MockVisionModel::new(MODEL_ANSWER);
        let request = AssessmentRequest {
            image: Some(photo()),
            metadata: metadata(),
        };

        let report = pipeline().assess(&model, &request).unwrap();
        assert!(!report.degraded);
        assert_eq!(report.model, "mock-vision");
        assert_eq!(report.result.accessibility_rating.as_deref(), Some("Partially Accessible"));
        assert_eq!(report.result.assessment_text("readability"), "B");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- building: Main Library"));
        assert!(prompts[0].contains("### Text Readability (id: \"readability\")"));
    }

    #[test]
    fn assess_without_image_is_input_error_and_skips_model() {
        let model = MockVisionModel::new("{}");
        let request = AssessmentRequest {
            image: None,
            metadata: metadata(),
        };
        assert!(matches!(pipeline().assess(&model, &request), Err(PipelineError::Input(_))));

        let empty = AssessmentRequest {
            image: Some(ImagePayload::new(Vec::new(), "image/png")),
            metadata: UserMetadata::new(),
        };
        assert!(matches!(pipeline().assess(&model, &empty), Err(PipelineError::Input(_))));
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn missing_credential_is_reported_before_model_call() {
        let model = MockVisionModel::new("{}").without_credentials();
        let request = AssessmentRequest {
            image: Some(photo()),
            metadata: UserMetadata::new(),
        };
        assert!(matches!(
            pipeline().assess(&model, &request),
            Err(PipelineError::Credential(_))
        ));
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn broken_schema_aborts_before_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(&path, "{not json").unwrap();
        let pipeline = AssessmentPipeline::new(
            Box::new(crate::schema::JsonFileSource::new(&path)),
            ColumnLayout::default(),
        );

        let model = MockVisionModel::new("{}");
        let request = AssessmentRequest {
            image: Some(photo()),
            metadata: UserMetadata::new(),
        };
        assert!(matches!(pipeline.assess(&model, &request), Err(PipelineError::Config(_))));
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn upstream_failure_is_model_error() {
        let model = MockVisionModel::failing(500, "boom");
        let request = AssessmentRequest {
            image: Some(photo()),
            metadata: UserMetadata::new(),
        };
        assert!(matches!(
            pipeline().assess(&model, &request),
            Err(PipelineError::Model(ModelError::Upstream { status: 500, .. }))
        ));
    }

    #[test]
    fn unparseable_answer_degrades_instead_of_failing() {
        let model = MockVisionModel::new("I cannot see a sign in this photo.");
        let request = AssessmentRequest {
            image: Some(photo()),
            metadata: UserMetadata::new(),
        };
        let report = pipeline().assess(&model, &request).unwrap();
        assert!(report.degraded);
        assert!(report.result.assessments.is_empty());
        assert!(report
            .result
            .overall_notes
            .as_deref()
            .unwrap()
            .contains("I cannot see a sign"));

        let outcome = pipeline().assess_outcome(&model, &request).unwrap();
        assert!(outcome.is_degraded());
    }

    #[test]
    fn strict_voice_changes_prompt_not_structure() {
        let schema = Schema::from_json(SCHEMA).unwrap();
        let strict = AssessmentPipeline::new(
            Box::new(StaticSchemaSource::new(schema)),
            ColumnLayout {
                voice: RubricVoice::Strict,
                assessor_comments: true,
            },
        );
        let balanced_prompt = pipeline().prompt_for(&UserMetadata::new()).unwrap();
        let strict_prompt = strict.prompt_for(&UserMetadata::new()).unwrap();
        assert_ne!(balanced_prompt, strict_prompt);
        assert_eq!(pipeline().header().unwrap().len(), strict.header().unwrap().len());
    }

    // ── submit ──

    #[test]
    fn submit_writes_header_then_row_on_empty_sheet() {
        let sheet = MemorySheet::new();
        let storage = MemoryStorage::new("https://files.example");
        let request = SubmissionRequest {
            metadata: metadata(),
            result: crate::pipeline::extract_assessment(MODEL_ANSWER).into_result(),
            rating_override: None,
            assessor_comments: "Checked on site.".into(),
            image: Some(photo()),
        };

        let receipt = pipeline()
            .submit_at(Some(&sheet), Some(&storage), request, at())
            .unwrap();

        assert!(receipt.header_rewritten);
        assert_eq!(
            receipt.image_link,
            "https://files.example/Main_Library_Front_Lobby_20250314_092653.jpg"
        );

        let rows = sheet.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], pipeline().header().unwrap());
        assert_eq!(rows[1], receipt.row);
        assert_eq!(rows[0].len(), rows[1].len());

        let cell = |label: &str| {
            let i = rows[0].iter().position(|h| h == label).unwrap();
            rows[1][i].clone()
        };
        assert_eq!(cell("Timestamp"), "2025-03-14 09:26:53 UTC");
        assert_eq!(cell("Floor"), "Other: Mezzanine");
        assert_eq!(cell("Sign Type"), "Digital");
        assert_eq!(cell("Contrast and Color Blindness"), "A");
        assert_eq!(cell("Text Readability"), "B");
        assert_eq!(cell("Accessibility Rating"), "Partially Accessible");
        assert_eq!(cell("Assessor Comments"), "Checked on site.");
        assert_eq!(cell("AI Additional Context"), "building: Library");
        assert_eq!(cell("Image Link"), receipt.image_link);
    }

    #[test]
    fn foreign_header_is_rewritten() {
        let sheet = MemorySheet::with_rows(vec![row(&["Version1", "old"])]);
        let receipt = pipeline()
            .submit_at(Some(&sheet), None, SubmissionRequest::default(), at())
            .unwrap();

        assert!(receipt.header_rewritten);
        let rows = sheet.rows();
        assert_eq!(rows[0], pipeline().header().unwrap());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn timestamp_header_is_left_untouched() {
        let existing = row(&["Timestamp", "Legacy Column"]);
        let sheet = MemorySheet::with_rows(vec![existing.clone()]);
        let receipt = pipeline()
            .submit_at(Some(&sheet), None, SubmissionRequest::default(), at())
            .unwrap();

        assert!(!receipt.header_rewritten);
        assert_eq!(sheet.rows()[0], existing);
    }

    #[test]
    fn unreadable_header_cell_is_treated_as_missing() {
        let sheet = UnreadableSheet(MemorySheet::new());
        assert!(reconcile_header(&sheet, &row(&["Timestamp"])).unwrap());
        assert_eq!(sheet.0.rows(), vec![row(&["Timestamp"])]);
    }

    #[test]
    fn rating_override_wins() {
        let sheet = MemorySheet::new();
        let request = SubmissionRequest {
            result: crate::pipeline::extract_assessment(MODEL_ANSWER).into_result(),
            rating_override: Some("Not Accessible".into()),
            ..SubmissionRequest::default()
        };
        let receipt = pipeline().submit_at(Some(&sheet), None, request, at()).unwrap();
        let header = pipeline().header().unwrap();
        let i = header.iter().position(|h| h == "Accessibility Rating").unwrap();
        assert_eq!(receipt.row[i], "Not Accessible");
    }

    #[test]
    fn no_upload_without_image_or_storage() {
        let sheet = MemorySheet::new();
        let storage = MemoryStorage::new("https://files.example");

        let receipt = pipeline()
            .submit_at(Some(&sheet), Some(&storage), SubmissionRequest::default(), at())
            .unwrap();
        assert_eq!(receipt.image_link, "");
        assert!(storage.uploads().is_empty());

        let with_image = SubmissionRequest {
            image: Some(photo()),
            ..SubmissionRequest::default()
        };
        let receipt = pipeline().submit_at(Some(&sheet), None, with_image, at()).unwrap();
        assert_eq!(receipt.image_link, "");
    }

    #[test]
    fn missing_sheet_target_is_config_error() {
        let storage = MemoryStorage::new("https://files.example");
        let request = SubmissionRequest {
            image: Some(photo()),
            ..SubmissionRequest::default()
        };
        let err = pipeline().submit_at(None, Some(&storage), request, at()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(storage.uploads().is_empty());
    }

    // ── naming ──

    #[test]
    fn image_names_follow_building_location_timestamp() {
        assert_eq!(
            image_file_name(&metadata(), "image/jpeg", at()),
            "Main_Library_Front_Lobby_20250314_092653.jpg"
        );
        assert_eq!(
            image_file_name(&UserMetadata::new(), "image/png", at()),
            "unknown__20250314_092653.png"
        );
    }

    #[test]
    fn image_payload_guesses_media_type_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sign.png");
        std::fs::write(&path, b"png").unwrap();
        let payload = ImagePayload::from_file(&path).unwrap();
        assert_eq!(payload.media_type, "image/png");
        assert_eq!(payload.bytes, b"png");

        let missing = ImagePayload::from_file(&dir.path().join("nope.jpg"));
        assert!(matches!(missing, Err(PipelineError::Input(_))));
    }
}

//! Row projector: schema-driven header and data rows for the assessment sheet.
//!
//! Both the header and every row are produced from one column plan, so
//! column *i* of a row always means what column *i* of the header says.

use chrono::{DateTime, Utc};

use super::types::{value_text, AssessmentResult, ColumnLayout, SubmissionContext, UserMetadata};
use crate::schema::{AiInferredField, Category, MetadataField, Schema};

/// First header cell; its presence in A1 marks an initialised sheet.
pub const TIMESTAMP_HEADER: &str = "Timestamp";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Friendlier column titles for well-known metadata ids.
const LABEL_OVERRIDES: &[(&str, &str)] = &[
    ("assessor_name", "Assessor Name"),
    ("assessor_email", "Email"),
    ("building", "Building"),
    ("screen_location", "Screen Location"),
    ("reviewed_on", "Date Reviewed"),
    ("floor_owner", "Floor Owner"),
];

#[derive(Debug, Clone, Copy)]
enum Column<'a> {
    Timestamp,
    Metadata(&'a MetadataField),
    Inferred(&'a AiInferredField),
    ImageLink,
    Category(&'a Category),
    Rating,
    FinalComments,
    AssessorComments,
    OverallNotes,
    AdditionalContext,
}

fn column_plan(schema: &Schema, layout: ColumnLayout) -> Vec<Column<'_>> {
    let mut columns = vec![Column::Timestamp];
    columns.extend(schema.metadata_fields.iter().map(Column::Metadata));
    columns.extend(schema.ai_inferred_fields.iter().map(Column::Inferred));
    columns.push(Column::ImageLink);
    columns.extend(schema.categories.iter().map(Column::Category));
    columns.push(Column::Rating);
    columns.push(Column::FinalComments);
    if layout.assessor_comments {
        columns.push(Column::AssessorComments);
    }
    columns.push(Column::OverallNotes);
    columns.push(Column::AdditionalContext);
    columns
}

/// Header row for the current schema and layout.
pub fn header_row(schema: &Schema, layout: ColumnLayout) -> Vec<String> {
    column_plan(schema, layout)
        .into_iter()
        .map(|column| match column {
            Column::Timestamp => TIMESTAMP_HEADER.to_string(),
            Column::Metadata(field) => metadata_label(field).to_string(),
            Column::Inferred(field) => field.label.clone(),
            Column::ImageLink => "Image Link".to_string(),
            Column::Category(category) => category.name.clone(),
            Column::Rating => "Accessibility Rating".to_string(),
            Column::FinalComments => layout.voice.final_comments_label().to_string(),
            Column::AssessorComments => "Assessor Comments".to_string(),
            Column::OverallNotes => "Overall Notes".to_string(),
            Column::AdditionalContext => "AI Additional Context".to_string(),
        })
        .collect()
}

/// One data row, same length and order as [`header_row`].
pub fn project_row(
    schema: &Schema,
    layout: ColumnLayout,
    metadata: &UserMetadata,
    result: &AssessmentResult,
    context: &SubmissionContext,
) -> Vec<String> {
    column_plan(schema, layout)
        .into_iter()
        .map(|column| match column {
            Column::Timestamp => format_timestamp(context.submitted_at),
            Column::Metadata(field) => metadata.resolved(&field.id),
            Column::Inferred(field) => result.inferred_text(&field.id),
            Column::ImageLink => context.image_link.clone(),
            Column::Category(category) => result.assessment_text(&category.id),
            Column::Rating => rating_cell(result, context),
            Column::FinalComments => result.final_comments.clone().unwrap_or_default(),
            Column::AssessorComments => context.assessor_comments.clone(),
            Column::OverallNotes => result.overall_notes.clone().unwrap_or_default(),
            Column::AdditionalContext => additional_context(schema, result),
        })
        .collect()
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn metadata_label(field: &MetadataField) -> &str {
    LABEL_OVERRIDES
        .iter()
        .find(|(id, _)| *id == field.id)
        .map(|(_, label)| *label)
        .unwrap_or(field.label.as_str())
}

fn rating_cell(result: &AssessmentResult, context: &SubmissionContext) -> String {
    context
        .rating_override
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .or(result.accessibility_rating.as_deref())
        .unwrap_or_default()
        .to_string()
}

/// Inferred values the schema does not declare (`building`,
/// `additional_context`, anything else the model volunteered).
fn additional_context(schema: &Schema, result: &AssessmentResult) -> String {
    result
        .inferred_metadata
        .iter()
        .filter(|(key, _)| !schema.is_ai_inferred(key))
        .map(|(key, value)| (key, value_text(value)))
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

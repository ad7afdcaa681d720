//! Prompt compiler: schema + assessor metadata → instruction prompt.
//!
//! The JSON skeleton at the end is the contract the extractor and the row
//! projector rely on. It is regenerated from the live schema on every call,
//! so adding a category or rating option needs no code change.

use serde_json::Value;

use super::types::UserMetadata;
use super::voice::RubricVoice;
use crate::schema::Schema;

const TASK_INSTRUCTIONS: &str = "\
Analyze the attached photo of a digital sign and provide a detailed assessment for each \
category listed under \"Categories to evaluate\".

For each category, write a 2-4 sentence assessment paragraph that:
- Describes what you observe on the sign relevant to that category
- Identifies accessibility concerns with specific evidence from the image
- Acknowledges things done well
- Distinguishes real accessibility barriers from minor design preferences";

const ASSESSMENT_PLACEHOLDER: &str = "Your 2-4 sentence assessment paragraph...";

const FORMAT_INSTRUCTION: &str = "\
Respond with the raw JSON object only. Do NOT wrap it in markdown code fences and do not \
add any text before or after it.";

/// Build the assessment prompt. Total and deterministic: the same schema,
/// metadata and voice always produce the same bytes.
pub fn compile_prompt(schema: &Schema, metadata: &UserMetadata, voice: RubricVoice) -> String {
    let context = context_block(metadata);
    let ai_field_lines = ai_field_instructions(schema);
    let categories = category_sections(schema);
    let rating_options = quoted_list(&schema.overall_rating.options);
    let skeleton = json_skeleton(schema);

    format!(
        "{preamble}\n{context}\n{TASK_INSTRUCTIONS}\n\n{guidelines}\n\n\
Also determine the following from the image:\n\
{ai_field_lines}\
- Any visible building or location identifiers\n\
- Any other relevant contextual details\n\n\
Categories to evaluate:\n\
{categories}\n\
{rating_instruction} Must be one of: {rating_options}\n\n\
Return your response as valid JSON matching this exact schema:\n\n\
{skeleton}\n\n\
{FORMAT_INSTRUCTION}\n",
        preamble = voice.preamble(),
        guidelines = voice.category_guidelines(),
        rating_instruction = voice.rating_instruction(),
    )
}

/// `User-provided context` block, or nothing when no metadata was sent.
fn context_block(metadata: &UserMetadata) -> String {
    if metadata.is_empty() {
        return String::new();
    }
    let mut block = String::from("\nUser-provided context about this sign:\n");
    for (key, value) in metadata.non_empty() {
        block.push_str(&format!("- {key}: {value}\n"));
    }
    block
}

fn ai_field_instructions(schema: &Schema) -> String {
    schema
        .ai_inferred_fields
        .iter()
        .map(|field| {
            format!(
                "- **{}**: {}. Must be one of: {}\n",
                field.id,
                field.label,
                quoted_list(&field.options)
            )
        })
        .collect()
}

fn category_sections(schema: &Schema) -> String {
    let mut text = String::new();
    for category in &schema.categories {
        text.push_str(&format!("\n### {} (id: \"{}\")\n", category.name, category.id));
        if let Some(guidance) = category.guidance.as_deref().filter(|g| !g.trim().is_empty()) {
            text.push_str(&format!("Evaluation criteria:\n{guidance}\n"));
        }
    }
    text
}

/// Expected output object. Placeholders are JSON strings, so the skeleton
/// itself is valid JSON.
fn json_skeleton(schema: &Schema) -> String {
    let mut inferred: Vec<String> = schema
        .ai_inferred_fields
        .iter()
        .map(|field| {
            skeleton_entry(&field.id, &format!("one of: {}", field.options.join(", ")))
        })
        .collect();
    inferred.push(skeleton_entry("building", "building name if visible, or null"));
    inferred.push(skeleton_entry("additional_context", "any other observations"));

    let assessments: Vec<String> = schema
        .category_ids()
        .into_iter()
        .map(|id| skeleton_entry(id, ASSESSMENT_PLACEHOLDER))
        .collect();

    let rating = format!("one of: {}", schema.overall_rating.options.join(", "));

    format!(
        "{{\n  \"inferred_metadata\": {},\n  \"assessments\": {},\n  \"accessibility_rating\": {},\n  \"final_comments\": {},\n  \"overall_notes\": {}\n}}",
        nested_object(&inferred),
        nested_object(&assessments),
        json_string(&rating),
        json_string("Any additional accessibility observations not covered by the categories above"),
        json_string("Extra context about the sign environment, placement, or other relevant details"),
    )
}

fn skeleton_entry(key: &str, placeholder: &str) -> String {
    format!("    {}: {}", json_string(key), json_string(placeholder))
}

fn nested_object(entries: &[String]) -> String {
    if entries.is_empty() {
        "{}".to_string()
    } else {
        format!("{{\n{}\n  }}", entries.join(",\n"))
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn quoted_list(options: &[String]) -> String {
    options
        .iter()
        .map(|o| format!("\"{o}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

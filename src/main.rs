mod cli;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use signage_audit_lib::ai::model_from_settings;
use signage_audit_lib::archive::{BlobStorage, FolderStorage, SheetStore, SqliteSheet};
use signage_audit_lib::config::{self, AppConfig};
use signage_audit_lib::pipeline::{
    AssessmentPipeline, AssessmentRequest, AssessmentResult, ImagePayload, SubmissionRequest,
    UserMetadata,
};
use signage_audit_lib::schema::JsonFileSource;

use crate::cli::{AssessArgs, Cli, Commands, PromptArgs, RowsArgs, SubmitArgs};

fn main() {
    signage_audit_lib::init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("invalid environment configuration")?;
    if let Some(schema) = cli.schema {
        config.schema_path = schema;
    }
    if let Some(voice) = cli.voice {
        config.voice = voice;
    }
    tracing::debug!(
        "{} v{} (schema {}, voice {})",
        config::APP_NAME,
        config::APP_VERSION,
        config.schema_path.display(),
        config.voice
    );

    let pipeline = AssessmentPipeline::new(
        Box::new(JsonFileSource::new(&config.schema_path)),
        config.layout(),
    );

    match cli.command {
        Commands::Schema => print_json(&pipeline.schema()?),
        Commands::Prompt(args) => prompt(&pipeline, args),
        Commands::Header => print_json(&pipeline.header()?),
        Commands::Assess(args) => assess(&pipeline, &config, args),
        Commands::Submit(args) => submit(&pipeline, config, args),
        Commands::Rows(args) => rows(args, config),
    }
}

fn prompt(pipeline: &AssessmentPipeline, args: PromptArgs) -> Result<()> {
    let text = pipeline.prompt_for(&metadata_from(args.meta))?;
    println!("{text}");
    Ok(())
}

fn assess(pipeline: &AssessmentPipeline, config: &AppConfig, args: AssessArgs) -> Result<()> {
    let request = AssessmentRequest {
        image: Some(ImagePayload::from_file(&args.image)?),
        metadata: metadata_from(args.meta),
    };
    if args.show_prompt {
        eprintln!("{}", pipeline.prompt_for(&request.metadata)?);
    }

    let model = model_from_settings(&config.model)?;
    let report = pipeline.assess(model.as_ref(), &request)?;
    if report.degraded {
        tracing::warn!("Model answer could not be parsed; see overall_notes");
    }
    print_json(&report)
}

fn submit(pipeline: &AssessmentPipeline, mut config: AppConfig, args: SubmitArgs) -> Result<()> {
    if args.sheet_db.is_some() {
        config.sheet_db = args.sheet_db;
    }
    if args.image_dir.is_some() {
        config.image_dir = args.image_dir;
    }

    let result = read_result(&args.result)?;
    let image = args
        .image
        .as_deref()
        .map(ImagePayload::from_file)
        .transpose()?;

    let sheet = config
        .sheet_db
        .as_deref()
        .map(SqliteSheet::open)
        .transpose()
        .context("failed to open spreadsheet database")?;
    let storage = config
        .image_dir
        .as_ref()
        .map(|dir| FolderStorage::new(dir, config.image_base_url.as_deref()));

    let request = SubmissionRequest {
        metadata: metadata_from(args.meta),
        result,
        rating_override: args.rating,
        assessor_comments: args.comments,
        image,
    };
    let receipt = pipeline.submit(
        sheet.as_ref().map(|s| s as &dyn SheetStore),
        storage.as_ref().map(|s| s as &dyn BlobStorage),
        request,
    )?;
    print_json(&receipt)
}

fn rows(args: RowsArgs, config: AppConfig) -> Result<()> {
    let Some(path) = args.sheet_db.or(config.sheet_db) else {
        bail!("no spreadsheet configured (set SIGNAGE_SHEET_DB or --sheet-db)");
    };
    let sheet = SqliteSheet::open(&path)
        .with_context(|| format!("failed to open spreadsheet {}", path.display()))?;
    let rows: Vec<Vec<String>> = sheet.rows()?.into_iter().map(|(_, cells)| cells).collect();
    print_json(&rows)
}

fn metadata_from(pairs: Vec<(String, String)>) -> UserMetadata {
    pairs
        .into_iter()
        .fold(UserMetadata::new(), |metadata, (key, value)| metadata.with(key, value))
}

/// Accept either a full `assess` report or a bare result object.
fn read_result(path: &Path) -> Result<AssessmentResult> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let Value::Object(mut object) = value else {
        bail!("{} must contain a JSON object", path.display());
    };
    match object.remove("result") {
        Some(Value::Object(inner)) => Ok(AssessmentResult::from_object(inner)),
        Some(other) => {
            object.insert("result".into(), other);
            Ok(AssessmentResult::from_object(object))
        }
        None => Ok(AssessmentResult::from_object(object)),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use signage_audit_lib::pipeline::RubricVoice;

#[derive(Parser, Debug)]
#[command(
    name = "signage-audit",
    version,
    about = "Assess digital signage photos for accessibility and archive the results"
)]
pub struct Cli {
    /// Schema file (questions.json)
    #[arg(long, global = true, env = "SIGNAGE_SCHEMA_PATH")]
    pub schema: Option<PathBuf>,

    /// Rubric voice: balanced or strict
    #[arg(long, global = true, env = "SIGNAGE_VOICE")]
    pub voice: Option<RubricVoice>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the schema and print it as JSON
    Schema,
    /// Print the prompt that would be sent to the model
    Prompt(PromptArgs),
    /// Print the spreadsheet header row as JSON
    Header,
    /// Send a photo to the vision model and print the structured result
    Assess(AssessArgs),
    /// Append a confirmed assessment to the spreadsheet
    Submit(SubmitArgs),
    /// Print every stored spreadsheet row as JSON
    Rows(RowsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PromptArgs {
    /// Assessor metadata as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_key_val)]
    pub meta: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct AssessArgs {
    /// Photo of the sign
    #[arg(long)]
    pub image: PathBuf,

    /// Assessor metadata as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_key_val)]
    pub meta: Vec<(String, String)>,

    /// Print the compiled prompt to stderr before calling the model
    #[arg(long, default_value_t = false)]
    pub show_prompt: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// JSON produced by `assess` (the whole report or just its `result`)
    #[arg(long)]
    pub result: PathBuf,

    /// Photo to upload alongside the row
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Assessor metadata as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_key_val)]
    pub meta: Vec<(String, String)>,

    /// Rating chosen by the assessor; replaces the model's suggestion
    #[arg(long)]
    pub rating: Option<String>,

    /// Assessor free-text comments
    #[arg(long, default_value = "")]
    pub comments: String,

    /// SQLite file acting as the spreadsheet
    #[arg(long, env = "SIGNAGE_SHEET_DB")]
    pub sheet_db: Option<PathBuf>,

    /// Folder receiving uploaded photos
    #[arg(long, env = "SIGNAGE_IMAGE_DIR")]
    pub image_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RowsArgs {
    #[arg(long, env = "SIGNAGE_SHEET_DB")]
    pub sheet_db: Option<PathBuf>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

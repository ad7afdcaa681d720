//! Application settings resolved from the process environment.
//!
//! Every value has a default except the credentials and archive targets,
//! which stay `None` until configured. Empty variables count as unset.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::pipeline::{ColumnLayout, RubricVoice};

/// Application-level constants
pub const APP_NAME: &str = "Signage Audit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_SCHEMA_PATH: &str = "config/questions.json";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_OLLAMA_MODEL: &str = "llava";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "signage_audit_lib=info,signage_audit=info,warn"
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Which vision model backend answers assessment requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelProvider {
    #[default]
    Anthropic,
    Ollama,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            Self::Ollama => DEFAULT_OLLAMA_MODEL,
        }
    }
}

impl FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown model provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: ModelProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub ollama_url: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub schema_path: PathBuf,
    pub voice: RubricVoice,
    pub assessor_comments: bool,
    pub model: ModelSettings,
    /// SQLite file acting as the assessment spreadsheet.
    pub sheet_db: Option<PathBuf>,
    /// Folder receiving uploaded sign photos.
    pub image_dir: Option<PathBuf>,
    /// Public prefix for uploaded photos. `None` yields `file://` links.
    pub image_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let voice = match get("SIGNAGE_VOICE") {
            Some(v) => v.parse::<RubricVoice>().map_err(|_| SettingsError::InvalidValue {
                key: "SIGNAGE_VOICE",
                value: v,
            })?,
            None => RubricVoice::default(),
        };

        let assessor_comments = match get("SIGNAGE_ASSESSOR_COMMENTS") {
            Some(v) => parse_flag(&v).ok_or(SettingsError::InvalidValue {
                key: "SIGNAGE_ASSESSOR_COMMENTS",
                value: v,
            })?,
            None => true,
        };

        let provider = match get("SIGNAGE_MODEL_PROVIDER") {
            Some(v) => v.parse::<ModelProvider>().map_err(|_| SettingsError::InvalidValue {
                key: "SIGNAGE_MODEL_PROVIDER",
                value: v,
            })?,
            None => ModelProvider::default(),
        };

        let timeout_secs = parse_number(get("SIGNAGE_MODEL_TIMEOUT_SECS"), "SIGNAGE_MODEL_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let max_tokens = parse_number(get("SIGNAGE_MAX_TOKENS"), "SIGNAGE_MAX_TOKENS")?
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let model = ModelSettings {
            provider,
            model: get("SIGNAGE_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            api_key: get("ANTHROPIC_API_KEY"),
            ollama_url: get("OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            timeout_secs,
            max_tokens,
        };

        Ok(Self {
            schema_path: get("SIGNAGE_SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_PATH)),
            voice,
            assessor_comments,
            model,
            sheet_db: get("SIGNAGE_SHEET_DB").map(PathBuf::from),
            image_dir: get("SIGNAGE_IMAGE_DIR").map(PathBuf::from),
            image_base_url: get("SIGNAGE_IMAGE_BASE_URL"),
        })
    }

    /// Column layout shared by header and row projection.
    pub fn layout(&self) -> ColumnLayout {
        ColumnLayout {
            voice: self.voice,
            assessor_comments: self.assessor_comments,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number<T: FromStr>(
    value: Option<String>,
    key: &'static str,
) -> Result<Option<T>, SettingsError> {
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| SettingsError::InvalidValue { key, value: v })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, SettingsError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.schema_path, PathBuf::from(DEFAULT_SCHEMA_PATH));
        assert_eq!(config.voice, RubricVoice::Balanced);
        assert!(config.assessor_comments);
        assert_eq!(config.model.provider, ModelProvider::Anthropic);
        assert_eq!(config.model.model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.model.max_tokens, 4096);
        assert!(config.model.api_key.is_none());
        assert!(config.sheet_db.is_none());
        assert!(config.image_dir.is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("ANTHROPIC_API_KEY", "   "), ("SIGNAGE_SHEET_DB", "")]).unwrap();
        assert!(config.model.api_key.is_none());
        assert!(config.sheet_db.is_none());
    }

    #[test]
    fn ollama_provider_picks_its_default_model() {
        let config = config_from(&[("SIGNAGE_MODEL_PROVIDER", "ollama")]).unwrap();
        assert_eq!(config.model.provider, ModelProvider::Ollama);
        assert_eq!(config.model.model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.model.ollama_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn strict_voice_without_assessor_column() {
        let config = config_from(&[
            ("SIGNAGE_VOICE", "strict"),
            ("SIGNAGE_ASSESSOR_COMMENTS", "off"),
        ])
        .unwrap();
        let layout = config.layout();
        assert_eq!(layout.voice, RubricVoice::Strict);
        assert!(!layout.assessor_comments);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = config_from(&[("SIGNAGE_MAX_TOKENS", "lots")]).unwrap_err();
        assert_eq!(
            err,
            SettingsError::InvalidValue {
                key: "SIGNAGE_MAX_TOKENS",
                value: "lots".into()
            }
        );
        assert!(config_from(&[("SIGNAGE_VOICE", "gentle")]).is_err());
        assert!(config_from(&[("SIGNAGE_ASSESSOR_COMMENTS", "maybe")]).is_err());
    }

    #[test]
    fn app_name_is_signage_audit() {
        assert_eq!(APP_NAME, "Signage Audit");
    }
}

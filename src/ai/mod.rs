//! Vision model collaborators.
//!
//! The pipeline only needs "send image + prompt, get text back". Each
//! provider lives behind [`VisionModel`] so the orchestrator can be tested
//! with [`MockVisionModel`].

pub mod anthropic;
pub mod ollama;

pub use anthropic::*;
pub use ollama::*;

use std::sync::Mutex;

use thiserror::Error;

use crate::config::{ModelProvider, ModelSettings};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model credential missing or rejected: {0}")]
    Auth(String),

    #[error("Could not reach model endpoint at {0}")]
    Unreachable(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Transport(String),

    #[error("Model provider returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed model provider response: {0}")]
    InvalidEnvelope(String),
}

/// A vision-capable language model.
pub trait VisionModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    /// Reject a missing credential before any request is sent.
    fn check_credentials(&self) -> Result<(), ModelError> {
        Ok(())
    }

    /// One blocking round trip: image plus instruction prompt in, raw text out.
    fn evaluate(&self, image: &[u8], media_type: &str, prompt: &str)
        -> Result<String, ModelError>;
}

/// Build the configured provider client.
pub fn model_from_settings(settings: &ModelSettings) -> Result<Box<dyn VisionModel>, ModelError> {
    match settings.provider {
        ModelProvider::Anthropic => Ok(Box::new(AnthropicClient::new(
            settings.api_key.as_deref().unwrap_or_default(),
            &settings.model,
            settings.max_tokens,
            settings.timeout_secs,
        )?)),
        ModelProvider::Ollama => Ok(Box::new(OllamaVisionClient::new(
            &settings.ollama_url,
            &settings.model,
            settings.timeout_secs,
        )?)),
    }
}

/// Map a failed send to the error taxonomy.
pub(crate) fn classify_send_error(e: reqwest::Error, endpoint: &str, timeout_secs: u64) -> ModelError {
    if e.is_connect() {
        ModelError::Unreachable(endpoint.to_string())
    } else if e.is_timeout() {
        ModelError::Timeout(timeout_secs)
    } else {
        ModelError::Transport(e.to_string())
    }
}

/// Turn a non-2xx response into an error, keeping the body for diagnosis.
pub(crate) fn ensure_success(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => ModelError::Auth(format!("HTTP {}: {body}", status.as_u16())),
        code => ModelError::Upstream { status: code, body },
    })
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, ModelError> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ModelError::Transport(format!("Failed to create HTTP client: {e}")))
}

// ──────────────────────────────────────────────
// Mock
// ──────────────────────────────────────────────

/// Mock vision model for testing: returns a configurable response and
/// records every prompt it receives.
pub struct MockVisionModel {
    response: Result<String, (u16, String)>,
    credential_ok: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockVisionModel {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            credential_ok: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with an upstream error of the given status.
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            response: Err((status, body.to_string())),
            credential_ok: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn without_credentials(mut self) -> Self {
        self.credential_ok = false;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }
}

impl VisionModel for MockVisionModel {
    fn name(&self) -> &str {
        "mock-vision"
    }

    fn check_credentials(&self) -> Result<(), ModelError> {
        if self.credential_ok {
            Ok(())
        } else {
            Err(ModelError::Auth("mock credential not set".into()))
        }
    }

    fn evaluate(&self, _image: &[u8], _media_type: &str, prompt: &str) -> Result<String, ModelError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err((status, body)) => Err(ModelError::Upstream {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

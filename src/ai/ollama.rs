use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{classify_send_error, ensure_success, http_client, ModelError, VisionModel};

/// Ollama HTTP client for local vision models (LLaVA, Gemma 3, ...).
///
/// Uses `/api/chat`: chat-template vision models reject images on
/// `/api/generate`.
pub struct OllamaVisionClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaVisionClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ModelError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: http_client(timeout_secs)?,
            timeout_secs,
        })
    }

    /// Default Ollama instance at localhost:11434.
    pub fn default_local(model: &str) -> Result<Self, ModelError> {
        Self::new(crate::config::DEFAULT_OLLAMA_URL, model, crate::config::DEFAULT_TIMEOUT_SECS)
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    /// Base64-encoded images (no data: prefix).
    images: Vec<String>,
}

/// Deterministic decoding: the answer is parsed, not read.
#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

fn build_request<'a>(model: &'a str, image: &[u8], prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
            images: vec![base64::engine::general_purpose::STANDARD.encode(image)],
        }],
        stream: false,
        options: ChatOptions { temperature: 0.0 },
    }
}

impl VisionModel for OllamaVisionClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn evaluate(&self, image: &[u8], _media_type: &str, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = build_request(&self.model, image, prompt);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| classify_send_error(e, &self.base_url, self.timeout_secs))?;

        let parsed: ChatResponse = ensure_success(response)?
            .json()
            .map_err(|e| ModelError::InvalidEnvelope(e.to_string()))?;

        Ok(parsed.message.content)
    }
}

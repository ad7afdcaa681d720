use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{classify_send_error, ensure_success, http_client, ModelError, VisionModel};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client sending one image + text turn.
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl AnthropicClient {
    /// An empty key is accepted here and reported by `check_credentials`.
    pub fn new(
        api_key: &str,
        model: &str,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            base_url: ANTHROPIC_API_URL.to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            max_tokens,
            client: http_client(timeout_secs)?,
            timeout_secs,
        })
    }

    /// Point at a proxy or test server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

/// Request body for `POST /v1/messages`
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: String,
}

/// Response body from `POST /v1/messages`
#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn build_request<'a>(
    model: &'a str,
    max_tokens: u32,
    image: &[u8],
    media_type: &'a str,
    prompt: &'a str,
) -> MessagesRequest<'a> {
    MessagesRequest {
        model,
        max_tokens,
        messages: vec![Message {
            role: "user",
            content: vec![
                ContentBlock::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type,
                        data: base64::engine::general_purpose::STANDARD.encode(image),
                    },
                },
                ContentBlock::Text { text: prompt },
            ],
        }],
    }
}

/// Text of the first text block.
fn first_text(response: MessagesResponse) -> Result<String, ModelError> {
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| ModelError::InvalidEnvelope("response has no text content".into()))
}

impl VisionModel for AnthropicClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn check_credentials(&self) -> Result<(), ModelError> {
        if self.api_key.is_empty() {
            return Err(ModelError::Auth("ANTHROPIC_API_KEY is not configured".into()));
        }
        Ok(())
    }

    fn evaluate(&self, image: &[u8], media_type: &str, prompt: &str) -> Result<String, ModelError> {
        self.check_credentials()?;

        let url = format!("{}/v1/messages", self.base_url);
        let body = build_request(&self.model, self.max_tokens, image, media_type, prompt);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .map_err(|e| classify_send_error(e, &self.base_url, self.timeout_secs))?;

        let parsed: MessagesResponse = ensure_success(response)?
            .json()
            .map_err(|e| ModelError::InvalidEnvelope(e.to_string()))?;

        first_text(parsed)
    }
}

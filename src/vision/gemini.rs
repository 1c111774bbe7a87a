//! Gemini `generateContent` over REST.
//!
//! Request shape (one user turn, text part then image part):
//!
//! ```json
//! {
//!   "contents": [{ "role": "user", "parts": [
//!     { "text": "<prompt>" },
//!     { "inline_data": { "mime_type": "image/jpeg", "data": "<base64>" } }
//!   ]}],
//!   "generationConfig": { "temperature": 0.1, "maxOutputTokens": 256 }
//! }
//! ```
//!
//! The answer is the concatenated text parts of the first candidate.

use super::{ImagePayload, VisionModel};
use crate::config::RenameConfig;
use crate::error::{ModelError, RenameError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini vision model addressed with an API key.
#[derive(Clone)]
pub struct GeminiVisionModel {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: usize,
}

impl fmt::Debug for GeminiVisionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiVisionModel")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiVisionModel {
    /// Build a client for `api_key` using the model, sampling and timeout
    /// settings of `config`.
    pub fn new(api_key: impl Into<String>, config: &RenameConfig) -> Result<Self, RenameError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| RenameError::ClientBuild {
                client: "Gemini".into(),
                detail: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: std::env::var("GEMINI_API_BASE")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{}:generateContent", self.base_url, model_path)
    }

    fn request_body(&self, prompt: &str, image: &ImagePayload) -> serde_json::Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "inline_data": { "mime_type": image.mime_type, "data": image.to_base64() } }
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens
            }
        })
    }
}

#[async_trait]
impl VisionModel for GeminiVisionModel {
    fn describe(&self) -> String {
        format!("gemini/{}", self.model)
    }

    async fn generate(&self, prompt: &str, image: ImagePayload) -> Result<String, ModelError> {
        let body = self.request_body(prompt, &image);
        debug!("Gemini request: {} bytes of {}", image.bytes.len(), image.mime_type);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Http {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(format!("malformed response: {e}")))?;
        extract_text(parsed)
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, ModelError> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ModelError::NoText {
            reason: block_reason,
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ModelError::NoText {
            reason: candidate.finish_reason.or(block_reason),
        });
    }
    Ok(text)
}

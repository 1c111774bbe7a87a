//! Vision-language model seam.
//!
//! The analyzer needs exactly one capability: send a prompt plus one image,
//! get text back. [`VisionModel`] is that capability. Two implementations
//! ship with the crate:
//!
//! * [`gemini::GeminiVisionModel`]: direct `generateContent` REST call, used
//!   when a Gemini API key was handed over by the secret provider.
//! * [`provider::ProviderVisionModel`]: any `edgequake_llm` provider
//!   (OpenAI, Anthropic, Gemini, Ollama, …), resolved from the environment.

pub mod gemini;
pub mod provider;

use crate::error::ModelError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub use gemini::GeminiVisionModel;
pub use provider::ProviderVisionModel;

/// One image as sent to the model.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Standard base64 of the image bytes, as multimodal APIs expect.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// A single-shot, image-in / text-out model call.
///
/// Shared by every worker; implementations must be safe for concurrent use.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Human-readable identifier for logs, e.g. `gemini/gemini-2.0-flash`.
    fn describe(&self) -> String;

    /// Send `prompt` with `image` and return the response text.
    async fn generate(&self, prompt: &str, image: ImagePayload) -> Result<String, ModelError>;
}

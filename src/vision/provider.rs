//! [`VisionModel`] over any `edgequake_llm` provider.

use super::{ImagePayload, VisionModel};
use crate::config::RenameConfig;
use crate::error::{ModelError, RenameError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Model used with a named provider when none is configured.
const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Adapter from an `edgequake_llm` chat provider to [`VisionModel`].
pub struct ProviderVisionModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
    api_timeout: Duration,
}

impl fmt::Debug for ProviderVisionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderVisionModel")
            .field("provider", &self.label)
            .field("api_timeout", &self.api_timeout)
            .finish()
    }
}

impl ProviderVisionModel {
    /// Wrap an already constructed provider. `label` is only used in logs.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &RenameConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            options: build_options(config),
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Resolve a provider from `config` and the environment, then wrap it.
    pub fn from_config(config: &RenameConfig) -> Result<Self, RenameError> {
        let (provider, label) = resolve_provider(config)?;
        Ok(Self::new(provider, label, config))
    }
}

#[async_trait]
impl VisionModel for ProviderVisionModel {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn generate(&self, prompt: &str, image: ImagePayload) -> Result<String, ModelError> {
        let image_data = ImageData::new(image.to_base64(), image.mime_type.as_str()).with_detail("high");
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];

        let call = self.provider.chat(&messages, Some(&self.options));
        let response = tokio::time::timeout(self.api_timeout, call)
            .await
            .map_err(|_| {
                ModelError::Transport(format!("timed out after {}s", self.api_timeout.as_secs()))
            })?
            .map_err(|e| ModelError::Provider(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label,
            response.prompt_tokens,
            response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the rename config.
fn build_options(config: &RenameConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

type ResolvedProvider = (Arc<dyn LLMProvider>, String);

/// Instantiate a named provider with the given model.
fn create_vision_provider(provider_name: &str, model: &str) -> Result<ResolvedProvider, RenameError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RenameError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok((provider, format!("{provider_name}/{model}")))
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Named provider + model** (`config.provider_name`).
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 3. **Auto-detection** (`ProviderFactory::from_env`), which picks whichever
///    provider key it finds first, `OPENAI_API_KEY` included.
///
/// Gemini keys never reach this point: [`crate::setup::connect`] has already
/// used them.
fn resolve_provider(config: &RenameConfig) -> Result<ResolvedProvider, RenameError> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_PROVIDER_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RenameError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No analyzer key was found and no LLM provider could be auto-detected.\n\
                Set GCP_PROJECT_ID (Secret Manager), GEMINI_API_KEY, or a provider key\n\
                such as OPENAI_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto-detected".to_string()))
}

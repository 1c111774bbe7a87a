//! Analyzer: one vision-model call per image, loosely validated.
//!
//! The model is asked for `DATE_TYPE_SUMMARY`. Only two things are checked
//! on the answer: it is not empty after trimming, and it contains the `_`
//! separator. Whether the date is a date or the summary has five words is
//! left to the model. Anything that fails comes back as an
//! [`AnalysisError`] for the file task's fallback path; nothing here is
//! retried.

use crate::error::AnalysisError;
use crate::vision::{ImagePayload, VisionModel};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Separator between the fields of a structured name.
pub const NAME_SEPARATOR: char = '_';

/// Wraps a [`VisionModel`] with the fixed analysis prompt.
#[derive(Clone)]
pub struct Analyzer {
    model: Arc<dyn VisionModel>,
    prompt: Arc<str>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("model", &self.model.describe())
            .finish()
    }
}

impl Analyzer {
    pub fn new(model: Arc<dyn VisionModel>, prompt: &str) -> Self {
        Self {
            model,
            prompt: Arc::from(prompt),
        }
    }

    /// Ask the model for a structured name for `bytes`.
    ///
    /// Exactly one request is sent.
    pub async fn analyze(&self, bytes: Vec<u8>, mime_hint: &str) -> Result<String, AnalysisError> {
        let start = Instant::now();
        let size = bytes.len();
        let text = self
            .model
            .generate(&self.prompt, ImagePayload::new(mime_hint, bytes))
            .await
            .map_err(|e| AnalysisError::RequestFailed(e.to_string()))?;
        debug!(
            "Analyzed {} bytes of {} in {}ms",
            size,
            mime_hint,
            start.elapsed().as_millis()
        );
        validate_candidate(&text)
    }
}

/// Apply the loose output contract to a raw model answer.
pub fn validate_candidate(text: &str) -> Result<String, AnalysisError> {
    let candidate = text.trim();
    if candidate.is_empty() || !candidate.contains(NAME_SEPARATOR) {
        return Err(AnalysisError::EmptyOrMalformed {
            output: candidate.to_string(),
        });
    }
    Ok(candidate.to_string())
}

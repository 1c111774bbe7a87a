//! Configuration for a rename batch.
//!
//! Every knob the coordinator and the analyzer read lives in
//! [`RenameConfig`], built via [`RenameConfigBuilder`]. Process-level settings
//! (which folder, which credentials, where the analyzer key lives) are not
//! here: the binary reads those once and turns them into clients before a
//! batch starts.

use crate::error::RenameError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Largest page Drive will return for a `files.list` call.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Configuration for a rename batch.
///
/// Built via [`RenameConfig::builder()`] or using [`RenameConfig::default()`].
///
/// # Example
/// ```rust
/// use exhibit_renamer::RenameConfig;
///
/// let config = RenameConfig::builder()
///     .concurrency(3)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 3);
/// ```
#[derive(Clone)]
pub struct RenameConfig {
    /// Number of files processed at once. Default: 5.
    ///
    /// Each in-flight file holds one download, one model call and one rename
    /// against external APIs. Five stays under the default per-user quotas
    /// of Drive and the Gemini free tier.
    pub concurrency: usize,

    /// Maximum number of files taken from the folder listing. Default: 100.
    ///
    /// Only the first page is read; a folder with more files is reported as
    /// truncated and the remainder is left for the next run.
    pub page_size: u32,

    /// Model identifier, e.g. "gemini-2.0-flash". If None, the default of
    /// the selected backend is used.
    pub model: Option<String>,

    /// `edgequake_llm` provider name (e.g. "openai", "anthropic", "ollama").
    /// Only consulted when no Gemini key is available.
    pub provider_name: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 256.
    ///
    /// The answer is one short filename; a low cap stops a chatty model from
    /// burning tokens on an explanation nobody reads.
    pub max_tokens: usize,

    /// Custom analysis prompt. If None, uses [`crate::prompts::ANALYSIS_PROMPT`].
    pub prompt: Option<String>,

    /// HTTP timeout in seconds. Default: 60.
    ///
    /// Bounds each model, token and secret request as a whole. Drive
    /// requests use it as a stall limit between reads instead, so a large
    /// download on a slow link is not cut off while data keeps flowing.
    pub api_timeout_secs: u64,

    /// Optional wall-clock limit for the download and analysis of one file.
    /// Default: None.
    ///
    /// A download that runs past it fails the file with its name untouched.
    /// An analysis that runs past it takes the fallback name. The rename
    /// itself is never cut short. Without a limit a hung call keeps its
    /// worker slot until it returns.
    pub task_timeout_secs: Option<u64>,

    /// Receives per-file events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            page_size: 100,
            model: None,
            provider_name: None,
            temperature: 0.1,
            max_tokens: 256,
            prompt: None,
            api_timeout_secs: 60,
            task_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RenameConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenameConfig")
            .field("concurrency", &self.concurrency)
            .field("page_size", &self.page_size)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("prompt", &self.prompt.as_ref().map(|p| format!("<{} chars>", p.len())))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("task_timeout_secs", &self.task_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenameProgressCallback>"),
            )
            .finish()
    }
}

impl RenameConfig {
    /// Create a new builder for `RenameConfig`.
    pub fn builder() -> RenameConfigBuilder {
        RenameConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt actually sent to the model.
    pub fn analysis_prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(crate::prompts::ANALYSIS_PROMPT)
    }
}

/// Builder for [`RenameConfig`].
#[derive(Debug)]
pub struct RenameConfigBuilder {
    config: RenameConfig,
}

impl RenameConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_size(mut self, n: u32) -> Self {
        self.config.page_size = n.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn task_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.task_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenameConfig, RenameError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(RenameError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(RenameError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(RenameError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        if c.task_timeout_secs == Some(0) {
            return Err(RenameError::InvalidConfig("Task timeout must be ≥ 1s".into()));
        }
        if c.prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(RenameError::InvalidConfig("Custom prompt is empty".into()));
        }
        Ok(self.config)
    }
}

//! Setup phase: turn process settings into ready-to-use clients.
//!
//! Everything that can fail before a file is touched happens here: missing
//! folder id, unreadable or invalid credentials, an inaccessible secret, a
//! client that cannot be built. [`connect`] either returns both clients or
//! a [`RenameError`]; the batch itself never sees half-initialised state.

use crate::auth::{CredentialsSource, SecretManager, TokenProvider, CLOUD_PLATFORM_SCOPE, DRIVE_SCOPE};
use crate::config::RenameConfig;
use crate::error::RenameError;
use crate::storage::{DriveClient, StorageClient};
use crate::vision::{GeminiVisionModel, ProviderVisionModel, VisionModel};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Secret holding the Gemini API key when none is named.
pub const DEFAULT_SECRET_ID: &str = "GEMINI_API_KEY";

/// Environment variable read for a Gemini key when no secret project is set.
pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";

/// Where the batch runs and how it authenticates.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Drive folder whose direct children are renamed.
    pub folder_id: String,
    pub credentials_source: CredentialsSource,
    /// Project holding the Gemini key in Secret Manager. When unset the key
    /// comes from the environment.
    pub secret_project_id: Option<String>,
    pub secret_id: String,
}

impl Settings {
    pub fn new(folder_id: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            credentials_source: CredentialsSource::default(),
            secret_project_id: None,
            secret_id: DEFAULT_SECRET_ID.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), RenameError> {
        if self.folder_id.trim().is_empty() {
            return Err(RenameError::MissingConfig {
                name: "folder id".into(),
                hint: "--folder-id or DRIVE_FOLDER_ID".into(),
            });
        }
        if self.secret_project_id.is_some() && self.secret_id.trim().is_empty() {
            return Err(RenameError::InvalidConfig(
                "secret id must not be empty when a secret project is set".into(),
            ));
        }
        Ok(())
    }
}

/// The two external collaborators of a batch.
#[derive(Clone)]
pub struct Clients {
    pub storage: Arc<dyn StorageClient>,
    pub model: Arc<dyn VisionModel>,
}

impl std::fmt::Debug for Clients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clients")
            .field("model", &self.model.describe())
            .finish_non_exhaustive()
    }
}

/// Build the storage and vision clients for `settings`.
///
/// Analyzer key resolution, first match wins:
///
/// 1. **Secret Manager** when `secret_project_id` is set; a failure here is
///    fatal.
/// 2. **`GEMINI_API_KEY`** from the environment, unless a provider was named
///    explicitly in `config`.
/// 3. **`edgequake-llm` provider chain** otherwise.
pub async fn connect(settings: &Settings, config: &RenameConfig) -> Result<Clients, RenameError> {
    settings.validate()?;

    let http = api_http(config)?;

    let mut scopes = vec![DRIVE_SCOPE];
    if settings.secret_project_id.is_some() {
        scopes.push(CLOUD_PLATFORM_SCOPE);
    }
    let auth = Arc::new(TokenProvider::from_source(
        &settings.credentials_source,
        &scopes,
        http.clone(),
    )?);

    let storage: Arc<dyn StorageClient> =
        Arc::new(DriveClient::new(storage_http(config)?, Arc::clone(&auth)));

    let model: Arc<dyn VisionModel> = if let Some(ref project) = settings.secret_project_id {
        let key = SecretManager::new(http, auth)
            .access(project, &settings.secret_id)
            .await?;
        debug!("Gemini key read from secret {}/{}", project, settings.secret_id);
        Arc::new(GeminiVisionModel::new(key, config)?)
    } else if let Some(key) = env_key(config) {
        debug!("Gemini key read from {}", GEMINI_KEY_ENV);
        Arc::new(GeminiVisionModel::new(key, config)?)
    } else {
        Arc::new(ProviderVisionModel::from_config(config)?)
    };
    info!("Vision model: {}", model.describe());

    Ok(Clients { storage, model })
}

/// Client for token, secret and model calls: each request as a whole is
/// bounded by `api_timeout_secs`.
fn api_http(config: &RenameConfig) -> Result<reqwest::Client, RenameError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| RenameError::ClientBuild {
            client: "HTTP".into(),
            detail: e.to_string(),
        })
}

/// Client for Drive: a download may take as long as it keeps making
/// progress. Only a read that stalls for `api_timeout_secs` gives up.
fn storage_http(config: &RenameConfig) -> Result<reqwest::Client, RenameError> {
    reqwest::Client::builder()
        .read_timeout(Duration::from_secs(config.api_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| RenameError::ClientBuild {
            client: "Drive HTTP".into(),
            detail: e.to_string(),
        })
}

fn env_key(config: &RenameConfig) -> Option<String> {
    if config.provider_name.is_some() {
        return None;
    }
    std::env::var(GEMINI_KEY_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

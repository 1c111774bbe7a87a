//! Secret Manager lookup for the analyzer API key.

use super::TokenProvider;
use crate::error::RenameError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_BASE_URL: &str = "https://secretmanager.googleapis.com/v1";

#[derive(Deserialize)]
struct AccessResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: String,
}

/// Minimal Secret Manager client: `versions/<v>:access` only.
#[derive(Debug, Clone)]
pub struct SecretManager {
    http: reqwest::Client,
    auth: Arc<TokenProvider>,
    base_url: String,
}

impl SecretManager {
    pub fn new(http: reqwest::Client, auth: Arc<TokenProvider>) -> Self {
        Self {
            http,
            auth,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a different endpoint (emulator, regional endpoint).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch the latest version of `secret_id` in `project_id` as UTF-8.
    pub async fn access(&self, project_id: &str, secret_id: &str) -> Result<String, RenameError> {
        self.access_version(project_id, secret_id, "latest").await
    }

    pub async fn access_version(
        &self,
        project_id: &str,
        secret_id: &str,
        version: &str,
    ) -> Result<String, RenameError> {
        let fail = |detail: String| {
            error!("Error accessing secret: {}", secret_id);
            RenameError::SecretAccess {
                project: project_id.to_string(),
                secret: secret_id.to_string(),
                detail,
            }
        };

        let token = self.auth.access_token().await.map_err(|e| fail(e.to_string()))?;
        let url = secret_version_url(&self.base_url, project_id, secret_id, version);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        let body: AccessResponse = response
            .json()
            .await
            .map_err(|e| fail(format!("malformed response: {e}")))?;
        let value = decode_payload(&body.payload.data).map_err(fail)?;

        info!("Successfully retrieved secret: {}", secret_id);
        Ok(value)
    }
}

fn secret_version_url(base: &str, project_id: &str, secret_id: &str, version: &str) -> String {
    format!("{base}/projects/{project_id}/secrets/{secret_id}/versions/{version}:access")
}

/// Secret payloads are base64 on the wire; keys are stored with a trailing
/// newline more often than not.
fn decode_payload(data: &str) -> Result<String, String> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| format!("payload is not base64: {e}"))?;
    let text = String::from_utf8(bytes).map_err(|e| format!("payload is not UTF-8: {e}"))?;
    Ok(text.trim().to_string())
}

//! OAuth2 access tokens for Google APIs.
//!
//! The storage client and the secret lookup both need a bearer token. Where
//! it comes from is chosen once at startup through [`CredentialsSource`]:
//!
//! | Source | Parsed from | Token comes from |
//! |--------|-------------|------------------|
//! | service account (env) | `env`, `env:VAR` | JSON key in `DRIVE_SERVICE_ACCOUNT` (or `VAR`) |
//! | service account (file) | `file:/path/key.json` | JSON key on disk |
//! | metadata server | `metadata` | GCE / Cloud Run instance identity |
//! | static token | `token`, `token:VAR` | bearer token in `GOOGLE_OAUTH_ACCESS_TOKEN` (or `VAR`) |
//!
//! Service-account keys are exchanged for tokens with the JWT bearer grant
//! (RFC 7523). Tokens are cached by [`TokenProvider`] until a minute before
//! they expire, so concurrent workers share one token instead of each
//! hitting the token endpoint.

pub mod secrets;

use crate::error::{AuthError, RenameError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use secrets::SecretManager;

/// Default env var holding the service-account JSON key.
pub const DEFAULT_SERVICE_ACCOUNT_ENV: &str = "DRIVE_SERVICE_ACCOUNT";

/// Default env var holding a pre-issued access token.
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Full Drive access; needed to rename files.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Needed for Secret Manager.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Where the storage credential comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    /// Service-account JSON key stored in an environment variable.
    ServiceAccountEnv(String),
    /// Service-account JSON key file.
    ServiceAccountFile(PathBuf),
    /// Compute metadata server of the current instance.
    Metadata,
    /// Bearer token stored in an environment variable, used as-is.
    AccessTokenEnv(String),
}

impl Default for CredentialsSource {
    fn default() -> Self {
        CredentialsSource::ServiceAccountEnv(DEFAULT_SERVICE_ACCOUNT_ENV.to_string())
    }
}

impl FromStr for CredentialsSource {
    type Err = RenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, arg) = match s.split_once(':') {
            Some((k, a)) => (k, Some(a.trim())),
            None => (s, None),
        };
        let arg = arg.filter(|a| !a.is_empty());

        match kind.to_lowercase().as_str() {
            "env" | "service-account" => Ok(CredentialsSource::ServiceAccountEnv(
                arg.unwrap_or(DEFAULT_SERVICE_ACCOUNT_ENV).to_string(),
            )),
            "file" => match arg {
                Some(path) => Ok(CredentialsSource::ServiceAccountFile(PathBuf::from(path))),
                None => Err(RenameError::InvalidConfig(
                    "credentials source 'file' needs a path, e.g. file:/secrets/key.json".into(),
                )),
            },
            "metadata" => Ok(CredentialsSource::Metadata),
            "token" => Ok(CredentialsSource::AccessTokenEnv(
                arg.unwrap_or(DEFAULT_ACCESS_TOKEN_ENV).to_string(),
            )),
            other => Err(RenameError::InvalidConfig(format!(
                "unknown credentials source '{other}' (expected env, file:<path>, metadata or token)"
            ))),
        }
    }
}

impl fmt::Display for CredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsSource::ServiceAccountEnv(var) => write!(f, "env:{var}"),
            CredentialsSource::ServiceAccountFile(path) => write!(f, "file:{}", path.display()),
            CredentialsSource::Metadata => f.write_str("metadata"),
            CredentialsSource::AccessTokenEnv(var) => write!(f, "token:{var}"),
        }
    }
}

/// The fields of a service-account key file we actually use.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        if key.client_email.is_empty() {
            return Err(AuthError::InvalidKey("client_email is empty".into()));
        }
        Ok(key)
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

enum TokenKind {
    ServiceAccount {
        email: String,
        token_uri: String,
        key: EncodingKey,
    },
    Metadata {
        url: String,
    },
    Static(String),
}

/// Hands out bearer tokens for the configured [`CredentialsSource`].
///
/// Cheap to share behind an `Arc`; the cache is guarded by an async mutex so
/// at most one refresh is in flight.
pub struct TokenProvider {
    kind: TokenKind,
    scopes: String,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            TokenKind::ServiceAccount { email, .. } => format!("service-account({email})"),
            TokenKind::Metadata { .. } => "metadata".to_string(),
            TokenKind::Static(_) => "static".to_string(),
        };
        f.debug_struct("TokenProvider")
            .field("kind", &kind)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl TokenProvider {
    /// Load the credential named by `source`.
    ///
    /// Everything that can be checked without the network is checked here
    /// (env var present, key parses, PEM is a valid RSA key) so a broken
    /// setup fails before any file is touched.
    pub fn from_source(
        source: &CredentialsSource,
        scopes: &[&str],
        http: reqwest::Client,
    ) -> Result<Self, RenameError> {
        let kind = match source {
            CredentialsSource::ServiceAccountEnv(var) => {
                let json = non_empty_env(var).ok_or_else(|| AuthError::MissingEnv(var.clone()))?;
                service_account_kind(ServiceAccountKey::from_json(&json)?)?
            }
            CredentialsSource::ServiceAccountFile(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| RenameError::CredentialsFile {
                    path: path.clone(),
                    source: e,
                })?;
                service_account_kind(ServiceAccountKey::from_json(&json)?)?
            }
            CredentialsSource::Metadata => TokenKind::Metadata {
                url: METADATA_TOKEN_URL.to_string(),
            },
            CredentialsSource::AccessTokenEnv(var) => {
                TokenKind::Static(non_empty_env(var).ok_or_else(|| AuthError::MissingEnv(var.clone()))?)
            }
        };
        info!("Storage credentials loaded from {}", source);

        Ok(Self {
            kind,
            scopes: scopes.join(" "),
            http,
            cache: Mutex::new(None),
        })
    }

    /// A provider that always returns `token`. Useful against emulators.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Static(token.into()),
            scopes: String::new(),
            http: reqwest::Client::new(),
            cache: Mutex::new(None),
        }
    }

    /// A valid bearer token, refreshing it when needed.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;
        let now = Utc::now();
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.token.clone());
            }
        }

        let fresh = match &self.kind {
            TokenKind::ServiceAccount {
                email,
                token_uri,
                key,
            } => self.fetch_service_account_token(email, token_uri, key, now).await?,
            TokenKind::Metadata { url } => self.fetch_metadata_token(url).await?,
            TokenKind::Static(token) => return Ok(token.clone()),
        };
        let expires_at = now + Duration::seconds(fresh.expires_in.unwrap_or(3600));
        debug!("Access token refreshed, valid until {}", expires_at);

        *cache = Some(CachedToken {
            token: fresh.access_token.clone(),
            expires_at,
        });
        Ok(fresh.access_token)
    }

    async fn fetch_service_account_token(
        &self,
        email: &str,
        token_uri: &str,
        key: &EncodingKey,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, AuthError> {
        let iat = now.timestamp();
        let claims = JwtClaims {
            iss: email,
            scope: &self.scopes,
            aud: token_uri,
            iat,
            exp: iat + 3600,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        let response = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        read_token_response(response).await
    }

    async fn fetch_metadata_token(&self, url: &str) -> Result<TokenResponse, AuthError> {
        let mut request = self.http.get(url).header("Metadata-Flavor", "Google");
        if !self.scopes.is_empty() {
            request = request.query(&[("scopes", self.scopes.replace(' ', ","))]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        read_token_response(response).await
    }
}

fn service_account_kind(key: ServiceAccountKey) -> Result<TokenKind, AuthError> {
    let encoding = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| AuthError::InvalidKey(format!("private_key: {e}")))?;
    Ok(TokenKind::ServiceAccount {
        email: key.client_email,
        token_uri: key
            .token_uri
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        key: encoding,
    })
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, AuthError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::Transport(format!("malformed token response: {e}")))
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

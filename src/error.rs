//! Error types for the exhibit-renamer library.
//!
//! Two distinct error families reflect two distinct failure modes:
//!
//! * [`RenameError`] is **fatal**: the batch cannot start at all (missing
//!   folder id, bad credentials, secret not accessible, folder listing
//!   refused). Returned as `Err(RenameError)` from [`crate::run`] and from
//!   the setup helpers. No file has been touched when one of these surfaces.
//!
//! * [`FileError`] is **non-fatal**: a single file failed (download or rename
//!   transport error, timeout, panicking task) while its siblings carry on.
//!   Stored inside [`crate::output::RenameOutcome::Failed`].
//!
//! A third family, [`AnalysisError`], never leaves the file task: it is
//! recovered locally by the fallback namer and only shows up as a warning
//! in the per-file report.
//!
//! [`StorageError`], [`ModelError`] and [`AuthError`] are what the external
//! collaborators (Drive, the vision model, the OAuth2 token endpoint) return.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the exhibit-renamer library.
///
/// Per-file failures use [`FileError`] and are stored in
/// [`crate::output::FileReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum RenameError {
    // ── Configuration errors ─────────────────────────────────────────────
    /// A required setting was not provided.
    #[error("Missing configuration: {name}\nSet it with {hint}.")]
    MissingConfig { name: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Credential errors ────────────────────────────────────────────────
    /// The service-account key file could not be read.
    #[error("Failed to read credentials file '{path}': {source}")]
    CredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Storage credentials could not be loaded or exchanged for a token.
    #[error("Storage credentials unavailable: {0}")]
    Credentials(#[from] AuthError),

    /// Secret Manager refused or failed to return the analyzer key.
    #[error("Failed to access secret '{secret}' in project '{project}': {detail}\nEnsure it exists and the service account has the 'Secret Manager Secret Accessor' role.")]
    SecretAccess {
        project: String,
        secret: String,
        detail: String,
    },

    // ── Client errors ────────────────────────────────────────────────────
    /// An HTTP client could not be constructed.
    #[error("Failed to build {client} client: {detail}")]
    ClientBuild { client: String, detail: String },

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Batch errors ─────────────────────────────────────────────────────
    /// The folder listing failed; nothing was renamed.
    #[error("Failed to list folder '{folder_id}': {source}")]
    ListingFailed {
        folder_id: String,
        #[source]
        source: StorageError,
    },

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single file.
///
/// Stored in [`crate::output::RenameOutcome::Failed`]. The batch continues
/// with every other file.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// Fetching the file content failed; the original name is untouched.
    #[error("download failed: {detail}")]
    DownloadFailed { detail: String },

    /// The rename request was rejected or never reached storage.
    #[error("rename to '{target}' failed: {detail}")]
    RenameFailed { target: String, detail: String },

    /// The download did not finish within the configured per-task timeout.
    /// The original name is untouched.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The task panicked; caught at the coordinator boundary.
    #[error("task aborted unexpectedly: {detail}")]
    TaskPanicked { detail: String },
}

/// Why the analyzer could not produce a structured name.
///
/// Always recovered by [`crate::pipeline::fallback::fallback_name`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// The model answered, but with nothing usable.
    #[error("model output empty or malformed: {output:?}")]
    EmptyOrMalformed { output: String },

    /// The model call itself failed.
    #[error("model request failed: {0}")]
    RequestFailed(String),

    /// The per-task deadline ran out while waiting for the model.
    #[error("model call exceeded the {secs}s task limit")]
    TimedOut { secs: u64 },
}

/// Error returned by a [`crate::storage::StorageClient`].
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Could not obtain an access token for the request.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection reset, DNS failure, body read error, …
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Error returned by a [`crate::vision::VisionModel`].
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The response had no candidate text (safety block, empty answer).
    #[error("no text in model response{}", reason.as_ref().map(|r| format!(" ({r})")).unwrap_or_default())]
    NoText { reason: Option<String> },

    #[error("{0}")]
    Provider(String),
}

/// Error obtaining an OAuth2 access token.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Environment variable holding the credential is unset or empty.
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    /// The service-account JSON could not be parsed.
    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    /// Signing the JWT assertion failed.
    #[error("failed to sign token request: {0}")]
    Signing(String),

    /// The token endpoint rejected the request.
    #[error("token endpoint returned HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("token request failed: {0}")]
    Transport(String),
}

impl From<AuthError> for StorageError {
    fn from(e: AuthError) -> Self {
        StorageError::Auth(e.to_string())
    }
}

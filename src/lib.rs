//! # exhibit-renamer
//!
//! Rename scanned exhibit images in a Google Drive folder to
//! `DATE_TYPE_SUMMARY` names read off the image by a vision model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Drive folder
//!  │
//!  ├─ 1. List      one page of direct, non-trashed children
//!  ├─ 2. Filter    non-images are skipped untouched
//!  ├─ 3. Download  raw bytes, one task per file, bounded pool
//!  ├─ 4. Analyze   one vision-model call; NEEDS_REVIEW_ fallback on failure
//!  ├─ 5. Normalize sanitise + keep the original extension
//!  ├─ 6. Rename    metadata-only update in Drive
//!  └─ 7. Report    "N renamed, M skipped, K failed"
//! ```
//!
//! A file that fails to download or rename keeps its original name and is
//! counted as failed; its siblings carry on. Only setup problems (missing
//! folder id, bad credentials, unreadable secret, refused listing) stop a
//! batch, and they do so before any file is touched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exhibit_renamer::{connect, run, RenameConfig, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Storage credential from DRIVE_SERVICE_ACCOUNT, model key from GEMINI_API_KEY
//!     let settings = Settings::new("1AbCdEfGhIjK");
//!     let config = RenameConfig::default();
//!     let clients = connect(&settings, &config).await?;
//!     let report = run(clients.storage, clients.model, &settings.folder_id, &config).await?;
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exhibit-renamer` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! exhibit-renamer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod setup;
pub mod storage;
pub mod stream;
pub mod vision;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use auth::{CredentialsSource, SecretManager, TokenProvider};
pub use config::{RenameConfig, RenameConfigBuilder};
pub use coordinator::{run, run_sync};
pub use error::{AnalysisError, AuthError, FileError, ModelError, RenameError, StorageError};
pub use output::{BatchReport, BatchSummary, FileReport, RenameOutcome};
pub use pipeline::TaskStage;
pub use progress::{NoopProgressCallback, ProgressCallback, RenameProgressCallback};
pub use report::Reporter;
pub use setup::{connect, Clients, Settings};
pub use storage::{DriveClient, FileRecord, StorageClient};
pub use stream::{run_stream, ReportStream};
pub use vision::{GeminiVisionModel, ImagePayload, ProviderVisionModel, VisionModel};

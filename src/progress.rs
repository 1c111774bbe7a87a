//! Progress-callback trait for per-file rename events.
//!
//! Inject an [`Arc<dyn RenameProgressCallback>`] via
//! [`crate::config::RenameConfigBuilder::progress_callback`] to receive
//! events as the batch moves each file through its stages.
//!
//! # Example
//!
//! ```rust
//! use exhibit_renamer::{FileRecord, RenameConfig, RenameProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     renamed: AtomicUsize,
//! }
//!
//! impl RenameProgressCallback for CountingCallback {
//!     fn on_file_renamed(&self, _file: &FileRecord, new_name: &str) {
//!         self.renamed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("-> {new_name}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { renamed: AtomicUsize::new(0) });
//!
//! let config = RenameConfig::builder()
//!     .progress_callback(counter as Arc<dyn RenameProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::BatchSummary;
use crate::pipeline::TaskStage;
use crate::storage::FileRecord;
use std::sync::Arc;

/// Called by the coordinator and the file tasks as the batch progresses.
///
/// Implementations must be `Send + Sync`: file events arrive concurrently
/// from different worker threads and in completion order. All methods have
/// default no-op implementations so callers only override what they care
/// about.
///
/// File events carry the listed [`FileRecord`]. Folders may hold several
/// files with the same name, so key per-file state by `file.id`.
pub trait RenameProgressCallback: Send + Sync {
    /// Called once after the folder was listed.
    ///
    /// # Arguments
    /// * `total_files`: number of files that will get a task
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file task enters a new non-terminal stage.
    fn on_file_stage(&self, file: &FileRecord, stage: TaskStage) {
        let _ = (file, stage);
    }

    /// Called when the analyzer failed and the fallback name is used.
    fn on_fallback(&self, file: &FileRecord, reason: &str) {
        let _ = (file, reason);
    }

    /// Called when a file was renamed.
    fn on_file_renamed(&self, file: &FileRecord, new_name: &str) {
        let _ = (file, new_name);
    }

    /// Called when a file is not an image and was left alone.
    fn on_file_skipped(&self, file: &FileRecord) {
        let _ = file;
    }

    /// Called when a file failed; its original name is untouched.
    fn on_file_error(&self, file: &FileRecord, error: &str) {
        let _ = (file, error);
    }

    /// Called once after every task has reached a terminal state.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenameProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RenameConfig`].
pub type ProgressCallback = Arc<dyn RenameProgressCallback>;

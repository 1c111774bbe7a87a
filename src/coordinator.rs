//! Batch coordinator: list once, fan out, fold results.
//!
//! [`run`] is the eager entry point: it returns after every listed file has
//! reached a terminal outcome. Use [`crate::stream::run_stream`] to receive
//! file reports as they complete instead.
//!
//! Every file gets its own `tokio::spawn`ed task; at most
//! `config.concurrency` of them are in flight at once. A task that panics is
//! reported as a failure for its file and does not take the batch down.
//!
//! Dropping the batch (the [`run`] future or a report stream) aborts the
//! tasks still in flight and never starts the rest. An aborted task stops at
//! its next await point: a rename request already on the wire may still be
//! applied by storage even though its report is gone.

use crate::config::RenameConfig;
use crate::error::{FileError, RenameError};
use crate::output::{BatchReport, FileReport, RenameOutcome};
use crate::pipeline::{Analyzer, FileTask};
use crate::report::Reporter;
use crate::storage::{FileRecord, Listing, StorageClient};
use crate::vision::VisionModel;
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// Rename every file in `folder_id`.
///
/// # Arguments
/// * `storage`: where the files live
/// * `model`: vision model shared by every task
/// * `folder_id`: folder whose direct, non-trashed children are processed
/// * `config`: concurrency, prompt, timeouts and progress callback
///
/// # Returns
/// `Ok(BatchReport)` once every task is done, whatever the per-file
/// outcomes were.
///
/// # Errors
/// Only [`RenameError::ListingFailed`]: no file is touched in that case.
pub async fn run(
    storage: Arc<dyn StorageClient>,
    model: Arc<dyn VisionModel>,
    folder_id: &str,
    config: &RenameConfig,
) -> Result<BatchReport, RenameError> {
    let start = Instant::now();
    info!("Starting rename batch for folder {} using {}", folder_id, model.describe());

    let listing = list_folder(storage.as_ref(), folder_id, config).await?;
    let truncated = listing.truncated;
    let total = listing.files.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut reporter = Reporter::new(total);
    if total == 0 {
        info!("No files found in folder {}", folder_id);
    } else {
        let task = FileTask::new(
            storage,
            Analyzer::new(model, config.analysis_prompt()),
            config.progress_callback.clone(),
        );
        let mut reports = dispatch(task, listing.files, config);
        while let Some(report) = reports.next().await {
            reporter.record(report);
        }
    }

    let report = reporter.finish(truncated, start.elapsed());
    info!(
        "Batch complete: {} in {}ms",
        report.summary, report.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&report.summary);
    }

    Ok(report)
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    storage: Arc<dyn StorageClient>,
    model: Arc<dyn VisionModel>,
    folder_id: &str,
    config: &RenameConfig,
) -> Result<BatchReport, RenameError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RenameError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(storage, model, folder_id, config))
}

/// Fetch one page of children. A listing failure is fatal.
pub(crate) async fn list_folder(
    storage: &dyn StorageClient,
    folder_id: &str,
    config: &RenameConfig,
) -> Result<Listing, RenameError> {
    let listing = storage
        .list_children(folder_id, config.page_size)
        .await
        .map_err(|source| RenameError::ListingFailed {
            folder_id: folder_id.to_string(),
            source,
        })?;

    info!("Found {} files in folder {}", listing.files.len(), folder_id);
    if listing.truncated {
        warn!(
            "Folder {} has more than {} files; only the first page is processed this run",
            folder_id, config.page_size
        );
    }
    Ok(listing)
}

/// Spawn one task per file with at most `config.concurrency` in flight.
///
/// Reports arrive in completion order. Spawning is lazy: a file's task is
/// only created when a slot frees up. Dropping the stream aborts the tasks
/// in flight.
pub(crate) fn dispatch(
    task: FileTask,
    files: Vec<FileRecord>,
    config: &RenameConfig,
) -> impl Stream<Item = FileReport> + Send + 'static {
    let limit = config.task_timeout_secs.map(Duration::from_secs);
    stream::iter(files)
        .map(move |file| {
            let task = task.clone();
            let listed = file.clone();
            let start = Instant::now();
            let handle = {
                let task = task.clone();
                AbortOnDrop(tokio::spawn(async move {
                    task.run_with_timeout(file, limit).await
                }))
            };
            async move {
                match handle.await {
                    Ok(report) => report,
                    Err(e) => aborted(&task, listed, e, start),
                }
            }
        })
        .buffer_unordered(config.concurrency)
}

/// Join handle that aborts its task when dropped before completion.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn aborted(task: &FileTask, file: FileRecord, err: JoinError, start: Instant) -> FileReport {
    let detail = panic_message(err);
    error!("{}: task aborted: {}", file.name, detail);
    let outcome = RenameOutcome::Failed {
        error: FileError::TaskPanicked { detail },
    };
    task.notify_outcome(&file, &outcome);
    FileReport {
        file,
        outcome,
        analysis_warning: None,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

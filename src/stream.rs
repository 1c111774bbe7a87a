//! Streaming batch API: emit file reports as tasks finish.
//!
//! Unlike the eager [`crate::coordinator::run`], which returns only after
//! every file is done, [`run_stream`] yields each [`FileReport`] as soon as
//! its task completes. Reports arrive in completion order, not listing
//! order. Fold them with a [`crate::report::Reporter`] to get the summary.

use crate::config::RenameConfig;
use crate::coordinator::{dispatch, list_folder};
use crate::error::RenameError;
use crate::output::FileReport;
use crate::pipeline::{Analyzer, FileTask};
use crate::storage::StorageClient;
use crate::vision::VisionModel;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file reports.
pub type ReportStream = Pin<Box<dyn Stream<Item = FileReport> + Send>>;

/// List `folder_id` and return a stream that drives every file to a
/// terminal outcome as it is polled.
///
/// The listing happens before this returns, so a listing failure is
/// reported here and not as a stream item. `on_batch_start` fires once the
/// listing is in; `on_batch_complete` is left to whoever folds the stream.
///
/// Dropping the stream early aborts the tasks in flight and skips the files
/// not yet started. Their reports are lost; a rename already sent to
/// storage may still land.
///
/// # Example
/// ```rust,no_run
/// use exhibit_renamer::{connect, run_stream, RenameConfig, Reporter, Settings};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = Settings::new("1AbCdEfG");
/// let config = RenameConfig::default();
/// let clients = connect(&settings, &config).await?;
/// let mut reports = run_stream(clients.storage, clients.model, &settings.folder_id, &config).await?;
/// let mut reporter = Reporter::default();
/// while let Some(report) = reports.next().await {
///     println!("{}: {:?}", report.file.name, report.outcome);
///     reporter.record(report);
/// }
/// println!("{}", reporter.summary());
/// # Ok(())
/// # }
/// ```
pub async fn run_stream(
    storage: Arc<dyn StorageClient>,
    model: Arc<dyn VisionModel>,
    folder_id: &str,
    config: &RenameConfig,
) -> Result<ReportStream, RenameError> {
    info!("Starting streaming rename batch for folder {}", folder_id);

    let listing = list_folder(storage.as_ref(), folder_id, config).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(listing.files.len());
    }

    let task = FileTask::new(
        storage,
        Analyzer::new(model, config.analysis_prompt()),
        config.progress_callback.clone(),
    );
    Ok(Box::pin(dispatch(task, listing.files, config)))
}

//! The per-file state machine.
//!
//! ```text
//! Listed ─┬─ not image ─────────────────────────────────────▶ Skipped
//!         └─ Downloading ─┬─ error / deadline ──────────────▶ Failed
//!                         └─ Analyzing ─┬─ ok ──┐
//!                                       └─ err ─┴▶ Naming ─▶ Renaming ─┬─ ok ──▶ Succeeded
//!                                 (or deadline; fallback name)         └─ err ─▶ Failed
//! ```
//!
//! A task never returns an error: every path ends in a [`RenameOutcome`],
//! and an analysis failure is downgraded to the fallback name plus a
//! warning on the report.
//!
//! The optional deadline covers Downloading and Analyzing only. Once a
//! rename request is sent it runs to completion, so `Failed` always means
//! the file kept its original name.

use super::analyze::Analyzer;
use super::fallback::fallback_name;
use super::naming::{ensure_extension, normalize};
use super::TaskStage;
use crate::error::{AnalysisError, FileError};
use crate::output::{FileReport, RenameOutcome};
use crate::progress::ProgressCallback;
use crate::storage::{FileRecord, StorageClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Everything a file task needs, cheap to clone into each spawned task.
#[derive(Clone)]
pub struct FileTask {
    storage: Arc<dyn StorageClient>,
    analyzer: Analyzer,
    progress: Option<ProgressCallback>,
}

impl FileTask {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        analyzer: Analyzer,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            storage,
            analyzer,
            progress,
        }
    }

    /// Drive `file` to a terminal outcome.
    pub async fn run(&self, file: FileRecord) -> FileReport {
        self.run_with_timeout(file, None).await
    }

    /// Like [`run`](Self::run), with `limit` shared by the download and the
    /// model call.
    ///
    /// A download still running at the deadline fails the file as
    /// [`FileError::Timeout`]. A model call still running at the deadline
    /// counts as an analysis failure and the file gets the fallback name.
    pub async fn run_with_timeout(&self, file: FileRecord, limit: Option<Duration>) -> FileReport {
        let start = Instant::now();
        self.enter(&file, TaskStage::Listed);

        let deadline = limit.map(|limit| Deadline {
            at: tokio::time::Instant::now() + limit,
            secs: limit.as_secs(),
        });
        let mut warning = None;
        let outcome = self.advance(&file, deadline, &mut warning).await;
        self.notify_outcome(&file, &outcome);

        FileReport {
            file,
            outcome,
            analysis_warning: warning,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn advance(
        &self,
        file: &FileRecord,
        deadline: Option<Deadline>,
        warning: &mut Option<String>,
    ) -> RenameOutcome {
        if !file.is_image() {
            info!("Skipping {} ({})", file.name, file.mime_type);
            return RenameOutcome::Skipped {
                mime_type: file.mime_type.clone(),
            };
        }

        self.enter(file, TaskStage::Downloading);
        let download = self.storage.download(&file.id);
        let downloaded = match deadline {
            Some(d) => match tokio::time::timeout_at(d.at, download).await {
                Ok(result) => result,
                Err(_) => {
                    error!("{}: download gave up after {}s", file.name, d.secs);
                    return RenameOutcome::Failed {
                        error: FileError::Timeout { secs: d.secs },
                    };
                }
            },
            None => download.await,
        };
        let bytes = match downloaded {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("{}: download failed: {}", file.name, e);
                return RenameOutcome::Failed {
                    error: FileError::DownloadFailed {
                        detail: e.to_string(),
                    },
                };
            }
        };
        debug!("{}: downloaded {} bytes", file.name, bytes.len());

        self.enter(file, TaskStage::Analyzing);
        let analysis = self.analyzer.analyze(bytes, &file.mime_type);
        let analyzed = match deadline {
            Some(d) => tokio::time::timeout_at(d.at, analysis)
                .await
                .unwrap_or(Err(AnalysisError::TimedOut { secs: d.secs })),
            None => analysis.await,
        };

        self.enter(file, TaskStage::Naming);
        let target = match analyzed {
            Ok(candidate) => normalize(&candidate, &file.name),
            Err(e) => {
                let reason = e.to_string();
                warn!("{}: {}; using fallback name", file.name, reason);
                if let Some(cb) = &self.progress {
                    cb.on_fallback(file, &reason);
                }
                *warning = Some(reason);
                ensure_extension(&fallback_name(&file.name), &file.name)
            }
        };

        self.enter(file, TaskStage::Renaming);
        match self.storage.rename(&file.id, &target).await {
            Ok(renamed) => {
                if renamed.name != target {
                    debug!("{}: storage applied '{}' for '{}'", file.name, renamed.name, target);
                }
                info!("Renamed {} -> {}", file.name, renamed.name);
                RenameOutcome::Succeeded {
                    new_name: renamed.name,
                }
            }
            Err(e) => {
                error!("{}: rename to '{}' failed: {}", file.name, target, e);
                RenameOutcome::Failed {
                    error: FileError::RenameFailed {
                        target,
                        detail: e.to_string(),
                    },
                }
            }
        }
    }

    fn enter(&self, file: &FileRecord, stage: TaskStage) {
        debug!("{}: {}", file.name, stage);
        if let Some(cb) = &self.progress {
            cb.on_file_stage(file, stage);
        }
    }

    pub(crate) fn notify_outcome(&self, file: &FileRecord, outcome: &RenameOutcome) {
        let Some(cb) = &self.progress else {
            return;
        };
        match outcome {
            RenameOutcome::Succeeded { new_name } => cb.on_file_renamed(file, new_name),
            RenameOutcome::Skipped { .. } => cb.on_file_skipped(file),
            RenameOutcome::Failed { error } => cb.on_file_error(file, &error.to_string()),
        }
    }
}

/// Point in time after which download and analysis are abandoned.
#[derive(Clone, Copy)]
struct Deadline {
    at: tokio::time::Instant,
    secs: u64,
}

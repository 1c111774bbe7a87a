//! Output types returned by a rename batch.
//!
//! [`RenameOutcome`] is the terminal state of one file; [`FileReport`] wraps
//! it with the file identity and diagnostics; [`BatchReport`] is what
//! [`crate::run`] hands back once every task has finished.

use crate::error::FileError;
use crate::storage::FileRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of a single file. Produced exactly once per listed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenameOutcome {
    /// The file now carries `new_name` in storage.
    Succeeded { new_name: String },
    /// Not an image; nothing was downloaded.
    Skipped { mime_type: String },
    /// Download or rename failed; the file keeps its original name.
    Failed { error: FileError },
}

impl RenameOutcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, RenameOutcome::Succeeded { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RenameOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RenameOutcome::Failed { .. })
    }
}

/// Result for a single file, with the diagnostics collected along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    /// Snapshot of the file as listed.
    pub file: FileRecord,
    pub outcome: RenameOutcome,
    /// Set when the analyzer failed and the fallback name was used.
    pub analysis_warning: Option<String>,
    /// Wall-clock time spent in the task.
    pub duration_ms: u64,
}

/// Three-way tally of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Number of files seen in the listing.
    pub total: usize,
}

impl BatchSummary {
    /// Files that went through the fallback path are still successes; this
    /// only looks at terminal outcomes.
    pub fn add(&mut self, outcome: &RenameOutcome) {
        match outcome {
            RenameOutcome::Succeeded { .. } => self.succeeded += 1,
            RenameOutcome::Skipped { .. } => self.skipped += 1,
            RenameOutcome::Failed { .. } => self.failed += 1,
        }
        self.total += 1;
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} renamed, {} skipped, {} failed ({} files)",
            self.succeeded, self.skipped, self.failed, self.total
        )
    }
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    /// Per-file reports in completion order.
    pub files: Vec<FileReport>,
    /// The folder had more files than one listing page; the rest were not
    /// looked at.
    pub listing_truncated: bool,
    pub duration_ms: u64,
}

impl BatchReport {
    /// Reports for files that took the fallback path.
    pub fn needs_review(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|r| r.analysis_warning.is_some())
    }
}

//! Result reporter: the single owner of the batch tally.
//!
//! File tasks never touch a shared counter. Each one hands back a
//! [`FileReport`], the coordinator feeds them into one [`Reporter`] in
//! completion order, and the summary is read once every task is in.

use crate::output::{BatchReport, BatchSummary, FileReport, RenameOutcome};
use std::fmt::Write as _;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Reporter {
    summary: BatchSummary,
    files: Vec<FileReport>,
}

impl Reporter {
    pub fn new(expected: usize) -> Self {
        Self {
            summary: BatchSummary::default(),
            files: Vec::with_capacity(expected),
        }
    }

    /// Fold one terminal outcome into the tally.
    pub fn record(&mut self, report: FileReport) {
        self.summary.add(&report.outcome);
        self.files.push(report);
    }

    /// Tally so far.
    pub fn summary(&self) -> BatchSummary {
        self.summary
    }

    pub fn finish(self, listing_truncated: bool, elapsed: Duration) -> BatchReport {
        BatchReport {
            summary: self.summary,
            files: self.files,
            listing_truncated,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Plain-text rendering of a finished batch: one summary line, then one
/// line per file that failed or needs review.
pub fn render(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Batch finished: {}", report.summary);
    if report.listing_truncated {
        let _ = writeln!(out, "  note: folder has more files than one listing page; rerun to continue");
    }
    for file in &report.files {
        match &file.outcome {
            RenameOutcome::Failed { error } => {
                let _ = writeln!(out, "  failed  {}: {}", file.file.name, error);
            }
            RenameOutcome::Succeeded { new_name } if file.analysis_warning.is_some() => {
                let _ = writeln!(out, "  review  {} -> {}", file.file.name, new_name);
            }
            _ => {}
        }
    }
    out
}

//! Per-file rename pipeline.
//!
//! Each submodule implements one step; [`task`] strings them together into
//! the state machine every listed file goes through.
//!
//! ## Data Flow
//!
//! ```text
//! listed ──▶ download ──▶ analyze ──┬──▶ normalize ──▶ rename
//! (mime)     (storage)    (VLM)     │    (naming)      (storage)
//!                                   └─ fallback on analysis failure
//! ```
//!
//! 1. [`analyze`]: one vision-model call, loosely validated
//! 2. [`fallback`]: `NEEDS_REVIEW_<date>_<original>` when analysis fails
//! 3. [`naming`]: sanitise the candidate and make sure it has an extension
//! 4. [`task`]: the per-file state machine; the only place that talks to
//!    storage and decides the terminal outcome

pub mod analyze;
pub mod fallback;
pub mod naming;
pub mod task;

use serde::Serialize;
use std::fmt;

pub use analyze::Analyzer;
pub use task::FileTask;

/// Non-terminal stage of a file task, reported through the progress callback.
///
/// Terminal states are [`crate::output::RenameOutcome`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    Listed,
    Downloading,
    Analyzing,
    Naming,
    Renaming,
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStage::Listed => "listed",
            TaskStage::Downloading => "downloading",
            TaskStage::Analyzing => "analyzing",
            TaskStage::Naming => "naming",
            TaskStage::Renaming => "renaming",
        };
        f.write_str(s)
    }
}

//! Deterministic name for files the analyzer could not handle.
//!
//! `NEEDS_REVIEW_<YYYY-MM-DD>_<original name>` keeps the original name
//! (and therefore its extension) intact and sorts every flagged file
//! together in the folder view.

use chrono::{Local, NaiveDate};

/// Prefix marking a file for human review.
pub const NEEDS_REVIEW_PREFIX: &str = "NEEDS_REVIEW_";

/// Fallback name using today's local date.
pub fn fallback_name(original: &str) -> String {
    fallback_name_on(Local::now().date_naive(), original)
}

/// Fallback name for a given date.
pub fn fallback_name_on(date: NaiveDate, original: &str) -> String {
    format!("{NEEDS_REVIEW_PREFIX}{}_{original}", date.format("%Y-%m-%d"))
}

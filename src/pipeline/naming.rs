//! Turn a candidate name into the final target name.
//!
//! Two passes, both pure:
//!
//! 1. **Sanitise**: the candidate is model output. Strip wrapping quotes or
//!    backticks and squash control characters into spaces. Anything else is
//!    a legal Drive name (names are metadata, so `/` is just a character)
//!    and is kept as written.
//! 2. **Extend**: a name without a `.` gets the original file's extension,
//!    or `jpg` when the original has none. A dotted name is returned as is.
//!
//! Both passes are the identity on a name that is already clean and dotted,
//! so normalising twice gives the same result as normalising once.
//!
//! Fallback names skip the first pass: they are built from the name storage
//! already accepted and only go through [`ensure_extension`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Extension used when neither the candidate nor the original has one.
pub const DEFAULT_EXTENSION: &str = "jpg";

static RE_CONTROL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{Cc}]+").unwrap());

/// Final target name for a file currently called `original`.
///
/// Falls back to `original` itself if sanitising leaves nothing, so the
/// result is never empty.
pub fn normalize(candidate: &str, original: &str) -> String {
    let clean = sanitize(candidate);
    if clean.is_empty() {
        return original.to_string();
    }
    ensure_extension(&clean, original)
}

/// Remove the things a model answer should not carry into a file name.
pub fn sanitize(candidate: &str) -> String {
    let s = candidate
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim();
    RE_CONTROL.replace_all(s, " ").trim().to_string()
}

/// Append an extension when `name` has none.
pub fn ensure_extension(name: &str, original: &str) -> String {
    if name.contains('.') {
        return name.to_string();
    }
    let ext = extension_of(original).unwrap_or(DEFAULT_EXTENSION);
    format!("{name}.{ext}")
}

/// Extension of `name`: the part after the last `.`, provided both sides of
/// the dot are non-empty (`.bashrc` and `scan.` have none).
pub fn extension_of(name: &str) -> Option<&str> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

//! Prompt sent to the vision model for every image.
//!
//! Keeping it here lets tests inspect it directly and makes a prompt change a
//! one-file diff. Callers can override it via
//! [`crate::config::RenameConfig::prompt`].

/// Default analysis prompt.
///
/// The answer is used verbatim (after trimming) as the new file name, so the
/// prompt insists on the bare `DATE_TYPE_SUMMARY` form with nothing around it.
pub const ANALYSIS_PROMPT: &str = "PERFORM OCR on this image. Then, extract the following three pieces of information to create a structured filename:
1. The most accurate date found in the document (DD-MM-YYYY).
2. The type of document (e.g., 'Email', 'Text_Message', 'Medical_Bill').
3. A short, professional summary of the content (5 words max).

Format the output EXACTLY like this: [DATE]_[TYPE]_[SUMMARY]
Output ONLY the filename. Do NOT add a file extension, quotes, commentary or explanations.";

//! Utility functions for string truncation and file system checks.
//!
//! All truncation here counts Unicode scalar values rather than bytes, since
//! most of the text flowing through the pipeline is Japanese.

use crate::http::BoxError;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Ellipsis marker appended to truncated display text.
pub const ELLIPSIS: &str = "...";

/// Truncate display text to a character budget.
///
/// If `s` has more than `max` characters, returns the first `keep` characters
/// followed by [`ELLIPSIS`]; otherwise returns `s` unchanged.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("abcdef", 4, 3), "abc...");
/// assert_eq!(truncate_chars("abcd", 4, 3), "abcd");
/// ```
pub fn truncate_chars(s: &str, max: usize, keep: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` characters with a byte count indicator
/// appended, e.g. `"aaaa…(+490 bytes)"`.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), BoxError> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

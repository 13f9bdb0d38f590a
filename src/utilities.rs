//! Internal utility functions.
//!
//! Helpers for directory resetting, number formatting, and other shared
//! logic that does not belong in any single public module.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Remove `dir` (if present) and recreate it empty.
pub(crate) fn recreate_dir(dir: &Path) -> std::io::Result<()> {
    remove_dir_if_exists(dir)?;
    fs::create_dir_all(dir)
}

/// Remove a directory tree, treating "not found" as success.
pub(crate) fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(error) if error.kind() != ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

/// Remove a single file, treating "not found" as success.
pub(crate) fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

/// Format a number for a command argument, always keeping a decimal point.
///
/// `10.0` becomes `"10.0"` rather than `"10"`, and `0.3` stays `"0.3"`.
pub(crate) fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Format a number for a command argument in its shortest form.
///
/// `0.0` becomes `"0"`.
pub(crate) fn format_compact(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Keep only the last `max_lines` lines of decoder diagnostic output.
pub(crate) fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

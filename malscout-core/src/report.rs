//! Plain-text report artifacts
//!
//! Persists the hit map of a completed run as an analyst-readable log file.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::Result;

const FOOTER: &str = "\n\nIf a WinAPI listed here was used maliciously but no \
description was given, consider contributing information to https://malapi.io.\n";

/// Append the hit map to a timestamped artifact under `reports_dir`,
/// returning the artifact's path.
///
/// Artifacts are keyed by minute; runs landing in the same minute append to
/// the same file, and an artifact from a different run is never overwritten.
pub fn write_report(
    report: &BTreeMap<String, String>,
    sample_name: Option<&str>,
    reports_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir)?;

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M");
    let path = reports_dir.join(format!("{timestamp}_report.log"));

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if let Some(name) = sample_name {
        writeln!(file, "Sample: {name}")?;
    }
    for (api_name, description) in report {
        writeln!(file, "{api_name}\n    \\---> {description}")?;
    }
    file.write_all(FOOTER.as_bytes())?;

    tracing::info!(path = %path.display(), entries = report.len(), "report written");
    Ok(path)
}

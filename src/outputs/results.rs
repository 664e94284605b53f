//! Read-back of the newest run output for the results API.
//!
//! The CSV may still be growing while it is read. Only newline-terminated
//! lines are considered, so a row caught mid-write is ignored until the next
//! read.

use super::OUTPUT_PREFIX;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Header, sample rows and size of the newest CSV.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResultsPreview {
    pub file: String,
    pub header: String,
    pub sample_data: Vec<String>,
    /// Line count including the header.
    pub total_lines: usize,
}

/// Length of the `%Y%m%d_%H%M%S_%3f` stamp in output file names.
const STAMP_LEN: usize = 19;

/// Sort key of an output CSV name: its start stamp, then its collision
/// suffix compared as a number.
fn run_key(name: &str) -> Option<(String, usize)> {
    let stem = name.strip_prefix(OUTPUT_PREFIX)?.strip_suffix(".csv")?;
    let stamp = stem.get(..STAMP_LEN)?;
    let suffix = match &stem[STAMP_LEN..] {
        "" => 0,
        rest => rest.strip_prefix('_')?.parse().ok()?,
    };
    Some((stamp.to_string(), suffix))
}

/// Newest `spine_headless_scraper_*.csv` in `dir`, by the start stamp in its name.
pub async fn latest_csv(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut newest: Option<((String, usize), PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(key) = run_key(&name) else {
            continue;
        };
        if newest.as_ref().is_none_or(|(best, _)| key > *best) {
            newest = Some((key, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Preview of the newest CSV, or `None` if no run has produced one.
#[instrument(level = "debug", skip_all, fields(dir = %dir.display()))]
pub async fn latest_results(dir: &Path, sample: usize) -> std::io::Result<Option<ResultsPreview>> {
    let Some(path) = latest_csv(dir).await? else {
        return Ok(None);
    };

    let bytes = tokio::fs::read(&path).await?;
    let text = String::from_utf8_lossy(&bytes);
    let complete = match text.rfind('\n') {
        Some(end) => &text[..end],
        None => return Ok(None),
    };
    let lines: Vec<&str> = complete.lines().collect();
    let Some(header) = lines.first() else {
        return Ok(None);
    };

    let preview = ResultsPreview {
        file: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        header: header.trim().to_string(),
        sample_data: lines
            .iter()
            .skip(1)
            .take(sample)
            .map(|l| l.trim().to_string())
            .collect(),
        total_lines: lines.len(),
    };
    debug!(file = %preview.file, total_lines = preview.total_lines, "Read results preview");
    Ok(Some(preview))
}

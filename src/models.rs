//! Data models shared by the scraper, the output writer and the HTTP API.
//!
//! - [`Page`]: raw text and links returned by a page source
//! - [`Classification`]: keyword findings for one article
//! - [`ArticleRecord`]: one output row, written once and never mutated
//! - [`RunState`] / [`RunStatus`]: the live state of the current run
//! - [`LogEntry`]: one line of the activity log

use crate::utils::normalize_text;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fetched page as seen by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// The URL that was requested.
    pub url: String,
    /// The document title, possibly empty.
    pub title: String,
    /// Extracted readable text.
    pub content: String,
    /// Absolute URLs of every link on the page.
    pub links: Vec<String>,
}

/// Keyword findings produced by the content classifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub content_length: usize,
    pub spine_procedures: Vec<String>,
    pub financial_mentions: Vec<String>,
    pub category: String,
}

/// One scraped article, as written to CSV and JSON.
///
/// Field order matches the CSV header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    pub website_name: String,
    pub category: String,
    pub content_length: usize,
    /// Comma-joined procedure matches, or empty.
    pub spine_procedures: String,
    /// Comma-joined financial matches, or empty.
    pub financial_mentions: String,
    /// ISO 8601 timestamp.
    pub scraped_at: String,
}

impl ArticleRecord {
    /// Assemble a record from fetch metadata and classifier output.
    pub fn new(page: &Page, website_name: &str, classification: Classification) -> Self {
        let title = match normalize_text(&page.title) {
            t if t.is_empty() => page.url.clone(),
            t => t,
        };
        Self {
            title,
            url: page.url.clone(),
            website_name: website_name.to_string(),
            category: classification.category,
            content_length: classification.content_length,
            spine_procedures: classification.spine_procedures.join(", "),
            financial_mentions: classification.financial_mentions.join(", "),
            scraped_at: Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        }
    }

    /// Procedure terms as a list.
    pub fn procedures(&self) -> impl Iterator<Item = &str> {
        self.spine_procedures
            .split(", ")
            .filter(|s| !s.is_empty())
    }

    pub fn has_financial_mentions(&self) -> bool {
        !self.financial_mentions.is_empty()
    }
}

/// Lifecycle state of the scrape job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    /// Stop was requested; the worker has not reached a checkpoint yet.
    Stopping,
    Completed,
    Stopped,
    #[serde(rename = "error")]
    Errored,
}

impl RunState {
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Running | RunState::Stopping)
    }
}

/// Snapshot-able status of the current (or last) run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct RunStatus {
    pub state: RunState,
    pub is_running: bool,
    /// 0 to 100, non-decreasing within a run.
    pub progress: u8,
    pub current_website: Option<String>,
    pub articles_scraped: usize,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
    pub error: Option<String>,
}

impl RunStatus {
    /// Fresh status for a run starting now.
    pub fn started(now: DateTime<Local>) -> Self {
        Self {
            state: RunState::Running,
            is_running: true,
            progress: 0,
            current_website: None,
            articles_scraped: 0,
            start_time: Some(now),
            end_time: None,
            error: None,
        }
    }
}

/// A timestamped activity log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// `HH:MM:SS`, local time.
    pub timestamp: String,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}

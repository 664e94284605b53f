//! Error types shared across the scraper.
//!
//! Failures are split by who recovers from them:
//! - [`FetchError`]: a single page could not be fetched; the run skips it.
//! - [`OutputError`]: the record writer could not touch its files.
//! - [`OrchestratorError`]: surfaced to API callers, or ends a run as
//!   errored when [`OrchestratorError::is_fatal`].
//! - [`ConfigError`]: aborts startup.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// A page fetch that failed, possibly after several attempts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to fetch {url}: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while writing run output files.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("output I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by the job orchestrator to its callers.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Scraping already in progress")]
    AlreadyRunning,

    #[error("No results found")]
    NoResultsYet,

    /// The page source could not be prepared.
    #[error("Page fetch capability unavailable: {}", .0.reason)]
    Unavailable(FetchError),

    /// The run's output files could not be opened, written or closed.
    #[error("Output files failed: {0}")]
    Output(#[from] OutputError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Whether this error ends a run rather than rejecting a request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Unavailable(_) | OrchestratorError::Output(_)
        )
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = match &self {
            OrchestratorError::AlreadyRunning => StatusCode::CONFLICT,
            OrchestratorError::NoResultsYet => StatusCode::NOT_FOUND,
            OrchestratorError::Unavailable(_)
            | OrchestratorError::Output(_)
            | OrchestratorError::Io(_) => {
                error!(error = %self, fatal = self.is_fatal(), "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

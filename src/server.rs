//! HTTP API over the orchestrator.
//!
//! | Endpoint | Method | Response |
//! |----------|--------|----------|
//! | `/api/scrape` | POST | `{message, status}`, 409 if a run is active |
//! | `/api/status` | GET | `{status, logs}` |
//! | `/api/logs` | GET | `{logs}` |
//! | `/api/results` | GET | `{file, header, sample_data, total_lines}`, 404 before any output |
//! | `/api/stop` | POST | `{message}` |
//!
//! Clients poll; there is no push channel.

use crate::errors::OrchestratorError;
use crate::orchestrator::{Orchestrator, StatusSnapshot, StopOutcome};
use crate::outputs::ResultsPreview;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/api/scrape", post(start_scrape))
        .route("/api/status", get(status))
        .route("/api/logs", get(logs))
        .route("/api/results", get(results))
        .route("/api/stop", post(stop))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

async fn start_scrape(
    State(orchestrator): State<Orchestrator>,
) -> Result<Json<StartResponse>, OrchestratorError> {
    orchestrator.start()?;
    info!("Scrape started via API");
    Ok(Json(StartResponse {
        message: "Scraping started".to_string(),
        status: "started".to_string(),
    }))
}

async fn status(State(orchestrator): State<Orchestrator>) -> Json<StatusSnapshot> {
    Json(orchestrator.status())
}

async fn logs(State(orchestrator): State<Orchestrator>) -> Json<LogsResponse> {
    Json(LogsResponse {
        logs: orchestrator.logs(),
    })
}

async fn results(
    State(orchestrator): State<Orchestrator>,
) -> Result<Json<ResultsPreview>, OrchestratorError> {
    Ok(Json(orchestrator.results().await?))
}

async fn stop(State(orchestrator): State<Orchestrator>) -> Json<MessageResponse> {
    let message = match orchestrator.stop() {
        StopOutcome::Requested => "Stop requested; scraping will halt after the current step",
        StopOutcome::NotRunning => "No active scraping to stop",
    };
    Json(MessageResponse {
        message: message.to_string(),
    })
}

//! # Spine Scraper
//!
//! A background scraper for spine industry news sites. A single scrape job
//! visits each configured site, fetches its candidate articles one at a time,
//! classifies their text against procedure and financial vocabularies, and
//! appends the results to per-run CSV and JSON files. A small HTTP API starts
//! and stops the job and exposes its live status, activity log and results.
//!
//! ## Usage
//!
//! ```sh
//! spine_scraper --config scraper.yaml --bind 127.0.0.1:5000
//! curl -X POST localhost:5000/api/scrape
//! curl localhost:5000/api/status
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: [`scrapers`] turns URLs into page text, with retry and backoff
//! 2. **Classification**: [`classifier`] matches vocabulary terms in the text
//! 3. **Output**: [`outputs`] appends records to CSV/JSON and reads them back
//! 4. **Orchestration**: [`orchestrator`] runs the site loop and owns run state
//! 5. **API**: [`server`] maps HTTP endpoints onto the orchestrator

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod activity_log;
mod classifier;
mod cli;
mod config;
mod errors;
mod models;
mod orchestrator;
mod outputs;
mod scrapers;
mod server;
mod utils;

use cli::Cli;
use config::ScraperConfig;
use orchestrator::Orchestrator;
use scrapers::HttpPageSource;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "spine_scraper starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, bind = %args.bind, "Parsed CLI arguments");

    let mut config = ScraperConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    // Early check: fail at startup rather than on the first run.
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    info!(
        sites = config.sites.len(),
        max_articles_per_site = config.max_articles_per_site,
        retry_attempts = config.retry.max_attempts,
        output_dir = %config.output_dir.display(),
        "Configuration ready"
    );

    let source = Arc::new(HttpPageSource::new(config.retry.attempt_timeout()));
    let orchestrator = Orchestrator::new(config, source)?;
    let app = server::router(orchestrator.clone());

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(addr = %args.bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped; waiting for scrape worker");
    orchestrator.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

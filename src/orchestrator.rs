//! The scrape job orchestrator.
//!
//! [`Orchestrator`] owns at most one in-flight run. `start` flips the shared
//! [`RunStatus`] to running under its lock and spawns the site loop on the
//! tokio runtime; API handlers read snapshots of the status and the
//! [`ActivityLog`] concurrently. Neither lock is ever held across an await.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start──▶ Running ──stop──▶ Stopping ──checkpoint──▶ Stopped
//!                    │                  │
//!                    ├──all sites done──┴──▶ Completed
//!                    └──fatal error─────────▶ Errored
//! ```
//!
//! Any terminal state may be restarted. Cancellation is cooperative: the
//! loop checks the run's cancellation token before each site and before and
//! after each article, so an in-flight fetch always finishes (or times out)
//! and its record is written before the run ends.

use crate::activity_log::ActivityLog;
use crate::classifier::Classifier;
use crate::config::{Politeness, ScraperConfig, SiteDescriptor};
use crate::errors::{ConfigError, OrchestratorError};
use crate::models::{ArticleRecord, RunState, RunStatus};
use crate::outputs::{RecordWriter, ResultsPreview, latest_results};
use crate::scrapers::{PageSource, SiteFetcher};
use crate::utils::truncate_for_log;
use chrono::{Local, Utc};
use rand::{Rng, rng};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Status plus the tail of the activity log, as served by the status API.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: RunStatus,
    pub logs: Vec<String>,
}

/// What a call to [`Orchestrator::stop`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A run was active; it will end at its next checkpoint.
    Requested,
    /// Nothing was running.
    NotRunning,
}

/// How the site loop ended when no fatal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    Completed,
    Stopped,
}

#[derive(Default)]
struct RunControl {
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
}

struct Inner {
    config: ScraperConfig,
    fetcher: SiteFetcher,
    classifier: Classifier,
    status: Mutex<RunStatus>,
    log: ActivityLog,
    control: Mutex<RunControl>,
}

/// Cheaply cloneable handle to the single scrape job.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(config: ScraperConfig, source: Arc<dyn PageSource>) -> Result<Self, ConfigError> {
        let classifier = Classifier::new(&config.vocabularies)?;
        let fetcher = SiteFetcher::new(
            source,
            config.retry.clone(),
            config.links.clone(),
            config.max_articles_per_site,
            config.min_content_length,
        );
        let log = ActivityLog::new(config.log_capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                classifier,
                status: Mutex::new(RunStatus::default()),
                log,
                control: Mutex::new(RunControl::default()),
            }),
        })
    }

    /// Begin a run in the background and return immediately.
    ///
    /// Fails with [`OrchestratorError::AlreadyRunning`] while a run is
    /// running or stopping; the active run's status is left untouched.
    pub fn start(&self) -> Result<(), OrchestratorError> {
        // Lock order is always status, then control.
        let mut status = self.inner.lock_status();
        if status.state.is_active() {
            return Err(OrchestratorError::AlreadyRunning);
        }
        *status = RunStatus::started(Local::now());

        let cancel = CancellationToken::new();
        let mut control = self.inner.lock_control();
        control.cancel = Some(cancel.clone());
        let inner = Arc::clone(&self.inner);
        control.worker = Some(tokio::spawn(async move {
            inner.run(cancel).await;
        }));
        info!("Scrape run started");
        Ok(())
    }

    /// Ask the active run to stop at its next checkpoint. Safe to call in
    /// any state and any number of times.
    pub fn stop(&self) -> StopOutcome {
        {
            let mut status = self.inner.lock_status();
            if !status.is_running {
                return StopOutcome::NotRunning;
            }
            if status.state == RunState::Running {
                status.state = RunState::Stopping;
            }
            // Logged before cancelling so it precedes the worker's final line.
            self.inner.log.push("Stop requested; finishing current step...");
            if let Some(cancel) = &self.inner.lock_control().cancel {
                cancel.cancel();
            }
        }
        StopOutcome::Requested
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.inner.lock_status().clone(),
            logs: self.inner.log.recent_lines(self.inner.config.status_log_lines),
        }
    }

    #[cfg(test)]
    pub fn run_status(&self) -> RunStatus {
        self.inner.lock_status().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.inner.log.recent_lines(self.inner.config.logs_endpoint_lines)
    }

    /// Header, sample rows and line count of the newest output CSV.
    pub async fn results(&self) -> Result<ResultsPreview, OrchestratorError> {
        latest_results(&self.inner.config.output_dir, self.inner.config.results_sample_lines)
            .await?
            .ok_or(OrchestratorError::NoResultsYet)
    }

    /// Cancel any active run and wait for its worker to finish, so output
    /// files are closed properly.
    pub async fn shutdown(&self) {
        let worker = {
            let mut control = self.inner.lock_control();
            if let Some(cancel) = &control.cancel {
                cancel.cancel();
            }
            control.worker.take()
        };
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Scrape worker ended abnormally");
            }
        }
    }

    /// Wait for the current worker, if any, without cancelling it.
    #[cfg(test)]
    pub async fn wait(&self) {
        let worker = self.inner.lock_control().worker.take();
        if let Some(worker) = worker {
            worker.await.unwrap();
        }
    }
}

impl Inner {
    // Status updates are plain field writes; a poisoned lock still holds a
    // usable value.
    fn lock_status(&self) -> MutexGuard<'_, RunStatus> {
        self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_control(&self) -> MutexGuard<'_, RunControl> {
        self.control.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn update_status(&self, f: impl FnOnce(&mut RunStatus)) {
        f(&mut self.lock_status());
    }

    /// Raise progress to `value`, never lowering it.
    fn raise_progress(&self, value: u8) {
        self.update_status(|s| s.progress = s.progress.max(value.min(100)));
    }

    #[instrument(level = "info", skip_all)]
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let result = self.site_loop(&cancel).await;
        let end_time = Some(Local::now());

        match result {
            Ok(LoopEnd::Completed) => {
                let scraped = {
                    let mut s = self.lock_status();
                    s.state = RunState::Completed;
                    s.is_running = false;
                    s.progress = 100;
                    s.current_website = None;
                    s.end_time = end_time;
                    s.articles_scraped
                };
                self.log
                    .push(format!("Scraping completed. {scraped} articles scraped."));
            }
            Ok(LoopEnd::Stopped) => {
                let scraped = {
                    let mut s = self.lock_status();
                    s.state = RunState::Stopped;
                    s.is_running = false;
                    s.current_website = None;
                    s.end_time = end_time;
                    s.articles_scraped
                };
                self.log
                    .push(format!("Scraping stopped. {scraped} articles scraped."));
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, fatal = e.is_fatal(), "Scrape run failed");
                self.update_status(|s| {
                    s.state = RunState::Errored;
                    s.is_running = false;
                    s.current_website = None;
                    s.end_time = end_time;
                    s.error = Some(message.clone());
                });
                self.log.push(format!("Error: {message}"));
            }
        }
    }

    /// Visit every configured site in order. Any `Err` ends the run.
    async fn site_loop(&self, cancel: &CancellationToken) -> Result<LoopEnd, OrchestratorError> {
        self.log.push("Starting spine industry scraper...");
        self.fetcher
            .prepare()
            .await
            .map_err(OrchestratorError::Unavailable)?;

        let started = self.lock_status().start_time.unwrap_or_else(Local::now);
        let mut writer =
            RecordWriter::open(&self.config.output_dir, started.with_timezone(&Utc)).await?;
        self.log
            .push(format!("Writing results to {}", writer.csv_path().display()));

        let outcome = self.visit_sites(cancel, &mut writer).await;

        // Close on every path so the JSON array is terminated.
        let closed = writer.close().await;
        let end = outcome?;
        let output = closed?;
        self.log.push(format!(
            "Saved {} records to {} and {}",
            output.records,
            output.csv_path.display(),
            output.json_path.display()
        ));
        if let Some(summary) = &output.summary_path {
            self.log
                .push(format!("Summary report: {}", summary.display()));
        }
        Ok(end)
    }

    async fn visit_sites(
        &self,
        cancel: &CancellationToken,
        writer: &mut RecordWriter,
    ) -> Result<LoopEnd, OrchestratorError> {
        let sites = &self.config.sites;
        let total_sites = sites.len();

        for (site_idx, site) in sites.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(LoopEnd::Stopped);
            }
            if site_idx > 0 {
                pause(cancel, Duration::from_millis(self.config.politeness.site_delay_ms)).await;
                if cancel.is_cancelled() {
                    return Ok(LoopEnd::Stopped);
                }
            }

            self.update_status(|s| s.current_website = Some(site.name.clone()));
            self.log.push(format!("Scraping {}...", site.name));

            if self.scrape_site(site, site_idx, total_sites, cancel, writer).await? == LoopEnd::Stopped {
                return Ok(LoopEnd::Stopped);
            }
            self.raise_progress(progress_for(total_sites, site_idx + 1, 0, 0));
        }
        Ok(LoopEnd::Completed)
    }

    async fn scrape_site(
        &self,
        site: &SiteDescriptor,
        site_idx: usize,
        total_sites: usize,
        cancel: &CancellationToken,
        writer: &mut RecordWriter,
    ) -> Result<LoopEnd, OrchestratorError> {
        let candidates = match self.fetcher.fetch_candidates(site).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(site = %site.name, error = %e, "Skipping site");
                self.log
                    .push(format!("Could not load {}: {}", site.name, e.reason));
                return Ok(LoopEnd::Completed);
            }
        };
        self.log.push(format!(
            "Found {} article links on {}",
            candidates.len(),
            site.name
        ));

        let mut site_articles = 0usize;
        let mut site_financial = 0usize;
        let mut site_procedures = BTreeSet::new();

        for (i, url) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(LoopEnd::Stopped);
            }
            if i > 0 {
                pause(cancel, article_delay(&self.config.politeness)).await;
                if cancel.is_cancelled() {
                    return Ok(LoopEnd::Stopped);
                }
            }

            match self.fetcher.fetch_article_text(url).await {
                Ok(page) => {
                    let classification = self.classifier.classify(&page.content, &site.category_label);
                    let record = ArticleRecord::new(&page, &site.name, classification);
                    writer.append(&record).await?;

                    site_articles += 1;
                    if record.has_financial_mentions() {
                        site_financial += 1;
                    }
                    site_procedures.extend(record.procedures().map(str::to_string));

                    self.update_status(|s| s.articles_scraped += 1);
                    self.log
                        .push(format!("Scraped: {}", truncate_for_log(&record.title, 120)));
                }
                Err(e) => {
                    warn!(%url, error = %e, "Skipping article");
                    self.log.push(format!("Skipped {url}: {}", e.reason));
                }
            }
            self.raise_progress(progress_for(total_sites, site_idx, i + 1, candidates.len()));
            if cancel.is_cancelled() {
                return Ok(LoopEnd::Stopped);
            }
        }

        self.log.push(format!(
            "{}: {} articles, {} procedures, {} with financial mentions",
            site.name,
            site_articles,
            site_procedures.len(),
            site_financial
        ));
        Ok(LoopEnd::Completed)
    }
}

/// `floor(100 * (sites_done + articles_done / articles_total) / total_sites)`.
pub fn progress_for(
    total_sites: usize,
    sites_done: usize,
    articles_done: usize,
    articles_total: usize,
) -> u8 {
    if total_sites == 0 {
        return 100;
    }
    let pct = if articles_total == 0 {
        100 * sites_done / total_sites
    } else {
        100 * (sites_done * articles_total + articles_done.min(articles_total))
            / (total_sites * articles_total)
    };
    pct.min(100) as u8
}

fn article_delay(politeness: &Politeness) -> Duration {
    let (min, max) = (politeness.article_delay_min_ms, politeness.article_delay_max_ms);
    let ms = if max > min {
        rng().random_range(min..=max)
    } else {
        min
    };
    Duration::from_millis(ms)
}

/// Sleep for `delay`, returning early if the run is cancelled.
async fn pause(cancel: &CancellationToken, delay: Duration) {
    if delay.is_zero() {
        return;
    }
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

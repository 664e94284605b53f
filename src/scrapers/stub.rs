//! Scripted page source for tests.

use super::PageSource;
use crate::errors::FetchError;
use crate::models::Page;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Shared record of every URL requested from a [`StubPageSource`].
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, url: &str) {
        self.0.lock().unwrap().push(url.to_string());
    }

    pub fn count(&self, url: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Holds one URL's fetch open until released.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct StubPageSource {
    pages: HashMap<String, Page>,
    failures: Mutex<HashMap<String, usize>>,
    hanging: HashSet<String>,
    gates: HashMap<String, Gate>,
    prepare_error: Option<String>,
    calls: CallLog,
}

impl StubPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A homepage at `base_url` linking to `articles` article pages, each
    /// with enough text to pass the quality check.
    pub fn with_site(mut self, base_url: &str, articles: usize) -> Self {
        let base = base_url.trim_end_matches('/');
        let links: Vec<String> = (1..=articles)
            .map(|i| format!("{base}/news/article-{i}"))
            .collect();
        for (i, link) in links.iter().enumerate() {
            let n = i + 1;
            self.pages.insert(
                link.clone(),
                Page {
                    url: link.clone(),
                    title: format!("Article {n}"),
                    content: format!(
                        "Article {n} reports that lumbar fusion volumes rose while \
                         revenue reached $12 million for the quarter."
                    ),
                    links: vec![],
                },
            );
        }
        self.pages.insert(
            base_url.to_string(),
            Page {
                url: base_url.to_string(),
                title: "Home".to_string(),
                content: "Homepage".to_string(),
                links,
            },
        );
        self
    }

    pub fn with_page(mut self, url: &str, title: &str, content: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Page {
                url: url.to_string(),
                title: title.to_string(),
                content: content.to_string(),
                links: vec![],
            },
        );
        self
    }

    /// Fail the next `times` fetches of `url`.
    pub fn failing(self, url: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), times);
        self
    }

    /// Never answer for `url`.
    pub fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    /// Block fetches of `url` until the returned gate is released.
    pub fn gated(mut self, url: &str) -> (Self, Gate) {
        let gate = Gate::default();
        self.gates.insert(url.to_string(), gate.clone());
        (self, gate)
    }

    pub fn failing_prepare(mut self, reason: &str) -> Self {
        self.prepare_error = Some(reason.to_string());
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl PageSource for StubPageSource {
    async fn prepare(&self) -> Result<(), FetchError> {
        match &self.prepare_error {
            Some(reason) => Err(FetchError::new("<prepare>", reason.clone())),
            None => Ok(()),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        self.calls.push(url);

        if let Some(gate) = self.gates.get(url) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.hanging.contains(url) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::new(url, "connection reset"));
                }
            }
        }

        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::new(url, "404 Not Found"))
    }
}

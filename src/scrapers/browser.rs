//! HTTP page source with browser-like headers and HTML text extraction.
//!
//! Pages are downloaded with `reqwest` and parsed with `scraper`. Readable
//! text is found with a cascade of strategies, stopping at the first that
//! yields enough text:
//!
//! 1. The first match of a list of common content selectors (`article`,
//!    `.entry-content`, `main`, ...) with more than 100 characters
//! 2. The longest `content`/`post`/`article` container
//! 3. Body lines longer than 20 characters that don't look like navigation
//! 4. The first 1000 characters of the body
//!
//! Every `a[href]` is resolved against the page URL and returned as a link.

use super::PageSource;
use crate::errors::FetchError;
use crate::models::Page;
use async_trait::async_trait;
use once_cell::sync::{Lazy, OnceCell};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

const MIN_SELECTOR_CONTENT: usize = 100;
const MIN_MEANINGFUL_LINE: usize = 20;
const FALLBACK_BODY_CHARS: usize = 1000;

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".content",
    ".post-content",
    ".entry-content",
    ".main-content",
    "main",
    ".article-body",
    ".post",
    ".single-content",
    ".the-content",
    ".entry",
    "[class*=\"content\"]",
    "[id*=\"content\"]",
];

const BOILERPLATE_WORDS: &[&str] = &[
    "menu",
    "navigation",
    "footer",
    "copyright",
    "©",
    "home",
    "about",
    "contact",
    "privacy",
    "terms",
    "login",
    "register",
    "search",
    "skip to",
];

fn selector(css: &str) -> Selector {
    // Only called with the literal selectors above.
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css}: {e}"))
}

static CONTENT: Lazy<Vec<Selector>> = Lazy::new(|| CONTENT_SELECTORS.iter().map(|s| selector(s)).collect());
static CONTAINERS: Lazy<Selector> = Lazy::new(|| {
    selector(
        "div[class*=\"content\"], div[id*=\"content\"], div[class*=\"post\"], div[class*=\"article\"]",
    )
});
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static BODY: Lazy<Selector> = Lazy::new(|| selector("body"));
static LINKS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

/// Production [`PageSource`] backed by a shared `reqwest` client.
///
/// The client is built on [`PageSource::prepare`], so a broken TLS backend
/// or proxy setting surfaces as a failed run rather than a failed startup.
#[derive(Debug)]
pub struct HttpPageSource {
    request_timeout: Duration,
    client: OnceCell<reqwest::Client>,
}

impl HttpPageSource {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::Client, FetchError> {
        self.client.get_or_try_init(|| {
            reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(self.request_timeout)
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .map_err(|e| FetchError::new("<client>", format!("failed to build HTTP client: {e}")))
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn prepare(&self) -> Result<(), FetchError> {
        self.client()?;
        info!("HTTP page source ready");
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        let client = self.client()?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(url, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::new(url, format!("failed to read body: {e}")))?;

        let page = extract_page(url, &body);
        debug!(
            bytes = body.len(),
            content_chars = page.content.chars().count(),
            links = page.links.len(),
            "Parsed page"
        );
        Ok(page)
    }
}

/// Parse an HTML document into a [`Page`].
pub fn extract_page(url: &str, html: &str) -> Page {
    let document = Html::parse_document(html);
    let title = document
        .select(&TITLE)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    Page {
        url: url.to_string(),
        title,
        content: extract_content(&document),
        links: extract_links(url, &document),
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_content(document: &Html) -> String {
    let mut content = String::new();

    for sel in CONTENT.iter() {
        if let Some(el) = document.select(sel).next() {
            content = element_text(&el);
            if content.chars().count() > MIN_SELECTOR_CONTENT {
                return content;
            }
        }
    }

    for el in document.select(&CONTAINERS) {
        let text = element_text(&el);
        let len = text.chars().count();
        if len > MIN_SELECTOR_CONTENT && len > content.chars().count() {
            content = text;
        }
    }
    if content.chars().count() >= MIN_SELECTOR_CONTENT {
        return content;
    }

    let body_text = document
        .select(&BODY)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    let meaningful = body_text
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_MEANINGFUL_LINE)
        .filter(|line| {
            let lower = line.to_lowercase();
            !BOILERPLATE_WORDS.iter().any(|w| lower.contains(w))
        })
        .collect::<Vec<_>>()
        .join("\n");

    if meaningful.chars().count() >= 50 {
        return meaningful;
    }

    body_text.chars().take(FALLBACK_BODY_CHARS).collect()
}

fn extract_links(url: &str, document: &Html) -> Vec<String> {
    let Ok(base) = Url::parse(url) else {
        return Vec::new();
    };
    document
        .select(&LINKS)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_HTML: &str = r#"
        <html>
          <head><title>Robotic Navigation Gains Ground</title></head>
          <body>
            <nav><a href="/">Home</a> <a href="/about">About</a></nav>
            <article>
              <h1>Robotic Navigation Gains Ground</h1>
              <p>Hospitals performing lumbar fusion report that robotic surgery
                 platforms shortened operating times across the quarter.</p>
              <p>The vendor posted $30 million in revenue.</p>
            </article>
            <a href="/news/next-story">Next</a>
            <a href="https://other.example/2025/x">Elsewhere</a>
            <a href="mailto:desk@acme.example">Mail</a>
          </body>
        </html>
    "#;

    #[test]
    fn test_extract_page_prefers_article_element() {
        let page = extract_page("https://acme.example/news/robotics", ARTICLE_HTML);
        assert_eq!(page.title, "Robotic Navigation Gains Ground");
        assert!(page.content.contains("lumbar fusion"));
        assert!(page.content.contains("$30 million"));
        assert!(!page.content.contains("About"));
    }

    #[test]
    fn test_extract_page_resolves_links() {
        let page = extract_page("https://acme.example/news/robotics", ARTICLE_HTML);
        assert!(page.links.contains(&"https://acme.example/".to_string()));
        assert!(page.links.contains(&"https://acme.example/news/next-story".to_string()));
        assert!(page.links.contains(&"https://other.example/2025/x".to_string()));
        assert!(!page.links.iter().any(|l| l.starts_with("mailto:")));
    }

    #[test]
    fn test_extract_content_falls_back_to_meaningful_lines() {
        let html = r#"
            <html><body>
              <div>Menu</div>
              <p>Spine device makers expanded their cervical portfolios this year.</p>
              <p>Analysts expect continued growth in minimally invasive techniques.</p>
              <div>Copyright 2025 Acme Media, all rights reserved worldwide</div>
            </body></html>
        "#;
        let page = extract_page("https://acme.example/", html);
        assert!(page.content.contains("cervical portfolios"));
        assert!(page.content.contains("minimally invasive"));
        assert!(!page.content.contains("Copyright"));
        assert!(!page.content.contains("Menu"));
    }

    #[test]
    fn test_extract_content_last_resort_is_truncated_body() {
        let html = format!("<html><body>{}</body></html>", "<p>tiny</p>".repeat(300));
        let page = extract_page("https://acme.example/", &html);
        assert_eq!(page.content.chars().count(), FALLBACK_BODY_CHARS);
        assert!(page.content.starts_with("tiny\ntiny"));
    }

    #[test]
    fn test_extract_page_without_title() {
        let page = extract_page("not a url", "<html><body><p>hi</p></body></html>");
        assert_eq!(page.title, "");
        assert!(page.links.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_builds_client() {
        let source = HttpPageSource::new(Duration::from_secs(5));
        assert!(source.prepare().await.is_ok());
        assert!(source.client.get().is_some());
    }
}

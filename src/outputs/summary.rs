//! Plain-text summary report for a finished run.

use crate::models::ArticleRecord;
use chrono::{DateTime, Local};
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt::Write;

/// Running totals over the records of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryStats {
    pub total_articles: usize,
    pub total_content: usize,
    pub financial_articles: usize,
    pub by_website: HashMap<String, usize>,
    pub procedures: HashMap<String, usize>,
}

impl SummaryStats {
    pub fn observe(&mut self, record: &ArticleRecord) {
        self.total_articles += 1;
        self.total_content += record.content_length;
        if record.has_financial_mentions() {
            self.financial_articles += 1;
        }
        *self
            .by_website
            .entry(record.website_name.clone())
            .or_default() += 1;
        for procedure in record.procedures() {
            *self.procedures.entry(procedure.to_string()).or_default() += 1;
        }
    }

    pub fn average_content(&self) -> usize {
        if self.total_articles == 0 {
            0
        } else {
            self.total_content / self.total_articles
        }
    }

    /// Procedures by mention count, most mentioned first; ties by name.
    pub fn top_procedures(&self, n: usize) -> Vec<(&str, usize)> {
        self.procedures
            .iter()
            .map(|(p, c)| (p.as_str(), *c))
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
            .take(n)
            .collect()
    }

    pub fn render(&self, generated_at: DateTime<Local>) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        // Writing to a String cannot fail.
        let _ = writeln!(out, "HEADLESS BROWSER SPINE INDUSTRY SCRAPING REPORT");
        let _ = writeln!(out, "{rule}\n");
        let _ = writeln!(out, "Scraping Date: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Total Articles: {}\n", self.total_articles);

        let _ = writeln!(out, "ARTICLES BY WEBSITE:");
        for (site, count) in self
            .by_website
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        {
            let _ = writeln!(out, "  {site}: {count} articles");
        }

        let _ = writeln!(out, "\nKEY INSIGHTS:");
        let _ = writeln!(out, "  • Total articles: {}", self.total_articles);
        let _ = writeln!(out, "  • Financial mentions: {} articles", self.financial_articles);
        let _ = writeln!(out, "  • Unique procedures: {}", self.procedures.len());
        let _ = writeln!(out, "  • Average content: {} characters", self.average_content());

        let top = self.top_procedures(10);
        if !top.is_empty() {
            let _ = writeln!(out, "\nTOP PROCEDURES BY MENTIONS:");
            for (i, (procedure, mentions)) in top.iter().enumerate() {
                let _ = writeln!(out, "  {:2}. {procedure}: {mentions} mentions", i + 1);
            }
        }
        out
    }
}

//! Append-only CSV and JSON output for one run.
//!
//! Both files are created when the run starts and flushed after every
//! record, so a reader polling the CSV sees complete rows as they land. The
//! JSON file is an array whose closing bracket is written by
//! [`RecordWriter::close`].

use super::summary::SummaryStats;
use super::{CSV_HEADER, OUTPUT_PREFIX};
use crate::errors::OutputError;
use crate::models::ArticleRecord;
use chrono::{DateTime, Local, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// Paths and totals of a closed run output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    pub summary_path: Option<PathBuf>,
    pub records: usize,
}

/// Owns the output file handles of a single run.
#[derive(Debug)]
pub struct RecordWriter {
    stamp: String,
    dir: PathBuf,
    csv_path: PathBuf,
    json_path: PathBuf,
    csv: File,
    json: File,
    records: usize,
    stats: SummaryStats,
}

impl RecordWriter {
    /// Create the CSV (with header) and JSON (with an opening bracket) for a
    /// run that started at `started`. The stamp is UTC so names sort by start
    /// time across clock changes. Existing files are never overwritten; a
    /// numeric suffix is added instead.
    #[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
    pub async fn open(dir: &Path, started: DateTime<Utc>) -> Result<Self, OutputError> {
        tokio::fs::create_dir_all(dir).await?;

        let base = started.format("%Y%m%d_%H%M%S_%3f").to_string();
        let mut suffix = 0usize;
        let (stamp, csv_path, json_path, csv) = loop {
            let stamp = if suffix == 0 {
                base.clone()
            } else {
                format!("{base}_{suffix}")
            };
            let csv_path = dir.join(format!("{OUTPUT_PREFIX}{stamp}.csv"));
            let json_path = dir.join(format!("{OUTPUT_PREFIX}{stamp}.json"));
            if tokio::fs::try_exists(&json_path).await? {
                suffix += 1;
                continue;
            }
            match create_new(&csv_path).await {
                Ok(file) => break (stamp, csv_path, json_path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        };
        let json = create_new(&json_path).await?;

        let mut writer = Self {
            stamp,
            dir: dir.to_path_buf(),
            csv_path,
            json_path,
            csv,
            json,
            records: 0,
            stats: SummaryStats::default(),
        };
        writer.csv.write_all(format!("{CSV_HEADER}\n").as_bytes()).await?;
        writer.csv.flush().await?;
        writer.json.write_all(b"[\n").await?;
        writer.json.flush().await?;

        info!(csv = %writer.csv_path.display(), json = %writer.json_path.display(), "Opened run output");
        Ok(writer)
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Write one record to both files and flush them.
    pub async fn append(&mut self, record: &ArticleRecord) -> Result<(), OutputError> {
        let element = serde_json::to_string(record)?;
        let separator = if self.records == 0 { "" } else { ",\n" };
        self.json
            .write_all(format!("{separator}  {element}").as_bytes())
            .await?;
        self.json.flush().await?;

        self.csv.write_all(csv_row(record).as_bytes()).await?;
        self.csv.flush().await?;

        self.records += 1;
        self.stats.observe(record);
        Ok(())
    }

    /// Close the JSON array, write the summary report if anything was
    /// recorded, and release the files.
    #[instrument(level = "info", skip_all, fields(records = self.records))]
    pub async fn close(mut self) -> Result<RunOutput, OutputError> {
        let tail = if self.records == 0 { "]\n" } else { "\n]\n" };
        self.json.write_all(tail.as_bytes()).await?;
        self.json.flush().await?;
        self.csv.flush().await?;

        let summary_path = if self.records > 0 {
            let path = self
                .dir
                .join(format!("headless_scraper_summary_{}.txt", self.stamp));
            tokio::fs::write(&path, self.stats.render(Local::now())).await?;
            Some(path)
        } else {
            None
        };

        info!(csv = %self.csv_path.display(), "Closed run output");
        Ok(RunOutput {
            csv_path: self.csv_path,
            json_path: self.json_path,
            summary_path,
            records: self.records,
        })
    }
}

async fn create_new(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

/// One CSV line, newline-terminated, in header order.
pub fn csv_row(record: &ArticleRecord) -> String {
    let content_length = record.content_length.to_string();
    let fields = [
        record.title.as_str(),
        record.url.as_str(),
        record.website_name.as_str(),
        record.category.as_str(),
        content_length.as_str(),
        record.spine_procedures.as_str(),
        record.financial_mentions.as_str(),
        record.scraped_at.as_str(),
    ];
    let mut line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

/// Quote a field if it contains a separator, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(title: &str, procedures: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            url: format!("https://acme.example/news/{}", title.len()),
            website_name: "Acme Spine News".to_string(),
            category: "industry_news".to_string(),
            content_length: 1234,
            spine_procedures: procedures.to_string(),
            financial_mentions: String::new(),
            scraped_at: "2025-05-06T14:30:00+00:00".to_string(),
        }
    }

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("fusion, lumbar"), "\"fusion, lumbar\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field(""), "");
    }

    #[test]
    fn test_csv_row_order() {
        let row = csv_row(&record("Title", "fusion, lumbar"));
        assert_eq!(
            row,
            "Title,https://acme.example/news/5,Acme Spine News,industry_news,1234,\"fusion, lumbar\",,2025-05-06T14:30:00+00:00\n"
        );
    }

    #[tokio::test]
    async fn test_records_land_in_both_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordWriter::open(dir.path(), started()).await.unwrap();
        let records = vec![record("First", "fusion"), record("Second, with comma", "")];
        for r in &records {
            writer.append(r).await.unwrap();
        }

        // Visible before close.
        let csv_so_far = std::fs::read_to_string(writer.csv_path()).unwrap();
        assert_eq!(csv_so_far.lines().count(), 3);

        let output = writer.close().await.unwrap();
        assert_eq!(output.records, 2);

        let csv = std::fs::read_to_string(&output.csv_path).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(format!("{}\n", lines[1]), csv_row(&records[0]));
        assert_eq!(format!("{}\n", lines[2]), csv_row(&records[1]));

        let json = std::fs::read_to_string(&output.json_path).unwrap();
        let parsed: Vec<ArticleRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, records);

        let summary = std::fs::read_to_string(output.summary_path.unwrap()).unwrap();
        assert!(summary.contains("Total Articles: 2"));
    }

    #[tokio::test]
    async fn test_empty_run_produces_valid_json_and_no_summary() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RecordWriter::open(dir.path(), started()).await.unwrap();
        let output = writer.close().await.unwrap();
        let json = std::fs::read_to_string(&output.json_path).unwrap();
        let parsed: Vec<ArticleRecord> = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_empty());
        assert!(output.summary_path.is_none());
    }

    #[tokio::test]
    async fn test_same_start_time_never_collides() {
        let dir = tempfile::tempdir().unwrap();
        let a = RecordWriter::open(dir.path(), started()).await.unwrap();
        let b = RecordWriter::open(dir.path(), started()).await.unwrap();
        assert_ne!(a.csv_path(), b.csv_path());
        assert!(
            b.csv_path()
                .to_string_lossy()
                .ends_with("spine_headless_scraper_20250506_143000_000_1.csv")
        );
    }
}

//! Output files for a scrape run.
//!
//! # Submodules
//!
//! - [`writer`]: appends [`ArticleRecord`](crate::models::ArticleRecord)s to
//!   the run's CSV and JSON files
//! - [`summary`]: plain-text report written when a run's output is closed
//! - [`results`]: reads back the newest CSV for the results API
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── spine_headless_scraper_20250506_143000_123.csv
//! ├── spine_headless_scraper_20250506_143000_123.json
//! └── headless_scraper_summary_20250506_143000_123.txt
//! ```

pub mod results;
pub mod summary;
pub mod writer;

pub use results::{ResultsPreview, latest_results};
pub use writer::{RecordWriter, RunOutput};

/// File name prefix shared by the CSV and JSON outputs.
pub const OUTPUT_PREFIX: &str = "spine_headless_scraper_";

/// Fixed CSV header; column order is part of the output contract.
pub const CSV_HEADER: &str =
    "title,url,website_name,category,content_length,spine_procedures,financial_mentions,scraped_at";

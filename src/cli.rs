//! Command-line interface definitions for the spine scraper server.
//!
//! Arguments can be provided via command-line flags or environment variables.
//! Everything about the scrape itself (sites, retry policy, vocabularies)
//! lives in the optional YAML file passed with `--config`.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the spine scraper server.
///
/// # Examples
///
/// ```sh
/// # Built-in site list, output in ./spine_industry_data
/// spine_scraper
///
/// # Custom config and output directory
/// spine_scraper --config scraper.yaml --output-dir /var/lib/spine
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for CSV/JSON output (overrides the config file)
    #[arg(short, long, env = "SCRAPER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Address the HTTP API listens on
    #[arg(short, long, env = "SCRAPER_BIND", default_value = "0.0.0.0:5000")]
    pub bind: String,
}

//! Command-line interface definitions for Curated News.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Paths can also be provided through environment variables.

use crate::config::Mode;
use crate::store::{DEFAULT_SNAPSHOT_PATH, DEFAULT_TTL};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Curated News pipeline.
///
/// # Examples
///
/// ```sh
/// # Regenerate the snapshot if it is older than six hours
/// curated_news
///
/// # Always regenerate, with a custom feed list
/// curated_news --force -c feeds.yaml -o /srv/www/data/daily_curation.json
///
/// # Newest-60 mode enriching only foreign sources
/// curated_news --mode flat
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path of the JSON snapshot
    #[arg(short, long, env = "CURATION_OUTPUT", default_value = DEFAULT_SNAPSHOT_PATH)]
    pub output: PathBuf,

    /// Optional path to a YAML feed configuration (built-in feeds otherwise)
    #[arg(short, long, env = "CURATION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Candidate selection and enrichment mode
    #[arg(long, value_enum, default_value_t = Mode::Categorized)]
    pub mode: Mode,

    /// Regenerate even if the snapshot is still fresh
    #[arg(short, long)]
    pub force: bool,

    /// Snapshot freshness window, in hours
    #[arg(long, default_value_t = DEFAULT_TTL.as_secs() / 3600)]
    pub ttl_hours: u64,

    /// Target display language for translations
    #[arg(long, default_value = "ja")]
    pub target_lang: String,

    /// Concurrent feed fetches
    #[arg(long, default_value_t = 5)]
    pub fetch_workers: usize,

    /// Concurrent article enrichments
    #[arg(long, default_value_t = 5)]
    pub enrich_workers: usize,

    /// Per-request HTTP timeout, in seconds
    #[arg(long, default_value_t = 15)]
    pub timeout_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["curated_news"]);

        assert_eq!(cli.mode, Mode::Categorized);
        assert!(!cli.force);
        assert_eq!(cli.ttl_hours, 6);
        assert_eq!(cli.target_lang, "ja");
        assert_eq!(cli.fetch_workers, 5);
        assert_eq!(cli.timeout_secs, 15);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "curated_news",
            "-o",
            "/tmp/out.json",
            "-c",
            "/tmp/feeds.yaml",
            "-f",
            "--mode",
            "flat",
        ]);

        assert_eq!(cli.output, PathBuf::from("/tmp/out.json"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/feeds.yaml")));
        assert!(cli.force);
        assert_eq!(cli.mode, Mode::Flat);
    }
}

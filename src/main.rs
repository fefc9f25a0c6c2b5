//! # Curated News
//!
//! A news curation pipeline that pulls RSS/Atom feeds, picks the newest
//! articles, enriches them with a lead sentence or short summary, keyword
//! tags, a reading-time estimate and translations, and writes everything to a
//! single JSON snapshot for a static front-end.
//!
//! ## Usage
//!
//! ```sh
//! curated_news --force -o data/daily_curation.json
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Fetching**: Read every configured feed (5 at a time), skipping failures
//! 2. **Selection**: Sort newest first, drop duplicate links, keep the top K
//!    per category (or the newest 60 overall in flat mode)
//! 3. **Enrichment**: Extract, summarize, tag and translate (5 at a time)
//! 4. **Output**: Atomically replace the JSON snapshot
//!
//! A snapshot younger than the TTL is left alone unless `--force` is given.

use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod enrich;
mod extractor;
mod feeds;
mod http;
mod models;
mod pipeline;
mod refresh;
mod store;
mod summarize;
mod translate;
mod utils;

use cli::Cli;
use config::{Mode, PipelineConfig, default_categorized, default_flat, load_feed_file};
use http::{BoxError, HttpFetcher, RetryFetch};
use pipeline::Pipeline;
use refresh::{RefreshPolicy, Refresher};
use store::{InFlightMarker, SnapshotStore};
use translate::GoogleTranslator;
use utils::ensure_writable_dir;

/// First delay of the HTTP retry backoff.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("curated_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // Early check: the snapshot directory must be writable
    let output_dir = args
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if let Err(e) = ensure_writable_dir(output_dir).await {
        error!(
            path = %output_dir.display(),
            error = %e,
            "Snapshot directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load feed configuration ----
    let feed_file = match &args.config {
        Some(path) => load_feed_file(path).await?,
        None => match args.mode {
            Mode::Categorized => default_categorized(),
            Mode::Flat => default_flat(),
        },
    };
    let mut config = PipelineConfig::new(args.mode, feed_file);
    config.fetch_workers = args.fetch_workers;
    config.enrich_workers = args.enrich_workers;
    config.target_lang = args.target_lang.clone();
    config.timeout = Duration::from_secs(args.timeout_secs);
    info!(
        mode = ?config.mode,
        categories = config.categories.len(),
        sources = config.sources.len(),
        output_cap = config.output_cap(),
        "Loaded configuration"
    );

    // ---- Clients ----
    let http = HttpFetcher::new(config.timeout)?;
    let fetcher = RetryFetch::new(http.clone(), config.retries, RETRY_BASE_DELAY);
    let translator = GoogleTranslator::new(
        RetryFetch::new(http, config.retries, RETRY_BASE_DELAY),
        config.target_lang.clone(),
    );

    let store = SnapshotStore::new(&args.output);
    let marker = InFlightMarker::beside(&store);
    let refresher = Arc::new(Refresher::new(
        Pipeline::new(config, fetcher, translator),
        store,
        marker,
    ));

    // Ctrl-C drops in-flight work; the previous snapshot stays in place
    let cancel = refresher.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling regeneration");
            cancel.cancel();
        }
    });

    if refresher.marker().is_active().await? {
        info!(
            marker = %refresher.marker().path().display(),
            "Another regeneration holds the in-flight marker"
        );
    }

    let policy = if args.force {
        RefreshPolicy::Force
    } else {
        RefreshPolicy::IfStale(Duration::from_secs(args.ttl_hours * 60 * 60))
    };

    // ---- Regenerate in the background, reporting progress ----
    let mut status = refresher.subscribe();
    let mut handle = refresher.spawn(policy);
    let outcome = loop {
        tokio::select! {
            joined = &mut handle => break joined?,
            Ok(()) = status.changed() => {
                let current = status.borrow_and_update().clone();
                info!(status = ?current, "Refresh status");
            }
        }
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Snapshot regeneration failed");
            return Err(e.into());
        }
    };

    let count = refresher.store().load().await?.map_or(0, |articles| articles.len());
    info!(
        ?outcome,
        status = ?refresher.status(),
        count,
        path = %refresher.store().path().display(),
        "Snapshot ready"
    );

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

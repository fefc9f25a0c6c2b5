//! The curation pipeline: fetch → dedupe → rank → enrich.
//!
//! A run never aborts because one source or one article misbehaves. It fails
//! only when no source produced any entry at all ([`PipelineError::NoArticles`])
//! or when it is cancelled. Persisting the result is left to the caller, so a
//! failed run leaves the previous snapshot in place.

use crate::config::{Mode, PipelineConfig};
use crate::enrich::{Enricher, Enrichment};
use crate::feeds::fetch_all;
use crate::http::FetchText;
use crate::models::{Article, CuratedArticle, sort_newest_first};
use crate::store::StoreError;
use crate::translate::Translate;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no articles could be fetched from any source")]
    NoArticles,
    #[error("pipeline run was cancelled")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Order candidates newest first, drop repeated links, and keep the ones
/// worth enriching.
///
/// Deduplication runs on the sorted list, so the most recent occurrence of a
/// link wins. Flat mode keeps the newest `max_articles`; categorized mode keeps
/// the newest `per_category` of each configured category, in category order.
pub fn select_candidates(config: &PipelineConfig, mut articles: Vec<Article>) -> Vec<Article> {
    sort_newest_first(&mut articles);
    let total = articles.len();
    let unique: Vec<Article> = articles
        .into_iter()
        .unique_by(|a| a.link.clone())
        .collect();
    let duplicates = total - unique.len();

    let selected: Vec<Article> = match config.mode {
        Mode::Flat => unique.into_iter().take(config.max_articles).collect(),
        Mode::Categorized => config
            .categories
            .iter()
            .unique()
            .flat_map(|category| {
                unique
                    .iter()
                    .filter(move |a| &a.category == category)
                    .take(config.per_category)
                    .cloned()
            })
            .collect(),
    };
    info!(total, duplicates, selected = selected.len(), "Selected candidates");
    selected
}

/// A configured pipeline with its network clients.
#[derive(Debug)]
pub struct Pipeline<F, T> {
    config: PipelineConfig,
    fetcher: F,
    translator: T,
}

impl<F: FetchText, T: Translate> Pipeline<F, T> {
    pub fn new(config: PipelineConfig, fetcher: F, translator: T) -> Self {
        Self {
            config,
            fetcher,
            translator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline once.
    ///
    /// The result holds at most [`PipelineConfig::output_cap`] records with
    /// unique ids, sorted newest first.
    #[instrument(level = "info", skip_all, fields(mode = ?self.config.mode))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Vec<CuratedArticle>, PipelineError> {
        let t0 = Instant::now();
        let config = &self.config;

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            articles = fetch_all(&self.fetcher, &config.sources, config.fetch_workers) => articles,
        };
        if fetched.is_empty() {
            warn!(sources = config.sources.len(), "Every source came back empty");
            return Err(PipelineError::NoArticles);
        }

        let candidates = select_candidates(config, fetched);
        let enricher = Enricher {
            fetcher: &self.fetcher,
            translator: &self.translator,
            mode: config.mode,
            num_tags: config.num_tags,
            summary_sentences: config.summary_sentences,
        };

        let enrich_all = stream::iter(candidates.into_iter().enumerate())
            .map(|(i, article)| {
                let enricher = &enricher;
                async move { (i, enricher.enrich(article).await) }
            })
            .buffer_unordered(config.enrich_workers.max(1))
            .collect::<Vec<(usize, Enrichment)>>();

        let mut results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            results = enrich_all => results,
        };

        // Completion order is arbitrary; restore selection order before the
        // stable sort so equal timestamps come out the same on every run.
        results.sort_by_key(|(i, _)| *i);
        let degraded = results.iter().filter(|(_, e)| e.is_degraded()).count();
        let mut articles: Vec<CuratedArticle> =
            results.into_iter().map(|(_, e)| e.into_article()).collect();
        sort_newest_first(&mut articles);

        info!(
            count = articles.len(),
            degraded,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );
        Ok(articles)
    }
}

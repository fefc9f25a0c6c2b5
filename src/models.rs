//! Data models for feed entries, candidate articles, and curated records.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`RawEntry`]: One feed item exactly as the feed parser produced it
//! - [`Article`]: A normalized candidate, ranked and deduplicated before enrichment
//! - [`CuratedArticle`]: The enriched record written to the snapshot
//!
//! [`CuratedArticle`] is the wire contract with the front-end, so its serialized
//! field names must stay stable between runs.

use serde::{Deserialize, Serialize};

/// A single feed item as returned by the feed parser.
///
/// Every field is kept as the raw string found in the document. Dates are
/// parsed and HTML is stripped later, during normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    /// The entry title, if the feed provided one.
    pub title: Option<String>,
    /// The entry link (canonical URL).
    pub link: Option<String>,
    /// The first date field found (`published`, `pubDate`, `updated`, `dc:date`, `date`).
    pub published: Option<String>,
    /// The inline summary, usually HTML.
    pub summary: Option<String>,
}

/// A normalized candidate article, prior to enrichment.
///
/// Candidates are merged across sources, sorted by `timestamp` and
/// deduplicated by `link`. Only the survivors are enriched.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Hex MD5 of `link`. See [`article_id`].
    pub id: String,
    /// Original-language title.
    pub title: String,
    /// Canonical URL; the identity and deduplication key.
    pub link: String,
    /// Local display form of the publication date (`%Y/%m/%d %H:%M`).
    pub published_at: String,
    /// Unix seconds; descending sort key.
    pub timestamp: i64,
    /// Display name of the feed source.
    pub source: String,
    /// Category of the feed source.
    pub category: String,
    /// HTML-stripped inline summary, truncated for display.
    pub description: String,
    /// Whether translation enrichment applies to this entry.
    pub is_foreign: bool,
}

/// A fully enriched article, as persisted in the snapshot.
///
/// # JSON Schema
///
/// The original-language `title` and `summary` are only present for foreign
/// sources; everything else is always serialized.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CuratedArticle {
    pub id: String,
    pub category: String,
    /// Title in the target display language.
    pub title_ja: String,
    /// Original title, foreign sources only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Original-language lead text, foreign sources only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub insight: String,
    pub core_sentence: String,
    pub source: String,
    /// Estimated reading time, always at least one minute.
    pub read_time_min: u32,
    pub url: String,
    pub published_at: String,
    pub timestamp: i64,
}

/// Derive the stable article identifier from its canonical link.
///
/// The same link always yields the same id, across runs and processes, so the
/// front-end can key bookmarks and read-state on it.
pub fn article_id(link: &str) -> String {
    format!("{:x}", md5::compute(link.as_bytes()))
}

/// Anything that carries a descending sort key.
pub trait Timestamped {
    fn timestamp(&self) -> i64;
}

impl Timestamped for Article {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Timestamped for CuratedArticle {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Stable sort, newest first. Equal timestamps keep their input order.
pub fn sort_newest_first<T: Timestamped>(items: &mut [T]) {
    items.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
}

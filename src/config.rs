//! Feed configuration and pipeline settings.
//!
//! Configuration is loaded once at startup into an immutable [`PipelineConfig`]
//! which is then passed explicitly into the fetcher and the orchestrator.
//!
//! Feeds are grouped by category, either from a YAML file or from the
//! built-in defaults:
//!
//! ```yaml
//! categories:
//!   - name: "AI・テクノロジートレンド"
//!     feeds:
//!       - url: "https://hnrss.org/newest?q=AI&points=100"
//!         name: "Hacker News"
//!         foreign: true
//!       - url: "https://zenn.dev/topics/ai/feed"
//!         name: "Zenn"
//!         limit: 10
//! ```

use crate::http::BoxError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Entries read per feed in categorized mode.
pub const CATEGORIZED_FEED_LIMIT: usize = 10;
/// Entries read per domestic feed in flat mode.
pub const FLAT_DOMESTIC_LIMIT: usize = 15;
/// Entries read per foreign feed in flat mode; foreign entries are expensive to enrich.
pub const FLAT_FOREIGN_LIMIT: usize = 10;

/// How candidates are selected before enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Top-K per category, every survivor enriched with a lead sentence and tags.
    Categorized,
    /// Newest N overall, only foreign entries enriched with a multi-sentence summary.
    Flat,
}

/// A single configured feed. Immutable for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSource {
    pub url: String,
    /// Display name, copied onto every article from this feed.
    pub name: String,
    pub category: String,
    /// Maximum number of entries read from the feed.
    pub limit: usize,
    /// Foreign-language source; its entries get translated.
    pub foreign: bool,
}

/// Everything a pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: Mode,
    /// Category names in display order.
    pub categories: Vec<String>,
    pub sources: Vec<FeedSource>,
    /// Concurrent feed fetches.
    pub fetch_workers: usize,
    /// Concurrent article enrichments.
    pub enrich_workers: usize,
    /// Global output cap in flat mode.
    pub max_articles: usize,
    /// Candidates kept per category in categorized mode.
    pub per_category: usize,
    /// Tags derived per article.
    pub num_tags: usize,
    /// Sentences in a flat-mode summary.
    pub summary_sentences: usize,
    /// Target display language, as a translation API language code.
    pub target_lang: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// HTTP retries after the first attempt.
    pub retries: usize,
}

impl PipelineConfig {
    /// Build the configuration for `mode` from a parsed feed file.
    pub fn new(mode: Mode, file: FeedFile) -> Self {
        let mut categories = Vec::with_capacity(file.categories.len());
        let mut sources = Vec::new();
        for category in file.categories {
            for feed in category.feeds {
                let limit = feed.limit.unwrap_or(match (mode, feed.foreign) {
                    (Mode::Categorized, _) => CATEGORIZED_FEED_LIMIT,
                    (Mode::Flat, true) => FLAT_FOREIGN_LIMIT,
                    (Mode::Flat, false) => FLAT_DOMESTIC_LIMIT,
                });
                sources.push(FeedSource {
                    url: feed.url,
                    name: feed.name,
                    category: category.name.clone(),
                    limit,
                    foreign: feed.foreign,
                });
            }
            // Repeated entries merge their feeds into the first occurrence.
            if !categories.contains(&category.name) {
                categories.push(category.name);
            }
        }

        Self {
            mode,
            categories,
            sources,
            fetch_workers: 5,
            enrich_workers: 5,
            max_articles: file.max_articles.unwrap_or(60),
            per_category: file.per_category.unwrap_or(5),
            num_tags: 3,
            summary_sentences: 3,
            target_lang: "ja".to_string(),
            timeout: Duration::from_secs(15),
            retries: 2,
        }
    }

    /// Upper bound on the number of records a run can produce.
    pub fn output_cap(&self) -> usize {
        match self.mode {
            Mode::Flat => self.max_articles,
            Mode::Categorized => self.categories.len() * self.per_category,
        }
    }
}

/// On-disk shape of the feed configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedFile {
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub max_articles: Option<usize>,
    #[serde(default)]
    pub per_category: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub feeds: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub foreign: bool,
}

/// Load a feed file from YAML.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_feed_file(path: impl AsRef<Path>) -> Result<FeedFile, BoxError> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    let file: FeedFile = serde_yaml::from_str(&text)?;
    info!(categories = file.categories.len(), "Loaded feed configuration");
    Ok(file)
}

fn feed(url: &str, name: &str, foreign: bool) -> FeedEntry {
    FeedEntry {
        url: url.to_string(),
        name: name.to_string(),
        limit: None,
        foreign,
    }
}

/// The built-in five-category curation.
pub fn default_categorized() -> FeedFile {
    let category = |name: &str, feeds: Vec<FeedEntry>| CategoryEntry {
        name: name.to_string(),
        feeds,
    };
    FeedFile {
        categories: vec![
            category(
                "AI・テクノロジートレンド",
                vec![
                    feed("https://hnrss.org/newest?q=AI+OR+LLM+OR+ChatGPT&points=100", "Hacker News", true),
                    feed("https://techcrunch.com/category/artificial-intelligence/feed/", "TechCrunch", true),
                    feed("https://zenn.dev/topics/ai/feed", "Zenn", false),
                ],
            ),
            category(
                "ガジェット・ハードウェア",
                vec![
                    feed("https://www.gizmodo.jp/index.xml", "Gizmodo Japan", false),
                    feed("https://hnrss.org/newest?q=Hardware+OR+Gadget&points=50", "Hacker News Hardware", true),
                    feed("https://japanese.engadget.com/rss.xml", "Engadget", false),
                ],
            ),
            category(
                "ビジネス・経済",
                vec![
                    feed("https://hnrss.org/newest?q=Business+OR+Market+OR+Economy&points=100", "HN Business", true),
                    feed(
                        "https://news.google.com/rss/search?q=%E3%83%86%E3%82%AF%E3%83%8E%E3%83%AD%E3%82%B8%E3%83%BC+%E4%BA%8B%E6%A5%AD&hl=ja&gl=JP&ceid=JP:ja",
                        "Google News Biz",
                        false,
                    ),
                ],
            ),
            category(
                "ライフハック・仕事術",
                vec![
                    feed(
                        "https://b.hatena.ne.jp/q/%E3%83%A9%E3%82%A4%E3%83%95%E3%83%8F%E3%83%83%E3%82%AF?sort=recent&safe=on&mode=rss",
                        "Hatena Lifehack",
                        false,
                    ),
                    feed("https://lifehacker.com/feed/rss", "Lifehacker", true),
                ],
            ),
            category(
                "サイエンス・未来予測",
                vec![
                    feed("https://hnrss.org/newest?q=Science+OR+Space+OR+Physics&points=100", "HN Science", true),
                    feed("https://wired.jp/rss/index.xml", "WIRED Japan", false),
                ],
            ),
        ],
        max_articles: None,
        per_category: None,
    }
}

/// The built-in flat feed list, served newest-first without categories.
pub fn default_flat() -> FeedFile {
    FeedFile {
        categories: vec![CategoryEntry {
            name: "AIニュース".to_string(),
            feeds: vec![
                feed("https://qiita.com/tags/AI/feed", "Qiita (AI)", false),
                feed("https://qiita.com/tags/ChatGPT/feed", "Qiita (ChatGPT)", false),
                feed("https://zenn.dev/topics/ai/feed", "Zenn (AI)", false),
                feed(
                    "https://news.google.com/rss/search?q=AI+%E6%B4%BB%E7%94%A8+%E4%BA%8B%E4%BE%8B&hl=ja&gl=JP&ceid=JP:ja",
                    "Google News (AI 活用事例)",
                    false,
                ),
                feed(
                    "https://b.hatena.ne.jp/q/AI%20%E6%B4%BB%E7%94%A8?sort=recent&safe=on&mode=rss",
                    "Hatena Bookmark (AI)",
                    false,
                ),
                feed("https://hnrss.org/newest?q=AI+OR+LLM+OR+ChatGPT&points=50", "Hacker News", true),
                feed("https://techcrunch.com/category/artificial-intelligence/feed/", "TechCrunch", true),
                feed("https://www.gizmodo.jp/index.xml", "Gizmodo Japan", false),
                feed("https://japanese.engadget.com/rss.xml", "Engadget (Archive)", false),
                feed("https://wired.jp/rss/index.xml", "WIRED Japan", false),
            ],
        }],
        max_articles: None,
        per_category: None,
    }
}

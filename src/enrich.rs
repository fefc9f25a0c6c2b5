//! Per-article enrichment: extract → summarize → tag → translate → assemble.
//!
//! Enrichment of one article is an independent unit of work. It never fails:
//! every step that cannot produce its enriched value substitutes a defined
//! fallback (feed description, fallback tags, the original-language text, a
//! sentinel message) and the outcome is reported as [`Enrichment::Degraded`].

use crate::config::Mode;
use crate::extractor::{self, Extraction};
use crate::http::FetchText;
use crate::models::{Article, CuratedArticle};
use crate::summarize::{
    extract_tags, fallback_tags, is_mostly_ascii, lead_sentence, read_time_minutes, summarize,
};
use crate::translate::{Translate, translate_or_original};
use crate::utils::truncate_chars;
use futures::future::join_all;
use tracing::{debug, instrument};

/// Shown when neither the article body nor the feed description yields text.
pub const EXTRACTION_FAILED: &str = "内容を抽出できませんでした。リンク元をご確認ください。";
/// Prefix of the insight line.
pub const INSIGHT_PREFIX: &str = "💡 影響: ";
/// Core sentence budget: longer text keeps 118 characters plus an ellipsis.
pub const CORE_SENTENCE_CHARS: (usize, usize) = (120, 118);
/// Budget for the multi-sentence summary of the flat mode.
pub const SUMMARY_CHARS: (usize, usize) = (300, 298);
/// Budget for domestic descriptions in the flat mode.
pub const DESCRIPTION_DISPLAY_CHARS: (usize, usize) = (150, 147);
/// Characters of the first tag woven into the insight line.
const INSIGHT_TAG_CHARS: usize = 8;

/// Result of enriching one article. Both variants carry a usable record.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Complete(CuratedArticle),
    Degraded {
        article: CuratedArticle,
        reasons: Vec<String>,
    },
}

impl Enrichment {
    fn from_parts(article: CuratedArticle, reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Enrichment::Complete(article)
        } else {
            Enrichment::Degraded { article, reasons }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Enrichment::Degraded { .. })
    }

    pub fn into_article(self) -> CuratedArticle {
        match self {
            Enrichment::Complete(article) | Enrichment::Degraded { article, .. } => article,
        }
    }
}

/// Build the insight line from the category and the leading tag.
///
/// The template is picked from the article id, so reruns over the same
/// article produce the same line.
pub fn insight(category: &str, tags: &[String], id: &str) -> String {
    let fallback = category.split('・').next().unwrap_or(category);
    let tag: String = tags
        .first()
        .map(|t| t.chars().take(INSIGHT_TAG_CHARS).collect())
        .unwrap_or_else(|| fallback.to_string());

    let templates = match category {
        "AI・テクノロジートレンド" => vec![
            format!("{tag}の活用がさらに拡大"),
            format!("{tag}による業務の高速化"),
            format!("次世代{tag}への移行加速"),
        ],
        "ガジェット・ハードウェア" => vec![
            format!("{tag}による生活の質向上"),
            format!("新しい{tag}体験が普及"),
            format!("{tag}のエコシステム強化"),
        ],
        "ビジネス・経済" => vec![
            format!("{tag}市場の競争が激化"),
            format!("{tag}関連の投資が加速"),
            format!("{tag}が業界標準を変える"),
        ],
        "ライフハック・仕事術" => vec![
            format!("{tag}の仕組み化で時短"),
            format!("{tag}の活用で生産性UP"),
            format!("新しい{tag}習慣の定着"),
        ],
        "サイエンス・未来予測" => vec![
            format!("{tag}のブレイクスルー"),
            format!("{tag}の新常識が到来"),
            format!("{tag}の可能性が拡大"),
        ],
        _ => vec![format!("{tag}の新たな可能性が開拓")],
    };

    let pick = id.bytes().map(usize::from).sum::<usize>() % templates.len();
    format!("{INSIGHT_PREFIX}{}", templates[pick])
}

/// Runs enrichment steps against shared, read-only clients.
#[derive(Debug)]
pub struct Enricher<'a, F, T> {
    pub fetcher: &'a F,
    pub translator: &'a T,
    pub mode: Mode,
    pub num_tags: usize,
    pub summary_sentences: usize,
}

impl<F: FetchText, T: Translate> Enricher<'_, F, T> {
    /// Enrich one candidate according to the configured mode.
    #[instrument(level = "info", skip_all, fields(id = %article.id, source = %article.source))]
    pub async fn enrich(&self, article: Article) -> Enrichment {
        let enrichment = match self.mode {
            Mode::Categorized => self.enrich_categorized(article).await,
            Mode::Flat => self.enrich_flat(article).await,
        };
        if let Enrichment::Degraded { reasons, .. } = &enrichment {
            debug!(?reasons, "Enrichment degraded");
        }
        enrichment
    }

    /// Translate only foreign text that the ASCII heuristic marks as English.
    async fn localize(&self, foreign: bool, text: &str) -> String {
        if foreign && is_mostly_ascii(text) {
            translate_or_original(self.translator, text).await
        } else {
            text.to_string()
        }
    }

    async fn localize_tags(&self, foreign: bool, tags: &[String]) -> Vec<String> {
        join_all(tags.iter().map(|tag| self.localize(foreign, tag))).await
    }

    fn tags_or_fallback(
        &self,
        text: &str,
        article: &Article,
        reasons: &mut Vec<String>,
    ) -> Vec<String> {
        let tags = extract_tags(text, self.num_tags);
        if tags.is_empty() {
            reasons.push("no tags extracted".to_string());
            fallback_tags(&article.category, &article.source)
        } else {
            tags
        }
    }

    async fn enrich_categorized(&self, article: Article) -> Enrichment {
        let foreign = article.is_foreign;
        let mut reasons = Vec::new();

        let (title_ja, extraction) = tokio::join!(
            self.localize(foreign, &article.title),
            extractor::extract(self.fetcher, &article.link)
        );

        let (lead, tags, read_time) = match extraction.usable() {
            Some(text) => (
                lead_sentence(text),
                self.tags_or_fallback(text, &article, &mut reasons),
                read_time_minutes(text),
            ),
            None => {
                reasons.push(extraction_reason(&extraction));
                (
                    lead_sentence(&article.description),
                    fallback_tags(&article.category, &article.source),
                    read_time_minutes(&article.description),
                )
            }
        };

        let (core, tags) = match &lead {
            Some(lead) => {
                tokio::join!(self.localize(foreign, lead), self.localize_tags(foreign, &tags))
            }
            None => {
                reasons.push("no lead sentence".to_string());
                (EXTRACTION_FAILED.to_string(), self.localize_tags(foreign, &tags).await)
            }
        };

        let (max, keep) = CORE_SENTENCE_CHARS;
        let curated = CuratedArticle {
            insight: insight(&article.category, &tags, &article.id),
            core_sentence: truncate_chars(&core, max, keep),
            title: foreign.then(|| article.title.clone()),
            summary: if foreign { lead } else { None },
            title_ja,
            tags,
            read_time_min: read_time,
            id: article.id,
            category: article.category,
            source: article.source,
            url: article.link,
            published_at: article.published_at,
            timestamp: article.timestamp,
        };
        Enrichment::from_parts(curated, reasons)
    }

    async fn enrich_flat(&self, article: Article) -> Enrichment {
        let mut reasons = Vec::new();

        if !article.is_foreign {
            let (max, keep) = DESCRIPTION_DISPLAY_CHARS;
            let core = if article.description.is_empty() {
                reasons.push("empty description".to_string());
                EXTRACTION_FAILED.to_string()
            } else {
                truncate_chars(&article.description, max, keep)
            };
            let basis = format!("{} {}", article.title, article.description);
            let tags = self.tags_or_fallback(&basis, &article, &mut reasons);
            let curated = CuratedArticle {
                insight: insight(&article.category, &tags, &article.id),
                core_sentence: core,
                title: None,
                summary: None,
                title_ja: article.title,
                tags,
                read_time_min: read_time_minutes(&article.description),
                id: article.id,
                category: article.category,
                source: article.source,
                url: article.link,
                published_at: article.published_at,
                timestamp: article.timestamp,
            };
            return Enrichment::from_parts(curated, reasons);
        }

        let (title_ja, extraction) = tokio::join!(
            self.localize(true, &article.title),
            extractor::extract(self.fetcher, &article.link)
        );

        let (summary, basis) = match extraction.usable() {
            Some(text) => (summarize(text, self.summary_sentences), text.to_string()),
            None => {
                reasons.push(extraction_reason(&extraction));
                (article.description.clone(), article.description.clone())
            }
        };
        let tags = self.tags_or_fallback(&basis, &article, &mut reasons);

        let (core, tags) = if summary.is_empty() {
            reasons.push("empty summary".to_string());
            (EXTRACTION_FAILED.to_string(), self.localize_tags(true, &tags).await)
        } else {
            tokio::join!(self.localize(true, &summary), self.localize_tags(true, &tags))
        };

        let (max, keep) = SUMMARY_CHARS;
        let curated = CuratedArticle {
            insight: insight(&article.category, &tags, &article.id),
            core_sentence: truncate_chars(&core, max, keep),
            title: Some(article.title),
            summary: (!summary.is_empty()).then_some(summary),
            title_ja,
            tags,
            read_time_min: read_time_minutes(&basis),
            id: article.id,
            category: article.category,
            source: article.source,
            url: article.link,
            published_at: article.published_at,
            timestamp: article.timestamp,
        };
        Enrichment::from_parts(curated, reasons)
    }
}

fn extraction_reason(extraction: &Extraction) -> String {
    match extraction {
        Extraction::Text(_) => "extraction ok".to_string(),
        Extraction::TooShort(text) => format!("extraction too short ({} chars)", text.chars().count()),
        Extraction::Failed(e) => format!("extraction failed: {e}"),
    }
}

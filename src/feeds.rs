//! Feed fetching and normalization.
//!
//! Each configured [`FeedSource`] is downloaded, parsed and normalized into
//! candidate [`Article`]s. The work follows the same shape for every source:
//!
//! 1. **Fetching**: Download the feed document
//! 2. **Parsing**: Pull [`RawEntry`] values out of RSS 2.0, RDF or Atom markup
//! 3. **Normalizing**: Resolve dates, strip HTML, derive ids
//!
//! A source that cannot be fetched or parsed contributes zero articles; the
//! failure is logged and never aborts the run.

use crate::config::FeedSource;
use crate::dates::{display_date, parse_date};
use crate::extractor::html_to_text;
use crate::http::{BoxError, FetchText};
use crate::models::{Article, RawEntry, article_id};
use crate::utils::truncate_chars;
use futures::stream::{self, StreamExt};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::escape::resolve_predefined_entity;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Character budget of the inline description.
pub const DESCRIPTION_CHARS: usize = 200;

/// Date elements, most preferred first.
const DATE_FIELDS: [&[u8]; 5] = [b"published", b"pubDate", b"updated", b"dc:date", b"date"];
/// Summary elements, most preferred first.
const SUMMARY_FIELDS: [&[u8]; 4] = [b"description", b"summary", b"content:encoded", b"content"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Date(usize),
    Summary(usize),
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            _ => DATE_FIELDS
                .iter()
                .position(|f| *f == name)
                .map(Field::Date)
                .or_else(|| SUMMARY_FIELDS.iter().position(|f| *f == name).map(Field::Summary)),
        }
    }
}

/// Fields collected for one entry while its element is open.
#[derive(Debug, Default)]
struct PartialEntry {
    title: Option<String>,
    link: Option<String>,
    dates: [Option<String>; DATE_FIELDS.len()],
    summaries: [Option<String>; SUMMARY_FIELDS.len()],
}

impl PartialEntry {
    fn set(&mut self, field: Field, value: String) {
        let value = value.trim().to_string();
        if value.is_empty() {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Date(i) => &mut self.dates[i],
            Field::Summary(i) => &mut self.summaries[i],
        };
        slot.get_or_insert(value);
    }

    fn finish(self) -> RawEntry {
        RawEntry {
            title: self.title,
            link: self.link,
            published: self.dates.into_iter().flatten().next(),
            summary: self.summaries.into_iter().flatten().next(),
        }
    }
}

fn is_entry(name: &[u8]) -> bool {
    matches!(name, b"item" | b"entry")
}

/// Atom `<link href=".." rel="..">`. Only alternate (or unqualified) links count.
fn atom_href(e: &BytesStart) -> Result<Option<String>, BoxError> {
    if let Some(rel) = e.try_get_attribute("rel")? {
        if rel.unescape_value()? != "alternate" {
            return Ok(None);
        }
    }
    match e.try_get_attribute("href")? {
        Some(href) => Ok(Some(href.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Parse RSS 2.0, RDF (RSS 1.0) or Atom markup into raw entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<RawEntry>, BoxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = false;

    let mut entries = Vec::new();
    let mut current: Option<PartialEntry> = None;
    let mut field: Option<(Field, Vec<u8>)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let name = name.as_ref();
                if is_entry(name) {
                    current = Some(PartialEntry::default());
                    field = None;
                } else if field.is_none() {
                    if let Some(entry) = current.as_mut() {
                        if name == b"link" {
                            if let Some(href) = atom_href(&e)? {
                                entry.set(Field::Link, href);
                            }
                        }
                        if let Some(f) = Field::from_name(name) {
                            field = Some((f, name.to_vec()));
                            text.clear();
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if let (Some(entry), true) = (current.as_mut(), field.is_none()) {
                    if e.name().as_ref() == b"link" {
                        if let Some(href) = atom_href(&e)? {
                            entry.set(Field::Link, href);
                        }
                    }
                }
            }
            Event::Text(t) if field.is_some() => text.push_str(&t.decode()?),
            Event::CData(c) if field.is_some() => text.push_str(&c.decode()?),
            Event::GeneralRef(r) if field.is_some() => {
                if let Some(ch) = r.resolve_char_ref()? {
                    text.push(ch);
                } else {
                    let name = r.decode()?;
                    match resolve_predefined_entity(&name) {
                        Some(resolved) => text.push_str(resolved),
                        None => {
                            text.push('&');
                            text.push_str(&name);
                            text.push(';');
                        }
                    }
                }
            }
            Event::End(e) => {
                let name = e.name();
                let name = name.as_ref();
                if is_entry(name) && field.is_none() {
                    if let Some(entry) = current.take() {
                        entries.push(entry.finish());
                    }
                } else if let Some((f, open)) = field.as_ref() {
                    if open.as_slice() == name {
                        if let Some(entry) = current.as_mut() {
                            entry.set(*f, std::mem::take(&mut text));
                        }
                        field = None;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Resolve a relative entry link against the feed URL. Absolute links are
/// kept verbatim, since the id is derived from them.
fn resolve_link(link: &str, feed_url: &str) -> String {
    match Url::parse(link) {
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(feed_url)
            .and_then(|base| base.join(link))
            .map(String::from)
            .unwrap_or_else(|_| link.to_string()),
        _ => link.to_string(),
    }
}

/// Turn a raw entry into a candidate article. Entries without a link are dropped.
pub fn normalize(entry: RawEntry, source: &FeedSource) -> Option<Article> {
    let link = entry
        .link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .map(|l| resolve_link(&l, &source.url))?;
    let published = parse_date(entry.published.as_deref());
    let description = entry
        .summary
        .as_deref()
        .map(html_to_text)
        .map(|text| truncate_chars(&text, DESCRIPTION_CHARS, DESCRIPTION_CHARS))
        .unwrap_or_default();

    Some(Article {
        id: article_id(&link),
        title: entry
            .title
            .map(|t| html_to_text(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No Title".to_string()),
        link,
        published_at: display_date(&published),
        timestamp: published.timestamp(),
        source: source.name.clone(),
        category: source.category.clone(),
        description,
        is_foreign: source.foreign,
    })
}

/// Fetch one source. Any failure yields an empty list.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn fetch_source<F: FetchText>(fetcher: &F, source: &FeedSource) -> Vec<Article> {
    let body = match fetcher.fetch_text(&source.url).await {
        Ok(body) => body,
        Err(e) => {
            warn!(url = %source.url, error = %e, "Feed fetch failed; skipping source");
            return Vec::new();
        }
    };

    let entries = match parse_feed(&body) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(url = %source.url, error = %e, "Feed parse failed; skipping source");
            return Vec::new();
        }
    };

    let total = entries.len();
    let articles: Vec<Article> = entries
        .into_iter()
        .take(source.limit)
        .filter_map(|entry| normalize(entry, source))
        .collect();

    info!(count = articles.len(), total, limit = source.limit, "Fetched feed");
    debug!(links = ?articles.iter().map(|a| &a.link).collect::<Vec<_>>(), "Feed links");
    articles
}

/// Fetch every source over a bounded pool of `workers` concurrent requests.
///
/// Results are merged after all sources complete; their order is unspecified.
#[instrument(level = "info", skip_all, fields(sources = sources.len(), workers))]
pub async fn fetch_all<F: FetchText>(
    fetcher: &F,
    sources: &[FeedSource],
    workers: usize,
) -> Vec<Article> {
    let fetches: Vec<_> = sources.iter().map(|source| fetch_source(fetcher, source)).collect();
    let per_source: Vec<Vec<Article>> = stream::iter(fetches)
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let reached = per_source.iter().filter(|a| !a.is_empty()).count();
    let articles: Vec<Article> = per_source.into_iter().flatten().collect();
    info!(count = articles.len(), reached, "Fetched all feeds");
    articles
}

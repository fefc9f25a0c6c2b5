//! Main-content extraction from arbitrary article HTML.
//!
//! Extraction runs in two passes:
//!
//! 1. **Container selection**: Boilerplate elements (scripts, navigation,
//!    cookie banners, share widgets) are skipped, then the text of the first
//!    semantic container (`article`, `main`, `[role=main]`) or, failing that,
//!    the element holding the largest mass of paragraph text is collected.
//! 2. **Line filtering**: [`clean_lines`] drops short lines and lines carrying
//!    known boilerplate markers.
//!
//! The result is an [`Extraction`]. Nothing here returns an error: network
//! and parse problems become [`Extraction::Failed`].

use crate::http::FetchText;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument};

/// Extracted text shorter than this is treated as a failed extraction.
pub const MIN_EXTRACTED_CHARS: usize = 100;
/// Lines must be longer than this to survive [`clean_lines`].
pub const MIN_LINE_CHARS: usize = 15;
/// Lines containing any of these (case-insensitive) are dropped.
pub const BOILERPLATE_MARKERS: &[&str] = &["cookie", "subscribe", "log in", "sign up", "read more"];

const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "button", "template", "figure",
];
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
    "blockquote", "pre", "br", "tr", "table", "dd", "dt",
];
const BOILERPLATE_HINTS: &[&str] = &[
    "cookie", "consent", "newsletter", "subscribe", "share", "social", "related", "comment",
    "advert", "promo", "breadcrumb", "sidebar", "paywall",
];

static CONTAINER_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "main", "[role=main]"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));

/// Outcome of a content extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Cleaned body text, at least [`MIN_EXTRACTED_CHARS`] long.
    Text(String),
    /// Something was extracted, but too little to be trusted.
    TooShort(String),
    /// Download or extraction failed outright.
    Failed(String),
}

impl Extraction {
    /// The extracted text, only if it is long enough to use.
    pub fn usable(&self) -> Option<&str> {
        match self {
            Extraction::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Flatten an HTML fragment to whitespace-normalized text.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_boilerplate(el: &ElementRef<'_>) -> bool {
    let v = el.value();
    if SKIP_TAGS.contains(&v.name()) {
        return true;
    }
    [v.attr("class"), v.attr("id")].into_iter().flatten().any(|attr| {
        let attr = attr.to_lowercase();
        BOILERPLATE_HINTS.iter().any(|hint| attr.contains(hint))
    })
}

/// Append a text node with its whitespace runs (source line wraps included)
/// collapsed to single spaces. Newlines only come from block boundaries.
fn push_inline(text: &str, out: &mut String) {
    for c in text.chars() {
        if !c.is_whitespace() {
            out.push(c);
        } else if !out.ends_with(|last: char| last == ' ' || last == '\n') {
            out.push(' ');
        }
    }
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => push_inline(text, out),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else { continue };
                if is_boilerplate(&child_el) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&child_el.value().name());
                if block {
                    out.push('\n');
                }
                collect_text(child_el, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

/// The element whose direct `<p>` children carry the most text.
fn densest_paragraph_parent(document: &Html) -> Option<ElementRef<'_>> {
    let mut scores: Vec<(ElementRef<'_>, usize)> = Vec::new();
    for p in document.select(&PARAGRAPH) {
        let Some(parent) = p.parent().and_then(ElementRef::wrap) else { continue };
        if is_boilerplate(&parent) {
            continue;
        }
        let len = element_text(p).trim().chars().count();
        match scores.iter_mut().find(|(el, _)| el.id() == parent.id()) {
            Some((_, score)) => *score += len,
            None => scores.push((parent, len)),
        }
    }
    scores.into_iter().max_by_key(|(_, score)| *score).map(|(el, _)| el)
}

/// Keep lines longer than [`MIN_LINE_CHARS`] that carry no boilerplate marker.
pub fn clean_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_LINE_CHARS)
        .filter(|line| {
            let lower = line.to_lowercase();
            !BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

/// Extract the main body text of an HTML document, line-filtered.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTAINER_SELECTORS.iter() {
        if let Some(container) = document.select(selector).next() {
            let lines = clean_lines(&element_text(container));
            let joined = lines.join(" ");
            if joined.chars().count() >= MIN_EXTRACTED_CHARS {
                return joined;
            }
        }
    }

    let fallback = densest_paragraph_parent(&document)
        .or_else(|| document.select(&BODY).next())
        .unwrap_or_else(|| document.root_element());
    clean_lines(&element_text(fallback)).join(" ")
}

/// Download `url` and extract its main text. Never fails.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn extract<F: FetchText>(fetcher: &F, url: &str) -> Extraction {
    let html = match fetcher.fetch_text(url).await {
        Ok(html) => html,
        Err(e) => {
            debug!(error = %e, "Article download failed");
            return Extraction::Failed(e.to_string());
        }
    };

    let text = extract_main_text(&html);
    let chars = text.chars().count();
    debug!(chars, "Extracted article text");
    if text.is_empty() {
        Extraction::Failed("no extractable text".to_string())
    } else if chars < MIN_EXTRACTED_CHARS {
        Extraction::TooShort(text)
    } else {
        Extraction::Text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::StaticFetcher;

    const PAGE: &str = r#"<html><head><title>t</title><script>var x = "ignore me please";</script></head>
<body>
  <nav><a href="/">Home navigation link text</a></nav>
  <div class="cookie-banner"><p>We use cookies to improve your experience on this site.</p></div>
  <article>
    <h1>Tokio reaches a new milestone</h1>
    <p>The Tokio project announced a new release with significant scheduler improvements.</p>
    <p>Benchmarks show lower tail latency across a range of network-heavy workloads.</p>
    <p>Subscribe to our newsletter for more updates like this one!</p>
    <p>Short line.</p>
  </article>
  <footer><p>Copyright notice and other footer boilerplate text.</p></footer>
</body></html>"#;

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("<p>Hello <b>world</b></p>\n<p> again </p>"), "Hello world again");
        assert_eq!(html_to_text("plain text"), "plain text");
    }

    #[test]
    fn test_clean_lines_filters_short_and_boilerplate() {
        let text = "A sufficiently long first line.\nshort\nPlease Sign Up for access today\nAnother sufficiently long line here.";
        assert_eq!(
            clean_lines(text),
            vec!["A sufficiently long first line.", "Another sufficiently long line here."]
        );
    }

    #[test]
    fn test_extract_main_text_prefers_article() {
        let text = extract_main_text(PAGE);
        assert!(text.starts_with("Tokio reaches a new milestone"));
        assert!(text.contains("scheduler improvements"));
        assert!(!text.contains("Subscribe"));
        assert!(!text.contains("Short line."));
        assert!(!text.contains("cookies"));
        assert!(!text.contains("ignore me"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_extract_main_text_without_semantic_container() {
        let html = r#"<html><body>
            <div id="menu"><p>Menu entry that is long enough to count</p></div>
            <div class="story">
              <p>First paragraph of the story with enough characters to be kept.</p>
              <p>Second paragraph of the story, also long enough to pass the filter.</p>
            </div>
        </body></html>"#;
        let text = extract_main_text(html);
        assert!(text.contains("First paragraph"));
        assert!(text.contains("Second paragraph"));
        assert!(!text.contains("Menu entry"));
    }

    #[test]
    fn test_extract_main_text_keeps_hard_wrapped_paragraphs() {
        let html = "<html><body><article>\n<p>Rust 1.80 was\nreleased today with\nmany improvements to\nthe compiler and\nthe standard library,\nsays the team.</p>\n<p>Benchmarks across several\nlarge workspaces show <b>faster</b>\nincremental builds.</p>\n</article></body></html>";
        let text = extract_main_text(html);
        assert_eq!(
            text,
            "Rust 1.80 was released today with many improvements to the compiler and the standard library, says the team. \
             Benchmarks across several large workspaces show faster incremental builds."
        );
    }

    #[test]
    fn test_headline_joins_lead_without_newline() {
        let text = extract_main_text(PAGE);
        assert!(!text.contains('\n'));
        let lead = crate::summarize::lead_sentence(&text).unwrap();
        assert_eq!(
            lead,
            "Tokio reaches a new milestone The Tokio project announced a new release with significant scheduler improvements."
        );
    }

    #[tokio::test]
    async fn test_extract_outcomes() {
        let fetcher = StaticFetcher::default()
            .with("https://full", PAGE)
            .with("https://short", "<html><body><p>Only a little bit of text.</p></body></html>")
            .with("https://empty", "<html><body></body></html>");

        assert!(matches!(extract(&fetcher, "https://full").await, Extraction::Text(_)));
        let short = extract(&fetcher, "https://short").await;
        assert!(matches!(short, Extraction::TooShort(_)));
        assert_eq!(short.usable(), None);
        assert!(matches!(extract(&fetcher, "https://empty").await, Extraction::Failed(_)));
        assert!(matches!(extract(&fetcher, "https://missing").await, Extraction::Failed(_)));
    }
}

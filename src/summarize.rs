//! Extractive summarization, keyword tagging and the language heuristic.
//!
//! Everything here is a deliberately simple statistical heuristic:
//! - [`is_mostly_ascii`] decides "English or not" by the share of ASCII
//!   characters in the first 500 characters.
//! - [`lead_sentence`] picks the first sentence as a cheap summary.
//! - [`summarize`] scores sentences by the frequency of their content terms.
//! - [`extract_tags`] ranks tokens by frequency, ties broken by first occurrence.
//!
//! Translation decisions downstream depend on [`is_mostly_ascii`], so its
//! window and threshold must not drift.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Characters inspected by [`is_mostly_ascii`].
pub const LANG_WINDOW: usize = 500;
/// ASCII share above which text counts as English.
pub const ASCII_THRESHOLD: f64 = 0.8;
/// Reading speed used by [`read_time_minutes`], in characters per minute.
pub const CHARS_PER_MINUTE: f64 = 400.0;

/// NLTK's English stopword list.
const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

/// Capitalized function words that start sentences.
const EXTRA_STOPWORDS: &[&str] = &["The", "A", "An", "It", "This", "That"];

/// Case-sensitive, matching the tag filter's behavior on capitalized words.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ENGLISH_STOPWORDS
        .iter()
        .chain(EXTRA_STOPWORDS)
        .copied()
        .collect()
});

static ASCII_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid regex"));

/// Whether more than 80% of the first 500 characters are ASCII.
pub fn is_mostly_ascii(text: &str) -> bool {
    let (total, ascii) = text
        .chars()
        .take(LANG_WINDOW)
        .fold((0usize, 0usize), |(t, a), c| (t + 1, a + usize::from(c.is_ascii())));
    total > 0 && (ascii as f64 / total as f64) > ASCII_THRESHOLD
}

/// Split text into sentences.
///
/// Latin terminators end a sentence only when followed by whitespace;
/// full-width terminators always do.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = match c {
            '。' | '！' | '？' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|next| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// The first sentence of `text`, if any, on a single line.
pub fn lead_sentence(text: &str) -> Option<String> {
    split_sentences(text)
        .into_iter()
        .next()
        .map(|sentence| sentence.split_whitespace().join(" "))
}

/// Content terms used to score sentences: lowercase words for ASCII text,
/// character bigrams otherwise.
fn content_terms(sentence: &str) -> Vec<String> {
    if is_mostly_ascii(sentence) {
        sentence
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(w.as_str()))
            .collect()
    } else {
        let chars: Vec<char> = sentence
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        chars.windows(2).map(|pair| pair.iter().collect()).collect()
    }
}

/// Multi-sentence extractive summary.
///
/// Each sentence scores the mean document frequency of its content terms.
/// The best `n` sentences are returned in document order, space-joined.
pub fn summarize(text: &str, n: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.len() <= n {
        return sentences.join(" ");
    }

    let terms: Vec<Vec<String>> = sentences.iter().map(|s| content_terms(s)).collect();
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for term in terms.iter().flatten() {
        *freq.entry(term.as_str()).or_default() += 1;
    }

    let score = |i: usize| -> f64 {
        let t = &terms[i];
        if t.is_empty() {
            return 0.0;
        }
        t.iter().map(|w| freq[w.as_str()] as f64).sum::<f64>() / t.len() as f64
    };

    let mut chosen: Vec<usize> = (0..sentences.len())
        .sorted_by(|&a, &b| score(b).total_cmp(&score(a)).then(a.cmp(&b)))
        .take(n)
        .collect();
    chosen.sort_unstable();
    chosen.iter().map(|&i| sentences[i].as_str()).join(" ")
}

/// Rank candidates by count, ties broken by first occurrence.
fn most_common(candidates: impl IntoIterator<Item = String>, n: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for word in candidates {
        match index.get(&word) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(word.clone(), counts.len());
                counts.push((word, 1));
            }
        }
    }
    // Stable sort keeps first-occurrence order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(n).map(|(w, _)| w).collect()
}

fn is_numeric(word: &str) -> bool {
    word.chars().all(char::is_numeric)
}

/// Derive up to `n` keyword tags from body text.
///
/// English text yields non-stopword tokens longer than three characters.
/// Other text yields embedded ASCII alphanumeric tokens (product names,
/// acronyms) longer than two characters. May return an empty list; callers
/// substitute [`fallback_tags`].
pub fn extract_tags(text: &str, n: usize) -> Vec<String> {
    if text.chars().count() < 10 {
        return Vec::new();
    }

    if is_mostly_ascii(text) {
        let candidates = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .filter(|w| !STOPWORDS.contains(*w))
            .filter(|w| w.chars().count() > 3 && !is_numeric(w))
            .map(str::to_string);
        most_common(candidates, n)
    } else {
        let candidates = ASCII_WORD
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|w| w.len() > 2 && w.chars().any(|c| c.is_ascii_alphabetic()))
            .map(str::to_string);
        most_common(candidates, n)
    }
}

/// Tags used when extraction yields none: the category's leading keyword and
/// the source's first word. Never empty.
pub fn fallback_tags(category: &str, source: &str) -> Vec<String> {
    let mut tags: Vec<String> = [
        category.split('・').next().unwrap_or(category).trim(),
        source.split_whitespace().next().unwrap_or(source),
    ]
    .into_iter()
    .filter(|t| !t.is_empty())
    .map(str::to_string)
    .unique()
    .collect();

    if tags.is_empty() {
        tags.push(if category.is_empty() { "News".to_string() } else { category.to_string() });
    }
    tags
}

/// Reading time estimate, at least one minute.
pub fn read_time_minutes(text: &str) -> u32 {
    let minutes = (text.chars().count() as f64 / CHARS_PER_MINUTE).round_ties_even();
    (minutes as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mostly_ascii_threshold() {
        assert!(is_mostly_ascii("Plain English sentence."));
        assert!(!is_mostly_ascii("日本語の文章です。"));
        assert!(!is_mostly_ascii(""));
        // Exactly 80% is not strictly greater.
        assert!(!is_mostly_ascii("abcdefgh日本"));
        assert!(is_mostly_ascii("abcdefghi日"));
    }

    #[test]
    fn test_is_mostly_ascii_only_reads_window() {
        let text = format!("{}{}", "a".repeat(LANG_WINDOW), "日".repeat(5000));
        assert!(is_mostly_ascii(&text));
    }

    #[test]
    fn test_split_sentences() {
        let text = "Rust 1.80 shipped today. It is fast! Is it? 日本語です。次の文";
        assert_eq!(
            split_sentences(text),
            vec!["Rust 1.80 shipped today.", "It is fast!", "Is it?", "日本語です。", "次の文"]
        );
    }

    #[test]
    fn test_lead_sentence() {
        assert_eq!(lead_sentence("  First one. Second one."), Some("First one.".to_string()));
        assert_eq!(lead_sentence("   "), None);
        assert_eq!(
            lead_sentence("Breaking news\nRust ships a new  release. More later."),
            Some("Breaking news Rust ships a new release.".to_string())
        );
    }

    #[test]
    fn test_extract_tags_english_frequency_and_ties() {
        let text = "The compiler team shipped a compiler update. Benchmarks improved, \
                    and the compiler now handles async code. Benchmarks matter; 2024 was busy.";
        let tags = extract_tags(text, 3);
        assert_eq!(tags, vec!["compiler", "Benchmarks", "team"]);
    }

    #[test]
    fn test_extract_tags_skips_capitalized_extras_and_numbers() {
        let tags = extract_tags("This That This 12345 12345 12345 kernel", 3);
        assert_eq!(tags, vec!["kernel"]);
    }

    #[test]
    fn test_extract_tags_non_english_pulls_ascii_tokens() {
        let text = "AppleがiPhoneの新モデルを発表。iPhoneはA18チップを搭載し、AppleはAIも強化。";
        let tags = extract_tags(text, 3);
        assert_eq!(tags, vec!["Apple", "iPhone", "A18"]);
    }

    #[test]
    fn test_extract_tags_short_text() {
        assert!(extract_tags("tiny", 3).is_empty());
    }

    #[test]
    fn test_fallback_tags() {
        assert_eq!(
            fallback_tags("AI・テクノロジートレンド", "Hacker News"),
            vec!["AI", "Hacker"]
        );
        assert_eq!(fallback_tags("Zenn", "Zenn"), vec!["Zenn"]);
        assert_eq!(fallback_tags("", ""), vec!["News"]);
    }

    #[test]
    fn test_summarize_keeps_document_order() {
        let text = "Rust memory safety matters. Cats are nice. Rust safety prevents memory bugs. \
                    Weather was mild.";
        let summary = summarize(text, 2);
        assert_eq!(summary, "Rust memory safety matters. Rust safety prevents memory bugs.");
    }

    #[test]
    fn test_summarize_short_text_is_whole_text() {
        assert_eq!(summarize("One. Two.", 3), "One. Two.");
    }

    #[test]
    fn test_read_time_minutes() {
        assert_eq!(read_time_minutes(""), 1);
        assert_eq!(read_time_minutes(&"あ".repeat(1000)), 2);
        assert_eq!(read_time_minutes(&"あ".repeat(1400)), 4);
        assert_eq!(read_time_minutes(&"あ".repeat(4000)), 10);
    }
}

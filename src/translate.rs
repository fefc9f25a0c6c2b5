//! Translation into the target display language.
//!
//! The [`Translate`] trait is the seam; [`GoogleTranslator`] calls the public
//! `translate_a/single` endpoint with automatic source-language detection.
//!
//! Translation is a quality enhancement, never a hard dependency: callers go
//! through [`translate_or_original`], which hands back the input text on any
//! failure. Each fragment (title, summary, every tag) is translated in its own
//! call so that one failure cannot block the others.

use crate::http::{BoxError, FetchText};
use crate::utils::truncate_for_log;
use serde_json::Value;
use std::future::Future;
use tracing::debug;

const GOOGLE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Translate a text fragment into the target language.
pub trait Translate: Send + Sync {
    fn translate(&self, text: &str) -> impl Future<Output = Result<String, BoxError>> + Send;
}

/// Translator backed by the public Google endpoint.
#[derive(Debug)]
pub struct GoogleTranslator<F> {
    fetcher: F,
    endpoint: String,
    target: String,
}

impl<F: FetchText> GoogleTranslator<F> {
    pub fn new(fetcher: F, target: impl Into<String>) -> Self {
        Self {
            fetcher,
            endpoint: GOOGLE_ENDPOINT.to_string(),
            target: target.into(),
        }
    }

    fn request_url(&self, text: &str) -> String {
        format!(
            "{}?client=gtx&sl=auto&tl={}&dt=t&q={}",
            self.endpoint,
            urlencoding::encode(&self.target),
            urlencoding::encode(text)
        )
    }
}

/// Pull the translated text and the detected source language out of a
/// `translate_a/single` response: `[[["訳", "src", ..], ..], null, "en", ..]`.
pub fn parse_google_response(body: &str) -> Result<(String, Option<String>), BoxError> {
    let value: Value = serde_json::from_str(body)?;
    let segments = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or("response has no translation segments")?;

    let text: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err("empty translation".into());
    }
    let detected = value.get(2).and_then(Value::as_str).map(str::to_string);
    Ok((text, detected))
}

impl<F: FetchText> Translate for GoogleTranslator<F> {
    async fn translate(&self, text: &str) -> Result<String, BoxError> {
        let body = self.fetcher.fetch_text(&self.request_url(text)).await?;
        let (translated, detected) = parse_google_response(&body)?;
        debug!(
            detected = detected.as_deref().unwrap_or("?"),
            target = %self.target,
            input = %truncate_for_log(text, 60),
            "Translated fragment"
        );
        Ok(translated)
    }
}

/// Translate `text`, or return it unchanged if translation fails.
pub async fn translate_or_original<T: Translate>(translator: &T, text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    match translator.translate(text).await {
        Ok(translated) if !translated.trim().is_empty() => translated,
        Ok(_) => text.to_string(),
        Err(e) => {
            debug!(error = %e, input = %truncate_for_log(text, 60), "Translation failed; keeping original");
            text.to_string()
        }
    }
}

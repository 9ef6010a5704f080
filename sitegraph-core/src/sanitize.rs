//! Cleanup of generated answers that cite URLs.
//!
//! Sentences citing URLs that are neither known nor present in the prompt are
//! dropped unless the URL answers 200 to a live check.

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use sitegraph_scanner::fetch::DEFAULT_USER_AGENT;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[\w.-]+(?:/[\w./?%&=-]*)?\b").expect("valid url pattern")
});

static BROKEN_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ttps?://").expect("valid scheme pattern"));

static ANCHOR_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]\(#.*?\)").expect("valid anchor pattern"));

#[async_trait]
pub trait LinkChecker: Send + Sync {
    /// True when the URL answers with status 200.
    async fn is_reachable(&self, url: &str) -> bool;
}

pub struct HttpLinkChecker {
    client: Client,
}

impl HttpLinkChecker {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkChecker for HttpLinkChecker {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Link check failed for {}: {}", url, e);
                false
            }
        }
    }
}

/// Treats every URL as reachable. Used when live checks are disabled.
pub struct AssumeReachable;

#[async_trait]
impl LinkChecker for AssumeReachable {
    async fn is_reachable(&self, _url: &str) -> bool {
        true
    }
}

/// Repairs `ttp://` and `ttps://` that lost their leading `h`.
pub fn clean_error_url(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len() + 4);
    let mut last = 0;
    for found in BROKEN_SCHEME.find_iter(text) {
        let preceded_by_h = text[..found.start()].ends_with('h');
        cleaned.push_str(&text[last..found.start()]);
        if !preceded_by_h {
            cleaned.push('h');
        }
        cleaned.push_str(found.as_str());
        last = found.end();
    }
    cleaned.push_str(&text[last..]);
    cleaned
}

/// Splits after `.`, `?` or `!` followed by whitespace. Abbreviations such as
/// `e.g.` and `Mr.` do not end a sentence. The separating whitespace character
/// is dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;

    for (pos, &(byte_idx, ch)) in chars.iter().enumerate() {
        if !ch.is_whitespace() || pos == 0 {
            continue;
        }
        if !matches!(chars[pos - 1].1, '.' | '?' | '!') {
            continue;
        }
        if is_abbreviation(&chars[..pos]) {
            continue;
        }
        sentences.push(&text[start..byte_idx]);
        start = byte_idx + ch.len_utf8();
    }
    sentences.push(&text[start..]);
    sentences
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// `prefix` ends right before a candidate boundary.
fn is_abbreviation(prefix: &[(usize, char)]) -> bool {
    let n = prefix.len();
    // "e.g." style: word, dot, word, any
    if n >= 4 {
        let [a, b, c, _] = [prefix[n - 4].1, prefix[n - 3].1, prefix[n - 2].1, prefix[n - 1].1];
        if is_word_char(a) && b == '.' && is_word_char(c) {
            return true;
        }
    }
    // "Mr." style: capital, lowercase, dot
    if n >= 3 {
        let [a, b, c] = [prefix[n - 3].1, prefix[n - 2].1, prefix[n - 1].1];
        if a.is_ascii_uppercase() && b.is_ascii_lowercase() && c == '.' {
            return true;
        }
    }
    false
}

/// True when some `[...]` in the sentence is not directly followed by `(http`.
fn has_unlinked_brackets(sentence: &str) -> bool {
    for line in sentence.split('\n') {
        for (open, _) in line.match_indices('[') {
            for (offset, _) in line[open + 1..].match_indices(']') {
                let close = open + 1 + offset;
                if !line[close + 1..].starts_with("(http") {
                    return true;
                }
            }
        }
    }
    false
}

/// Deletes in-page `[text](#anchor)` links, then drops sentences that still
/// contain bracketed text without an http link.
pub fn remove_bracketed_pattern(text: &str) -> String {
    let without_anchors = ANCHOR_LINK.replace_all(text, "");
    split_sentences(&without_anchors)
        .into_iter()
        .filter(|sentence| !has_unlinked_brackets(sentence))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Sanitizer {
    checker: Arc<dyn LinkChecker>,
    known_urls: HashSet<String>,
}

impl Sanitizer {
    pub fn new(checker: Arc<dyn LinkChecker>) -> Self {
        Self {
            checker,
            known_urls: HashSet::new(),
        }
    }

    pub fn with_known_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Drops sentences citing an unknown URL that fails a live check.
    pub async fn remove_unknown(&self, text: &str, prompt: &str) -> String {
        let mut cleaned = String::new();

        for sentence in split_sentences(text) {
            let mut keep = true;
            if sentence.contains("http://") || sentence.contains("https://") {
                for found in URL_PATTERN.find_iter(sentence) {
                    let url = found.as_str();
                    if self.known_urls.contains(url) || prompt.contains(url) {
                        continue;
                    }
                    if !self.checker.is_reachable(url).await {
                        debug!("Dropping sentence citing unreachable {}", url);
                        keep = false;
                        break;
                    }
                }
            }
            if keep {
                cleaned.push_str(sentence);
                cleaned.push(' ');
            }
        }

        cleaned.replace("()", "").replace("[]", "")
    }

    /// Applies literal replacements, then every cleanup step in order.
    pub async fn process_answer(
        &self,
        answer: &str,
        prompt: &str,
        replacements: &[(String, String)],
    ) -> String {
        let mut text = answer.trim().to_string();
        for (from, to) in replacements {
            if !from.is_empty() {
                text = text.replace(from.as_str(), to);
            }
        }
        let text = clean_error_url(&text);
        let text = self.remove_unknown(&text, prompt).await;
        remove_bracketed_pattern(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_error_url() {
        assert_eq!(
            clean_error_url("see ttps://a.com and ttp://b.com"),
            "see https://a.com and http://b.com"
        );
        assert_eq!(
            clean_error_url("already https://a.com fine"),
            "already https://a.com fine"
        );
        assert_eq!(clean_error_url("ttps://start.com"), "https://start.com");
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("One. Two? Three! Four"),
            vec!["One.", "Two?", "Three!", "Four"]
        );
        assert_eq!(
            split_sentences("Use e.g. this. Ask Mr. Smith."),
            vec!["Use e.g. this.", "Ask Mr. Smith."]
        );
        assert_eq!(split_sentences("no boundary"), vec!["no boundary"]);
    }

    #[test]
    fn test_url_pattern() {
        let found: Vec<&str> = URL_PATTERN
            .find_iter("go to https://example.com/a/b?x=1. or http://x.io")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, vec!["https://example.com/a/b?x=1", "http://x.io"]);
    }

    #[test]
    fn test_unlinked_brackets() {
        assert!(!has_unlinked_brackets("[docs](https://example.com)"));
        assert!(has_unlinked_brackets("see [1] for details"));
        assert!(has_unlinked_brackets("[a](https://x.com) and [b]"));
    }

    #[test]
    fn test_remove_bracketed_pattern() {
        let text = "Jump [here](#top) now. See [1] below. Read [docs](https://example.com).";
        assert_eq!(
            remove_bracketed_pattern(text),
            "Jump  now. Read [docs](https://example.com)."
        );
    }
}

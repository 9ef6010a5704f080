//! HTML to text and link extraction.
//!
//! Anchor text is emitted together with its absolute href so that a page's
//! text records which other pages it references. The reference graph is built
//! later by plain substring search over this text.

use crate::error::{Result, ScanError};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Elements whose text is never rendered.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// How anchor hrefs are written next to their link text.
#[derive(Debug, Clone, Copy)]
pub enum HrefMode<'a> {
    /// Resolve against `page_url`, keep only hrefs starting with `scope`.
    SameSite { page_url: &'a str, scope: &'a str },
    /// Write the href attribute as-is (local documents have no site).
    Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub title: Option<String>,
}

/// Drops the fragment and any trailing slashes.
pub fn normalize_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment.trim_end_matches('/').to_string()
}

/// Canonical crawl scope for a seed: parsed through `Url` (lowercase host,
/// default port dropped, percent-encoded path) and then normalized, so it
/// prefixes links produced by [`resolve_url`].
pub fn site_scope(seed_url: &str) -> String {
    match Url::parse(seed_url) {
        Ok(parsed) => normalize_url(parsed.as_str()),
        Err(_) => normalize_url(seed_url),
    }
}

/// Resolves `href` against `base`, returning a normalized absolute URL.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel:, etc.
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    resolved.set_fragment(None);

    Some(normalize_url(resolved.as_str()))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScanError::ParseError(format!("Failed to parse selector '{}': {}", css, e)))
}

/// Collects the absolute URLs of every `a[href]` in the document.
pub fn extract_links(html: &str, current_url: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let link_selector = selector("a[href]")?;

    let links = document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_url(current_url, href))
        .collect::<Vec<_>>();

    debug!("Found {} links on {}", links.len(), current_url);
    Ok(links)
}

/// Returns the text of the first `<title>` element, if any.
pub fn extract_title(document: &Html) -> Result<Option<String>> {
    let title_selector = selector("title")?;
    Ok(document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty()))
}

/// Flattens a document into newline-separated text nodes.
///
/// Text inside an anchor is kept only when the anchor's href qualifies under
/// `mode`, and is then written as `"{text} {href}"`.
pub fn extract_text(html: &str, mode: HrefMode<'_>) -> Result<ExtractedText> {
    let document = Html::parse_document(html);
    let title = extract_title(&document)?;

    let mut lines: Vec<String> = Vec::new();
    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let text: &str = text;

        let mut anchor: Option<ElementRef<'_>> = None;
        let mut hidden = false;
        for ancestor in node.ancestors() {
            let Some(element) = ElementRef::wrap(ancestor) else {
                continue;
            };
            let name = element.value().name();
            if HIDDEN_ELEMENTS.contains(&name) {
                hidden = true;
                break;
            }
            if name == "a" && anchor.is_none() {
                anchor = Some(element);
            }
        }
        if hidden || text.trim().is_empty() {
            continue;
        }

        match anchor.and_then(|a| a.value().attr("href")) {
            Some(href) => {
                if let Some(line) = anchor_line(text, href, mode) {
                    lines.push(line);
                }
            }
            None => lines.push(text.to_string()),
        }
    }

    Ok(ExtractedText {
        text: lines.join("\n"),
        title,
    })
}

fn anchor_line(text: &str, href: &str, mode: HrefMode<'_>) -> Option<String> {
    match mode {
        HrefMode::SameSite { page_url, scope } => {
            let absolute = resolve_url(page_url, href)?;
            absolute
                .starts_with(scope)
                .then(|| format!("{} {}", text, absolute))
        }
        HrefMode::Verbatim => Some(format!("{} {}", text, href)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
        assert_eq!(normalize_url("https://example.com/a/#top"), "https://example.com/a");
        assert_eq!(normalize_url("https://example.com/a"), "https://example.com/a");
    }

    #[test]
    fn test_site_scope_matches_resolved_links() {
        assert_eq!(site_scope("https://Example.COM/Docs/"), "https://example.com/Docs");
        assert_eq!(site_scope("http://example.com:80/a#x"), "http://example.com/a");
        assert_eq!(site_scope("https://example.com/my docs"), "https://example.com/my%20docs");

        let link = resolve_url("https://example.com/my%20docs/", "intro").unwrap();
        assert!(link.starts_with(&site_scope("https://example.com/my docs")));
    }

    #[test]
    fn test_resolve_relative_href() {
        assert_eq!(
            resolve_url("https://example.com/docs", "/about/"),
            Some("https://example.com/about".to_string())
        );
        assert_eq!(
            resolve_url("https://example.com/docs/", "intro#part"),
            Some("https://example.com/docs/intro".to_string())
        );
    }

    #[test]
    fn test_resolve_skips_non_navigational() {
        assert_eq!(resolve_url("https://example.com", "mailto:a@b.c"), None);
        assert_eq!(resolve_url("https://example.com", "javascript:void(0)"), None);
        assert_eq!(resolve_url("https://example.com", "#section"), None);
        assert_eq!(resolve_url("https://example.com", ""), None);
    }

    #[test]
    fn test_extract_links() {
        let html = r#"<html><body>
            <a href="/a">A</a>
            <a href="https://other.org/x">X</a>
            <a href="tel:123">call</a>
            <a>no href</a>
        </body></html>"#;
        let links = extract_links(html, "https://example.com").unwrap();
        assert_eq!(
            links,
            vec![
                "https://example.com/a".to_string(),
                "https://other.org/x".to_string()
            ]
        );
    }

    #[test]
    fn test_extract_text_appends_same_site_hrefs() {
        let html = r#"<html><head><title>Home</title><style>p{}</style></head><body>
            <p>Welcome</p>
            <a href="/pricing">Pricing</a>
            <a href="https://other.org/">Elsewhere</a>
            <script>var x = 1;</script>
        </body></html>"#;
        let extracted = extract_text(
            html,
            HrefMode::SameSite {
                page_url: "https://example.com",
                scope: "https://example.com",
            },
        )
        .unwrap();

        assert_eq!(extracted.title.as_deref(), Some("Home"));
        assert_eq!(
            extracted.text,
            "Home\nWelcome\nPricing https://example.com/pricing"
        );
    }

    #[test]
    fn test_extract_text_verbatim_hrefs() {
        let html = r#"<body><a href="faq.html">FAQ</a> plain</body>"#;
        let extracted = extract_text(html, HrefMode::Verbatim).unwrap();
        assert_eq!(extracted.text, "FAQ faq.html\n plain");
        assert_eq!(extracted.title, None);
    }
}

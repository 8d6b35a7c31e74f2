//! HTML parser for directory and entity pages
//!
//! This module handles parsing HTML content to extract:
//! - Entity profile links from directory pages
//! - A single field (the company website) from entity pages

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts links and fields from page HTML
pub trait PageParser: Send + Sync {
    /// Returns absolute links whose path contains `path_substring`
    ///
    /// Links are deduplicated and kept in document order.
    fn extract_links(&self, html: &str, base_url: &Url, path_substring: &str) -> Vec<String>;

    /// Returns the first element matching `selector`: its `href` when
    /// present, otherwise its text
    fn extract_field(&self, html: &str, selector: &str) -> Option<String>;
}

/// [`PageParser`] backed by the scraper crate
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl PageParser for HtmlParser {
    fn extract_links(&self, html: &str, base_url: &Url, path_substring: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let Ok(a_selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&a_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(absolute) = resolve_link(href, base_url) else {
                continue;
            };

            if !absolute.path().contains(path_substring) {
                continue;
            }

            let absolute = absolute.to_string();
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }

        links
    }

    fn extract_field(&self, html: &str, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        let document = Html::parse_document(html);
        let element = document.select(&selector).next()?;

        if let Some(href) = element.value().attr("href") {
            let href = href.trim();
            if !href.is_empty() {
                return Some(href.to_string());
            }
        }

        let text = element.text().collect::<String>();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid or non-HTTP(S) URLs
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }

    // Anchors within one profile are the same profile
    absolute.set_fragment(None);
    Some(absolute)
}

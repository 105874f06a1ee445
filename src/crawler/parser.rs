//! HTML parser for extracting links and metadata
//!
//! This module handles parsing fetched documents to extract:
//! - Outgoing links (from `<a>` and `<area>` tags) with their nofollow hint
//! - Page title and meta description
//!
//! Documents with a non-text content type are not parsed: they yield no links
//! and empty metadata instead of an error.

use crate::events::PageData;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A hyperlink found in a document, resolved to an absolute URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub url: String,
    /// The element carried `rel="nofollow"`
    pub nofollow: bool,
}

/// Extracted information from a fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub data: PageData,
    pub links: Vec<ExtractedLink>,
}

/// Parses a response body and extracts metadata and links
///
/// # Arguments
///
/// * `body` - The decoded response body
/// * `content_type` - The response Content-Type header, if any
/// * `page_url` - The URL the body was served from, used as the link base
///
/// # Example
///
/// ```
/// use site2graph::crawler::parse_page;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let parsed = parse_page(html, Some("text/html"), "https://example.com/");
/// assert_eq!(parsed.data.title.as_deref(), Some("Test"));
/// assert_eq!(parsed.links[0].url, "https://example.com/page");
/// ```
pub fn parse_page(body: &str, content_type: Option<&str>, page_url: &str) -> ParsedPage {
    if !is_queryable(content_type) {
        tracing::debug!(
            "Not parsing {} (content type {:?})",
            page_url,
            content_type.unwrap_or_default()
        );
        return ParsedPage::default();
    }

    let document = Html::parse_document(body);

    let links = match Url::parse(page_url) {
        Ok(base_url) => extract_links(&document, &base_url),
        Err(e) => {
            tracing::warn!("Cannot resolve links against {}: {}", page_url, e);
            Vec::new()
        }
    };

    ParsedPage {
        data: extract_metadata(&document),
        links,
    }
}

/// Returns true if a document with this content type can be queried
///
/// Missing content types, `text/*`, and HTML, XML, JSON or JavaScript
/// payloads are parsed; images, archives and other binary payloads are not.
pub fn is_queryable(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.is_empty()
        || mime.starts_with("text/")
        || mime.contains("html")
        || mime.contains("xml")
        || mime.contains("json")
        || mime.contains("javascript")
}

/// Extracts the title and meta description of a document
pub fn extract_metadata(document: &Html) -> PageData {
    PageData {
        title: extract_title(document),
        meta_description: extract_meta_description(document),
    }
}

/// First text node of the first `<title>` element
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .and_then(|element| element.text().next())
        .map(str::to_string)
}

/// `content` of the first `<meta name="description">` carrying one
fn extract_meta_description(document: &Html) -> Option<String> {
    let meta_selector = Selector::parse(r#"meta[name="description"][content]"#).ok()?;

    document
        .select(&meta_selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(str::to_string)
}

/// Extracts every resolvable link in document order
///
/// # Link Extraction Rules
///
/// - `<a href>` and `<area href>` elements are considered
/// - Raw values are stripped of surrounding whitespace
/// - `tel:` values are dropped (see [`filter_link_value`])
/// - Relative values resolve against `<base href>` if present, else `page_url`
/// - Values that cannot be resolved are skipped
/// - A URL already extracted from this document is not repeated
/// - Every other scheme is kept as-is
pub fn extract_links(document: &Html, page_url: &Url) -> Vec<ExtractedLink> {
    let base_url = document_base(document, page_url);
    let mut links: Vec<ExtractedLink> = Vec::new();

    let Ok(link_selector) = Selector::parse("a[href], area[href]") else {
        return links;
    };

    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(value) = filter_link_value(href.trim()) else {
            tracing::trace!("Dropping telephone link {}", href);
            continue;
        };

        let url = match base_url.join(value) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::trace!("Skipping unresolvable link {:?}: {}", value, e);
                continue;
            }
        };

        if links.iter().any(|link| link.url == url) {
            continue;
        }

        links.push(ExtractedLink {
            url,
            nofollow: has_nofollow(&element),
        });
    }

    links
}

/// Suppresses link values the extractor is known to mangle
///
/// Telephone links (`tel:...`) are mis-resolved into bogus absolute URLs by
/// naive extractors, so they are dropped entirely. Every other value is
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use site2graph::crawler::filter_link_value;
///
/// assert_eq!(filter_link_value("tel:+2345234"), None);
/// assert_eq!(filter_link_value("../link"), Some("../link"));
/// ```
pub fn filter_link_value(value: &str) -> Option<&str> {
    if value.starts_with("tel:") {
        None
    } else {
        Some(value)
    }
}

/// Resolves the document's `<base href>` against the page URL
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Refreshes at or above this many seconds are not treated as redirects
const META_REFRESH_MAX_DELAY: f64 = 100.0;

/// Target of the document's `<meta http-equiv="refresh">`, if it redirects
///
/// Refreshes inside `<noscript>`, without a URL, or with a delay of
/// [`META_REFRESH_MAX_DELAY`] seconds or more are ignored. The URL resolves
/// against `<base href>` like any link and must be http(s).
pub fn meta_refresh_target(body: &str, page_url: &Url) -> Option<Url> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("meta[http-equiv][content]").ok()?;

    let content = document
        .select(&selector)
        .filter(|element| {
            element
                .value()
                .attr("http-equiv")
                .is_some_and(|equiv| equiv.trim().eq_ignore_ascii_case("refresh"))
        })
        .find(|element| !inside_noscript(element))?
        .value()
        .attr("content")?;

    let (delay, target) = parse_refresh_content(content)?;
    if delay >= META_REFRESH_MAX_DELAY {
        return None;
    }

    let next = document_base(&document, page_url).join(target).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

/// Splits a refresh `content` value such as `5; url='/next'` into delay and URL
fn parse_refresh_content(content: &str) -> Option<(f64, &str)> {
    let pattern = Regex::new(r"(?i)^\s*(\d*\.?\d+)\s*[;,]\s*(?:url\s*=\s*)?(.*?)\s*$").ok()?;
    let captures = pattern.captures(content)?;

    let delay = captures.get(1)?.as_str().parse::<f64>().ok()?;
    let target = captures
        .get(2)?
        .as_str()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();

    (!target.is_empty()).then_some((delay, target))
}

fn inside_noscript(element: &ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|parent| parent.name() == "noscript")
    })
}

/// True if the element's `rel` attribute contains the `nofollow` token
fn has_nofollow(element: &ElementRef<'_>) -> bool {
    element.value().attr("rel").is_some_and(|rel| {
        rel.split(|c: char| c.is_ascii_whitespace() || c == ',')
            .any(|token| token.eq_ignore_ascii_case("nofollow"))
    })
}

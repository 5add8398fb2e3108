//! Directory listing parser
//!
//! This module extracts the entries of an HTTP directory index:
//! - Child links (from `<a href>` tags), resolved against the directory URL
//! - Whether each child is a sub-directory (trailing `/`)
//! - The size column, from table listings or `<pre>` style listings

use crate::skip::parse_size;
use crate::url::is_strict_child;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Decoded last path segment
    pub name: String,
    /// Absolute URL of the entry
    pub url: Url,
    pub is_dir: bool,
    /// Size shown by the listing, when there is one
    pub size: Option<u64>,
}

/// Parses a directory listing
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` whose resolved URL lies strictly below `base`
///
/// **Exclude:**
/// - Parent and sibling links (`../`, absolute links elsewhere)
/// - Sort links (`?C=N;O=D`) and fragments
/// - Duplicates of an earlier entry
///
/// # Arguments
///
/// * `html` - The listing body
/// * `base` - URL of the directory (ending with `/`)
///
/// # Returns
///
/// The entries in document order
///
/// # Example
///
/// ```
/// use httpeat::crawler::parse_listing;
/// use url::Url;
///
/// let html = r#"<table><tr><td><a href="b.img">b.img</a></td><td>1G</td></tr></table>"#;
/// let base = Url::parse("https://host1/a/").unwrap();
/// let entries = parse_listing(html, &base);
/// assert_eq!(entries[0].url.as_str(), "https://host1/a/b.img");
/// assert_eq!(entries[0].size, Some(1 << 30));
/// ```
pub fn parse_listing(html: &str, base: &Url) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return entries;
    };

    for anchor in document.select(&selector) {
        let Some(url) = anchor.value().attr("href").and_then(|h| resolve_child(h, base)) else {
            continue;
        };
        if !seen.insert(url.as_str().to_string()) {
            continue;
        }

        let is_dir = url.path().ends_with('/');
        let size = if is_dir {
            None
        } else {
            row_size(&anchor).or_else(|| trailing_text_size(&anchor))
        };

        entries.push(ListingEntry {
            name: entry_name(&url),
            url,
            is_dir,
            size,
        });
    }

    entries
}

/// Resolves an href and keeps it only if it points below `base`
fn resolve_child(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with('?') {
        return None;
    }

    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    is_strict_child(base, &url).then_some(url)
}

fn entry_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default();
    let raw = urlencoding::decode_binary(segment.as_bytes());
    String::from_utf8_lossy(&raw).into_owned()
}

/// Size from the other cells of the table row holding the anchor
fn row_size(anchor: &ElementRef<'_>) -> Option<u64> {
    let row = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "tr")?;

    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .filter(|cell| !anchor.ancestors().any(|a| a.id() == cell.id()))
        .find_map(|cell| parse_size(&cell.text().collect::<String>()))
}

/// Size from the text following the anchor, as in `<pre>` listings:
/// `<a href="f">f</a>   01-Jan-2020 10:00   1.2K`
fn trailing_text_size(anchor: &ElementRef<'_>) -> Option<u64> {
    let text = anchor.next_sibling()?.value().as_text()?;
    let line = text.lines().find(|l| !l.trim().is_empty())?;
    parse_size(line.split_whitespace().last()?)
}

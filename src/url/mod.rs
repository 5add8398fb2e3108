//! URL handling module for httpeat
//!
//! This module provides target parsing and classification, mirror rewriting,
//! and the mapping from remote URLs to local file paths.

mod mirror;
mod path;

use crate::UrlError;
use url::Url;

// Re-export main types
pub use mirror::MirrorRule;
pub use path::{fingerprint, PathEncoder, NAME_MAX_DEFAULT};

/// Kind of a target URL, inferred from its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A single file, downloaded directly
    Leaf,
    /// A directory index, crawled for children
    Directory,
}

impl TargetKind {
    /// Classifies a URL: a trailing `/` means a directory index
    pub fn of(url: &Url) -> Self {
        if url.path().ends_with('/') {
            Self::Directory
        } else {
            Self::Leaf
        }
    }
}

/// Parses a user-supplied target URL
///
/// Only `http` and `https` URLs with a host are accepted. Fragments are
/// dropped since they never reach the server.
///
/// # Arguments
///
/// * `input` - The URL string as given on the command line or in a list file
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The string is not a usable HTTP(S) URL
///
/// # Examples
///
/// ```
/// use httpeat::url::{parse_target, TargetKind};
///
/// let url = parse_target("https://example.com/pub/").unwrap();
/// assert_eq!(TargetKind::of(&url), TargetKind::Directory);
/// ```
pub fn parse_target(input: &str) -> Result<Url, UrlError> {
    let mut url =
        Url::parse(input.trim()).map_err(|e| UrlError::Parse(format!("{}: {}", input, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost(input.to_string()));
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns the percent-decoded path of a URL
///
/// Invalid UTF-8 sequences are replaced rather than rejected, so the result
/// is always usable for regex matching.
pub fn decoded_path(url: &Url) -> String {
    let raw = urlencoding::decode_binary(url.path().as_bytes());
    String::from_utf8_lossy(&raw).into_owned()
}

/// Returns true when `child` lives strictly below the directory `parent`
///
/// Both URLs must share scheme, host and port, `child` must carry no query,
/// and its path must extend the parent's path. This is what keeps an index
/// crawl from cycling back to an ancestor.
pub fn is_strict_child(parent: &Url, child: &Url) -> bool {
    if parent.scheme() != child.scheme()
        || parent.host_str() != child.host_str()
        || parent.port_or_known_default() != child.port_or_known_default()
    {
        return false;
    }

    if child.query().is_some() {
        return false;
    }

    let parent_path = parent.path();
    let child_path = child.path();
    parent_path.ends_with('/')
        && child_path.len() > parent_path.len()
        && child_path.starts_with(parent_path)
}

//! Mapping from remote URLs to local paths under the session data tree
//!
//! Every URL maps to `<data_root>/<host>[:<port>]/<decoded path segments>`.
//! The mapping is a pure function of the URL, so a resumed session always
//! resolves the same file for the same item.

use data_encoding::BASE32;
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use url::Url;

/// Default maximum length of a single path component, in bytes
pub const NAME_MAX_DEFAULT: usize = 255;

/// Length of the fingerprint inserted into shortened names
const FINGERPRINT_LEN: usize = 8;

/// Bytes reserved around the fingerprint when shortening (`_` + fp + `_`)
const SHORTEN_MARGIN: usize = 10;

/// Computes the deterministic fingerprint of a file name
///
/// The fingerprint is the first 8 characters of the base32 encoded MD5
/// digest of the full name.
///
/// # Examples
///
/// ```
/// use httpeat::url::fingerprint;
///
/// let name = format!("{}.img", "b".repeat(300));
/// assert_eq!(fingerprint(&name), "JRQN6PSE");
/// ```
pub fn fingerprint(name: &str) -> String {
    let digest = Md5::digest(name.as_bytes());
    let mut encoded = BASE32.encode(&digest);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}

/// Encodes URLs into local paths
#[derive(Debug, Clone)]
pub struct PathEncoder {
    data_root: PathBuf,
    name_max: usize,
}

impl PathEncoder {
    /// Creates an encoder rooted at `data_root`
    ///
    /// # Arguments
    ///
    /// * `data_root` - Directory all encoded paths live under
    /// * `name_max` - Maximum byte length of a single path component
    pub fn new(data_root: impl Into<PathBuf>, name_max: usize) -> Self {
        Self {
            data_root: data_root.into(),
            name_max,
        }
    }

    /// Returns the root of the data tree
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Returns the local path for a URL
    ///
    /// Path segments are percent-decoded. A decoded segment can never climb
    /// out of the data root: `/` and NUL are replaced with `_` and the `.`
    /// and `..` segments become underscores. Any component longer than the
    /// name limit is shortened with [`fingerprint`].
    ///
    /// # Examples
    ///
    /// ```
    /// use httpeat::url::PathEncoder;
    /// use std::path::Path;
    /// use url::Url;
    ///
    /// let encoder = PathEncoder::new("/tmp/session/data", 255);
    /// let url = Url::parse("https://host1/a/my%20file.img").unwrap();
    /// assert_eq!(
    ///     encoder.encode(&url),
    ///     Path::new("/tmp/session/data/host1/a/my file.img")
    /// );
    /// ```
    pub fn encode(&self, url: &Url) -> PathBuf {
        let mut path = self.data_root.clone();

        let host = url.host_str().unwrap_or("_");
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        path.push(self.encode_component(&host));

        if let Some(segments) = url.path_segments() {
            for segment in segments.filter(|s| !s.is_empty()) {
                let raw = urlencoding::decode_binary(segment.as_bytes());
                let decoded = String::from_utf8_lossy(&raw);
                path.push(self.encode_component(&decoded));
            }
        }

        path
    }

    fn encode_component(&self, component: &str) -> String {
        let sanitized = sanitize_component(component);
        if sanitized.len() > self.name_max {
            shorten_name(&sanitized, self.name_max)
        } else {
            sanitized
        }
    }
}

fn sanitize_component(component: &str) -> String {
    if component == "." || component == ".." {
        return "_".repeat(component.len());
    }
    component.replace(['/', '\0'], "_")
}

/// Shortens a name that exceeds `name_max` bytes
///
/// Keeps the head of the name, the fingerprint of the full name, then the
/// tail of the stem followed by the extension. The extension (from the last
/// `.`) is preserved verbatim; only one that cannot fit next to the
/// fingerprint at all is handled as part of the stem.
fn shorten_name(name: &str, name_max: usize) -> String {
    let keep = (name_max / 2).saturating_sub(SHORTEN_MARGIN);
    let fp = fingerprint(name);

    let ext = match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx + SHORTEN_MARGIN <= name_max => &name[idx..],
        _ => "",
    };
    let stem = &name[..name.len() - ext.len()];

    let (head_len, tail_len) = if ext.len() < keep {
        (keep, keep - ext.len())
    } else {
        // Long extension: head and tail split what it leaves
        let room = name_max - SHORTEN_MARGIN - ext.len();
        (room - room / 2, room / 2)
    };
    let head_end = floor_char_boundary(stem, head_len);
    let tail_start = ceil_char_boundary(stem, stem.len().saturating_sub(tail_len));

    format!("{}_{}_{}{}", &stem[..head_end], fp, &stem[tail_start..], ext)
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

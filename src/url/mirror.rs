//! Mirror rules: alternate hosts serving the same tree as a canonical base
//!
//! A rule is written `<mirror-base-url> mirrors <canonical-base-url>`.
//! Only URLs below the canonical base are ever rewritten; a URL that already
//! points at the mirror host is fetched as-is.

use crate::url::parse_target;
use crate::ConfigError;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A mirror base paired with the canonical base it mirrors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRule {
    mirror: Url,
    canonical: Url,
}

impl MirrorRule {
    /// Creates a rule from two base URLs, appending `/` when missing
    pub fn new(mirror: Url, canonical: Url) -> Self {
        Self {
            mirror: with_trailing_slash(mirror),
            canonical: with_trailing_slash(canonical),
        }
    }

    /// The mirror base URL
    pub fn mirror(&self) -> &Url {
        &self.mirror
    }

    /// The canonical base URL
    pub fn canonical(&self) -> &Url {
        &self.canonical
    }

    /// Returns true when `url` lives under the canonical base
    pub fn applies_to(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.canonical.as_str())
    }

    /// Rewrites a canonical URL onto the mirror base
    ///
    /// Returns `None` when the rule does not apply to `url`.
    ///
    /// # Examples
    ///
    /// ```
    /// use httpeat::url::MirrorRule;
    /// use url::Url;
    ///
    /// let rule: MirrorRule = "https://host2/pub/a/ mirrors https://host1/a/".parse().unwrap();
    /// let url = Url::parse("https://host1/a/b.img").unwrap();
    /// assert_eq!(rule.rewrite(&url).unwrap().as_str(), "https://host2/pub/a/b.img");
    /// ```
    pub fn rewrite(&self, url: &Url) -> Option<Url> {
        let remainder = url.as_str().strip_prefix(self.canonical.as_str())?;
        Url::parse(&format!("{}{}", self.mirror, remainder)).ok()
    }
}

impl FromStr for MirrorRule {
    type Err = ConfigError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [mirror, "mirrors", canonical] => {
                let mirror = parse_target(mirror)
                    .map_err(|e| ConfigError::InvalidMirror(format!("'{}': {}", line, e)))?;
                let canonical = parse_target(canonical)
                    .map_err(|e| ConfigError::InvalidMirror(format!("'{}': {}", line, e)))?;
                Ok(Self::new(mirror, canonical))
            }
            _ => Err(ConfigError::InvalidMirror(format!(
                "'{}': expected '<mirror-url> mirrors <canonical-url>'",
                line
            ))),
        }
    }
}

impl fmt::Display for MirrorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mirrors {}", self.mirror, self.canonical)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

//! Skip filter engine
//!
//! Rules are given as `<kind>:<argument>` strings:
//! - `dl-size-gt:<size>` skips downloads whose known size exceeds `<size>`
//! - `dl-path:<regex>` skips downloads whose decoded URL path matches
//! - `idx-path:<regex>` stops the crawl from entering matching directories
//!
//! A candidate is skipped as soon as one rule matches. Decisions are made
//! once, when an item is discovered.

mod size;

pub use size::parse_size;

use crate::ConfigError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// A single skip rule
#[derive(Debug, Clone)]
pub enum SkipRule {
    /// Skip downloads larger than this many bytes
    DownloadSizeGreaterThan(u64),
    /// Skip downloads whose path matches
    DownloadPath(Regex),
    /// Skip index directories whose path matches
    IndexPath(Regex),
}

impl FromStr for SkipRule {
    type Err = ConfigError;

    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = rule.split_once(':').ok_or_else(|| {
            ConfigError::InvalidSkipRule(format!("'{}': expected '<kind>:<argument>'", rule))
        })?;

        let compile = |arg: &str| {
            Regex::new(arg).map_err(|e| ConfigError::InvalidSkipRule(format!("'{}': {}", rule, e)))
        };

        match kind {
            "dl-size-gt" => parse_size(arg)
                .map(Self::DownloadSizeGreaterThan)
                .ok_or_else(|| {
                    ConfigError::InvalidSkipRule(format!("'{}': invalid size '{}'", rule, arg))
                }),
            "dl-path" => compile(arg).map(Self::DownloadPath),
            "idx-path" => compile(arg).map(Self::IndexPath),
            other => Err(ConfigError::InvalidSkipRule(format!(
                "'{}': unknown rule kind '{}'",
                rule, other
            ))),
        }
    }
}

impl fmt::Display for SkipRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DownloadSizeGreaterThan(size) => write!(f, "dl-size-gt:{}", size),
            Self::DownloadPath(re) => write!(f, "dl-path:{}", re.as_str()),
            Self::IndexPath(re) => write!(f, "idx-path:{}", re.as_str()),
        }
    }
}

/// Something that may be skipped: its decoded URL path and known size
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub path: &'a str,
    pub size: Option<u64>,
}

/// Outcome of evaluating a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// Skipped; carries the text of the matching rule
    Skip(String),
}

impl Verdict {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip(_))
    }
}

/// An ordered set of skip rules
#[derive(Debug, Clone, Default)]
pub struct SkipFilter {
    rules: Vec<SkipRule>,
}

impl SkipFilter {
    pub fn new(rules: Vec<SkipRule>) -> Self {
        Self { rules }
    }

    /// Parses a list of rule strings
    ///
    /// # Returns
    ///
    /// * `Ok(SkipFilter)` - All rules parsed
    /// * `Err(ConfigError)` - The first rule that failed to parse
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|r| r.as_ref().parse())
            .collect::<Result<Vec<SkipRule>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[SkipRule] {
        &self.rules
    }

    /// Evaluates a download candidate against the download rules
    ///
    /// A candidate without a known size never matches a size rule.
    pub fn evaluate(&self, candidate: Candidate<'_>) -> Verdict {
        for rule in &self.rules {
            let matched = match rule {
                SkipRule::DownloadSizeGreaterThan(limit) => {
                    candidate.size.is_some_and(|size| size > *limit)
                }
                SkipRule::DownloadPath(re) => re.is_match(candidate.path),
                SkipRule::IndexPath(_) => false,
            };
            if matched {
                return Verdict::Skip(rule.to_string());
            }
        }
        Verdict::Keep
    }

    /// Evaluates a discovered directory against the index rules
    pub fn evaluate_index(&self, path: &str) -> Verdict {
        self.rules
            .iter()
            .find(|rule| matches!(rule, SkipRule::IndexPath(re) if re.is_match(path)))
            .map_or(Verdict::Keep, |rule| Verdict::Skip(rule.to_string()))
    }
}

//! httpeat: a resumable, concurrent HTTP harvester
//!
//! This crate crawls HTTP directory indexes and downloads the files they
//! list into a local mirror tree. Progress is persisted per item so an
//! interrupted session resumes without re-fetching completed work, and
//! downloads can be spread over several proxies and mirror hosts.

pub mod config;
pub mod crawler;
pub mod output;
pub mod skip;
pub mod state;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for httpeat operations
///
/// Only conditions that prevent a run from proceeding end up here. Failures
/// of individual items are recorded in the ledgers instead.
#[derive(Debug, Error)]
pub enum HttpeatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write into the data tree at {}: {message}", path.display())]
    DataTree { path: PathBuf, message: String },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid skip rule: {0}")]
    InvalidSkipRule(String),

    #[error("Invalid mirror rule: {0}")]
    InvalidMirror(String),

    #[error("Invalid proxy entry: {0}")]
    InvalidProxy(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for httpeat operations
pub type Result<T> = std::result::Result<T, HttpeatError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Httpeat, ProgressHandle, RunSummary};
pub use state::{ItemState, Phase, ProgressStats};
pub use url::{parse_target, PathEncoder, TargetKind};

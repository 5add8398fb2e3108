//! Crawler module: index crawling and downloading
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with per-request timeouts
//! - Directory listing parsing
//! - Retry classification and budgets
//! - Lane scheduling over proxies and mirrors
//! - Overall run orchestration

mod context;
mod coordinator;
mod fetcher;
mod indexer;
mod parser;
mod retry;
mod scheduler;

pub use context::CrawlContext;
pub use coordinator::{Httpeat, ProgressHandle, RunSummary, EXIT_INTERRUPTED};
pub use fetcher::{build_http_client, default_user_agent, ClientOptions, FetchError, Fetcher};
pub use indexer::IndexCrawler;
pub use parser::{parse_listing, ListingEntry};
pub use retry::{classify, Decision, ErrorClass, ItemBudget, RetryPolicy};
pub use scheduler::{build_lanes, pick_lane, BusyGuard, Lane, Scheduler};

use crate::config::Config;
use crate::HttpeatError;

/// Runs a complete harvest
///
/// This is the main entry point for a run without a shutdown signal. It
/// will:
/// 1. Open or create the session
/// 2. Seed the targets
/// 3. Crawl directory indexes and download files concurrently
/// 4. Checkpoint the ledgers
///
/// # Arguments
///
/// * `config` - The run configuration
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run drained; failed items are in the summary
/// * `Err(HttpeatError)` - The run could not start or hit a fatal error
pub async fn run(config: Config) -> Result<RunSummary, HttpeatError> {
    Httpeat::new(config)?.run().await
}

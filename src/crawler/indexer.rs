//! Directory index crawler
//!
//! Directories are items of the index store, so the crawl frontier is that
//! store's pending queue. Expanding a directory fetches and parses its
//! listing, then registers sub-directories in the index store and files in
//! the download store, in listing order, before the directory itself is
//! marked done.

use crate::crawler::context::CrawlContext;
use crate::crawler::parser::parse_listing;
use crate::crawler::retry::{classify, Decision};
use crate::crawler::scheduler::{dispatch, BusyGuard, Lane};
use crate::state::Phase;
use crate::storage::{Claim, Outcome};
use crate::HttpeatError;
use std::sync::Arc;

/// Crawls the pending directories of the index store
pub struct IndexCrawler {
    ctx: Arc<CrawlContext>,
    lanes: Vec<Arc<Lane>>,
}

impl IndexCrawler {
    pub fn new(ctx: Arc<CrawlContext>, lanes: Vec<Arc<Lane>>) -> Self {
        Self { ctx, lanes }
    }

    /// Runs the crawl until no directory is pending or being expanded
    ///
    /// Only expansions add directories, so the index store is sealed up
    /// front and drains once the last expansion is done.
    pub async fn run(&self) -> Result<(), HttpeatError> {
        let index = &self.ctx.index;
        index.seal();
        tracing::info!(
            "Index crawl started, {} directories pending",
            index.pending_count()
        );

        let ctx = Arc::clone(&self.ctx);
        let stop = self.ctx.stop_signal();
        dispatch(index, &self.lanes, stop, move |claim, lane| {
            expand(Arc::clone(&ctx), lane, claim)
        })
        .await?;

        let stats = index.stats();
        tracing::info!(
            "Index crawl {}: {} directories ok, {} failed",
            if self.ctx.is_stopping() { "stopped" } else { "finished" },
            stats.items_ok,
            stats.items_error
        );
        Ok(())
    }
}

/// Expands one directory
async fn expand(
    ctx: Arc<CrawlContext>,
    lane: BusyGuard,
    claim: Claim,
) -> Result<(), HttpeatError> {
    let url = claim.item().url.clone();
    let mut budget = ctx.retry.budget(Phase::Index);

    loop {
        tracing::debug!("Listing {} via {}", url, lane.name());
        let result = lane.fetcher().fetch_listing(&url).await;

        let error = match result {
            Ok(body) => {
                let entries = parse_listing(&body, &url);
                let (mut dirs, mut files) = (0, 0);
                for entry in entries {
                    if entry.is_dir {
                        dirs += usize::from(ctx.enqueue_directory(entry.url)?);
                    } else {
                        files += usize::from(ctx.enqueue_download(entry.url, entry.size)?);
                    }
                }
                tracing::info!("Indexed {}: {} directories, {} files", url, dirs, files);
                claim.complete(Outcome::Ok { size: None })?;
                ctx.retry.pause().await;
                return Ok(());
            }
            Err(error) => error,
        };

        match ctx.retry.decide(&mut budget, classify(&error)) {
            Decision::Retry => {
                tracing::debug!("Retrying listing {} after: {}", url, error);
                ctx.retry.pause().await;
            }
            Decision::GiveUp => {
                ctx.warn(format!("Index failed for {}: {}", url, error));
                claim.complete(Outcome::Error(error.to_string()))?;
                ctx.retry.pause().await;
                return Ok(());
            }
            Decision::Abort => {
                return Err(HttpeatError::DataTree {
                    path: claim.item().local_path.clone(),
                    message: error.to_string(),
                });
            }
        }
    }
}

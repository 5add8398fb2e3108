//! State shared by every task of a run

use crate::crawler::retry::RetryPolicy;
use crate::skip::{Candidate, SkipFilter, Verdict};
use crate::storage::{NewItem, StateStore, StorageError};
use crate::url::{decoded_path, PathEncoder};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use url::Url;

/// Stores, filters and policies of a run
#[derive(Debug)]
pub struct CrawlContext {
    pub index: Arc<StateStore>,
    pub download: Arc<StateStore>,
    pub skip: SkipFilter,
    pub encoder: PathEncoder,
    pub retry: RetryPolicy,
    warnings: Mutex<Vec<String>>,
    stop: watch::Sender<bool>,
}

impl CrawlContext {
    pub fn new(
        index: Arc<StateStore>,
        download: Arc<StateStore>,
        skip: SkipFilter,
        encoder: PathEncoder,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            index,
            download,
            skip,
            encoder,
            retry,
            warnings: Mutex::new(Vec::new()),
            stop: watch::channel(false).0,
        }
    }

    /// Asks every dispatcher to stop; running tasks are cancelled
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stopping(&self) -> bool {
        *self.stop.borrow()
    }

    pub(crate) fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Logs a warning and keeps it for the run summary
    pub fn warn(&self, message: String) {
        tracing::warn!("{}", message);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers a directory to crawl
    pub fn add_directory(&self, url: Url) -> Result<bool, StorageError> {
        let local_path = self.encoder.encode(&url);
        self.index.add(NewItem {
            url,
            local_path,
            size: None,
            skip_reason: None,
        })
    }

    /// Registers a sub-directory found in a listing, unless an index rule
    /// excludes it
    pub fn enqueue_directory(&self, url: Url) -> Result<bool, StorageError> {
        if let Verdict::Skip(rule) = self.skip.evaluate_index(&decoded_path(&url)) {
            tracing::debug!("Not descending into {} ({})", url, rule);
            return Ok(false);
        }
        self.add_directory(url)
    }

    /// Registers a file to download, recording it as skipped when a rule
    /// matches
    ///
    /// # Arguments
    ///
    /// * `url` - The file URL
    /// * `size` - Size hint from the listing, if any
    pub fn enqueue_download(&self, url: Url, size: Option<u64>) -> Result<bool, StorageError> {
        let verdict = self.skip.evaluate(Candidate {
            path: &decoded_path(&url),
            size,
        });
        let skip_reason = match verdict {
            Verdict::Keep => None,
            Verdict::Skip(rule) => {
                tracing::info!("Skipping {} ({})", url, rule);
                Some(rule)
            }
        };

        let local_path = self.encoder.encode(&url);
        self.download.add(NewItem {
            url,
            local_path,
            size,
            skip_reason,
        })
    }
}

//! Retry policy and error classification
//!
//! Failures fall into three classes:
//! - network errors (timeouts, refused or reset connections) retry against a
//!   budget owned by each item, separate for index and download work
//! - any other error retries against a single budget shared by the whole run
//! - fatal errors abort the run

use crate::config::Config;
use crate::crawler::fetcher::FetchError;
use crate::state::Phase;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Class of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Timeouts, connection failures, peer resets and truncated bodies
    NetworkTransient,
    /// HTTP status errors and everything else
    Generic,
    /// The local data tree cannot be written
    Fatal,
}

/// Classifies a fetch failure
pub fn classify(error: &FetchError) -> ErrorClass {
    match error {
        FetchError::Timeout | FetchError::Connection(_) => ErrorClass::NetworkTransient,
        FetchError::Status(_) | FetchError::Other(_) => ErrorClass::Generic,
        FetchError::Io { source, .. } if source.kind() == ErrorKind::PermissionDenied => {
            ErrorClass::Fatal
        }
        FetchError::Io { .. } => ErrorClass::Generic,
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    GiveUp,
    Abort,
}

/// Retry budget carried by a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemBudget {
    network: u32,
}

impl ItemBudget {
    pub fn network_remaining(&self) -> u32 {
        self.network
    }
}

/// Run-wide retry policy
#[derive(Debug)]
pub struct RetryPolicy {
    dl_network: u32,
    index_network: u32,
    global: AtomicU32,
    wait: Duration,
}

impl RetryPolicy {
    /// Creates a policy
    ///
    /// # Arguments
    ///
    /// * `dl_network` - Network retries allowed per download item
    /// * `index_network` - Network retries allowed per index item
    /// * `global` - Retries of other errors allowed across the whole run
    /// * `wait` - Delay after each request
    pub fn new(dl_network: u32, index_network: u32, global: u32, wait: Duration) -> Self {
        Self {
            dl_network,
            index_network,
            global: AtomicU32::new(global),
            wait,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.retry_dl_networkerror,
            config.retry_index_networkerror,
            config.retry_global_error,
            config.wait_duration(),
        )
    }

    /// Fresh budget for an item of the given phase
    pub fn budget(&self, phase: Phase) -> ItemBudget {
        let network = match phase {
            Phase::Index => self.index_network,
            Phase::Download => self.dl_network,
        };
        ItemBudget { network }
    }

    /// Decides whether to retry after a failure of class `class`
    ///
    /// Consumes one unit of the matching budget when retrying.
    pub fn decide(&self, budget: &mut ItemBudget, class: ErrorClass) -> Decision {
        match class {
            ErrorClass::Fatal => Decision::Abort,
            ErrorClass::NetworkTransient => {
                if budget.network > 0 {
                    budget.network -= 1;
                    Decision::Retry
                } else {
                    Decision::GiveUp
                }
            }
            ErrorClass::Generic => {
                let taken = self
                    .global
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
                if taken.is_ok() {
                    Decision::Retry
                } else {
                    Decision::GiveUp
                }
            }
        }
    }

    /// Remaining run-wide retries
    pub fn global_remaining(&self) -> u32 {
        self.global.load(Ordering::Acquire)
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Sleeps for the configured delay, if any
    pub async fn pause(&self) {
        if !self.wait.is_zero() {
            tokio::time::sleep(self.wait).await;
        }
    }
}

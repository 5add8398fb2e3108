/// Item state definitions for tracking harvest progress
///
/// This module defines the states an item moves through and the two phases
/// items belong to.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of an item
///
/// ```text
/// Pending -> Running -> Ok
///                    -> Error
/// Skipped (assigned at discovery)
/// Running -> Pending (claim released)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    // ===== Active States =====
    /// Discovered and waiting for a worker
    Pending,

    /// Claimed by exactly one worker; never written to a ledger
    Running,

    // ===== Terminal States =====
    /// Fetched successfully
    Ok,

    /// Gave up after exhausting the retry budgets
    Error,

    /// Excluded by a skip rule at discovery
    Skipped,
}

impl ItemState {
    /// Returns true if this is a terminal state
    ///
    /// Terminal states are immutable; a resumed session never revisits them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ok | Self::Error | Self::Skipped)
    }

    /// Returns the state as recorded in a ledger
    ///
    /// A running claim does not survive a restart, so it is recorded as
    /// pending.
    pub fn persisted(&self) -> Self {
        match self {
            Self::Running => Self::Pending,
            other => *other,
        }
    }

    /// Converts the state to its ledger string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a state from its ledger string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "ok" => Some(Self::Ok),
            "error" => Some(Self::Error),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// The two kinds of work a session tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Directory listings to crawl
    Index,
    /// Files to download
    Download,
}

impl Phase {
    /// File name of the phase's ledger inside the session directory
    pub fn ledger_file_name(&self) -> &'static str {
        match self {
            Self::Index => "state_index.csv",
            Self::Download => "state_download.csv",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Download => write!(f, "download"),
        }
    }
}

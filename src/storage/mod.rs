//! Storage module for persisting harvest state
//!
//! This module handles everything written to the session directory besides
//! downloaded content, including:
//! - Session directory layout and list files
//! - Per-phase CSV ledgers with their append-only journals
//! - The in-memory item store that hands out work and records outcomes

pub mod ledger;
pub mod session;
mod store;

pub use ledger::{read_records, Ledger, LedgerRecord};
pub use session::Session;
pub use store::{Claim, Item, NewItem, Outcome, StateStore};

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to replace ledger snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Corrupt ledger: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

//! CSV ledger with an append-only journal
//!
//! The ledger of a phase is a CSV snapshot (`state_<phase>.csv`) with one
//! row per item in discovery order, plus a headerless journal
//! (`state_<phase>.csv.journal`) receiving every mutation as it happens.
//! Each journal append is flushed before returning, so a killed process
//! loses at most the line being written. The journal is synced to disk
//! every [`SYNC_INTERVAL`] appends and on every checkpoint. Opening replays
//! the journal over the snapshot and compacts both into a fresh snapshot.

use crate::state::ItemState;
use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Number of journal records after which the snapshot is rewritten
pub(crate) const CHECKPOINT_INTERVAL: usize = 256;

/// Number of journal appends between two syncs
pub(crate) const SYNC_INTERVAL: usize = 32;

/// One ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub url: String,
    pub local_path: String,
    pub size: Option<u64>,
    pub state: ItemState,
    pub updated_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// A phase ledger opened for writing
#[derive(Debug)]
pub struct Ledger {
    snapshot_path: PathBuf,
    records: Vec<LedgerRecord>,
    index: HashMap<String, usize>,
    journal: csv::Writer<File>,
    since_checkpoint: usize,
    unsynced: usize,
}

impl Ledger {
    /// Opens (or creates) the ledger at `snapshot_path`
    ///
    /// Any journal left by a previous run is replayed and folded into the
    /// snapshot before new writes are accepted.
    pub fn open(snapshot_path: &Path) -> Result<Self, StorageError> {
        let records = read_records(snapshot_path)?;
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.url.clone(), i))
            .collect();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(journal_path(snapshot_path))?;
        let journal = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let mut ledger = Self {
            snapshot_path: snapshot_path.to_path_buf(),
            records,
            index,
            journal,
            since_checkpoint: 0,
            unsynced: 0,
        };
        ledger.checkpoint()?;
        Ok(ledger)
    }

    /// Records in discovery order
    pub fn records(&self) -> &[LedgerRecord] {
        &self.records
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Records a new or updated row
    ///
    /// The row replaces an existing one with the same URL, keeping its
    /// position; otherwise it is appended.
    pub fn record(&mut self, record: LedgerRecord) -> Result<(), StorageError> {
        self.journal.serialize(&record)?;
        self.journal.flush()?;
        self.unsynced += 1;
        if self.unsynced >= SYNC_INTERVAL {
            self.journal.get_ref().sync_data()?;
            self.unsynced = 0;
        }

        upsert(&mut self.records, &mut self.index, record);

        self.since_checkpoint += 1;
        if self.since_checkpoint >= CHECKPOINT_INTERVAL {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Atomically rewrites the snapshot and empties the journal
    pub fn checkpoint(&mut self) -> Result<(), StorageError> {
        let dir = self
            .snapshot_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(&mut tmp);
            for record in &self.records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.snapshot_path)?;

        self.journal.get_ref().set_len(0)?;
        self.journal.get_ref().sync_data()?;
        self.since_checkpoint = 0;
        self.unsynced = 0;

        tracing::trace!(
            "Checkpointed {} ({} records)",
            self.snapshot_path.display(),
            self.records.len()
        );
        Ok(())
    }

    /// Checkpoints and closes the ledger
    pub fn close(mut self) -> Result<(), StorageError> {
        self.checkpoint()
    }
}

/// Reads the current contents of a ledger without opening it for writing
///
/// The snapshot is read first, then the journal (if any) is replayed over
/// it. A malformed trailing journal line, left by an interrupted write, ends
/// the replay with a warning.
///
/// # Arguments
///
/// * `snapshot_path` - Path of the `state_<phase>.csv` file
///
/// # Returns
///
/// * `Ok(Vec<LedgerRecord>)` - Records in discovery order (empty if the ledger does not exist)
/// * `Err(StorageError)` - The snapshot could not be read or is corrupt
pub fn read_records(snapshot_path: &Path) -> Result<Vec<LedgerRecord>, StorageError> {
    let mut records = Vec::new();
    let mut index = HashMap::new();

    if snapshot_path.exists() {
        let mut reader = csv::Reader::from_path(snapshot_path)?;
        for result in reader.deserialize::<LedgerRecord>() {
            let record = result.map_err(|e| {
                StorageError::Corrupt(format!("{}: {}", snapshot_path.display(), e))
            })?;
            upsert(&mut records, &mut index, record);
        }
    }

    let journal = journal_path(snapshot_path);
    if journal.exists() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&journal)?;
        let mut replayed = 0usize;
        for result in reader.deserialize::<LedgerRecord>() {
            match result {
                Ok(record) => {
                    upsert(&mut records, &mut index, record);
                    replayed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Ignoring torn journal tail in {} after {} records: {}",
                        journal.display(),
                        replayed,
                        e
                    );
                    break;
                }
            }
        }
        if replayed > 0 {
            tracing::debug!("Replayed {} journal records from {}", replayed, journal.display());
        }
    }

    Ok(records)
}

/// Path of the journal belonging to a snapshot
pub fn journal_path(snapshot_path: &Path) -> PathBuf {
    let mut name = snapshot_path.as_os_str().to_os_string();
    name.push(".journal");
    PathBuf::from(name)
}

fn upsert(records: &mut Vec<LedgerRecord>, index: &mut HashMap<String, usize>, record: LedgerRecord) {
    match index.get(&record.url) {
        Some(&i) => records[i] = record,
        None => {
            index.insert(record.url.clone(), records.len());
            records.push(record);
        }
    }
}

//! Per-phase item store
//!
//! The store is the only place items change state. It hands out pending
//! items one claim at a time, records terminal outcomes in the phase ledger
//! before updating the live counters, and wakes waiting dispatchers whenever
//! something changes.

use crate::state::{ItemState, Phase, PhaseCounters, ProgressStats};
use crate::storage::ledger::{Ledger, LedgerRecord};
use crate::storage::StorageError;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use url::Url;

/// An item tracked by a store
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub url: Url,
    pub local_path: PathBuf,
    /// Size hint from the listing, or the actual size once downloaded
    pub size: Option<u64>,
    pub state: ItemState,
}

/// A freshly discovered item
#[derive(Debug, Clone)]
pub struct NewItem {
    pub url: Url,
    pub local_path: PathBuf,
    pub size: Option<u64>,
    /// When set, the item is recorded as skipped with this reason
    pub skip_reason: Option<String>,
}

/// Terminal outcome of a claimed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Completed; carries the final size when known
    Ok { size: Option<u64> },
    /// Gave up; carries the last error
    Error(String),
}

struct StoreInner {
    items: Vec<Item>,
    by_url: HashMap<String, usize>,
    /// Pending item ids, kept in discovery order
    pending: VecDeque<usize>,
    running: usize,
    ledger: Ledger,
}

impl StoreInner {
    fn requeue(&mut self, id: usize) {
        let pos = self.pending.partition_point(|&p| p < id);
        self.pending.insert(pos, id);
    }
}

/// Item store for one phase
pub struct StateStore {
    phase: Phase,
    inner: Mutex<StoreInner>,
    counters: PhaseCounters,
    changed: Notify,
    sealed: AtomicBool,
}

impl StateStore {
    /// Opens the store backed by the ledger at `ledger_path`
    ///
    /// Items recorded by a previous run are restored in discovery order.
    /// Terminal items keep their state; anything else becomes pending again.
    /// Counters are seeded from the restored items.
    pub fn open(phase: Phase, ledger_path: &Path) -> Result<Arc<Self>, StorageError> {
        let ledger = Ledger::open(ledger_path)?;
        let counters = PhaseCounters::new();

        let mut items = Vec::with_capacity(ledger.records().len());
        let mut by_url = HashMap::with_capacity(ledger.records().len());
        let mut pending = VecDeque::new();

        for record in ledger.records() {
            let url = Url::parse(&record.url).map_err(|e| {
                StorageError::Corrupt(format!(
                    "{}: bad url '{}': {}",
                    ledger.path().display(),
                    record.url,
                    e
                ))
            })?;
            let state = record.state.persisted();
            let id = items.len();

            counters.add_total(1);
            match state {
                ItemState::Ok => counters.add_ok(1),
                ItemState::Error => counters.add_error(1),
                ItemState::Skipped => counters.add_skipped(1),
                _ => pending.push_back(id),
            }
            if state != ItemState::Skipped {
                if let Some(size) = record.size {
                    counters.add_size_total(size);
                    if state == ItemState::Ok {
                        counters.add_size_completed(size);
                    }
                }
            }

            by_url.insert(record.url.clone(), id);
            items.push(Item {
                url,
                local_path: PathBuf::from(&record.local_path),
                size: record.size,
                state,
            });
        }

        if !items.is_empty() {
            tracing::info!(
                "Restored {} {} items ({} pending) from {}",
                items.len(),
                phase,
                pending.len(),
                ledger.path().display()
            );
        }

        Ok(Arc::new(Self {
            phase,
            inner: Mutex::new(StoreInner {
                items,
                by_url,
                pending,
                running: 0,
                ledger,
            }),
            counters,
            changed: Notify::new(),
            sealed: AtomicBool::new(false),
        }))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a discovered item
    ///
    /// Items are deduplicated by URL, which makes re-discovery on resume a
    /// no-op.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The item is new and was recorded
    /// * `Ok(false)` - The URL was already known
    /// * `Err(StorageError)` - The ledger write failed
    pub fn add(&self, new: NewItem) -> Result<bool, StorageError> {
        let state = if new.skip_reason.is_some() {
            ItemState::Skipped
        } else {
            ItemState::Pending
        };

        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.by_url.contains_key(new.url.as_str()) {
                return Ok(false);
            }

            inner.ledger.record(LedgerRecord {
                url: new.url.to_string(),
                local_path: new.local_path.display().to_string(),
                size: new.size,
                state,
                updated_at: Some(Utc::now()),
                message: new.skip_reason.clone(),
            })?;

            let id = inner.items.len();
            inner.by_url.insert(new.url.to_string(), id);
            inner.items.push(Item {
                url: new.url,
                local_path: new.local_path,
                size: new.size,
                state,
            });
            if state == ItemState::Pending {
                inner.pending.push_back(id);
            }
        }

        self.counters.add_total(1);
        if state == ItemState::Skipped {
            self.counters.add_skipped(1);
        } else if let Some(size) = new.size {
            self.counters.add_size_total(size);
        }

        self.changed.notify_waiters();
        Ok(true)
    }

    /// Claims the first pending item accepted by `eligible`
    ///
    /// Items are considered in discovery order. The returned [`Claim`] is
    /// the only handle allowed to complete the item; dropping it without
    /// completing puts the item back to pending.
    pub fn next_pending<F>(self: &Arc<Self>, eligible: F) -> Option<Claim>
    where
        F: Fn(&Item) -> bool,
    {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let pos = inner
            .pending
            .iter()
            .position(|&id| eligible(&inner.items[id]))?;
        let id = inner.pending.remove(pos)?;

        inner.items[id].state = ItemState::Running;
        inner.running += 1;

        Some(Claim {
            store: Arc::clone(self),
            id,
            item: inner.items[id].clone(),
            finished: false,
        })
    }

    fn complete(&self, id: usize, outcome: Outcome) -> Result<(), StorageError> {
        let state = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let item = &inner.items[id];
            if item.state.is_terminal() {
                return Ok(());
            }

            let (state, size, message) = match outcome {
                Outcome::Ok { size } => (ItemState::Ok, size.or(item.size), None),
                Outcome::Error(message) => (ItemState::Error, item.size, Some(message)),
            };

            inner.ledger.record(LedgerRecord {
                url: item.url.to_string(),
                local_path: item.local_path.display().to_string(),
                size,
                state,
                updated_at: Some(Utc::now()),
                message,
            })?;

            let was_running = item.state == ItemState::Running;
            let item = &mut inner.items[id];
            item.state = state;
            item.size = size;

            if was_running {
                inner.running -= 1;
            } else if let Some(pos) = inner.pending.iter().position(|&p| p == id) {
                inner.pending.remove(pos);
            }
            state
        };

        match state {
            ItemState::Ok => self.counters.add_ok(1),
            _ => self.counters.add_error(1),
        }
        self.changed.notify_waiters();
        Ok(())
    }

    fn release(&self, id: usize) {
        {
            let mut inner = self.lock();
            if inner.items[id].state != ItemState::Running {
                return;
            }
            inner.items[id].state = ItemState::Pending;
            inner.running -= 1;
            inner.requeue(id);
        }
        tracing::debug!("Released claim on {} item #{}", self.phase, id);
        self.changed.notify_waiters();
    }

    /// Returns a future resolving on the next state change
    ///
    /// Call [`Notified::enable`] on the pinned future before inspecting the
    /// store so a change between the check and the wait is not missed.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    /// Marks the end of discovery for this store
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn running_count(&self) -> usize {
        self.lock().running
    }

    /// Returns a copy of every item in discovery order
    pub fn items(&self) -> Vec<Item> {
        self.lock().items.clone()
    }

    pub fn stats(&self) -> ProgressStats {
        self.counters.snapshot()
    }

    /// Adds bytes written to disk to the live counters
    pub fn add_size_completed(&self, bytes: u64) {
        self.counters.add_size_completed(bytes);
    }

    /// Adds newly learned expected bytes to the live counters
    pub fn add_size_total(&self, bytes: u64) {
        self.counters.add_size_total(bytes);
    }

    /// Rewrites the ledger snapshot
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.lock().ledger.checkpoint()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("phase", &self.phase)
            .field("stats", &self.stats())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

/// Exclusive claim on a running item
///
/// Dropping a claim that was not completed releases the item back to
/// pending.
#[derive(Debug)]
pub struct Claim {
    store: Arc<StateStore>,
    id: usize,
    item: Item,
    finished: bool,
}

impl Claim {
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// Records the terminal outcome of the item
    ///
    /// When the ledger write fails the claim is released like a dropped one.
    pub fn complete(mut self, outcome: Outcome) -> Result<(), StorageError> {
        self.store.complete(self.id, outcome)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.finished {
            self.store.release(self.id);
        }
    }
}

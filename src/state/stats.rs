//! Live progress counters
//!
//! Each phase owns a set of atomic counters that workers bump as items move
//! through their states. Readers take a plain [`ProgressStats`] snapshot;
//! counters only ever grow.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time copy of a phase's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressStats {
    /// Items known to the phase, whatever their state
    pub items_total: u64,
    pub items_ok: u64,
    pub items_error: u64,
    pub items_skipped: u64,
    /// Bytes written to disk (download phase only)
    pub size_completed: u64,
    /// Bytes expected across known sizes (download phase only)
    pub size_total: u64,
}

impl ProgressStats {
    /// Items that reached a terminal state
    pub fn items_done(&self) -> u64 {
        self.items_ok + self.items_error + self.items_skipped
    }

    /// Items still pending or running
    pub fn items_remaining(&self) -> u64 {
        self.items_total.saturating_sub(self.items_done())
    }
}

/// Atomic counters backing [`ProgressStats`]
#[derive(Debug, Default)]
pub struct PhaseCounters {
    items_total: AtomicU64,
    items_ok: AtomicU64,
    items_error: AtomicU64,
    items_skipped: AtomicU64,
    size_completed: AtomicU64,
    size_total: AtomicU64,
}

impl PhaseCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_total(&self, n: u64) {
        self.items_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_ok(&self, n: u64) {
        self.items_ok.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_error(&self, n: u64) {
        self.items_error.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_skipped(&self, n: u64) {
        self.items_skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_size_completed(&self, bytes: u64) {
        self.size_completed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_size_total(&self, bytes: u64) {
        self.size_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Takes a snapshot of all counters
    pub fn snapshot(&self) -> ProgressStats {
        ProgressStats {
            items_total: self.items_total.load(Ordering::Relaxed),
            items_ok: self.items_ok.load(Ordering::Relaxed),
            items_error: self.items_error.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
            size_completed: self.size_completed.load(Ordering::Relaxed),
            size_total: self.size_total.load(Ordering::Relaxed),
        }
    }
}

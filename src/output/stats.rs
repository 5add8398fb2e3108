//! Statistics generation from session ledgers
//!
//! This module provides functionality for extracting and displaying
//! per-phase statistics of a session, either from its ledgers on disk or
//! from the summary of a run that just finished.

use crate::crawler::RunSummary;
use crate::state::{ItemState, Phase, ProgressStats};
use crate::storage::{read_records, Session, StorageError};
use std::collections::HashMap;

/// Statistics of one phase of a session
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStatistics {
    pub phase: Phase,

    /// Number of items in the ledger
    pub total_items: u64,

    /// Count of items by state
    pub items_by_state: HashMap<ItemState, u64>,

    /// Bytes of completed items
    pub bytes_ok: u64,

    /// Failed items and their last error, in ledger order
    pub failures: Vec<(String, String)>,
}

impl PhaseStatistics {
    pub fn count(&self, state: ItemState) -> u64 {
        self.items_by_state.get(&state).copied().unwrap_or(0)
    }
}

/// Statistics of both phases of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatistics {
    pub index: PhaseStatistics,
    pub download: PhaseStatistics,
}

/// Loads statistics from the ledgers of a session
///
/// # Arguments
///
/// * `session` - The session to inspect
///
/// # Returns
///
/// * `Ok(SessionStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - A ledger could not be read
pub fn load_statistics(session: &Session) -> Result<SessionStatistics, StorageError> {
    Ok(SessionStatistics {
        index: load_phase(session, Phase::Index)?,
        download: load_phase(session, Phase::Download)?,
    })
}

fn load_phase(session: &Session, phase: Phase) -> Result<PhaseStatistics, StorageError> {
    let records = read_records(&session.ledger_path(phase))?;

    let mut items_by_state = HashMap::new();
    let mut bytes_ok = 0;
    let mut failures = Vec::new();

    for record in &records {
        *items_by_state.entry(record.state.persisted()).or_insert(0) += 1;
        match record.state {
            ItemState::Ok => bytes_ok += record.size.unwrap_or(0),
            ItemState::Error => failures.push((
                record.url.clone(),
                record.message.clone().unwrap_or_default(),
            )),
            _ => {}
        }
    }

    Ok(PhaseStatistics {
        phase,
        total_items: records.len() as u64,
        items_by_state,
        bytes_ok,
        failures,
    })
}

/// Formats a byte count with binary units
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SessionStatistics) {
    println!("=== Session Statistics ===\n");

    for phase in [&stats.index, &stats.download] {
        println!("{} ({} items):", phase.phase, phase.total_items);
        for state in [
            ItemState::Ok,
            ItemState::Error,
            ItemState::Skipped,
            ItemState::Pending,
        ] {
            let count = phase.count(state);
            let percentage = if phase.total_items > 0 {
                (count as f64 / phase.total_items as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", state, count, percentage);
        }
        if phase.phase == Phase::Download {
            println!("  downloaded: {}", format_size(phase.bytes_ok));
        }
        println!();
    }

    let failures: Vec<_> = stats
        .index
        .failures
        .iter()
        .chain(&stats.download.failures)
        .collect();
    if !failures.is_empty() {
        println!("Failures ({}):", failures.len());
        for (url, message) in failures {
            println!("  - {}: {}", url, message);
        }
    }
}

/// Prints the outcome of a run
pub fn print_summary(summary: &RunSummary) {
    println!(
        "{}",
        if summary.interrupted {
            "=== Run interrupted ==="
        } else {
            "=== Run complete ==="
        }
    );
    print_phase("index", &summary.index);
    print_phase("download", &summary.download);
    println!(
        "  bytes: {} / {}",
        format_size(summary.download.size_completed),
        format_size(summary.download.size_total)
    );

    if !summary.warnings.is_empty() {
        println!("\nWarnings ({}):", summary.warnings.len());
        for warning in &summary.warnings {
            println!("  - {}", warning);
        }
    }
}

fn print_phase(name: &str, stats: &ProgressStats) {
    println!(
        "  {}: {} ok, {} error, {} skipped, {} remaining of {}",
        name,
        stats.items_ok,
        stats.items_error,
        stats.items_skipped,
        stats.items_remaining(),
        stats.items_total
    );
}

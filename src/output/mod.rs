//! Output module for run reports
//!
//! This module handles:
//! - Live progress bars while a run is going
//! - Statistics of a session read back from its ledgers
//! - The end-of-run summary

pub mod progress;
pub mod stats;

pub use progress::{spawn_progress, ProgressDisplay};
pub use stats::{
    format_size, load_statistics, print_statistics, print_summary, PhaseStatistics,
    SessionStatistics,
};

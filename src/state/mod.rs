//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `ItemState`: Tracks the state of individual items (pending, running, ok, error, skipped)
//! - `Phase`: Distinguishes index crawling from downloading
//! - `ProgressStats` / `PhaseCounters`: Live per-phase counters and their snapshots

mod item_state;
mod stats;

// Re-export main types
pub use item_state::{ItemState, Phase};
pub use stats::{PhaseCounters, ProgressStats};

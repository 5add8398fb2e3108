//! Progress UI for harvest runs
//!
//! Bars are redrawn from [`ProgressStats`] snapshots polled on a timer, so
//! workers never touch the terminal.

use crate::crawler::ProgressHandle;
use crate::state::ProgressStats;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const REFRESH: Duration = Duration::from_millis(200);

/// A running progress display
#[derive(Debug)]
pub struct ProgressDisplay {
    handle: Option<tokio::task::JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl ProgressDisplay {
    /// Stops the display and waits for its last redraw
    pub async fn finish(self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle {
            let _ = handle.await;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }
}

/// Spawns the progress UI when requested
///
/// # Arguments
///
/// * `enabled` - Draw bars; when false the returned display does nothing
/// * `progress` - Counters of the run
/// * `show_index` - Also draw the index crawl line
pub fn spawn_progress(
    enabled: bool,
    progress: ProgressHandle,
    show_index: bool,
) -> ProgressDisplay {
    let stop = Arc::new(AtomicBool::new(false));
    if !enabled {
        return ProgressDisplay { handle: None, stop };
    }

    let handle = tokio::spawn(render(progress, show_index, Arc::clone(&stop)));
    ProgressDisplay {
        handle: Some(handle),
        stop,
    }
}

async fn render(progress: ProgressHandle, show_index: bool, stop: Arc<AtomicBool>) {
    let multi = MultiProgress::new();

    let index_bar = show_index.then(|| {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    });

    let download_bar = multi.add(ProgressBar::new(0));
    download_bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    loop {
        let done = stop.load(Ordering::SeqCst);

        if let Some(bar) = &index_bar {
            bar.set_message(index_message(&progress.index()));
        }
        let download = progress.download();
        download_bar.set_length(download.size_total.max(download.size_completed));
        download_bar.set_position(download.size_completed);
        download_bar.set_message(download_message(&download));

        if done {
            break;
        }
        tokio::time::sleep(REFRESH).await;
    }

    if let Some(bar) = index_bar {
        bar.finish();
    }
    download_bar.finish();
}

/// Status line of the index crawl
pub fn index_message(stats: &ProgressStats) -> String {
    format!(
        "index {}/{} directories ({} failed)",
        stats.items_done(),
        stats.items_total,
        stats.items_error
    )
}

/// Status line of the downloads
pub fn download_message(stats: &ProgressStats) -> String {
    let mut message = format!("files {}/{}", stats.items_done(), stats.items_total);
    if stats.items_error > 0 {
        message.push_str(&format!(", {} failed", stats.items_error));
    }
    if stats.items_skipped > 0 {
        message.push_str(&format!(", {} skipped", stats.items_skipped));
    }
    message
}

//! Live console dashboard
//!
//! One progress bar per worker plus a consolidated overall bar, refreshed on
//! a fixed cadence from status board snapshots. A worker whose status has
//! not moved past the staleness threshold gets an idle flag; the display
//! never acts on staleness beyond showing it.

use crate::status::{StatusBoard, WorkerState};
use datapolish_core::error::{Error, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub struct Dashboard {
    overall: ProgressBar,
    bars: BTreeMap<usize, ProgressBar>,
    idle_threshold: Duration,
    // Held so the bars keep rendering together
    _multi: MultiProgress,
}

impl Dashboard {
    /// Build bars for the given `(worker_id, total)` pairs
    pub fn new(workers: &[(usize, usize)], idle_threshold: Duration) -> Result<Self> {
        let multi = MultiProgress::new();

        let overall_total: usize = workers.iter().map(|(_, total)| total).sum();
        let overall = multi.add(ProgressBar::new(overall_total as u64));
        overall.set_style(
            ProgressStyle::with_template("Overall:   [{bar:30}] {pos}/{len} entries")
                .map_err(|e| Error::monitor(format!("Bad progress template: {e}")))?
                .progress_chars("█░░"),
        );

        let worker_style =
            ProgressStyle::with_template("Worker {prefix}: [{bar:30}] {pos}/{len} {msg}")
                .map_err(|e| Error::monitor(format!("Bad progress template: {e}")))?
                .progress_chars("█░░");

        let mut bars = BTreeMap::new();
        for (worker_id, total) in workers {
            let bar = multi.add(ProgressBar::new(*total as u64));
            bar.set_style(worker_style.clone());
            bar.set_prefix(worker_id.to_string());
            bar.set_message("not started");
            bars.insert(*worker_id, bar);
        }

        Ok(Self {
            overall,
            bars,
            idle_threshold,
            _multi: multi,
        })
    }

    /// Redraw every bar from a fresh board snapshot
    pub async fn refresh(&self, board: &StatusBoard) {
        for (worker_id, status) in board.snapshot().await {
            let Some(bar) = self.bars.get(&worker_id) else {
                continue;
            };
            bar.set_length(status.total as u64);
            bar.set_position(status.progress as u64);

            let idle = status.state != WorkerState::Completed
                && status.last_update.elapsed() > self.idle_threshold;
            let flag = if idle { " (!)" } else { "" };
            bar.set_message(format!("{}{flag}", status.stage));
        }

        let (processed, total) = board.overall().await;
        self.overall.set_length(total as u64);
        self.overall.set_position(processed as u64);
    }

    /// Run the refresh loop until every worker has completed
    pub async fn run(self, board: Arc<StatusBoard>, refresh_interval: Duration) {
        let mut ticker = tokio::time::interval(refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.refresh(&board).await;
            if board.all_completed().await {
                break;
            }
        }

        self.refresh(&board).await;
        for bar in self.bars.values() {
            bar.finish_with_message("completed");
        }
        self.overall.finish();
    }
}

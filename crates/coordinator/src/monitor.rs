//! Coordinator monitoring loop
//!
//! Spawns one watcher per worker and a display task over the shared status
//! board, then polls for result files as a redundant completion signal: a
//! worker killed before flushing its completion log line is still detected
//! once its result file appears.

use crate::display::Dashboard;
use crate::status::StatusBoard;
use crate::watcher::WorkerWatcher;
use datapolish_core::config::MonitorConfig;
use datapolish_core::error::Result;
use datapolish_core::layout::{Layout, RunManifest};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::info;

pub struct Monitor {
    layout: Layout,
    config: MonitorConfig,
    board: Arc<StatusBoard>,
    workers: Vec<(usize, usize)>,
}

impl Monitor {
    /// Build a monitor for the workers named in the run manifest
    pub async fn new(layout: Layout, config: MonitorConfig, manifest: &RunManifest) -> Self {
        let board = Arc::new(StatusBoard::new());
        let mut workers = Vec::with_capacity(manifest.fragments.len());
        for fragment in &manifest.fragments {
            board.init_worker(fragment.worker_id, fragment.entry_count).await;
            workers.push((fragment.worker_id, fragment.entry_count));
        }
        Self {
            layout,
            config,
            board,
            workers,
        }
    }

    pub fn board(&self) -> Arc<StatusBoard> {
        self.board.clone()
    }

    /// Block until every worker has completed.
    ///
    /// `show_display` controls whether the live dashboard runs; monitoring
    /// behaves identically without it.
    pub async fn wait_for_completion(&self, show_display: bool) -> Result<()> {
        info!("Starting worker monitoring");

        let mut watchers = JoinSet::new();
        let poll_interval = Duration::from_millis(self.config.log_poll_interval_ms);
        for (worker_id, _) in &self.workers {
            let watcher = WorkerWatcher::new(*worker_id, &self.layout, self.board.clone());
            watchers.spawn(watcher.run(poll_interval));
        }

        let mut display_task = None;
        if show_display {
            let dashboard = Dashboard::new(
                &self.workers,
                Duration::from_secs(self.config.idle_threshold_secs),
            )?;
            display_task = Some(tokio::spawn(dashboard.run(
                self.board.clone(),
                Duration::from_millis(self.config.display_refresh_ms),
            )));
        }

        // Redundant completion path, independent of the watchers
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.result_poll_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.check_result_files().await;
            if self.board.all_completed().await {
                break;
            }
        }

        while watchers.join_next().await.is_some() {}
        if let Some(task) = display_task {
            let _ = task.await;
        }

        info!("All workers have completed processing");
        Ok(())
    }

    /// Mark any worker whose final result file exists as completed
    pub async fn check_result_files(&self) {
        for (worker_id, _) in &self.workers {
            if self.board.is_completed(*worker_id).await {
                continue;
            }
            if self.layout.result_file(*worker_id).exists() {
                info!("Worker {worker_id} completed (detected by result file)");
                self.board.mark_completed(*worker_id).await;
            }
        }
    }
}

//! Per-worker progress watcher
//!
//! Each worker gets a dedicated watcher that polls two signals: the
//! structured progress record (primary) and newly appended log lines run
//! through the keyword classifier (secondary, tolerates workers that predate
//! structured records). `poll_once` is separate from the timed loop so tests
//! can drive it without real delays.

use crate::classifier::{classify_line, LogEvent};
use crate::status::StatusBoard;
use datapolish_core::layout::Layout;
use datapolish_core::progress::{ProgressRecord, Stage};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Watcher for one worker's log stream and progress record
pub struct WorkerWatcher {
    worker_id: usize,
    log_path: PathBuf,
    progress_path: PathBuf,
    board: Arc<StatusBoard>,
    /// Byte offset of the last fully consumed log position
    offset: u64,
}

impl WorkerWatcher {
    pub fn new(worker_id: usize, layout: &Layout, board: Arc<StatusBoard>) -> Self {
        Self {
            worker_id,
            log_path: layout.log_file(worker_id),
            progress_path: layout.progress_file(worker_id),
            board,
            offset: 0,
        }
    }

    /// One polling pass: consume the progress record, then any new log lines.
    /// Read and parse failures are swallowed; the next pass retries.
    pub async fn poll_once(&mut self) {
        if let Some(record) = ProgressRecord::read(&self.progress_path) {
            self.apply_progress_record(&record).await;
        }

        for line in self.read_new_lines() {
            self.board.push_log_line(self.worker_id, &line).await;
            if let Some(event) = classify_line(&line) {
                self.apply_event(event).await;
            }
        }
    }

    /// Run the watcher until its worker completes
    pub async fn run(mut self, poll_interval: Duration) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
            if self.board.is_completed(self.worker_id).await {
                debug!("Watcher for worker {} finished", self.worker_id);
                return;
            }
        }
    }

    async fn apply_progress_record(&self, record: &ProgressRecord) {
        match record.stage {
            Stage::Completed => self.board.mark_completed(self.worker_id).await,
            Stage::Processing | Stage::Resumed | Stage::Loaded => {
                self.board
                    .set_progress(self.worker_id, record.processed, record.total)
                    .await;
                self.board
                    .set_stage(self.worker_id, &record.stage.to_string())
                    .await;
            }
            _ => {
                self.board
                    .set_stage(self.worker_id, &record.stage.to_string())
                    .await;
            }
        }
    }

    async fn apply_event(&self, event: LogEvent) {
        match event {
            LogEvent::StageChange(stage) => self.board.set_stage(self.worker_id, stage).await,
            LogEvent::Progress { current, total } => {
                self.board.set_progress(self.worker_id, current, total).await
            }
            LogEvent::Completed => self.board.mark_completed(self.worker_id).await,
        }
    }

    /// Read log lines appended since the last poll, advancing the offset
    /// only past complete (newline-terminated) lines.
    fn read_new_lines(&mut self) -> Vec<String> {
        let mut file = match std::fs::File::open(&self.log_path) {
            Ok(file) => file,
            Err(_) => return Vec::new(),
        };

        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return Vec::new();
        }

        let mut buf = String::new();
        if file.read_to_string(&mut buf).is_err() {
            return Vec::new();
        }

        let consumed = match buf.rfind('\n') {
            Some(pos) => pos + 1,
            None => return Vec::new(),
        };
        self.offset += consumed as u64;

        buf[..consumed]
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect()
    }
}

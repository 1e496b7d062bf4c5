//! Shared per-worker status
//!
//! All watcher tasks and the display/aggregation logic operate over the same
//! state, so everything lives behind a single mutex as an owned aggregate
//! exposing snapshot and update operations, never raw shared fields.

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;
use tokio::sync::Mutex;

/// How many recent log lines are retained per worker for the display
const LOG_TAIL_CAPACITY: usize = 20;

/// Lifecycle state of one worker as the coordinator sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Ready,
    Processing,
    Completed,
}

/// Coordinator-held view of one worker
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub progress: usize,
    pub total: usize,
    pub stage: String,
    pub last_update: Instant,
}

impl WorkerStatus {
    fn new(total: usize) -> Self {
        Self {
            state: WorkerState::Ready,
            progress: 0,
            total,
            stage: "not started".to_string(),
            last_update: Instant::now(),
        }
    }

    pub fn completed(&self) -> bool {
        self.state == WorkerState::Completed
    }
}

#[derive(Debug, Default)]
struct BoardInner {
    workers: BTreeMap<usize, WorkerStatus>,
    logs: BTreeMap<usize, VecDeque<String>>,
}

/// The single synchronization domain for all per-worker status
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: Mutex<BoardInner>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker in the Ready state with its fragment total
    pub async fn init_worker(&self, worker_id: usize, total: usize) {
        let mut inner = self.inner.lock().await;
        inner.workers.insert(worker_id, WorkerStatus::new(total));
    }

    /// Record a stage string observed for a worker
    pub async fn set_stage(&self, worker_id: usize, stage: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(status) = inner.workers.get_mut(&worker_id) {
            if status.completed() {
                return;
            }
            status.stage = stage.to_string();
            status.last_update = Instant::now();
        }
    }

    /// Record a progress counter observed for a worker.
    ///
    /// Progress is monotonic: an observation lower than the current value
    /// (a stale record read mid-overwrite) is ignored.
    pub async fn set_progress(&self, worker_id: usize, progress: usize, total: usize) {
        let mut inner = self.inner.lock().await;
        if let Some(status) = inner.workers.get_mut(&worker_id) {
            if status.completed() || progress < status.progress {
                return;
            }
            status.progress = progress;
            status.total = total;
            status.state = WorkerState::Processing;
            status.last_update = Instant::now();
        }
    }

    /// Transition a worker to Completed. Terminal: once completed, a worker's
    /// status is immutable for the rest of the run.
    pub async fn mark_completed(&self, worker_id: usize) {
        let mut inner = self.inner.lock().await;
        if let Some(status) = inner.workers.get_mut(&worker_id) {
            if status.completed() {
                return;
            }
            status.state = WorkerState::Completed;
            status.progress = status.total;
            status.stage = "completed".to_string();
            status.last_update = Instant::now();
        }
    }

    /// Append a log line to a worker's retained tail
    pub async fn push_log_line(&self, worker_id: usize, line: &str) {
        let mut inner = self.inner.lock().await;
        let tail = inner.logs.entry(worker_id).or_default();
        if tail.len() == LOG_TAIL_CAPACITY {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }

    /// Most recent retained log line for a worker
    pub async fn last_log_line(&self, worker_id: usize) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.logs.get(&worker_id).and_then(|t| t.back().cloned())
    }

    /// Consistent point-in-time copy of every worker's status
    pub async fn snapshot(&self) -> Vec<(usize, WorkerStatus)> {
        let inner = self.inner.lock().await;
        inner
            .workers
            .iter()
            .map(|(id, status)| (*id, status.clone()))
            .collect()
    }

    /// Consolidated `(processed, total)` across all workers
    pub async fn overall(&self) -> (usize, usize) {
        let inner = self.inner.lock().await;
        inner.workers.values().fold((0, 0), |(p, t), status| {
            (p + status.progress, t + status.total)
        })
    }

    pub async fn is_completed(&self, worker_id: usize) -> bool {
        let inner = self.inner.lock().await;
        inner
            .workers
            .get(&worker_id)
            .map(|s| s.completed())
            .unwrap_or(false)
    }

    pub async fn all_completed(&self) -> bool {
        let inner = self.inner.lock().await;
        !inner.workers.is_empty() && inner.workers.values().all(|s| s.completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_init_and_overall() {
        let board = StatusBoard::new();
        board.init_worker(1, 6).await;
        board.init_worker(2, 5).await;

        assert_eq!(board.overall().await, (0, 11));
        assert!(!board.all_completed().await);

        board.set_progress(1, 3, 6).await;
        assert_eq!(board.overall().await, (3, 11));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let board = StatusBoard::new();
        board.init_worker(1, 10).await;

        board.set_progress(1, 5, 10).await;
        board.set_progress(1, 3, 10).await;

        let snapshot = board.snapshot().await;
        assert_eq!(snapshot[0].1.progress, 5);
    }

    #[tokio::test]
    async fn test_completed_is_terminal() {
        let board = StatusBoard::new();
        board.init_worker(1, 10).await;
        board.set_progress(1, 4, 10).await;
        board.mark_completed(1).await;

        // Completion snaps progress to total
        let snapshot = board.snapshot().await;
        assert_eq!(snapshot[0].1.progress, 10);
        assert!(snapshot[0].1.completed());

        // Later observations cannot regress a completed worker
        board.set_progress(1, 7, 10).await;
        board.set_stage(1, "processing").await;
        let snapshot = board.snapshot().await;
        assert_eq!(snapshot[0].1.progress, 10);
        assert_eq!(snapshot[0].1.stage, "completed");
    }

    #[tokio::test]
    async fn test_all_completed() {
        let board = StatusBoard::new();
        board.init_worker(1, 1).await;
        board.init_worker(2, 1).await;

        board.mark_completed(1).await;
        assert!(!board.all_completed().await);
        board.mark_completed(2).await;
        assert!(board.all_completed().await);
    }

    #[tokio::test]
    async fn test_log_tail_is_bounded() {
        let board = StatusBoard::new();
        for i in 0..40 {
            board.push_log_line(1, &format!("line {i}")).await;
        }
        assert_eq!(board.last_log_line(1).await.unwrap(), "line 39");
    }
}

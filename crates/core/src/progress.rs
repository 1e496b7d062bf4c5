//! Worker progress records
//!
//! A progress record is a best-effort, frequently overwritten snapshot for
//! coordinator consumption. The worker's own process state stays
//! authoritative; losing a write only delays the coordinator's view.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Coarse processing stage a worker reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    StartingService,
    PullingModel,
    ServiceReady,
    ServiceFailed,
    Loading,
    Loaded,
    Resumed,
    Processing,
    Completed,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::StartingService => "starting service",
            Stage::PullingModel => "pulling model",
            Stage::ServiceReady => "service ready",
            Stage::ServiceFailed => "service failed",
            Stage::Loading => "loading",
            Stage::Loaded => "loaded",
            Stage::Resumed => "resumed",
            Stage::Processing => "processing",
            Stage::Completed => "completed",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

/// A single progress snapshot, overwritten in place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub worker_id: usize,
    pub processed: usize,
    pub total: usize,
    pub percentage: f64,
    pub stage: Stage,
    /// Seconds since the Unix epoch at write time
    pub timestamp: f64,
}

impl ProgressRecord {
    pub fn new(worker_id: usize, processed: usize, total: usize, stage: Stage) -> Self {
        let percentage = if total > 0 {
            processed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            worker_id,
            processed,
            total,
            percentage,
            stage,
            timestamp: unix_now(),
        }
    }

    /// Overwrite the record at `path`. Failures are logged and swallowed:
    /// progress records are a communication artifact, not authoritative state.
    pub fn write_best_effort(&self, path: &Path) {
        if let Err(e) = self.write(path) {
            warn!("Failed to save progress record: {e}");
        }
    }

    /// Overwrite the record at `path`
    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string(self)
            .map_err(|e| Error::monitor(format!("Failed to serialize progress: {e}")))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Read the record at `path` if present and parseable
    pub fn read(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

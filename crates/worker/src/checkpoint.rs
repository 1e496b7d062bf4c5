//! Checkpoint persistence for checkpointed workers
//!
//! A checkpoint is the full accumulated entry list plus structural metadata.
//! Alongside it a `.partial` result snapshot in the source shape is kept, so
//! a crash loses at most one checkpoint interval of work.

use datapolish_core::dataset::{rewrap, DatasetShape};
use datapolish_core::error::{Error, Result};
use datapolish_core::layout::Layout;
use datapolish_core::progress::unix_now;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Durable snapshot of a worker's processed entries plus metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub processed: usize,
    pub total: usize,
    pub shape: DatasetShape,
    /// Seconds since the Unix epoch at save time
    pub timestamp: f64,
    pub processed_entries: Vec<Value>,
}

impl Checkpoint {
    pub fn new(shape: DatasetShape, total: usize, processed_entries: Vec<Value>) -> Self {
        Self {
            processed: processed_entries.len(),
            total,
            shape,
            timestamp: unix_now(),
            processed_entries,
        }
    }

    /// Persist the checkpoint and the matching `.partial` result snapshot.
    ///
    /// `fragment_doc` provides the non-entry fields for the snapshot rewrap.
    pub fn save(&self, layout: &Layout, worker_id: usize, fragment_doc: &Value) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::checkpoint(format!("Failed to serialize checkpoint: {e}")))?;
        std::fs::write(layout.checkpoint_file(worker_id), text)?;

        let snapshot = rewrap(&self.shape, self.processed_entries.clone(), fragment_doc);
        let snapshot_text = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| Error::checkpoint(format!("Failed to serialize snapshot: {e}")))?;
        std::fs::write(layout.partial_result_file(worker_id), snapshot_text)?;

        info!(
            "Checkpoint saved: {}/{} entries",
            self.processed, self.total
        );
        Ok(())
    }

    /// Load an existing checkpoint if it is valid for a fragment of
    /// `fragment_total` entries.
    ///
    /// A checkpoint whose recorded total does not match the fragment's own
    /// entry count is stale; it is discarded, never merged.
    pub fn load(layout: &Layout, worker_id: usize, fragment_total: usize) -> Option<Self> {
        let path = layout.checkpoint_file(worker_id);
        if !path.exists() {
            return None;
        }

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read checkpoint: {e}");
                return None;
            }
        };

        let checkpoint: Checkpoint = match serde_json::from_str(&text) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!("Failed to parse checkpoint: {e}");
                return None;
            }
        };

        if checkpoint.total != fragment_total {
            warn!(
                "Discarding stale checkpoint: recorded total {} does not match fragment total {}",
                checkpoint.total, fragment_total
            );
            return None;
        }

        info!(
            "Loaded checkpoint: {}/{} entries processed",
            checkpoint.processed, checkpoint.total
        );
        Some(checkpoint)
    }

    /// Remove the checkpoint and `.partial` snapshot after a successful run
    pub fn cleanup(layout: &Layout, worker_id: usize) {
        for path in [
            layout.checkpoint_file(worker_id),
            layout.partial_result_file(worker_id),
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!("Failed to remove {}: {e}", path.display());
                }
            }
        }
    }
}

//! Checkpointed sequential fragment processor
//!
//! One processor runs per worker process. Entries are enhanced strictly one
//! at a time: the enhancement service is a shared local collaborator, and
//! ordering within a fragment must hold for checkpoint resume to mean
//! anything (entry `i` is fully processed before `i+1` is attempted).

use crate::checkpoint::Checkpoint;
use datapolish_core::config::WorkerConfig;
use datapolish_core::dataset::{detect_shape, extract_entries, rewrap, DatasetShape};
use datapolish_core::error::{Error, Result};
use datapolish_core::layout::{Layout, RunManifest};
use datapolish_core::progress::{ProgressRecord, Stage};
use datapolish_enhance::Enhancer;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Summary of a completed processing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub processed: usize,
    pub total: usize,
    /// Entries kept unmodified after exhausting enhancement retries
    pub degraded: usize,
    /// Index processing resumed from (0 for a fresh run)
    pub resumed_from: usize,
}

/// Checkpointed processor for one worker's fragment
pub struct Processor {
    worker_id: usize,
    layout: Layout,
    config: WorkerConfig,
    enhancer: Arc<dyn Enhancer>,
}

impl Processor {
    pub fn new(
        worker_id: usize,
        layout: Layout,
        config: WorkerConfig,
        enhancer: Arc<dyn Enhancer>,
    ) -> Self {
        Self {
            worker_id,
            layout,
            config,
            enhancer,
        }
    }

    /// Run the worker to completion: readiness check, resume or fresh start,
    /// sequential enhancement with retry-then-degrade, cadenced checkpoint
    /// and progress writes, final result and artifact cleanup.
    pub async fn run(&self) -> Result<ProcessOutcome> {
        self.progress(0, 0, Stage::StartingService);
        info!("Starting enhancement service for worker {}", self.worker_id);

        if let Err(e) = self.enhancer.ensure_ready().await {
            error!("Cannot proceed without enhancement service: {e}");
            self.progress(0, 0, Stage::ServiceFailed);
            return Err(e);
        }
        self.progress(0, 0, Stage::ServiceReady);

        match self.process_fragment().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Error processing fragment: {e}");
                self.progress(0, 0, Stage::Error);
                Err(e)
            }
        }
    }

    async fn process_fragment(&self) -> Result<ProcessOutcome> {
        let fragment_file = self.layout.fragment_file(self.worker_id);
        info!(
            "Worker {} processing fragment {}",
            self.worker_id,
            fragment_file.display()
        );
        self.progress(0, 0, Stage::Loading);

        let text = std::fs::read_to_string(&fragment_file).map_err(|e| {
            Error::dataset(format!("Failed to read {}: {e}", fragment_file.display()))
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|e| {
            Error::dataset(format!("Failed to parse {}: {e}", fragment_file.display()))
        })?;

        let (shape, entries) = self.resolve_shape(&document)?;
        let total = entries.len();
        info!("Loaded {total} entries, detected shape: {shape:?}");
        self.progress(0, total, Stage::Loaded);

        let (start_index, mut results) = match Checkpoint::load(&self.layout, self.worker_id, total)
        {
            Some(checkpoint) if checkpoint.processed > 0 => {
                info!("Resuming from checkpoint at entry {}", checkpoint.processed);
                self.progress(checkpoint.processed, total, Stage::Resumed);
                (checkpoint.processed, checkpoint.processed_entries)
            }
            _ => {
                info!("Starting fresh processing");
                self.progress(0, total, Stage::Processing);
                (0, Vec::with_capacity(total))
            }
        };

        let mut degraded = 0;
        for entry in entries.iter().skip(start_index) {
            let (processed_entry, was_degraded) = self.enhance_with_retry(entry).await;
            if was_degraded {
                degraded += 1;
            }
            results.push(processed_entry);

            // Brief pause to avoid overwhelming the enhancement service
            if self.config.entry_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.entry_pause_ms)).await;
            }

            let processed = results.len();
            if processed % self.config.checkpoint_interval == 0 {
                let checkpoint = Checkpoint::new(shape.clone(), total, results.clone());
                if let Err(e) = checkpoint.save(&self.layout, self.worker_id, &document) {
                    // Losing a checkpoint only risks redoing work on resume
                    warn!("Failed to save checkpoint: {e}");
                }
                self.progress(processed, total, Stage::Processing);
                info!(
                    "Processed {processed}/{total} entries ({:.1}%)",
                    processed as f64 / total as f64 * 100.0
                );
            } else if processed % self.config.progress_interval == 0 {
                self.progress(processed, total, Stage::Processing);
            }
        }

        let final_doc = rewrap(&shape, results, &document);
        let final_text = serde_json::to_string_pretty(&final_doc)
            .map_err(|e| Error::dataset(format!("Failed to serialize result: {e}")))?;
        let result_file = self.layout.result_file(self.worker_id);
        std::fs::write(&result_file, final_text)?;

        Checkpoint::cleanup(&self.layout, self.worker_id);
        self.progress(total, total, Stage::Completed);
        info!(
            "Processing completed. Results saved to {}",
            result_file.display()
        );

        Ok(ProcessOutcome {
            processed: total,
            total,
            degraded,
            resumed_from: start_index,
        })
    }

    /// Shape comes from the run manifest when one exists (decided once by
    /// the partitioner); a standalone worker falls back to detection.
    fn resolve_shape(&self, document: &Value) -> Result<(DatasetShape, Vec<Value>)> {
        if let Some(manifest) = RunManifest::load(&self.layout)? {
            let entries = extract_entries(&manifest.shape, document).ok_or_else(|| {
                Error::dataset(format!(
                    "Fragment does not match manifest shape {:?}",
                    manifest.shape
                ))
            })?;
            return Ok((manifest.shape, entries));
        }
        Ok(detect_shape(document))
    }

    /// Enhance one entry, retrying transient failures a bounded number of
    /// times with fixed backoff. When every attempt fails the original entry
    /// is kept unmodified: a single bad entry never aborts the run.
    async fn enhance_with_retry(&self, entry: &Value) -> (Value, bool) {
        for attempt in 1..=self.config.max_retries {
            match self.enhancer.enhance(entry).await {
                Ok(enhanced) => return (enhanced, false),
                Err(e) => {
                    warn!(
                        "Enhancement attempt failed: {e} (Retry {attempt}/{})",
                        self.config.max_retries
                    );
                    if attempt < self.config.max_retries && self.config.retry_backoff_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms))
                            .await;
                    }
                }
            }
        }
        error!(
            "Failed to process entry after {} attempts - keeping original",
            self.config.max_retries
        );
        (entry.clone(), true)
    }

    fn progress(&self, processed: usize, total: usize, stage: Stage) {
        ProgressRecord::new(self.worker_id, processed, total, stage)
            .write_best_effort(&self.layout.progress_file(self.worker_id));
    }
}

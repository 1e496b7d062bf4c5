//! Filesystem layout shared by the coordinator and workers
//!
//! All coordination happens through files: fragments, results, checkpoints,
//! progress records and logs. Each worker owns its own files exclusively;
//! the coordinator only ever reads worker-owned files.

use crate::dataset::DatasetShape;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Canonical file paths for a run, derived from configuration once
#[derive(Debug, Clone)]
pub struct Layout {
    fragment_dir: PathBuf,
    result_dir: PathBuf,
}

impl Layout {
    pub fn new(fragment_dir: impl Into<PathBuf>, result_dir: impl Into<PathBuf>) -> Self {
        Self {
            fragment_dir: fragment_dir.into(),
            result_dir: result_dir.into(),
        }
    }

    /// Create both directories if they do not exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.fragment_dir)?;
        std::fs::create_dir_all(&self.result_dir)?;
        Ok(())
    }

    pub fn fragment_dir(&self) -> &Path {
        &self.fragment_dir
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    /// Fragment input for one worker
    pub fn fragment_file(&self, worker_id: usize) -> PathBuf {
        self.fragment_dir.join(format!("fragment_{worker_id}.json"))
    }

    /// Run manifest written by the partitioner
    pub fn manifest_file(&self) -> PathBuf {
        self.fragment_dir.join("manifest.json")
    }

    /// Final per-worker result document
    pub fn result_file(&self, worker_id: usize) -> PathBuf {
        self.result_dir.join(format!("result_{worker_id}.json"))
    }

    /// In-progress result snapshot, rewritten at every checkpoint
    pub fn partial_result_file(&self, worker_id: usize) -> PathBuf {
        self.result_dir
            .join(format!("result_{worker_id}.json.partial"))
    }

    /// Durable checkpoint enabling resume
    pub fn checkpoint_file(&self, worker_id: usize) -> PathBuf {
        self.result_dir.join(format!("checkpoint_{worker_id}.json"))
    }

    /// Frequently overwritten progress record
    pub fn progress_file(&self, worker_id: usize) -> PathBuf {
        self.result_dir.join(format!("progress_{worker_id}.json"))
    }

    /// Free-text log stream the monitor tails
    pub fn log_file(&self, worker_id: usize) -> PathBuf {
        self.result_dir.join(format!("worker_{worker_id}.log"))
    }
}

/// Metadata for one contiguous fragment of the source entry sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMeta {
    /// 1-based worker id the fragment is assigned to
    pub worker_id: usize,
    /// Number of entries in the fragment
    pub entry_count: usize,
    /// Inclusive start index into the original entry sequence
    pub start_index: usize,
    /// Exclusive end index into the original entry sequence
    pub end_index: usize,
}

/// Run manifest written by the partitioner next to the fragment files.
///
/// Carries the shape decided once from the original document so that workers
/// and the aggregator never have to re-derive it, plus the fragment table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub shape: DatasetShape,
    pub total_entries: usize,
    pub workers: usize,
    pub fragments: Vec<FragmentMeta>,
}

impl RunManifest {
    /// Write the manifest to its canonical path
    pub fn save(&self, layout: &Layout) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::dataset(format!("Failed to serialize manifest: {e}")))?;
        std::fs::write(layout.manifest_file(), text)?;
        Ok(())
    }

    /// Load the manifest if one exists
    pub fn load(layout: &Layout) -> Result<Option<Self>> {
        let path = layout.manifest_file();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        let manifest = serde_json::from_str(&text)
            .map_err(|e| Error::dataset(format!("Failed to parse manifest: {e}")))?;
        Ok(Some(manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_naming() {
        let layout = Layout::new("/data/fragments", "/results/fragments");
        assert_eq!(
            layout.fragment_file(3),
            PathBuf::from("/data/fragments/fragment_3.json")
        );
        assert_eq!(
            layout.result_file(3),
            PathBuf::from("/results/fragments/result_3.json")
        );
        assert_eq!(
            layout.partial_result_file(3),
            PathBuf::from("/results/fragments/result_3.json.partial")
        );
        assert_eq!(
            layout.checkpoint_file(3),
            PathBuf::from("/results/fragments/checkpoint_3.json")
        );
        assert_eq!(
            layout.progress_file(3),
            PathBuf::from("/results/fragments/progress_3.json")
        );
        assert_eq!(
            layout.log_file(3),
            PathBuf::from("/results/fragments/worker_3.log")
        );
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());

        let manifest = RunManifest {
            shape: DatasetShape::ObjectWithNamedListField("samples".to_string()),
            total_entries: 23,
            workers: 4,
            fragments: vec![FragmentMeta {
                worker_id: 1,
                entry_count: 6,
                start_index: 0,
                end_index: 6,
            }],
        };
        manifest.save(&layout).unwrap();

        let loaded = RunManifest::load(&layout).unwrap().unwrap();
        assert_eq!(loaded.total_entries, 23);
        assert_eq!(loaded.shape, manifest.shape);
        assert_eq!(loaded.fragments, manifest.fragments);
    }

    #[test]
    fn test_manifest_absent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());
        assert!(RunManifest::load(&layout).unwrap().is_none());
    }
}

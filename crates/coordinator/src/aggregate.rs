//! Result aggregation
//!
//! Once every worker has completed, per-worker result documents are read in
//! ascending worker-id order, entries are extracted via the shape decided at
//! partition time, and the concatenation is rewrapped into the original
//! document shape. Fragments were contiguous, so ascending-id concatenation
//! reproduces the original global order.

use datapolish_core::dataset::{extract_entries, rewrap};
use datapolish_core::error::{Error, Result};
use datapolish_core::layout::{Layout, RunManifest};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Combine all worker results into the final output document.
///
/// Any missing or unreadable worker result is fatal: no partial combined
/// output is ever produced.
pub fn combine(
    layout: &Layout,
    manifest: &RunManifest,
    original: &Value,
    output_file: &Path,
) -> Result<()> {
    info!("Combining results from {} workers", manifest.workers);

    let mut combined = Vec::with_capacity(manifest.total_entries);
    for worker_id in 1..=manifest.workers {
        let path = layout.result_file(worker_id);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::aggregate(format!(
                "Failed to read result for worker {worker_id} at {}: {e}",
                path.display()
            ))
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|e| {
            Error::aggregate(format!("Failed to parse result for worker {worker_id}: {e}"))
        })?;

        let entries = extract_entries(&manifest.shape, &document).ok_or_else(|| {
            Error::aggregate(format!(
                "Result for worker {worker_id} does not match shape {:?}",
                manifest.shape
            ))
        })?;

        info!("Adding {} entries from worker {worker_id}", entries.len());
        combined.extend(entries);
    }

    let final_doc = rewrap(&manifest.shape, combined, original);
    let text = serde_json::to_string_pretty(&final_doc)
        .map_err(|e| Error::aggregate(format!("Failed to serialize combined output: {e}")))?;

    if let Some(parent) = output_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_file, text)?;

    info!("Combined results saved to {}", output_file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapolish_core::dataset::DatasetShape;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn list_manifest(workers: usize, total: usize) -> RunManifest {
        RunManifest {
            shape: DatasetShape::List,
            total_entries: total,
            workers,
            fragments: vec![],
        }
    }

    #[test]
    fn test_combine_preserves_worker_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());

        std::fs::write(layout.result_file(1), r#"[{"input": 0}, {"input": 1}]"#).unwrap();
        std::fs::write(layout.result_file(2), r#"[{"input": 2}]"#).unwrap();

        let output = dir.path().join("combined.json");
        combine(&layout, &list_manifest(2, 3), &json!([]), &output).unwrap();

        let result: Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(
            result,
            json!([{"input": 0}, {"input": 1}, {"input": 2}])
        );
    }

    #[test]
    fn test_combine_rewraps_with_original_fields() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());

        std::fs::write(layout.result_file(1), r#"{"data": [{"input": 0}]}"#).unwrap();

        let original = json!({"version": 3, "data": [{"input": 0}]});
        let manifest = RunManifest {
            shape: DatasetShape::ObjectWithDataField,
            total_entries: 1,
            workers: 1,
            fragments: vec![],
        };

        let output = dir.path().join("combined.json");
        combine(&layout, &manifest, &original, &output).unwrap();

        let result: Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(result["version"], json!(3));
        assert_eq!(result["data"], json!([{"input": 0}]));
    }

    #[test]
    fn test_missing_result_is_fatal_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());

        std::fs::write(layout.result_file(1), "[]").unwrap();
        // Worker 2's result is missing

        let output = dir.path().join("combined.json");
        let err = combine(&layout, &list_manifest(2, 0), &json!([]), &output);
        assert!(err.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_corrupt_result_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());

        std::fs::write(layout.result_file(1), "{ not json").unwrap();

        let output = dir.path().join("combined.json");
        assert!(combine(&layout, &list_manifest(1, 0), &json!([]), &output).is_err());
    }

    #[test]
    fn test_combine_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());

        let enhanced = json!({"input": "code", "output": "better description"});
        std::fs::write(
            layout.result_file(1),
            serde_json::to_string(&enhanced).unwrap(),
        )
        .unwrap();

        let original = json!({"input": "code", "output": "description"});
        let manifest = RunManifest {
            shape: DatasetShape::SingleObject,
            total_entries: 1,
            workers: 1,
            fragments: vec![],
        };

        let output = dir.path().join("combined.json");
        combine(&layout, &manifest, &original, &output).unwrap();

        let result: Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        // The result is the transformed mapping, not a one-element list
        assert_eq!(result, enhanced);
        assert!(!result.is_array());
    }
}

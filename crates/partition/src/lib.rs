//! Dataset partitioner
//!
//! Splits the source document into contiguous, size-balanced fragments, one
//! per worker, each materialized as a self-contained document in the source
//! shape, and records the run manifest carrying the shape decided here.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use datapolish_core::dataset::{detect_shape, rewrap, DatasetShape};
use datapolish_core::error::{Error, Result};
use datapolish_core::layout::{FragmentMeta, Layout, RunManifest};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// One materialized fragment
#[derive(Debug, Clone)]
pub struct Fragment {
    pub worker_id: usize,
    pub path: PathBuf,
    pub entry_count: usize,
    pub start_index: usize,
    pub end_index: usize,
}

/// Outcome of a partitioning run
#[derive(Debug)]
pub struct PartitionResult {
    pub shape: DatasetShape,
    pub total_entries: usize,
    pub fragments: Vec<Fragment>,
    /// The parsed source document, kept for aggregation-time rewrapping
    pub original: Value,
}

/// Compute contiguous `[start, end)` slices for `workers` workers.
///
/// The first `total % workers` workers get one extra entry, so sizes differ
/// by at most 1 and the slices cover `0..total` exactly. Zero-size slices
/// are valid when there are fewer entries than workers. A worker count of
/// zero yields an empty plan.
pub fn plan_slices(total: usize, workers: usize) -> Vec<(usize, usize)> {
    if workers == 0 {
        return Vec::new();
    }
    let base = total / workers;
    let remainder = total % workers;

    let mut slices = Vec::with_capacity(workers);
    let mut start = 0;
    for i in 0..workers {
        let size = base + usize::from(i < remainder);
        slices.push((start, start + size));
        start += size;
    }
    slices
}

/// Load the source document, split it into fragment files and write the run
/// manifest. Fails before any fragment is written if the source cannot be
/// read or parsed.
pub fn split(input_file: &Path, workers: usize, layout: &Layout) -> Result<PartitionResult> {
    info!("Loading data from {}", input_file.display());

    let text = std::fs::read_to_string(input_file)
        .map_err(|e| Error::dataset(format!("Failed to read {}: {e}", input_file.display())))?;
    let original: Value = serde_json::from_str(&text)
        .map_err(|e| Error::dataset(format!("Failed to parse {}: {e}", input_file.display())))?;

    let (shape, entries) = detect_shape(&original);
    let total_entries = entries.len();
    info!(
        "Loaded {} entries, detected shape: {:?}",
        total_entries, shape
    );

    layout.ensure_dirs()?;

    let slices = plan_slices(total_entries, workers);
    info!(
        "Fragment sizes: {:?}",
        slices.iter().map(|(s, e)| e - s).collect::<Vec<_>>()
    );

    let mut fragments = Vec::with_capacity(workers);
    for (i, (start, end)) in slices.into_iter().enumerate() {
        let worker_id = i + 1;
        let slice = entries[start..end].to_vec();
        let document = rewrap(&shape, slice, &original);

        let path = layout.fragment_file(worker_id);
        let text = serde_json::to_string(&document)
            .map_err(|e| Error::dataset(format!("Failed to serialize fragment: {e}")))?;
        std::fs::write(&path, text)?;

        info!(
            "Created fragment {} with {} entries at {}",
            worker_id,
            end - start,
            path.display()
        );

        fragments.push(Fragment {
            worker_id,
            path,
            entry_count: end - start,
            start_index: start,
            end_index: end,
        });
    }

    let manifest = RunManifest {
        shape: shape.clone(),
        total_entries,
        workers,
        fragments: fragments
            .iter()
            .map(|f| FragmentMeta {
                worker_id: f.worker_id,
                entry_count: f.entry_count,
                start_index: f.start_index,
                end_index: f.end_index,
            })
            .collect(),
    };
    manifest.save(layout)?;

    Ok(PartitionResult {
        shape,
        total_entries,
        fragments,
        original,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapolish_core::dataset::detect_shape;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn temp_layout() -> (tempfile::TempDir, Layout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path().join("fragments"), dir.path().join("results"));
        (dir, layout)
    }

    #[test]
    fn test_plan_slices_balanced() {
        assert_eq!(plan_slices(23, 4), vec![(0, 6), (6, 12), (12, 18), (18, 23)]);
        assert_eq!(plan_slices(8, 4), vec![(0, 2), (2, 4), (4, 6), (6, 8)]);
        assert_eq!(plan_slices(0, 3), vec![(0, 0), (0, 0), (0, 0)]);
    }

    #[test]
    fn test_plan_slices_fewer_entries_than_workers() {
        let slices = plan_slices(2, 4);
        assert_eq!(slices, vec![(0, 1), (1, 2), (2, 2), (2, 2)]);
    }

    #[test]
    fn test_plan_slices_zero_workers_is_empty() {
        assert_eq!(plan_slices(5, 0), vec![]);
        assert_eq!(plan_slices(0, 0), vec![]);
    }

    #[test]
    fn test_plan_slices_conservation_and_contiguity() {
        for total in [0, 1, 7, 23, 100, 101] {
            for workers in [1, 2, 3, 4, 7] {
                let slices = plan_slices(total, workers);
                assert_eq!(slices.len(), workers);

                let sum: usize = slices.iter().map(|(s, e)| e - s).sum();
                assert_eq!(sum, total);

                let mut prev_end = 0;
                for (start, end) in &slices {
                    assert_eq!(*start, prev_end);
                    assert!(end >= start);
                    prev_end = *end;
                }
                assert_eq!(prev_end, total);

                let sizes: Vec<usize> = slices.iter().map(|(s, e)| e - s).collect();
                let max = sizes.iter().max().unwrap();
                let min = sizes.iter().min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn test_split_writes_fragments_in_source_shape() {
        let (dir, layout) = temp_layout();
        let input = dir.path().join("dataset.json");
        let doc = json!({"version": 2, "data": (0..5).map(|i| json!({"input": i})).collect::<Vec<_>>()});
        std::fs::write(&input, serde_json::to_string(&doc).unwrap()).unwrap();

        let result = split(&input, 2, &layout).unwrap();
        assert_eq!(result.shape, DatasetShape::ObjectWithDataField);
        assert_eq!(result.total_entries, 5);
        assert_eq!(result.fragments.len(), 2);
        assert_eq!(result.fragments[0].entry_count, 3);
        assert_eq!(result.fragments[1].entry_count, 2);

        // Each fragment file keeps the source shape and non-entry fields
        let frag1: Value =
            serde_json::from_str(&std::fs::read_to_string(layout.fragment_file(1)).unwrap())
                .unwrap();
        assert_eq!(frag1["version"], json!(2));
        let (frag_shape, frag_entries) = detect_shape(&frag1);
        assert_eq!(frag_shape, DatasetShape::ObjectWithDataField);
        assert_eq!(frag_entries.len(), 3);
    }

    #[test]
    fn test_split_concat_reproduces_original_order() {
        let (dir, layout) = temp_layout();
        let input = dir.path().join("dataset.json");
        let entries: Vec<Value> = (0..23).map(|i| json!({"input": i})).collect();
        std::fs::write(&input, serde_json::to_string(&json!(entries)).unwrap()).unwrap();

        let result = split(&input, 4, &layout).unwrap();
        let sizes: Vec<usize> = result.fragments.iter().map(|f| f.entry_count).collect();
        assert_eq!(sizes, vec![6, 6, 6, 5]);

        let mut concatenated = Vec::new();
        for fragment in &result.fragments {
            let doc: Value =
                serde_json::from_str(&std::fs::read_to_string(&fragment.path).unwrap()).unwrap();
            let (_, frag_entries) = detect_shape(&doc);
            concatenated.extend(frag_entries);
        }
        assert_eq!(concatenated, entries);
    }

    #[test]
    fn test_split_single_object() {
        let (dir, layout) = temp_layout();
        let input = dir.path().join("dataset.json");
        let doc = json!({"input": "code", "output": "desc"});
        std::fs::write(&input, serde_json::to_string(&doc).unwrap()).unwrap();

        let result = split(&input, 1, &layout).unwrap();
        assert_eq!(result.shape, DatasetShape::SingleObject);
        assert_eq!(result.total_entries, 1);

        let frag: Value =
            serde_json::from_str(&std::fs::read_to_string(layout.fragment_file(1)).unwrap())
                .unwrap();
        assert_eq!(frag, doc);
    }

    #[test]
    fn test_split_writes_manifest() {
        let (dir, layout) = temp_layout();
        let input = dir.path().join("dataset.json");
        std::fs::write(&input, "[1, 2, 3]").unwrap();

        split(&input, 2, &layout).unwrap();

        let manifest = RunManifest::load(&layout).unwrap().unwrap();
        assert_eq!(manifest.shape, DatasetShape::List);
        assert_eq!(manifest.total_entries, 3);
        assert_eq!(manifest.workers, 2);
        assert_eq!(manifest.fragments.len(), 2);
    }

    #[test]
    fn test_split_fails_fast_on_unparseable_input() {
        let (dir, layout) = temp_layout();
        let input = dir.path().join("dataset.json");
        std::fs::write(&input, "not json at all {").unwrap();

        assert!(split(&input, 2, &layout).is_err());
        // No fragment was written
        assert!(!layout.fragment_file(1).exists());
    }

    #[test]
    fn test_split_fails_on_missing_input() {
        let (dir, layout) = temp_layout();
        let input = dir.path().join("absent.json");
        assert!(split(&input, 2, &layout).is_err());
    }
}

//! Dataset shape model
//!
//! JSON datasets arrive in a small number of layouts: a plain list of
//! entries, an object with a `data` list, an object with some other single
//! list-valued field, or a single object treated as one entry. The shape is
//! detected once from the source document and threaded explicitly through
//! partitioning, checkpointing and aggregation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The structural variant describing how entries are embedded in a document.
///
/// The variant chosen for a document is stable for the lifetime of that
/// document's fragments: the partitioner decides it once and every fragment
/// of a run carries the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum DatasetShape {
    /// The document is itself a JSON array of entries
    List,
    /// An object whose `data` field is the entry list
    ObjectWithDataField,
    /// An object whose named field is the entry list
    ObjectWithNamedListField(String),
    /// No list field at all; the whole document is one entry
    SingleObject,
}

impl DatasetShape {
    /// Name of the list-valued field entries live under, if any
    pub fn list_field(&self) -> Option<&str> {
        match self {
            DatasetShape::ObjectWithDataField => Some("data"),
            DatasetShape::ObjectWithNamedListField(name) => Some(name),
            _ => None,
        }
    }
}

/// Detect the shape of a document and extract its entry sequence.
///
/// Detection order, first match wins: array; object with a `data` array;
/// object with a first array-valued field (document order; documents with
/// more than one list field are undefined input); otherwise the whole
/// document is a single entry.
pub fn detect_shape(document: &Value) -> (DatasetShape, Vec<Value>) {
    match document {
        Value::Array(entries) => (DatasetShape::List, entries.clone()),
        Value::Object(map) => {
            if let Some(Value::Array(entries)) = map.get("data") {
                return (DatasetShape::ObjectWithDataField, entries.clone());
            }
            for (key, value) in map {
                if let Value::Array(entries) = value {
                    return (
                        DatasetShape::ObjectWithNamedListField(key.clone()),
                        entries.clone(),
                    );
                }
            }
            (DatasetShape::SingleObject, vec![document.clone()])
        }
        _ => (DatasetShape::SingleObject, vec![document.clone()]),
    }
}

/// Wrap an entry sequence back into a document of the given shape.
///
/// Non-entry fields of the original mapping are reused unchanged (shallow:
/// nested structures are not deep-copied). For `SingleObject`, zero entries
/// yield an empty object and one entry yields that entry unwrapped.
pub fn rewrap(shape: &DatasetShape, entries: Vec<Value>, original: &Value) -> Value {
    match shape {
        DatasetShape::List => Value::Array(entries),
        DatasetShape::ObjectWithDataField => {
            let mut map = original_fields(original);
            map.insert("data".to_string(), Value::Array(entries));
            Value::Object(map)
        }
        DatasetShape::ObjectWithNamedListField(field) => {
            let mut map = original_fields(original);
            map.insert(field.clone(), Value::Array(entries));
            Value::Object(map)
        }
        DatasetShape::SingleObject => entries
            .into_iter()
            .next()
            .unwrap_or_else(|| Value::Object(Map::new())),
    }
}

/// Extract the entry sequence from a document of a known shape.
///
/// Used when the shape was decided upstream (run manifest) so stages never
/// disagree on where entries live. Returns `None` when the document does not
/// match the shape.
pub fn extract_entries(shape: &DatasetShape, document: &Value) -> Option<Vec<Value>> {
    match shape {
        DatasetShape::List => document.as_array().cloned(),
        DatasetShape::ObjectWithDataField => document.get("data")?.as_array().cloned(),
        DatasetShape::ObjectWithNamedListField(field) => {
            document.get(field)?.as_array().cloned()
        }
        DatasetShape::SingleObject => Some(vec![document.clone()]),
    }
}

fn original_fields(original: &Value) -> Map<String, Value> {
    match original {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_detect_list() {
        let doc = json!([{"input": "a", "output": "b"}, {"input": "c", "output": "d"}]);
        let (shape, entries) = detect_shape(&doc);
        assert_eq!(shape, DatasetShape::List);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_detect_object_with_data_field() {
        let doc = json!({"version": 1, "data": [{"input": "a"}]});
        let (shape, entries) = detect_shape(&doc);
        assert_eq!(shape, DatasetShape::ObjectWithDataField);
        assert_eq!(entries, vec![json!({"input": "a"})]);
    }

    #[test]
    fn test_data_field_wins_over_other_list_fields() {
        let doc = json!({"items": [1, 2], "data": [{"input": "a"}]});
        let (shape, _) = detect_shape(&doc);
        assert_eq!(shape, DatasetShape::ObjectWithDataField);
    }

    #[test]
    fn test_detect_named_list_field() {
        let doc = json!({"name": "cwe", "samples": [{"input": "a"}, {"input": "b"}]});
        let (shape, entries) = detect_shape(&doc);
        assert_eq!(
            shape,
            DatasetShape::ObjectWithNamedListField("samples".to_string())
        );
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_detect_single_object() {
        let doc = json!({"input": "code", "output": "description"});
        let (shape, entries) = detect_shape(&doc);
        assert_eq!(shape, DatasetShape::SingleObject);
        assert_eq!(entries, vec![doc]);
    }

    #[test]
    fn test_rewrap_preserves_non_entry_fields() {
        let doc = json!({"version": 1, "source": "nvd", "data": [{"input": "a"}]});
        let (shape, entries) = detect_shape(&doc);
        let rewrapped = rewrap(&shape, entries, &doc);
        assert_eq!(rewrapped, doc);
    }

    #[test]
    fn test_round_trip_all_shapes() {
        let docs = vec![
            json!([{"input": "a"}, {"input": "b"}]),
            json!({"data": [{"input": "a"}]}),
            json!({"records": [{"input": "a"}], "meta": "x"}),
            json!({"input": "a", "output": "b"}),
        ];

        for doc in docs {
            let (shape, entries) = detect_shape(&doc);
            let rewrapped = rewrap(&shape, entries.clone(), &doc);
            let (shape2, entries2) = detect_shape(&rewrapped);
            assert_eq!(shape, shape2);
            assert_eq!(entries, entries2);
        }
    }

    #[test]
    fn test_rewrap_single_object_empty() {
        let doc = json!({"input": "a"});
        let rewrapped = rewrap(&DatasetShape::SingleObject, vec![], &doc);
        assert_eq!(rewrapped, json!({}));
    }

    #[test]
    fn test_rewrap_single_object_is_not_a_list() {
        let doc = json!({"input": "a"});
        let rewrapped = rewrap(&DatasetShape::SingleObject, vec![doc.clone()], &doc);
        assert_eq!(rewrapped, doc);
        assert!(!rewrapped.is_array());
    }

    #[test]
    fn test_extract_entries_by_known_shape() {
        let doc = json!({"samples": [{"input": "a"}], "data_version": "1"});
        let shape = DatasetShape::ObjectWithNamedListField("samples".to_string());
        assert_eq!(
            extract_entries(&shape, &doc),
            Some(vec![json!({"input": "a"})])
        );

        // Mismatched shape yields None rather than guessing
        assert_eq!(extract_entries(&DatasetShape::List, &doc), None);
        assert_eq!(
            extract_entries(&DatasetShape::ObjectWithDataField, &doc),
            None
        );
    }

    #[test]
    fn test_shape_serde_round_trip() {
        let shapes = vec![
            DatasetShape::List,
            DatasetShape::ObjectWithDataField,
            DatasetShape::ObjectWithNamedListField("samples".to_string()),
            DatasetShape::SingleObject,
        ];
        for shape in shapes {
            let text = serde_json::to_string(&shape).unwrap();
            let back: DatasetShape = serde_json::from_str(&text).unwrap();
            assert_eq!(shape, back);
        }
    }
}

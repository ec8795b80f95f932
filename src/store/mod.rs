//! Document storage for test management entities.
//!
//! Documents are JSON objects kept in named collections. Collection names
//! resolve case-insensitively against existing collections, and every
//! document carries its identifier under both `_id` and `id`.

pub mod file;
pub mod memory;
pub mod repository;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use repository::{Collection, Entity, Repository};

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored JSON object.
pub type Document = Map<String, Value>;

/// Field equality filter. An empty filter matches every document.
pub type Filter = Map<String, Value>;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// No document with the given id
    #[error("Document not found in '{collection}': {id}")]
    NotFound { collection: String, id: String },

    /// A document with the same id already exists
    #[error("Duplicate id in '{collection}': {id}")]
    DuplicateId { collection: String, id: String },

    /// Collection name cannot be used
    #[error("Invalid collection name: '{name}'")]
    InvalidCollection { name: String },

    /// Document is not a JSON object or has an unusable id
    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Find/insert/update/delete-by-filter over named collections.
pub trait DocumentStore {
    /// Names of the existing collections.
    fn collections(&self) -> Vec<String>;

    /// All documents matching the filter. A missing collection is empty.
    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// First document matching the filter.
    fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.find(collection, filter)?.into_iter().next())
    }

    /// Store a document, assigning an id if it has none. Returns the stored document.
    fn insert(&mut self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Shallow-merge `patch` into every match. Returns the number updated.
    fn update(&mut self, collection: &str, filter: &Filter, patch: Document) -> StoreResult<usize>;

    /// Remove every match. Returns the number removed.
    fn delete(&mut self, collection: &str, filter: &Filter) -> StoreResult<usize>;
}

pub(crate) const ID: &str = "id";
pub(crate) const MONGO_ID: &str = "_id";
pub(crate) const CREATED_AT: &str = "createdAt";
pub(crate) const UPDATED_AT: &str = "updatedAt";

/// Pick the collection to use for a requested name.
///
/// An exact match wins, then a match ignoring ASCII case. Otherwise the
/// requested name is used as given.
pub fn resolve_collection_name<'a>(
    requested: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> StoreResult<String> {
    validate_collection_name(requested)?;

    let mut case_insensitive = None;
    for name in existing {
        if name == requested {
            return Ok(name.to_string());
        }
        if case_insensitive.is_none() && name.eq_ignore_ascii_case(requested) {
            case_insensitive = Some(name.to_string());
        }
    }

    Ok(case_insensitive.unwrap_or_else(|| requested.to_string()))
}

/// Collection names double as file names, so only a safe subset is allowed.
pub(crate) fn validate_collection_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection {
            name: name.to_string(),
        })
    }
}

/// Read an identifier value: strings, numbers and `{"$oid": ...}` objects.
fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(id_value),
        _ => None,
    }
}

/// The identifier of a document, from `_id` or `id`.
pub fn document_id(document: &Document) -> Option<String> {
    document
        .get(MONGO_ID)
        .and_then(id_value)
        .or_else(|| document.get(ID).and_then(id_value))
}

/// Filter matching a single id.
pub fn id_filter(id: &str) -> Filter {
    let mut filter = Filter::new();
    filter.insert(ID.to_string(), Value::String(id.to_string()));
    filter
}

/// Give a document a flat string id under both `_id` and `id`.
pub(crate) fn reconcile_id(mut document: Document) -> StoreResult<Document> {
    let has_id_field = document.contains_key(MONGO_ID) || document.contains_key(ID);
    let id = match document_id(&document) {
        Some(id) => id,
        None if has_id_field => {
            return Err(StoreError::InvalidDocument {
                message: "id must be a non-empty string, number or {\"$oid\": ...}".to_string(),
            })
        }
        None => uuid::Uuid::new_v4().to_string(),
    };

    document.insert(MONGO_ID.to_string(), Value::String(id.clone()));
    document.insert(ID.to_string(), Value::String(id));
    Ok(document)
}

/// Turn an arbitrary JSON value into a document.
pub fn into_document(value: Value) -> StoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument {
            message: format!("expected a JSON object, got {}", json_type(&other)),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Whether a document satisfies every field of the filter.
///
/// `id` and `_id` in the filter both match the document's identifier.
pub fn matches(document: &Document, filter: &Filter) -> bool {
    filter.iter().all(|(key, expected)| {
        if key == ID || key == MONGO_ID {
            match (document_id(document), id_value(expected)) {
                (Some(actual), Some(expected)) => actual == expected,
                _ => false,
            }
        } else {
            document.get(key) == Some(expected)
        }
    })
}

pub(crate) fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// Merge top-level fields of `patch` into `document`, leaving the id alone.
pub(crate) fn apply_patch(document: &mut Document, patch: &Document) {
    for (key, value) in patch {
        if key == ID || key == MONGO_ID {
            continue;
        }
        document.insert(key.clone(), value.clone());
    }
    document.insert(UPDATED_AT.to_string(), now_timestamp());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        into_document(value).unwrap()
    }

    #[test]
    fn test_resolve_exact_match_wins() {
        let existing = ["TestCases", "testcases"];
        let name = resolve_collection_name("testcases", existing).unwrap();
        assert_eq!(name, "testcases");
    }

    #[test]
    fn test_resolve_case_insensitive_fallback() {
        let name = resolve_collection_name("TESTRUNS", ["projects", "testRuns"]).unwrap();
        assert_eq!(name, "testRuns");
    }

    #[test]
    fn test_resolve_unknown_name_used_as_given() {
        let name = resolve_collection_name("defects", ["projects"]).unwrap();
        assert_eq!(name, "defects");
    }

    #[test]
    fn test_resolve_rejects_unsafe_names() {
        assert!(resolve_collection_name("../etc", ["projects"]).is_err());
        assert!(resolve_collection_name("", ["projects"]).is_err());
    }

    #[test]
    fn test_document_id_sources() {
        assert_eq!(document_id(&doc(json!({"_id": "a"}))), Some("a".to_string()));
        assert_eq!(document_id(&doc(json!({"id": 7}))), Some("7".to_string()));
        assert_eq!(
            document_id(&doc(json!({"_id": {"$oid": "65f0c0ffee"}}))),
            Some("65f0c0ffee".to_string())
        );
        assert_eq!(document_id(&doc(json!({"name": "x"}))), None);
    }

    #[test]
    fn test_reconcile_id_mirrors_fields() {
        let document = reconcile_id(doc(json!({"id": "abc", "name": "x"}))).unwrap();
        assert_eq!(document.get("_id"), Some(&json!("abc")));
        assert_eq!(document.get("id"), Some(&json!("abc")));
    }

    #[test]
    fn test_reconcile_id_generates_when_missing() {
        let document = reconcile_id(doc(json!({"name": "x"}))).unwrap();
        let id = document_id(&document).unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(document.get("id"), Some(&json!(id)));
    }

    #[test]
    fn test_reconcile_id_rejects_bad_id() {
        assert!(reconcile_id(doc(json!({"id": null}))).is_err());
        assert!(reconcile_id(doc(json!({"_id": ""}))).is_err());
    }

    #[test]
    fn test_into_document_rejects_non_objects() {
        let err = into_document(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_matches_id_either_field() {
        let document = doc(json!({"_id": "r1", "projectId": "p1"}));

        assert!(matches(&document, &doc(json!({"id": "r1"}))));
        assert!(matches(&document, &doc(json!({"_id": "r1", "projectId": "p1"}))));
        assert!(!matches(&document, &doc(json!({"id": "r2"}))));
        assert!(!matches(&document, &doc(json!({"projectId": "p2"}))));
        assert!(matches(&document, &Filter::new()));
    }

    #[test]
    fn test_apply_patch_keeps_id() {
        let mut document = reconcile_id(doc(json!({"id": "a", "name": "old"}))).unwrap();
        apply_patch(&mut document, &doc(json!({"id": "b", "_id": "b", "name": "new"})));

        assert_eq!(document_id(&document), Some("a".to_string()));
        assert_eq!(document.get("id"), Some(&json!("a")));
        assert_eq!(document.get("name"), Some(&json!("new")));
        assert!(document.contains_key(UPDATED_AT));
    }
}

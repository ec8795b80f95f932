//! JSON file backed document store.
//!
//! Each collection is a pretty-printed JSON array in `<data_dir>/<name>.json`.
//! All collections are loaded when the store is opened, and a collection's
//! file is rewritten after every mutation of it.

use super::{
    into_document, Document, DocumentStore, Filter, MemoryStore, StoreResult,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Document store persisted as one JSON file per collection.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open (creating if needed) a data directory and load its collections.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let mut inner = MemoryStore::new();
        let mut paths: Vec<PathBuf> = fs::read_dir(&root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping non UTF-8 file name: {}", path.display());
                continue;
            };

            let content = fs::read_to_string(&path)?;
            let documents = parse_collection(&content)?;
            inner.load_collection(name, documents)?;
        }

        info!(
            "Opened data directory {} ({} collections)",
            root.display(),
            inner.collections().len()
        );

        Ok(Self { root, inner })
    }

    /// The data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    /// Write one collection back to its file.
    fn persist(&self, name: &str) -> StoreResult<()> {
        let path = self.collection_path(name);
        let content = serde_json::to_string_pretty(self.inner.documents(name))?;
        fs::write(&path, content)?;

        debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Parse a collection file. An empty file is an empty collection.
fn parse_collection(content: &str) -> StoreResult<Vec<Document>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(content)? {
        Value::Array(values) => values.into_iter().map(into_document).collect(),
        single => Ok(vec![into_document(single)?]),
    }
}

impl DocumentStore for FileStore {
    fn collections(&self) -> Vec<String> {
        self.inner.collections()
    }

    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.inner.find(collection, filter)
    }

    fn insert(&mut self, collection: &str, document: Document) -> StoreResult<Document> {
        let name = self.inner.resolve_name(collection)?;
        let stored = self.inner.insert(&name, document)?;
        self.persist(&name)?;
        Ok(stored)
    }

    fn update(&mut self, collection: &str, filter: &Filter, patch: Document) -> StoreResult<usize> {
        let name = self.inner.resolve_name(collection)?;
        let updated = self.inner.update(&name, filter, patch)?;
        if updated > 0 {
            self.persist(&name)?;
        }
        Ok(updated)
    }

    fn delete(&mut self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let name = self.inner.resolve_name(collection)?;
        let removed = self.inner.delete(&name, filter)?;
        if removed > 0 {
            self.persist(&name)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::id_filter;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        into_document(value).unwrap()
    }

    #[test]
    fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");

        let store = FileStore::open(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
        assert!(store.collections().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();

        {
            let mut store = FileStore::open(temp.path()).unwrap();
            store
                .insert("projects", doc(json!({"id": "p1", "name": "Checkout"})))
                .unwrap();
            store
                .insert("projects", doc(json!({"id": "p2", "name": "Search"})))
                .unwrap();
            store.delete("projects", &id_filter("p2")).unwrap();
        }

        assert!(temp.path().join("projects.json").exists());

        let store = FileStore::open(temp.path()).unwrap();
        let projects = store.find("projects", &Filter::new()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].get("name"), Some(&json!("Checkout")));
    }

    #[test]
    fn test_loads_mongo_export() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("TestRuns.json"),
            r#"[{"_id": {"$oid": "65f1"}, "name": "nightly", "projectId": "p1"}]"#,
        )
        .unwrap();

        let store = FileStore::open(temp.path()).unwrap();
        let run = store
            .find_one("testruns", &id_filter("65f1"))
            .unwrap()
            .unwrap();

        assert_eq!(run.get("id"), Some(&json!("65f1")));
        assert_eq!(store.collections(), vec!["TestRuns".to_string()]);
    }

    #[test]
    fn test_empty_file_is_empty_collection() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("testCases.json"), "").unwrap();

        let store = FileStore::open(temp.path()).unwrap();
        assert_eq!(store.collections(), vec!["testCases".to_string()]);
        assert!(store.find("testCases", &Filter::new()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("projects.json"), "[1, 2, 3]").unwrap();

        assert!(FileStore::open(temp.path()).is_err());
    }

    #[test]
    fn test_update_writes_file() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        store
            .insert("testRuns", doc(json!({"id": "r1", "status": "running"})))
            .unwrap();

        let updated = store
            .update("TESTRUNS", &id_filter("r1"), doc(json!({"status": "completed"})))
            .unwrap();
        assert_eq!(updated, 1);

        let content = fs::read_to_string(temp.path().join("testRuns.json")).unwrap();
        assert!(content.contains("completed"));
    }

    #[test]
    fn test_files_differing_by_case_both_load() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("TestRuns.json"), r#"[{"_id": "a"}]"#).unwrap();
        fs::write(temp.path().join("testRuns.json"), r#"[{"_id": "b"}]"#).unwrap();

        let mut store = FileStore::open(temp.path()).unwrap();
        assert_eq!(store.collections().len(), 2);
        assert_eq!(store.find("TestRuns", &Filter::new()).unwrap().len(), 1);
        assert_eq!(store.find("testRuns", &Filter::new()).unwrap().len(), 1);

        store.insert("testRuns", doc(json!({"_id": "c"}))).unwrap();

        let reopened = FileStore::open(temp.path()).unwrap();
        assert_eq!(reopened.find("TestRuns", &Filter::new()).unwrap().len(), 1);
        assert_eq!(reopened.find("testRuns", &Filter::new()).unwrap().len(), 2);
    }
}

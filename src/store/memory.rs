//! In-memory document store.

use super::{
    apply_patch, document_id, matches, now_timestamp, reconcile_id, resolve_collection_name,
    validate_collection_name, Document, DocumentStore, Filter, StoreError, StoreResult,
    CREATED_AT,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Collections held in memory, in insertion order per collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Vec<Document>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the stored collection name for a requested one.
    pub fn resolve_name(&self, requested: &str) -> StoreResult<String> {
        resolve_collection_name(requested, self.collections.keys().map(String::as_str))
    }

    /// Documents of a collection by its exact stored name.
    pub(crate) fn documents(&self, name: &str) -> &[Document] {
        self.collections
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replace a collection wholesale, reconciling ids of the loaded documents.
    ///
    /// The name is taken literally; collections differing only by case stay apart.
    pub(crate) fn load_collection(
        &mut self,
        name: &str,
        documents: Vec<Document>,
    ) -> StoreResult<()> {
        validate_collection_name(name)?;
        let name = name.to_string();
        let documents = documents
            .into_iter()
            .map(reconcile_id)
            .collect::<StoreResult<Vec<_>>>()?;

        debug!("Loaded {} documents into '{}'", documents.len(), name);
        self.collections.insert(name, documents);
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn collections(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let name = self.resolve_name(collection)?;
        Ok(self
            .documents(&name)
            .iter()
            .filter(|document| matches(document, filter))
            .cloned()
            .collect())
    }

    fn insert(&mut self, collection: &str, document: Document) -> StoreResult<Document> {
        let name = self.resolve_name(collection)?;
        let mut document = reconcile_id(document)?;
        let id = document_id(&document).unwrap_or_default();

        let documents = self.collections.entry(name.clone()).or_default();
        if documents
            .iter()
            .any(|existing| document_id(existing).as_deref() == Some(id.as_str()))
        {
            return Err(StoreError::DuplicateId {
                collection: name,
                id,
            });
        }

        if !document.contains_key(CREATED_AT) {
            document.insert(CREATED_AT.to_string(), now_timestamp());
        }

        debug!("Inserted '{}' into '{}'", id, name);
        documents.push(document.clone());
        Ok(document)
    }

    fn update(&mut self, collection: &str, filter: &Filter, patch: Document) -> StoreResult<usize> {
        let name = self.resolve_name(collection)?;
        let Some(documents) = self.collections.get_mut(&name) else {
            return Ok(0);
        };

        let mut updated = 0;
        for document in documents.iter_mut().filter(|d| matches(d, filter)) {
            apply_patch(document, &patch);
            updated += 1;
        }

        debug!("Updated {} documents in '{}'", updated, name);
        Ok(updated)
    }

    fn delete(&mut self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let name = self.resolve_name(collection)?;
        let Some(documents) = self.collections.get_mut(&name) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|document| !matches(document, filter));
        let removed = before - documents.len();

        debug!("Deleted {} documents from '{}'", removed, name);
        Ok(removed)
    }
}

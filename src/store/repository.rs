//! Typed per-entity access on top of a [`DocumentStore`].

use super::{
    apply_patch, id_filter, into_document, Document, DocumentStore, Filter, StoreError, StoreResult,
};
use crate::models::{Project, TestCase, TestResult, TestRun, TestSuite};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// The entity collections of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Projects,
    TestCases,
    TestSuites,
    TestRuns,
    TestResults,
}

impl Collection {
    /// Stored collection name.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::TestCases => "testCases",
            Collection::TestSuites => "testSuites",
            Collection::TestRuns => "testRuns",
            Collection::TestResults => "testResults",
        }
    }

    /// Recognize a collection from any casing, separator style or singular form.
    ///
    /// `test_cases`, `test-cases`, `TestCases` and `testcase` all map to
    /// [`Collection::TestCases`].
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let singular = normalized.strip_suffix('s').unwrap_or(&normalized);

        match singular {
            "project" => Some(Collection::Projects),
            "testcase" => Some(Collection::TestCases),
            "testsuite" => Some(Collection::TestSuites),
            "testrun" => Some(Collection::TestRuns),
            "testresult" => Some(Collection::TestResults),
            _ => None,
        }
    }

    /// Check that a document decodes as this collection's entity type.
    pub fn validate(&self, document: &Document) -> StoreResult<()> {
        let value = Value::Object(document.clone());
        let decoded = match self {
            Collection::Projects => serde_json::from_value::<Project>(value).map(drop),
            Collection::TestCases => serde_json::from_value::<TestCase>(value).map(drop),
            Collection::TestSuites => serde_json::from_value::<TestSuite>(value).map(drop),
            Collection::TestRuns => serde_json::from_value::<TestRun>(value).map(drop),
            Collection::TestResults => serde_json::from_value::<TestResult>(value).map(drop),
        };

        decoded.map_err(|e| StoreError::InvalidDocument {
            message: format!("not a valid {} document: {}", self, e),
        })
    }

    /// Check that `document` with `patch` merged in still decodes.
    pub fn validate_patch(&self, document: &Document, patch: &Document) -> StoreResult<()> {
        let mut patched = document.clone();
        apply_patch(&mut patched, patch);
        self.validate(&patched)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A record type stored in one of the entity collections.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
}

impl Entity for Project {
    const COLLECTION: Collection = Collection::Projects;
}

impl Entity for TestCase {
    const COLLECTION: Collection = Collection::TestCases;
}

impl Entity for TestSuite {
    const COLLECTION: Collection = Collection::TestSuites;
}

impl Entity for TestRun {
    const COLLECTION: Collection = Collection::TestRuns;
}

impl Entity for TestResult {
    const COLLECTION: Collection = Collection::TestResults;
}

/// Typed CRUD for one entity type.
pub struct Repository<'a, S: DocumentStore + ?Sized, T: Entity> {
    store: &'a mut S,
    _entity: PhantomData<T>,
}

impl<'a, S: DocumentStore + ?Sized, T: Entity> Repository<'a, S, T> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    fn collection(&self) -> &'static str {
        T::COLLECTION.name()
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: self.collection().to_string(),
            id: id.to_string(),
        }
    }

    fn decode(document: Document) -> StoreResult<T> {
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    fn decode_all(documents: Vec<Document>) -> StoreResult<Vec<T>> {
        documents.into_iter().map(Self::decode).collect()
    }

    /// Every entity in the collection.
    pub fn list(&self) -> StoreResult<Vec<T>> {
        Self::decode_all(self.store.find(self.collection(), &Filter::new())?)
    }

    /// Entities whose `field` equals `value`.
    pub fn list_by(&self, field: &str, value: impl Into<Value>) -> StoreResult<Vec<T>> {
        let mut filter = Filter::new();
        filter.insert(field.to_string(), value.into());
        Self::decode_all(self.store.find(self.collection(), &filter)?)
    }

    /// The entity with the given id.
    pub fn get(&self, id: &str) -> StoreResult<T> {
        match self.store.find_one(self.collection(), &id_filter(id))? {
            Some(document) => Self::decode(document),
            None => Err(self.not_found(id)),
        }
    }

    /// Store a new entity. An empty id is replaced by a generated one.
    pub fn create(&mut self, entity: &T) -> StoreResult<T> {
        let collection = self.collection();
        let document = into_document(serde_json::to_value(entity)?)?;
        let stored = self.store.insert(collection, document)?;
        Self::decode(stored)
    }

    /// Merge `patch` into the entity and return the updated entity.
    ///
    /// A patch that would leave an undecodable entity is rejected unwritten.
    pub fn update(&mut self, id: &str, patch: Document) -> StoreResult<T> {
        let collection = self.collection();
        let Some(current) = self.store.find_one(collection, &id_filter(id))? else {
            return Err(self.not_found(id));
        };
        T::COLLECTION.validate_patch(&current, &patch)?;

        let updated = self.store.update(collection, &id_filter(id), patch)?;
        if updated == 0 {
            return Err(self.not_found(id));
        }
        self.get(id)
    }

    /// Remove the entity with the given id.
    pub fn delete(&mut self, id: &str) -> StoreResult<()> {
        let collection = self.collection();
        let removed = self.store.delete(collection, &id_filter(id))?;
        if removed == 0 {
            return Err(self.not_found(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, RunStatus, TestStatus};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn project(name: &str) -> Project {
        Project {
            name: name.to_string(),
            ..Project::default()
        }
    }

    #[test]
    fn test_collection_from_name() {
        assert_eq!(Collection::from_name("projects"), Some(Collection::Projects));
        assert_eq!(Collection::from_name("Project"), Some(Collection::Projects));
        assert_eq!(Collection::from_name("test_cases"), Some(Collection::TestCases));
        assert_eq!(Collection::from_name("test-suites"), Some(Collection::TestSuites));
        assert_eq!(Collection::from_name("TestRuns"), Some(Collection::TestRuns));
        assert_eq!(Collection::from_name("testresult"), Some(Collection::TestResults));
        assert_eq!(Collection::from_name("defects"), None);
    }

    #[test]
    fn test_collection_names_round_trip() {
        for collection in [
            Collection::Projects,
            Collection::TestCases,
            Collection::TestSuites,
            Collection::TestRuns,
            Collection::TestResults,
        ] {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
        }
    }

    #[test]
    fn test_validate_document() {
        let valid = into_document(json!({"runId": "r1", "testCaseId": "c1", "status": "passed"}))
            .unwrap();
        assert!(Collection::TestResults.validate(&valid).is_ok());

        let bad_status =
            into_document(json!({"runId": "r1", "testCaseId": "c1", "status": "flaky"})).unwrap();
        let err = Collection::TestResults.validate(&bad_status).unwrap_err();
        assert!(err.to_string().contains("testResults"));

        let missing_name = into_document(json!({"description": "no name"})).unwrap();
        assert!(Collection::Projects.validate(&missing_name).is_err());
    }

    #[test]
    fn test_create_assigns_id_and_timestamp() {
        let mut store = MemoryStore::new();
        let mut projects = Repository::<_, Project>::new(&mut store);

        let created = projects.create(&project("Checkout")).unwrap();

        assert!(!created.id.is_empty());
        assert!(created.created_at.is_some());
        assert_eq!(projects.get(&created.id).unwrap(), created);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let mut store = MemoryStore::new();
        let projects = Repository::<_, Project>::new(&mut store);

        let err = projects.get("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_update_and_delete() {
        let mut store = MemoryStore::new();
        let mut cases = Repository::<_, TestCase>::new(&mut store);

        let created = cases
            .create(&TestCase {
                project_id: "p1".to_string(),
                title: "Login".to_string(),
                ..TestCase::default()
            })
            .unwrap();

        let patch = into_document(json!({"priority": "HIGH", "tags": ["auth"]})).unwrap();
        let updated = cases.update(&created.id, patch).unwrap();

        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.tags, vec!["auth".to_string()]);
        assert!(updated.updated_at.is_some());

        cases.delete(&created.id).unwrap();
        assert!(cases.list().unwrap().is_empty());
        assert!(matches!(
            cases.delete(&created.id),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            cases.update(&created.id, Document::new()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_rejects_invalid_patch() {
        let mut store = MemoryStore::new();
        let mut results = Repository::<_, TestResult>::new(&mut store);

        let created = results
            .create(&TestResult {
                id: "x1".to_string(),
                run_id: "r1".to_string(),
                test_case_id: "c1".to_string(),
                status: TestStatus::Passed,
                duration_ms: None,
                message: None,
                created_at: None,
                updated_at: None,
            })
            .unwrap();

        let patch = into_document(json!({"status": "flaky"})).unwrap();
        let err = results.update(&created.id, patch).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { .. }));

        let stored = results.get(&created.id).unwrap();
        assert_eq!(stored.status, TestStatus::Passed);
        assert!(stored.updated_at.is_none());
    }

    #[test]
    fn test_validate_patch() {
        let current =
            into_document(json!({"_id": "r1", "projectId": "p1", "name": "nightly"})).unwrap();

        let ok = into_document(json!({"status": "completed"})).unwrap();
        assert!(Collection::TestRuns.validate_patch(&current, &ok).is_ok());

        let bad = into_document(json!({"status": "exploded"})).unwrap();
        assert!(Collection::TestRuns.validate_patch(&current, &bad).is_err());
    }

    #[test]
    fn test_list_by_field() {
        let mut store = MemoryStore::new();
        let mut runs = Repository::<_, TestRun>::new(&mut store);

        for (id, project) in [("r1", "p1"), ("r2", "p2"), ("r3", "p1")] {
            runs.create(&TestRun {
                id: id.to_string(),
                project_id: project.to_string(),
                name: format!("run {}", id),
                status: RunStatus::Completed,
                ..TestRun::default()
            })
            .unwrap();
        }

        let p1_runs = runs.list_by("projectId", "p1").unwrap();
        let ids: Vec<_> = p1_runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
    }

    #[test]
    fn test_generic_insert_visible_through_repository() {
        let mut store = MemoryStore::new();
        store
            .insert(
                "TESTRESULTS",
                into_document(json!({
                    "_id": "x1", "runId": "r1", "testCaseId": "c1", "status": "Passed"
                }))
                .unwrap(),
            )
            .unwrap();
        store
            .insert(
                "testResults",
                into_document(json!({
                    "id": "x2", "runId": "r1", "testCaseId": "c2", "status": "failed"
                }))
                .unwrap(),
            )
            .unwrap();

        let results = Repository::<_, TestResult>::new(&mut store).list().unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "x1");
        assert_eq!(results[0].status, TestStatus::Passed);
        assert_eq!(results[1].status, TestStatus::Failed);
    }
}
